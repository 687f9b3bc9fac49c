//! Full evaluations against mocked provider APIs.

use evaluator::{EvalConfig, EvalError, EvaluationPipeline, EvaluationRequest, JudgeConfig};
use mockito::{Matcher, Mock, ServerGuard};
use model::{ProviderCredentials, ProviderEndpoints, ProviderFamily};
use serde_json::json;
use std::time::Duration;

const PROMPT: &str = "اشرح الفرق بين الذكاء الاصطناعي والتعلم الآلي";
const GPT_ANSWER: &str = "الذكاء الاصطناعي مجال أوسع يشمل التعلم الآلي GPTANSWER";
const CLAUDE_ANSWER: &str = "التعلم الآلي فرع من فروع الذكاء الاصطناعي CLAUDEANSWER";

fn openai_body(content: &str) -> String {
    json!({
        "choices": [{
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
    .to_string()
}

fn anthropic_body(text: &str) -> String {
    json!({
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 40, "output_tokens": 12}
    })
    .to_string()
}

fn config(
    openai: &ServerGuard,
    anthropic: &ServerGuard,
    credentials: ProviderCredentials,
) -> EvalConfig {
    let mut config = EvalConfig::new()
        .with_timeout(Duration::from_secs(10))
        .with_judge(JudgeConfig::default().with_retries(1, 1))
        .with_credentials(credentials);
    config.provider.endpoints = ProviderEndpoints::default()
        .with_endpoint(ProviderFamily::OpenAi, openai.url())
        .with_endpoint(ProviderFamily::Anthropic, anthropic.url());
    config
}

fn all_keys() -> ProviderCredentials {
    ProviderCredentials::new()
        .with_key(ProviderFamily::OpenAi, "sk-test")
        .with_key(ProviderFamily::Anthropic, "sk-ant-test")
}

/// Evaluated-model call; judge calls never carry the evaluation system prompt.
fn gpt_answer(server: &mut ServerGuard) -> Mock {
    server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("Respond in the requested dialect".to_string()))
        .with_status(200)
        .with_body(openai_body(GPT_ANSWER))
}

async fn mock_judge(
    server: &mut ServerGuard,
    answer_tag: &str,
    verdict: serde_json::Value,
) -> Mock {
    server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("Score this response".to_string()),
            Matcher::Regex(answer_tag.to_string()),
        ]))
        .with_status(200)
        .with_body(openai_body(&verdict.to_string()))
        .create_async()
        .await
}

fn request(models: &[&str]) -> EvaluationRequest {
    EvaluationRequest::new(PROMPT, models.iter().map(|m| m.to_string()).collect())
}

#[tokio::test]
async fn test_two_models_scored_and_winner_selected() {
    let mut openai = mockito::Server::new_async().await;
    let mut anthropic = mockito::Server::new_async().await;

    let _gpt = gpt_answer(&mut openai).create_async().await;
    let _claude = anthropic
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "sk-ant-test")
        .with_status(200)
        .with_body(anthropic_body(CLAUDE_ANSWER))
        .create_async()
        .await;
    let _judge_gpt = mock_judge(
        &mut openai,
        "GPTANSWER",
        json!({
            "arabic_quality": 7, "accuracy": 7, "dialect_adherence": 7,
            "technical_precision": 7, "completeness": 7, "cultural_sensitivity": 7,
            "reasoning": "Correct but brief."
        }),
    )
    .await;
    let _judge_claude = mock_judge(
        &mut openai,
        "CLAUDEANSWER",
        json!({"arabic_quality": 9.5, "accuracy": 12, "overall": 9.1, "reasoning": "ممتاز"}),
    )
    .await;

    let pipeline =
        EvaluationPipeline::from_config(&config(&openai, &anthropic, all_keys())).unwrap();
    let outcome = pipeline
        .run(&request(&["gpt-4o", "claude-3-5-sonnet"]))
        .await
        .unwrap();

    assert_eq!(outcome.responses.len(), 2);
    assert_eq!(outcome.responses[0].result.model_id, "gpt-4o");
    assert_eq!(outcome.responses[1].result.model_id, "claude-3-5-sonnet");
    assert!(outcome.responses.iter().all(|r| r.result.response_text.is_some()));

    let gpt = &outcome.responses[0];
    assert_eq!(gpt.result.provider, "OpenAI");
    assert_eq!(gpt.scores.overall, Some(7.0));
    let metrics = gpt.result.linguistic_metrics.as_ref().unwrap();
    assert!(metrics.arabic_char_ratio > 0.5);

    let claude = &outcome.responses[1];
    assert_eq!(claude.scores.accuracy, Some(10.0));
    assert_eq!(claude.scores.overall, Some(9.1));
    assert_eq!(claude.scores.reasoning.as_deref(), Some("ممتاز"));

    assert_eq!(outcome.winner_model_id.as_deref(), Some("claude-3-5-sonnet"));
    assert_eq!(outcome.ranking, vec!["gpt-4o", "claude-3-5-sonnet"]);
    assert!(outcome.total_cost_usd > 0.0);
}

#[tokio::test]
async fn test_missing_credential_isolated_to_its_model() {
    let mut openai = mockito::Server::new_async().await;
    let mut anthropic = mockito::Server::new_async().await;

    let _gpt = gpt_answer(&mut openai).create_async().await;
    let _judge = mock_judge(&mut openai, "GPTANSWER", json!({"overall": 6.4})).await;
    let claude = anthropic
        .mock("POST", "/v1/messages")
        .expect(0)
        .create_async()
        .await;

    let credentials = ProviderCredentials::new().with_key(ProviderFamily::OpenAi, "sk-test");
    let pipeline =
        EvaluationPipeline::from_config(&config(&openai, &anthropic, credentials)).unwrap();
    let outcome = pipeline
        .run(&request(&["claude-3-5-sonnet", "gpt-4o"]))
        .await
        .unwrap();

    let missing = &outcome.responses[0];
    assert_eq!(missing.result.model_id, "claude-3-5-sonnet");
    assert!(missing.result.response_text.is_none());
    assert!(missing
        .result
        .error
        .as_deref()
        .unwrap()
        .contains("ANTHROPIC_API_KEY is not set"));
    assert_eq!(missing.result.cost_usd, 0.0);
    assert_eq!(missing.scores.overall, None);
    assert_eq!(
        missing.scores.reasoning.as_deref(),
        Some("Model returned an error.")
    );

    assert_eq!(outcome.responses[1].scores.overall, Some(6.4));
    assert_eq!(outcome.winner_model_id.as_deref(), Some("gpt-4o"));
    assert_eq!(outcome.ranking, vec!["gpt-4o"]);
    claude.assert_async().await;
}

#[tokio::test]
async fn test_unconfigured_judge_leaves_scores_null() {
    let mut openai = mockito::Server::new_async().await;
    let anthropic = mockito::Server::new_async().await;
    let gpt = gpt_answer(&mut openai).expect(2).create_async().await;

    let mut config = config(
        &openai,
        &anthropic,
        ProviderCredentials::new().with_key(ProviderFamily::OpenAi, "sk-test"),
    );
    config.judge = config.judge.with_judge_model("claude-3-opus");

    let pipeline = EvaluationPipeline::from_config(&config).unwrap();
    let outcome = pipeline
        .run(&request(&["gpt-4o", "gpt-3.5-turbo"]))
        .await
        .unwrap();

    for response in &outcome.responses {
        assert!(response.result.response_text.is_some());
        assert_eq!(response.scores.overall, None);
        let reasoning = response.scores.reasoning.as_deref().unwrap();
        assert!(reasoning.starts_with("Judge model not configured"));
    }
    assert_eq!(outcome.winner_model_id, None);
    assert!(outcome.ranking.is_empty());
    gpt.assert_async().await;
}

#[tokio::test]
async fn test_judge_exhaustion_reported_per_response() {
    let mut openai = mockito::Server::new_async().await;
    let anthropic = mockito::Server::new_async().await;
    let _gpt = gpt_answer(&mut openai).create_async().await;
    let judge = openai
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("Score this response".to_string()))
        .with_status(503)
        .with_body("overloaded")
        .expect(4)
        .create_async()
        .await;

    let pipeline = EvaluationPipeline::from_config(&config(
        &openai,
        &anthropic,
        ProviderCredentials::new().with_key(ProviderFamily::OpenAi, "sk-test"),
    ))
    .unwrap();
    let outcome = pipeline
        .run(&request(&["gpt-4o", "gpt-4-turbo"]))
        .await
        .unwrap();

    assert_eq!(outcome.responses.len(), 2);
    for response in &outcome.responses {
        assert!(response.result.error.is_none());
        assert_eq!(response.scores.overall, None);
        let reasoning = response.scores.reasoning.as_deref().unwrap();
        assert!(reasoning.contains("after 2 attempts"), "{reasoning}");
    }
    assert_eq!(outcome.winner_model_id, None);
    judge.assert_async().await;
}

#[tokio::test]
async fn test_invalid_request_rejected_before_dispatch() {
    let mut openai = mockito::Server::new_async().await;
    let anthropic = mockito::Server::new_async().await;
    let gpt = gpt_answer(&mut openai).expect(0).create_async().await;

    let pipeline =
        EvaluationPipeline::from_config(&config(&openai, &anthropic, all_keys())).unwrap();
    let err = pipeline
        .run(&request(&["gpt-4o", "gpt-4o"]))
        .await
        .unwrap_err();

    assert!(matches!(err, EvalError::InvalidRequest { .. }));
    gpt.assert_async().await;
}
