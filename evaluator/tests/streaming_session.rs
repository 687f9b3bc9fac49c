use evaluator::{EvalConfig, StreamEvent, StreamRequest, StreamSession};
use model::{AdapterTable, ModelRegistry, ProviderCredentials, ProviderEndpoints, ProviderFamily};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::test]
async fn test_stream_session_over_sse() {
    let mut openai = mockito::Server::new_async().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"وش \"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"الأخبار؟ \"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"وايد زين\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    let _stream = openai
        .mock("POST", "/chat/completions")
        .match_body(mockito::Matcher::Regex(r#""stream":true"#.to_string()))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let mut config = EvalConfig::new()
        .with_timeout(Duration::from_secs(5))
        .with_credentials(ProviderCredentials::new().with_key(ProviderFamily::OpenAi, "sk-test"));
    config.provider.endpoints =
        ProviderEndpoints::default().with_endpoint(ProviderFamily::OpenAi, openai.url());

    let adapters =
        AdapterTable::from_registry(&ModelRegistry::builtin(), &config.provider).unwrap();
    let session = StreamSession::new(Arc::new(adapters), config.dispatch_config());

    let request: StreamRequest = serde_json::from_value(serde_json::json!({
        "prompt": "كيف حالك اليوم؟",
        "dialect": "gulf",
        "models": ["gpt-4o", "gemini-1.5-pro"],
        "max_tokens": 9000
    }))
    .unwrap();

    let (tx, mut rx) = mpsc::channel(16);
    let run = tokio::spawn(async move { session.run(request, tx).await });

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    let evaluation_id = run.await.unwrap().unwrap();

    assert_eq!(
        events.first(),
        Some(&StreamEvent::EvaluationStart {
            evaluation_id,
            models: vec!["gpt-4o".to_string(), "gemini-1.5-pro".to_string()],
        })
    );
    assert_eq!(
        events.last(),
        Some(&StreamEvent::EvaluationComplete { evaluation_id })
    );

    let tokens: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Token { model_id, token } if model_id == "gpt-4o" => Some(token.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(tokens, vec!["وش ", "الأخبار؟ ", "وايد زين"]);

    let end = events
        .iter()
        .find_map(|e| match e {
            StreamEvent::StreamEnd {
                model_id,
                token_count,
                linguistic_metrics,
                ..
            } if model_id == "gpt-4o" => Some((*token_count, linguistic_metrics.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(end.0, 4);
    assert_eq!(end.1.detected_dialect, Some(evaluator::Dialect::Gulf));
    assert!(end.1.dialect_match);

    let gemini: Vec<&StreamEvent> = events
        .iter()
        .filter(|e| e.model_id() == Some("gemini-1.5-pro"))
        .collect();
    assert_eq!(gemini.len(), 1);
    match gemini[0] {
        StreamEvent::StreamError { error, .. } => assert!(error.contains("GOOGLE_API_KEY")),
        other => panic!("expected stream_error, got {:?}", other),
    }
}
