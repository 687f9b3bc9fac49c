use crate::http::{build_client, ensure_success, handle_http_error};
use crate::provider::{ModelError, ModelProvider, ModelResult, TokenStream};
use crate::sse;
use crate::types::{ChatRequest, ChatResponse, FinishReason, MessageRole, Usage};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

const PROVIDER: &str = "google";
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

impl GenerateContentResponse {
    fn first_text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Gemini `generateContent` client.
pub struct GoogleProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoogleProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> ModelResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn build_request_body(request: &ChatRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: request.system_prompt().map(|text| Content {
                role: None,
                parts: vec![Part { text: Some(text) }],
            }),
            contents: request
                .conversation()
                .map(|m| Content {
                    role: Some(
                        match m.role {
                            MessageRole::Assistant => "model",
                            _ => "user",
                        }
                        .to_string(),
                    ),
                    parts: vec![Part {
                        text: Some(m.content.clone().unwrap_or_default()),
                    }],
                })
                .collect(),
            generation_config: GenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        }
    }

    fn parse_response(response: GenerateContentResponse) -> ModelResult<ChatResponse> {
        let text = response.first_text();
        if text.is_empty() {
            return Err(ModelError::EmptyResponse { provider: PROVIDER });
        }

        let finish_reason = response
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .map(FinishReason::from_vendor);

        let mut chat = ChatResponse::from_text(text, finish_reason);
        if let Some(usage) = response.usage_metadata {
            chat = chat.with_usage(Usage::new(
                usage.prompt_token_count,
                usage.candidates_token_count,
            ));
        }
        Ok(chat)
    }

    async fn post(
        &self,
        url: &str,
        body: &GenerateContentRequest,
    ) -> ModelResult<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| handle_http_error(PROVIDER, e))?;
        ensure_success(PROVIDER, response).await
    }
}

#[async_trait]
impl ModelProvider for GoogleProvider {
    async fn chat(&self, request: ChatRequest) -> ModelResult<ChatResponse> {
        debug!("Starting gemini request with model: {}", request.model);

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model
        );
        let body = Self::build_request_body(&request);
        let response = self.post(&url, &body).await?;
        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| handle_http_error(PROVIDER, e))?;

        let chat = Self::parse_response(api_response)?;
        info!("gemini request completed for {}", request.model);
        Ok(chat)
    }

    async fn chat_stream(&self, request: ChatRequest) -> ModelResult<TokenStream> {
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, request.model
        );
        let body = Self::build_request_body(&request);
        let response = self.post(&url, &body).await?;

        let fragments = sse::data_events(response).filter_map(|event| async move {
            match event {
                Ok(data) => match serde_json::from_str::<GenerateContentResponse>(&data) {
                    Ok(chunk) => Some(chunk.first_text()).filter(|t| !t.is_empty()).map(Ok),
                    Err(e) => {
                        warn!("gemini sent an unreadable stream chunk: {}", e);
                        Some(Err(ModelError::Serialization(e)))
                    }
                },
                Err(e) => Some(Err(e)),
            }
        });
        Ok(fragments.boxed())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
