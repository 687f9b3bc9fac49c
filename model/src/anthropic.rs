use crate::http::{build_client, ensure_success, handle_http_error};
use crate::provider::{ModelError, ModelProvider, ModelResult, TokenStream};
use crate::sse;
use crate::types::{ChatRequest, ChatResponse, FinishReason, Usage};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

const PROVIDER: &str = "anthropic";
const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Clone, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Clone, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: Option<StreamDelta>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Clone, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct StreamError {
    message: String,
}

pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    api_version: String,
}

impl AnthropicProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_version: impl Into<String>,
        timeout: Duration,
    ) -> ModelResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_version: api_version.into(),
        })
    }

    fn build_request_body(request: &ChatRequest, stream: bool) -> MessagesRequest {
        MessagesRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: request.system_prompt(),
            messages: request
                .conversation()
                .map(|m| AnthropicMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone().unwrap_or_default(),
                })
                .collect(),
            temperature: request.temperature,
            stream,
        }
    }

    fn parse_response(response: MessagesResponse) -> ModelResult<ChatResponse> {
        let text: String = response
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if text.is_empty() {
            return Err(ModelError::EmptyResponse { provider: PROVIDER });
        }

        let mut chat = ChatResponse::from_text(
            text,
            response.stop_reason.as_deref().map(FinishReason::from_vendor),
        );
        if let Some(usage) = response.usage {
            chat = chat.with_usage(Usage::new(usage.input_tokens, usage.output_tokens));
        }
        Ok(chat)
    }

    fn stream_fragment(data: &str) -> Option<ModelResult<String>> {
        let event: StreamEvent = match serde_json::from_str(data) {
            Ok(event) => event,
            Err(e) => {
                warn!("anthropic sent an unreadable stream event: {}", e);
                return Some(Err(ModelError::Serialization(e)));
            }
        };

        match event.event_type.as_str() {
            "content_block_delta" => event
                .delta
                .and_then(|d| d.text)
                .filter(|t| !t.is_empty())
                .map(Ok),
            "error" => Some(Err(ModelError::Api {
                provider: PROVIDER,
                status: 200,
                message: event
                    .error
                    .map(|e| e.message)
                    .unwrap_or_else(|| "stream error".to_string()),
            })),
            _ => None,
        }
    }

    async fn post(&self, body: &MessagesRequest) -> ModelResult<reqwest::Response> {
        let url = format!("{}/v1/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(body)
            .send()
            .await
            .map_err(|e| handle_http_error(PROVIDER, e))?;
        ensure_success(PROVIDER, response).await
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    async fn chat(&self, request: ChatRequest) -> ModelResult<ChatResponse> {
        debug!("Starting anthropic messages request with model: {}", request.model);

        let body = Self::build_request_body(&request, false);
        let response = self.post(&body).await?;
        let api_response: MessagesResponse = response
            .json()
            .await
            .map_err(|e| handle_http_error(PROVIDER, e))?;

        let chat = Self::parse_response(api_response)?;
        info!("anthropic request completed for {}", request.model);
        Ok(chat)
    }

    async fn chat_stream(&self, request: ChatRequest) -> ModelResult<TokenStream> {
        let body = Self::build_request_body(&request, true);
        let response = self.post(&body).await?;

        let fragments = sse::data_events(response).filter_map(|event| async move {
            match event {
                Ok(data) => Self::stream_fragment(&data),
                Err(e) => Some(Err(e)),
            }
        });
        Ok(fragments.boxed())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
