use crate::http::{build_client, ensure_success, handle_http_error};
use crate::provider::{ModelError, ModelProvider, ModelResult, TokenStream};
use crate::sse;
use crate::types::{ChatMessage, ChatRequest, ChatResponse, Choice, FinishReason, Usage};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// OpenAI-compatible chat completion request
#[derive(Debug, Clone, Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Client for any `/chat/completions` endpoint speaking the OpenAI protocol.
///
/// OpenAI itself, Groq, Mistral and the hosted Jais endpoint all share this
/// wire format and differ only in base URL, key and display name.
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    name: &'static str,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        name: &'static str,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> ModelResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ModelError::InvalidConfig {
                message: format!("{} base URL cannot be empty", name),
            });
        }

        Ok(Self {
            client: build_client(timeout)?,
            base_url,
            api_key: api_key.into(),
            name,
        })
    }

    fn build_request_body(request: &ChatRequest, stream: bool) -> OpenAiChatRequest {
        OpenAiChatRequest {
            model: request.model.clone(),
            messages: request
                .messages
                .iter()
                .map(Self::convert_message)
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        }
    }

    fn convert_message(msg: &ChatMessage) -> OpenAiMessage {
        OpenAiMessage {
            role: msg.role.as_str().to_string(),
            content: Some(msg.content.clone().unwrap_or_default()),
        }
    }

    fn parse_response(&self, response: OpenAiChatResponse) -> ModelResult<ChatResponse> {
        let choices: Vec<Choice> = response
            .choices
            .into_iter()
            .filter_map(|choice| {
                let content = choice.message.content.filter(|c| !c.is_empty())?;
                Some(Choice {
                    message: ChatMessage::assistant(content),
                    finish_reason: choice.finish_reason.as_deref().map(FinishReason::from_vendor),
                })
            })
            .collect();

        if choices.is_empty() {
            return Err(ModelError::EmptyResponse {
                provider: self.name,
            });
        }

        Ok(ChatResponse {
            choices,
            usage: response
                .usage
                .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens)),
        })
    }

    async fn post(&self, body: &OpenAiChatRequest) -> ModelResult<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| handle_http_error(self.name, e))?;
        ensure_success(self.name, response).await
    }
}

#[async_trait]
impl ModelProvider for OpenAiCompatibleProvider {
    async fn chat(&self, request: ChatRequest) -> ModelResult<ChatResponse> {
        debug!("Starting {} chat request with model: {}", self.name, request.model);

        let body = Self::build_request_body(&request, false);
        let response = self.post(&body).await?;
        let api_response: OpenAiChatResponse = response
            .json()
            .await
            .map_err(|e| handle_http_error(self.name, e))?;

        let chat_response = self.parse_response(api_response)?;
        info!("{} chat request completed for {}", self.name, request.model);
        Ok(chat_response)
    }

    async fn chat_stream(&self, request: ChatRequest) -> ModelResult<TokenStream> {
        debug!("Starting {} stream with model: {}", self.name, request.model);

        let body = Self::build_request_body(&request, true);
        let response = self.post(&body).await?;
        let name = self.name;

        let fragments = sse::data_events(response).filter_map(move |event| async move {
            match event {
                Ok(data) => match serde_json::from_str::<OpenAiStreamChunk>(&data) {
                    Ok(chunk) => chunk
                        .choices
                        .into_iter()
                        .find_map(|c| c.delta.content)
                        .filter(|c| !c.is_empty())
                        .map(Ok),
                    Err(e) => {
                        warn!("{} sent an unreadable stream chunk: {}", name, e);
                        Some(Err(ModelError::Serialization(e)))
                    }
                },
                Err(e) => Some(Err(e)),
            }
        });

        Ok(fragments.boxed())
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }
}
