use crate::types::{ChatRequest, ChatResponse};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Model '{model}' is not available or misconfigured: {reason}")]
    ModelNotAvailable { model: String, reason: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Authentication failed")]
    Authentication,

    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("{provider} returned no text content")]
    EmptyResponse { provider: &'static str },

    #[error("Unknown error: {message}")]
    Unknown { message: String },
}

impl ModelError {
    pub fn not_available(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModelNotAvailable {
            model: model.into(),
            reason: reason.into(),
        }
    }
}

pub type ModelResult<T> = Result<T, ModelError>;

/// Text fragments in the order the provider produced them.
pub type TokenStream = BoxStream<'static, ModelResult<String>>;

#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> ModelResult<ChatResponse>;

    /// Streams the completion as text fragments.
    ///
    /// Providers without a streaming endpoint fall back to a single fragment
    /// holding the whole completion.
    async fn chat_stream(&self, request: ChatRequest) -> ModelResult<TokenStream> {
        let provider = self.provider_name();
        let response = self.chat(request).await?;
        let text = response
            .text()
            .map(str::to_string)
            .ok_or(ModelError::EmptyResponse { provider })?;
        Ok(futures::stream::once(async move { Ok(text) }).boxed())
    }

    fn provider_name(&self) -> &'static str;
}
