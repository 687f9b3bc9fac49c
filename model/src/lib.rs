pub mod adapter;
pub mod anthropic;
pub mod config;
pub mod google;
mod http;
pub mod openai;
pub mod provider;
pub mod registry;
pub mod sse;
pub mod types;

pub use adapter::{AdapterTable, ModelAdapter};
pub use anthropic::AnthropicProvider;
pub use config::{ProviderConfig, ProviderCredentials, ProviderEndpoints};
pub use google::GoogleProvider;
pub use openai::OpenAiCompatibleProvider;
pub use provider::{ModelError, ModelProvider, ModelResult, TokenStream};
pub use registry::{ModelInfo, ModelRegistry, ModelTier, ProviderFamily};
pub use types::{ChatMessage, ChatRequest, ChatResponse, Choice, FinishReason, MessageRole, Usage};

pub mod prelude {
    pub use crate::adapter::*;
    pub use crate::config::*;
    pub use crate::provider::*;
    pub use crate::registry::*;
    pub use crate::types::*;
}
