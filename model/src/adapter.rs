//! Model id → provider capability table.
//!
//! Resolution happens against a table built once from the registry and the
//! configured credentials, so an unknown id or a missing key is answered
//! without touching the network.

use crate::anthropic::AnthropicProvider;
use crate::config::ProviderConfig;
use crate::google::GoogleProvider;
use crate::openai::OpenAiCompatibleProvider;
use crate::provider::{ModelError, ModelProvider, ModelResult, TokenStream};
use crate::registry::{ModelRegistry, ProviderFamily};
use crate::types::{ChatMessage, ChatRequest, FinishReason};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A single model bound to the provider client that serves it.
#[derive(Clone)]
pub struct ModelAdapter {
    pub model_id: String,
    pub api_model: String,
    provider: Arc<dyn ModelProvider>,
}

impl std::fmt::Debug for ModelAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelAdapter")
            .field("model_id", &self.model_id)
            .field("api_model", &self.api_model)
            .field("provider", &self.provider.provider_name())
            .finish()
    }
}

impl ModelAdapter {
    pub fn new(
        model_id: impl Into<String>,
        api_model: impl Into<String>,
        provider: Arc<dyn ModelProvider>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            api_model: api_model.into(),
            provider,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    fn build_request(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> ChatRequest {
        ChatRequest::new(
            self.api_model.clone(),
            vec![ChatMessage::system(system), ChatMessage::user(prompt)],
        )
        .with_max_tokens(max_tokens)
        .with_temperature(temperature)
    }

    /// Sends `prompt` under the `system` instruction and returns the completion text.
    pub async fn send(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> ModelResult<String> {
        let request = self.build_request(system, prompt, max_tokens, temperature);
        let response = self.provider.chat(request).await?;

        if let Some(usage) = &response.usage {
            debug!(
                "{} used {} prompt and {} completion tokens",
                self.model_id, usage.prompt_tokens, usage.completion_tokens
            );
        }
        if response
            .choices
            .first()
            .and_then(|c| c.finish_reason.as_ref())
            == Some(&FinishReason::Length)
        {
            warn!("{} reply was cut off at {} tokens", self.model_id, max_tokens);
        }

        response
            .text()
            .map(str::to_string)
            .ok_or(ModelError::EmptyResponse {
                provider: self.provider.provider_name(),
            })
    }

    pub async fn send_stream(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> ModelResult<TokenStream> {
        let request = self.build_request(system, prompt, max_tokens, temperature);
        self.provider.chat_stream(request).await
    }
}

#[derive(Debug, Default)]
pub struct AdapterTable {
    adapters: HashMap<String, Arc<ModelAdapter>>,
    unavailable: HashMap<String, String>,
}

impl AdapterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds one client per provider family and binds every registry model to it.
    ///
    /// Families without a credential leave their models recorded as unavailable.
    pub fn from_registry(registry: &ModelRegistry, config: &ProviderConfig) -> ModelResult<Self> {
        config
            .validate()
            .map_err(|message| ModelError::InvalidConfig { message })?;

        let mut clients: HashMap<ProviderFamily, Arc<dyn ModelProvider>> = HashMap::new();
        let mut table = Self::new();

        for info in registry.iter() {
            let Some(key) = config.credentials.for_family(info.family) else {
                let reason = format!("{} is not set", info.family.credential_env());
                debug!("{} unavailable: {}", info.id, reason);
                table.mark_unavailable(&info.id, reason);
                continue;
            };

            let provider = match clients.get(&info.family) {
                Some(provider) => Arc::clone(provider),
                None => {
                    let provider = build_provider(info.family, key, config)?;
                    clients.insert(info.family, Arc::clone(&provider));
                    provider
                }
            };

            table.insert(ModelAdapter::new(&info.id, &info.api_model, provider));
        }

        if table.adapters.is_empty() {
            warn!("No provider credentials configured; every model is unavailable");
        }

        Ok(table)
    }

    pub fn insert(&mut self, adapter: ModelAdapter) {
        self.unavailable.remove(&adapter.model_id);
        self.adapters
            .insert(adapter.model_id.clone(), Arc::new(adapter));
    }

    pub fn mark_unavailable(&mut self, model_id: impl Into<String>, reason: impl Into<String>) {
        let model_id = model_id.into();
        self.adapters.remove(&model_id);
        self.unavailable.insert(model_id, reason.into());
    }

    pub fn resolve(&self, model_id: &str) -> ModelResult<Arc<ModelAdapter>> {
        if let Some(adapter) = self.adapters.get(model_id) {
            return Ok(Arc::clone(adapter));
        }
        let reason = self
            .unavailable
            .get(model_id)
            .cloned()
            .unwrap_or_else(|| "unknown model id".to_string());
        Err(ModelError::not_available(model_id, reason))
    }

    pub fn is_available(&self, model_id: &str) -> bool {
        self.adapters.contains_key(model_id)
    }
}

fn build_provider(
    family: ProviderFamily,
    key: &str,
    config: &ProviderConfig,
) -> ModelResult<Arc<dyn ModelProvider>> {
    let base_url = config.endpoints.for_family(family);
    let timeout = config.timeout;

    let provider: Arc<dyn ModelProvider> = match family {
        ProviderFamily::Anthropic => Arc::new(AnthropicProvider::new(
            base_url,
            key,
            config.anthropic_version.clone(),
            timeout,
        )?),
        ProviderFamily::Google => Arc::new(GoogleProvider::new(base_url, key, timeout)?),
        ProviderFamily::OpenAi
        | ProviderFamily::Groq
        | ProviderFamily::Mistral
        | ProviderFamily::Jais => Arc::new(OpenAiCompatibleProvider::new(
            family.as_str(),
            base_url,
            key,
            timeout,
        )?),
    };
    Ok(provider)
}
