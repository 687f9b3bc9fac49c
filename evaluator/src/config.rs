//! Evaluator settings.
//!
//! Values come from built-in defaults, an optional TOML file, and then
//! environment overrides, in that order. Provider API keys are only ever read
//! from the environment.

use crate::dispatch::DispatchConfig;
use crate::error::{EvalError, EvalResult};
use crate::judge::JudgeConfig;
use crate::request::{MAX_MAX_TOKENS, MAX_MODELS, MIN_MAX_TOKENS};
use model::{ProviderConfig, ProviderCredentials};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    pub default_max_tokens: u32,
    /// Sampling temperature for evaluated models
    pub temperature: f32,
    /// Bound on each provider call, applied per model
    pub evaluation_timeout_secs: u64,
    pub max_parallel_models: usize,
    pub judge: JudgeConfig,
    pub provider: ProviderConfig,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            default_max_tokens: 1024,
            temperature: 0.3,
            evaluation_timeout_secs: 120,
            max_parallel_models: MAX_MODELS,
            judge: JudgeConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

fn env_override<T: FromStr>(name: &str) -> EvalResult<Option<T>> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| EvalError::Config {
                    message: format!("{} has an invalid value: {}", name, raw),
                })
        }
        _ => Ok(None),
    }
}

impl EvalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by environment variables.
    pub fn from_env() -> EvalResult<Self> {
        Self::default().with_env_overrides()
    }

    /// Parses TOML without consulting the environment.
    pub fn from_toml_str(source: &str) -> EvalResult<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Reads a TOML file, then layers environment overrides and credentials on top.
    pub fn load(path: impl AsRef<Path>) -> EvalResult<Self> {
        let path = path.as_ref();
        debug!("Loading evaluator config from {}", path.display());
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)?.with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> EvalResult<Self> {
        if let Some(secs) = env_override("EVALUATION_TIMEOUT_SECONDS")? {
            self.evaluation_timeout_secs = secs;
        }
        if let Some(temperature) = env_override("DEFAULT_TEMPERATURE")? {
            self.temperature = temperature;
        }
        if let Some(max_tokens) = env_override("DEFAULT_MAX_TOKENS")? {
            self.default_max_tokens = max_tokens;
        }
        if let Some(parallel) = env_override("MAX_PARALLEL_MODELS")? {
            self.max_parallel_models = parallel;
        }
        if let Some(judge_model) = env_override::<String>("JUDGE_MODEL")? {
            self.judge.judge_model = judge_model;
        }
        if let Some(temperature) = env_override("JUDGE_TEMPERATURE")? {
            self.judge.temperature = temperature;
        }
        if let Some(retries) = env_override("JUDGE_MAX_RETRIES")? {
            self.judge.max_retries = retries;
        }
        self.provider.credentials = ProviderCredentials::from_env();
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.evaluation_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_judge(mut self, judge: JudgeConfig) -> Self {
        self.judge = judge;
        self
    }

    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_credentials(mut self, credentials: ProviderCredentials) -> Self {
        self.provider.credentials = credentials;
        self
    }

    pub fn evaluation_timeout(&self) -> Duration {
        Duration::from_secs(self.evaluation_timeout_secs)
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig::default()
            .with_timeout(self.evaluation_timeout())
            .with_temperature(self.temperature)
            .with_max_parallel(self.max_parallel_models)
    }

    pub fn validate(&self) -> EvalResult<()> {
        let invalid = |message: String| EvalError::Config { message };

        if self.evaluation_timeout_secs == 0 {
            return Err(invalid("Evaluation timeout must be greater than 0".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid(format!(
                "Temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }
        if !(MIN_MAX_TOKENS..=MAX_MAX_TOKENS).contains(&self.default_max_tokens) {
            return Err(invalid(format!(
                "Default max tokens must be between {} and {}",
                MIN_MAX_TOKENS, MAX_MAX_TOKENS
            )));
        }
        if self.max_parallel_models == 0 {
            return Err(invalid("Max parallel models must be at least 1".to_string()));
        }
        self.judge.validate().map_err(invalid)?;
        self.provider.validate().map_err(invalid)?;
        Ok(())
    }
}
