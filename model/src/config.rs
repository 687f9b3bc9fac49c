use crate::registry::ProviderFamily;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// API keys per provider family.
///
/// Keys only ever come from the environment or from explicit builder calls;
/// they are never serialized.
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub mistral_api_key: Option<String>,
    pub jais_api_key: Option<String>,
}

impl ProviderCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let mut credentials = Self::default();
        for family in ProviderFamily::ALL {
            if let Ok(value) = std::env::var(family.credential_env()) {
                credentials = credentials.with_key(family, value);
            }
        }
        credentials
    }

    /// Blank keys are treated as absent.
    pub fn with_key(mut self, family: ProviderFamily, key: impl Into<String>) -> Self {
        let key = key.into();
        let value = if key.trim().is_empty() {
            None
        } else {
            Some(key)
        };
        *self.slot_mut(family) = value;
        self
    }

    pub fn for_family(&self, family: ProviderFamily) -> Option<&str> {
        match family {
            ProviderFamily::OpenAi => self.openai_api_key.as_deref(),
            ProviderFamily::Anthropic => self.anthropic_api_key.as_deref(),
            ProviderFamily::Google => self.google_api_key.as_deref(),
            ProviderFamily::Groq => self.groq_api_key.as_deref(),
            ProviderFamily::Mistral => self.mistral_api_key.as_deref(),
            ProviderFamily::Jais => self.jais_api_key.as_deref(),
        }
    }

    fn slot_mut(&mut self, family: ProviderFamily) -> &mut Option<String> {
        match family {
            ProviderFamily::OpenAi => &mut self.openai_api_key,
            ProviderFamily::Anthropic => &mut self.anthropic_api_key,
            ProviderFamily::Google => &mut self.google_api_key,
            ProviderFamily::Groq => &mut self.groq_api_key,
            ProviderFamily::Mistral => &mut self.mistral_api_key,
            ProviderFamily::Jais => &mut self.jais_api_key,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderEndpoints {
    pub openai: String,
    pub anthropic: String,
    pub google: String,
    pub groq: String,
    pub mistral: String,
    pub jais: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            openai: "https://api.openai.com/v1".to_string(),
            anthropic: "https://api.anthropic.com".to_string(),
            google: "https://generativelanguage.googleapis.com".to_string(),
            groq: "https://api.groq.com/openai/v1".to_string(),
            mistral: "https://api.mistral.ai/v1".to_string(),
            jais: "https://api.core42.ai/v1".to_string(),
        }
    }
}

impl ProviderEndpoints {
    pub fn for_family(&self, family: ProviderFamily) -> &str {
        match family {
            ProviderFamily::OpenAi => &self.openai,
            ProviderFamily::Anthropic => &self.anthropic,
            ProviderFamily::Google => &self.google,
            ProviderFamily::Groq => &self.groq,
            ProviderFamily::Mistral => &self.mistral,
            ProviderFamily::Jais => &self.jais,
        }
    }

    pub fn with_endpoint(mut self, family: ProviderFamily, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        match family {
            ProviderFamily::OpenAi => self.openai = base_url,
            ProviderFamily::Anthropic => self.anthropic = base_url,
            ProviderFamily::Google => self.google = base_url,
            ProviderFamily::Groq => self.groq = base_url,
            ProviderFamily::Mistral => self.mistral = base_url,
            ProviderFamily::Jais => self.jais = base_url,
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    #[serde(skip)]
    pub credentials: ProviderCredentials,
    pub endpoints: ProviderEndpoints,
    /// HTTP client timeout; the dispatcher applies its own per-call bound on top.
    pub timeout: Duration,
    pub anthropic_version: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            credentials: ProviderCredentials::default(),
            endpoints: ProviderEndpoints::default(),
            timeout: Duration::from_secs(180),
            anthropic_version: "2023-06-01".to_string(),
        }
    }
}

impl ProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(mut self, credentials: ProviderCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        for family in ProviderFamily::ALL {
            let url = self.endpoints.for_family(family);
            if url.is_empty() {
                return Err(format!("Base URL for {} cannot be empty", family));
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!(
                    "Base URL for {} must start with http:// or https://",
                    family
                ));
            }
        }

        if self.timeout.is_zero() {
            return Err("Timeout must be greater than 0".to_string());
        }

        if self.anthropic_version.is_empty() {
            return Err("Anthropic API version cannot be empty".to_string());
        }

        Ok(())
    }
}
