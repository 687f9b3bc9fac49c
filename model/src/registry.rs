//! Static catalogue of the models the arena can compare.
//!
//! The registry is built once at startup and shared read-only (usually behind
//! an `Arc`) by every concurrent dispatch and judge task.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Vendor API family a model is served through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFamily {
    OpenAi,
    Anthropic,
    Google,
    Groq,
    Mistral,
    Jais,
}

impl ProviderFamily {
    pub const ALL: [ProviderFamily; 6] = [
        ProviderFamily::OpenAi,
        ProviderFamily::Anthropic,
        ProviderFamily::Google,
        ProviderFamily::Groq,
        ProviderFamily::Mistral,
        ProviderFamily::Jais,
    ];

    /// Environment variable holding this family's API key.
    pub fn credential_env(&self) -> &'static str {
        match self {
            ProviderFamily::OpenAi => "OPENAI_API_KEY",
            ProviderFamily::Anthropic => "ANTHROPIC_API_KEY",
            ProviderFamily::Google => "GOOGLE_API_KEY",
            ProviderFamily::Groq => "GROQ_API_KEY",
            ProviderFamily::Mistral => "MISTRAL_API_KEY",
            ProviderFamily::Jais => "JAIS_API_KEY",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderFamily::OpenAi => "openai",
            ProviderFamily::Anthropic => "anthropic",
            ProviderFamily::Google => "google",
            ProviderFamily::Groq => "groq",
            ProviderFamily::Mistral => "mistral",
            ProviderFamily::Jais => "jais",
        }
    }
}

impl fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ModelTier {
    Flagship,
    Efficient,
    ArabicNative,
    OpenSource,
    Challenger,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    /// Display name of the vendor.
    pub provider: String,
    pub family: ProviderFamily,
    /// Model name sent on the wire.
    pub api_model: String,
    pub tier: ModelTier,
    pub description: String,
    pub context_window: u32,
    pub max_output_tokens: u32,
    pub cost_per_1k_input_usd: f64,
    pub cost_per_1k_output_usd: f64,
    pub supports_arabic: bool,
    pub arabic_native: bool,
}

#[allow(clippy::too_many_arguments)]
fn entry(
    id: &str,
    name: &str,
    provider: &str,
    family: ProviderFamily,
    api_model: &str,
    tier: ModelTier,
    description: &str,
    context_window: u32,
    max_output_tokens: u32,
    cost_in: f64,
    cost_out: f64,
    arabic_native: bool,
) -> ModelInfo {
    ModelInfo {
        id: id.to_string(),
        name: name.to_string(),
        provider: provider.to_string(),
        family,
        api_model: api_model.to_string(),
        tier,
        description: description.to_string(),
        context_window,
        max_output_tokens,
        cost_per_1k_input_usd: cost_in,
        cost_per_1k_output_usd: cost_out,
        supports_arabic: true,
        arabic_native,
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Vec<ModelInfo>,
}

impl ModelRegistry {
    pub fn new(models: Vec<ModelInfo>) -> Self {
        Self { models }
    }

    /// The supported model catalogue, in display order.
    pub fn builtin() -> Self {
        use ModelTier::*;
        use ProviderFamily::*;

        Self::new(vec![
            entry(
                "gpt-4o",
                "GPT-4o",
                "OpenAI",
                OpenAi,
                "gpt-4o",
                Flagship,
                "OpenAI's omni model. Strong Arabic with MSA and Egyptian dialects.",
                128_000,
                4096,
                0.005,
                0.015,
                false,
            ),
            entry(
                "gpt-4-turbo",
                "GPT-4 Turbo",
                "OpenAI",
                OpenAi,
                "gpt-4-turbo",
                Flagship,
                "Previous-generation OpenAI flagship with broad Arabic coverage.",
                128_000,
                4096,
                0.010,
                0.030,
                false,
            ),
            entry(
                "gpt-3.5-turbo",
                "GPT-3.5 Turbo",
                "OpenAI",
                OpenAi,
                "gpt-3.5-turbo",
                Efficient,
                "Low-cost OpenAI model. Serviceable MSA, weak on dialects.",
                16_385,
                4096,
                0.0005,
                0.002,
                false,
            ),
            entry(
                "claude-3-5-sonnet",
                "Claude 3.5 Sonnet",
                "Anthropic",
                Anthropic,
                "claude-3-5-sonnet-20241022",
                Flagship,
                "Anthropic's top model. Excellent Arabic quality and cultural awareness.",
                200_000,
                8096,
                0.003,
                0.015,
                false,
            ),
            entry(
                "claude-3-opus",
                "Claude 3 Opus",
                "Anthropic",
                Anthropic,
                "claude-3-opus-20240229",
                Flagship,
                "Anthropic's largest Claude 3 model. Careful, thorough Arabic answers.",
                200_000,
                4096,
                0.015,
                0.075,
                false,
            ),
            entry(
                "gemini-1.5-pro",
                "Gemini 1.5 Pro",
                "Google",
                Google,
                "gemini-1.5-pro",
                Flagship,
                "Google's multimodal model. Good MSA, weaker on dialects.",
                1_000_000,
                8192,
                0.00125,
                0.007,
                false,
            ),
            entry(
                "gemini-1.5-flash",
                "Gemini 1.5 Flash",
                "Google",
                Google,
                "gemini-1.5-flash",
                Efficient,
                "Fast, inexpensive Gemini variant for high-volume comparisons.",
                1_000_000,
                8192,
                0.000075,
                0.0007,
                false,
            ),
            entry(
                "llama-3-70b",
                "LLaMA 3 70B",
                "Meta/Groq",
                Groq,
                "llama3-70b-8192",
                OpenSource,
                "Meta's open-source model served by Groq. Decent MSA, limited dialect support.",
                8192,
                2048,
                0.0004,
                0.0008,
                false,
            ),
            entry(
                "mistral-large",
                "Mistral Large",
                "Mistral AI",
                Mistral,
                "mistral-large-latest",
                Challenger,
                "Mistral's largest model. Good multilingual coverage including Arabic.",
                32_768,
                4096,
                0.002,
                0.006,
                false,
            ),
            entry(
                "jais-30b",
                "Jais 30B",
                "G42/MBZUAI",
                Jais,
                "jais-30b-chat",
                ArabicNative,
                "Arabic-native LLM trained on a large Arabic corpus. Best dialect coverage.",
                4096,
                2048,
                0.001,
                0.002,
                true,
            ),
        ])
    }

    pub fn get(&self, id: &str) -> Option<&ModelInfo> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelInfo> {
        self.models.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_catalogue() {
        let registry = ModelRegistry::builtin();
        assert_eq!(registry.len(), 10);
        assert_eq!(registry.ids()[0], "gpt-4o");
        assert_eq!(registry.ids()[9], "jais-30b");

        let unique: HashSet<_> = registry.ids().into_iter().collect();
        assert_eq!(unique.len(), registry.len());
    }

    #[test]
    fn test_lookup_and_wire_names() {
        let registry = ModelRegistry::builtin();

        let sonnet = registry.get("claude-3-5-sonnet").unwrap();
        assert_eq!(sonnet.family, ProviderFamily::Anthropic);
        assert_eq!(sonnet.api_model, "claude-3-5-sonnet-20241022");
        assert_eq!(sonnet.cost_per_1k_output_usd, 0.015);

        assert_eq!(registry.get("llama-3-70b").unwrap().api_model, "llama3-70b-8192");
        assert!(registry.get("jais-30b").unwrap().arabic_native);
        assert!(!registry.contains("gpt-5"));
    }

    #[test]
    fn test_family_credentials() {
        assert_eq!(ProviderFamily::OpenAi.credential_env(), "OPENAI_API_KEY");
        assert_eq!(ProviderFamily::Google.to_string(), "google");
        assert_eq!(ProviderFamily::ALL.len(), 6);
    }

    #[test]
    fn test_serialization() {
        let registry = ModelRegistry::builtin();
        let json = serde_json::to_value(registry.get("jais-30b").unwrap()).unwrap();
        assert_eq!(json["tier"], "arabic-native");
        assert_eq!(json["family"], "jais");
    }
}
