use crate::error::{EvalError, EvalResult};
use model::ModelRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

pub const MIN_PROMPT_CHARS: usize = 10;
pub const MAX_PROMPT_CHARS: usize = 8000;
pub const MIN_MODELS: usize = 2;
pub const MAX_MODELS: usize = 6;
pub const MIN_MAX_TOKENS: u32 = 64;
pub const MAX_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Msa,
    Gulf,
    Egyptian,
    Levantine,
    Maghrebi,
    Iraqi,
}

impl Dialect {
    pub const ALL: [Dialect; 6] = [
        Dialect::Msa,
        Dialect::Gulf,
        Dialect::Egyptian,
        Dialect::Levantine,
        Dialect::Maghrebi,
        Dialect::Iraqi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Msa => "msa",
            Dialect::Gulf => "gulf",
            Dialect::Egyptian => "egyptian",
            Dialect::Levantine => "levantine",
            Dialect::Maghrebi => "maghrebi",
            Dialect::Iraqi => "iraqi",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dialect::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<_> = Dialect::ALL.iter().map(|d| d.as_str()).collect();
                EvalError::invalid(format!(
                    "Dialect must be one of: {}",
                    valid.join(", ")
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    DialectUnderstanding,
    TechnicalTerminology,
    Reasoning,
    InstructionFollowing,
    Translation,
    CreativeWriting,
    CodeGeneration,
    CultureHeritage,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::DialectUnderstanding,
        Category::TechnicalTerminology,
        Category::Reasoning,
        Category::InstructionFollowing,
        Category::Translation,
        Category::CreativeWriting,
        Category::CodeGeneration,
        Category::CultureHeritage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::DialectUnderstanding => "dialect_understanding",
            Category::TechnicalTerminology => "technical_terminology",
            Category::Reasoning => "reasoning",
            Category::InstructionFollowing => "instruction_following",
            Category::Translation => "translation",
            Category::CreativeWriting => "creative_writing",
            Category::CodeGeneration => "code_generation",
            Category::CultureHeritage => "culture_heritage",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<_> = Category::ALL.iter().map(|c| c.as_str()).collect();
                EvalError::invalid(format!(
                    "Category must be one of: {}",
                    valid.join(", ")
                ))
            })
    }
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub prompt: String,
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default)]
    pub category: Category,
    #[serde(rename = "models")]
    pub model_ids: Vec<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub reference_answer: Option<String>,
}

impl EvaluationRequest {
    pub fn new(prompt: impl Into<String>, model_ids: Vec<String>) -> Self {
        Self {
            prompt: prompt.into(),
            dialect: Dialect::default(),
            category: Category::default(),
            model_ids,
            max_tokens: DEFAULT_MAX_TOKENS,
            reference_answer: None,
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_reference_answer(mut self, reference: impl Into<String>) -> Self {
        self.reference_answer = Some(reference.into());
        self
    }

    /// Rejects malformed requests before any provider is contacted.
    pub fn validate(&self, registry: &ModelRegistry) -> EvalResult<()> {
        let prompt_chars = self.prompt.chars().count();
        if !(MIN_PROMPT_CHARS..=MAX_PROMPT_CHARS).contains(&prompt_chars) {
            return Err(EvalError::invalid(format!(
                "Prompt must be between {} and {} characters (got {})",
                MIN_PROMPT_CHARS, MAX_PROMPT_CHARS, prompt_chars
            )));
        }

        if !(MIN_MODELS..=MAX_MODELS).contains(&self.model_ids.len()) {
            return Err(EvalError::invalid(format!(
                "Between {} and {} models are required (got {})",
                MIN_MODELS,
                MAX_MODELS,
                self.model_ids.len()
            )));
        }

        let unknown: Vec<&str> = self
            .model_ids
            .iter()
            .map(String::as_str)
            .filter(|id| !registry.contains(id))
            .collect();
        if !unknown.is_empty() {
            return Err(EvalError::invalid(format!(
                "Unknown models: {}. Valid: {}",
                unknown.join(", "),
                registry.ids().join(", ")
            )));
        }

        let unique: HashSet<&String> = self.model_ids.iter().collect();
        if unique.len() != self.model_ids.len() {
            return Err(EvalError::invalid("Duplicate models are not allowed."));
        }

        if !(MIN_MAX_TOKENS..=MAX_MAX_TOKENS).contains(&self.max_tokens) {
            return Err(EvalError::invalid(format!(
                "max_tokens must be between {} and {}",
                MIN_MAX_TOKENS, MAX_MAX_TOKENS
            )));
        }

        if let Some(reference) = &self.reference_answer {
            if reference.chars().count() > MAX_PROMPT_CHARS {
                return Err(EvalError::invalid(format!(
                    "Reference answer must be at most {} characters",
                    MAX_PROMPT_CHARS
                )));
            }
        }

        Ok(())
    }
}

fn default_stream_models() -> Vec<String> {
    vec!["gpt-4o".to_string()]
}

/// Request message accepted by a streaming session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default = "default_stream_models")]
    pub models: Vec<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl StreamRequest {
    pub fn new(prompt: impl Into<String>, models: Vec<String>) -> Self {
        Self {
            prompt: prompt.into(),
            dialect: Dialect::default(),
            models,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Trims the prompt and caps `max_tokens`; only an empty prompt is rejected.
    pub fn normalized(mut self) -> EvalResult<Self> {
        self.prompt = self.prompt.trim().to_string();
        if self.prompt.is_empty() {
            return Err(EvalError::invalid("Prompt is required."));
        }
        self.max_tokens = self.max_tokens.min(MAX_MAX_TOKENS);
        Ok(self)
    }
}
