use model::ModelError;
use std::time::Duration;
use thiserror::Error;

/// Faults that abort a whole evaluation call.
///
/// Per-model faults never surface here; they are captured into the model's
/// result slot as [`DispatchError`] or [`ScoringError`] text.
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

impl EvalError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }
}

pub type EvalResult<T> = Result<T, EvalError>;

/// Why a single model produced no response text.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("{0}")]
    ModelNotAvailable(ModelError),

    #[error("Request timed out after {} seconds.", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("{0}")]
    Provider(ModelError),

    #[error("Model task aborted: {0}")]
    TaskFailed(String),
}

/// Why a response came back without judge scores.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Model returned an error.")]
    ModelFailed,

    #[error("Judge model not configured: {0}")]
    NotConfigured(String),

    #[error("Scoring parse error: {0}")]
    Parse(String),

    #[error("Scoring failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    #[error("Scoring task aborted: {0}")]
    TaskFailed(String),
}
