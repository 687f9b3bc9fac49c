pub mod analyzer;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod judge;
pub mod pipeline;
pub mod prompts;
pub mod request;
pub mod stream;
pub mod winner;

pub use analyzer::{analyze, LinguisticMetrics};
pub use config::EvalConfig;
pub use dispatch::{DispatchConfig, Dispatcher, SingleModelResult};
pub use error::{DispatchError, EvalError, EvalResult, ScoringError};
pub use judge::{JudgeConfig, JudgeScorer, ScoreBreakdown, SCORE_DIMENSIONS, SCORE_WEIGHTS};
pub use pipeline::{EvaluationOutcome, EvaluationPipeline, ModelEvaluation};
pub use request::{Category, Dialect, EvaluationRequest, StreamRequest};
pub use stream::{StreamEvent, StreamSession};
pub use winner::{ranking, select_winner};

pub mod prelude {
    pub use crate::config::*;
    pub use crate::error::*;
    pub use crate::pipeline::*;
    pub use crate::request::*;
    pub use crate::stream::*;
}
