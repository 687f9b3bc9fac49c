//! LLM-as-judge scoring.
//!
//! A designated judge model grades each successful response on six rubric
//! dimensions. The judge payload is JSON, possibly wrapped in a code fence;
//! every dimension is clamped into `[0, 10]` and a missing `overall` is
//! recomputed from [`SCORE_WEIGHTS`].
//!
//! Call-level faults (transport errors, timeouts) are retried with
//! exponential backoff; a payload that does not parse is final for that
//! response. No fault ever escapes [`JudgeScorer::score_all`]: it is
//! rendered into the `reasoning` of a null-scored [`ScoreBreakdown`].

use crate::analyzer::round_to;
use crate::dispatch::SingleModelResult;
use crate::error::ScoringError;
use crate::prompts::{JudgePrompt, JUDGE_RUBRIC};
use crate::request::{Category, Dialect};
use futures::future::join_all;
use model::{AdapterTable, ModelAdapter};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const SCORE_DIMENSIONS: [&str; 6] = [
    "arabic_quality",
    "accuracy",
    "dialect_adherence",
    "technical_precision",
    "completeness",
    "cultural_sensitivity",
];

/// Rubric weights; they sum to 1.0.
pub const SCORE_WEIGHTS: [(&str, f64); 6] = [
    ("arabic_quality", 0.25),
    ("accuracy", 0.25),
    ("dialect_adherence", 0.20),
    ("technical_precision", 0.15),
    ("completeness", 0.10),
    ("cultural_sensitivity", 0.05),
];

const SCORE_MIN: f64 = 0.0;
const SCORE_MAX: f64 = 10.0;

/// Judge call and retry parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    /// Registry id of the judge model
    pub judge_model: String,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds)
    pub base_delay_ms: u64,
    /// Growth factor applied per attempt
    pub backoff_factor: f64,
    /// Maximum delay for exponential backoff (in milliseconds)
    pub max_delay_ms: u64,
    /// Jitter factor for randomizing retry delays (0.0 to 1.0)
    pub jitter_factor: f64,
    /// Bound on a single judge call, in seconds
    pub request_timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            judge_model: "gpt-4o".to_string(),
            max_retries: 2,
            base_delay_ms: 1000,
            backoff_factor: 1.5,
            max_delay_ms: 30_000,
            jitter_factor: 0.0,
            request_timeout_secs: 120,
            temperature: 0.0,
            max_tokens: 512,
        }
    }
}

impl JudgeConfig {
    pub fn with_judge_model(mut self, judge_model: impl Into<String>) -> Self {
        self.judge_model = judge_model.into();
        self
    }

    /// Set custom retry settings
    pub fn with_retries(mut self, max_retries: u32, base_delay_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Total attempts including the first.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Calculate delay for retry attempt with exponential backoff and jitter
    pub fn calculate_retry_delay(&self, attempt: u32) -> Duration {
        let exponential_ms = self.base_delay_ms as f64 * self.backoff_factor.powi(attempt as i32);
        let delay_ms = exponential_ms.min(self.max_delay_ms as f64);
        let delay = Duration::from_millis(delay_ms as u64);

        if self.jitter_factor > 0.0 {
            let mut rng = rand::thread_rng();
            let jitter = rng.gen_range(0.0..=self.jitter_factor);
            let jitter_ms = (delay.as_millis() as f64 * jitter) as u64;
            delay + Duration::from_millis(jitter_ms)
        } else {
            delay
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.judge_model.trim().is_empty() {
            return Err("Judge model cannot be empty".to_string());
        }
        if self.backoff_factor < 1.0 {
            return Err("Backoff factor must be at least 1.0".to_string());
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err("Jitter factor must be between 0.0 and 1.0".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("Judge timeout must be greater than 0".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err("Judge temperature must be between 0.0 and 2.0".to_string());
        }
        if self.max_tokens == 0 {
            return Err("Judge max_tokens must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Judge scores for one response. All fields are `None` when scoring did not happen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub arabic_quality: Option<f64>,
    pub accuracy: Option<f64>,
    pub dialect_adherence: Option<f64>,
    pub technical_precision: Option<f64>,
    pub completeness: Option<f64>,
    pub cultural_sensitivity: Option<f64>,
    pub overall: Option<f64>,
    pub reasoning: Option<String>,
}

impl ScoreBreakdown {
    /// All-null scores with an explanation.
    pub fn null(reasoning: impl Into<String>) -> Self {
        Self {
            reasoning: Some(reasoning.into()),
            ..Self::default()
        }
    }

    pub fn from_error(err: &ScoringError) -> Self {
        Self::null(err.to_string())
    }

    pub fn dimension(&self, name: &str) -> Option<f64> {
        match name {
            "arabic_quality" => self.arabic_quality,
            "accuracy" => self.accuracy,
            "dialect_adherence" => self.dialect_adherence,
            "technical_precision" => self.technical_precision,
            "completeness" => self.completeness,
            "cultural_sensitivity" => self.cultural_sensitivity,
            _ => None,
        }
    }

    fn dimension_mut(&mut self, name: &str) -> Option<&mut Option<f64>> {
        match name {
            "arabic_quality" => Some(&mut self.arabic_quality),
            "accuracy" => Some(&mut self.accuracy),
            "dialect_adherence" => Some(&mut self.dialect_adherence),
            "technical_precision" => Some(&mut self.technical_precision),
            "completeness" => Some(&mut self.completeness),
            "cultural_sensitivity" => Some(&mut self.cultural_sensitivity),
            _ => None,
        }
    }
}

/// Weighted sum of the six dimensions, rounded to 2 places. Missing dimensions count as 0.
pub fn weighted_overall(scores: &ScoreBreakdown) -> f64 {
    let total: f64 = SCORE_WEIGHTS
        .iter()
        .map(|(dim, weight)| scores.dimension(dim).unwrap_or(0.0) * weight)
        .sum();
    round_to(total, 2)
}

fn clamp_score(value: f64) -> f64 {
    value.clamp(SCORE_MIN, SCORE_MAX)
}

/// Drops every fence line when the payload opens with a code fence.
fn strip_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    trimmed
        .lines()
        .filter(|line| !line.trim().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn numeric_field(fields: &Map<String, Value>, name: &str) -> Result<Option<f64>, ScoringError> {
    let raw = match fields.get(name) {
        None | Some(Value::Null) => return Ok(None),
        Some(raw) => raw,
    };
    let value = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match value {
        Some(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(ScoringError::Parse(format!("{} is not a number: {}", name, raw))),
    }
}

/// Decodes a judge reply into clamped scores.
pub fn parse_score_payload(raw: &str) -> Result<ScoreBreakdown, ScoringError> {
    let cleaned = strip_fences(raw);
    let value: Value =
        serde_json::from_str(&cleaned).map_err(|e| ScoringError::Parse(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(ScoringError::Parse(
            "judge payload is not a JSON object".to_string(),
        ));
    };

    let mut scores = ScoreBreakdown::default();
    for dim in SCORE_DIMENSIONS {
        let parsed = numeric_field(&fields, dim)?.map(clamp_score);
        if let Some(slot) = scores.dimension_mut(dim) {
            *slot = parsed;
        }
    }

    scores.overall = Some(match fields.get("overall").and_then(Value::as_f64) {
        Some(overall) if overall.is_finite() => clamp_score(overall),
        _ => weighted_overall(&scores),
    });
    scores.reasoning = fields
        .get("reasoning")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(scores)
}

/// Scores responses with the configured judge model.
#[derive(Debug, Clone)]
pub struct JudgeScorer {
    judge: Option<Arc<ModelAdapter>>,
    unavailable_reason: Option<String>,
    config: JudgeConfig,
}

impl JudgeScorer {
    pub fn new(judge: Option<Arc<ModelAdapter>>, config: JudgeConfig) -> Self {
        Self {
            judge,
            unavailable_reason: None,
            config,
        }
    }

    /// Resolves the judge model once; an unresolvable judge leaves scoring unconfigured.
    pub fn from_table(table: &AdapterTable, config: JudgeConfig) -> Self {
        match table.resolve(&config.judge_model) {
            Ok(adapter) => Self::new(Some(adapter), config),
            Err(err) => {
                warn!("Judge model unavailable, scores will be null: {}", err);
                Self {
                    judge: None,
                    unavailable_reason: Some(err.to_string()),
                    config,
                }
            }
        }
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.judge.is_some()
    }

    pub async fn score(
        &self,
        prompt: &str,
        response: &str,
        dialect: Dialect,
        category: Category,
        reference_answer: Option<&str>,
    ) -> Result<ScoreBreakdown, ScoringError> {
        let Some(judge) = &self.judge else {
            let reason = self
                .unavailable_reason
                .clone()
                .unwrap_or_else(|| self.config.judge_model.clone());
            return Err(ScoringError::NotConfigured(reason));
        };

        let user_turn = JudgePrompt {
            prompt,
            response,
            dialect,
            category,
            reference_answer,
        }
        .build();

        let attempts = self.config.attempts();
        let mut last_error = String::new();

        for attempt in 0..attempts {
            let call = judge.send(
                JUDGE_RUBRIC,
                &user_turn,
                self.config.max_tokens,
                self.config.temperature,
            );
            match tokio::time::timeout(self.config.request_timeout(), call).await {
                Ok(Ok(raw)) => {
                    debug!("Judge replied on attempt {}", attempt + 1);
                    return parse_score_payload(&raw).inspect_err(|err| {
                        warn!("Failed to parse judge reply: {} | raw: {:.200}", err, raw);
                    });
                }
                Ok(Err(err)) => last_error = err.to_string(),
                Err(_) => {
                    last_error = format!(
                        "judge request timed out after {} seconds",
                        self.config.request_timeout_secs
                    )
                }
            }

            warn!(
                "Judge attempt {}/{} failed: {}",
                attempt + 1,
                attempts,
                last_error
            );
            if attempt + 1 < attempts {
                tokio::time::sleep(self.config.calculate_retry_delay(attempt)).await;
            }
        }

        error!("All {} judge attempts exhausted", attempts);
        Err(ScoringError::Exhausted {
            attempts,
            last_error,
        })
    }

    /// Scores every successful result concurrently; the output aligns with `results`.
    pub async fn score_all(
        &self,
        results: &[SingleModelResult],
        prompt: &str,
        dialect: Dialect,
        category: Category,
        reference_answer: Option<&str>,
    ) -> Vec<ScoreBreakdown> {
        let prompt: Arc<str> = Arc::from(prompt);
        let reference: Option<Arc<str>> = reference_answer.map(Arc::from);

        let handles: Vec<_> = results
            .iter()
            .map(|result| match (&result.response_text, &result.error) {
                (Some(text), None) => {
                    let scorer = self.clone();
                    let prompt = Arc::clone(&prompt);
                    let reference = reference.clone();
                    let text = text.clone();
                    Some(tokio::spawn(async move {
                        scorer
                            .score(&prompt, &text, dialect, category, reference.as_deref())
                            .await
                    }))
                }
                _ => None,
            })
            .collect();

        let scores = join_all(handles.into_iter().map(|handle| async move {
            let outcome = match handle {
                None => Err(ScoringError::ModelFailed),
                Some(handle) => handle.await.unwrap_or_else(|join_err| {
                    error!("Scoring task aborted: {}", join_err);
                    Err(ScoringError::TaskFailed(join_err.to_string()))
                }),
            };
            outcome.unwrap_or_else(|err| ScoreBreakdown::from_error(&err))
        }))
        .await;

        info!(
            "Scored {} of {} responses",
            scores.iter().filter(|s| s.overall.is_some()).count(),
            scores.len()
        );
        scores
    }
}
