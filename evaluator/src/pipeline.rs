//! End-to-end evaluation: validate, dispatch, score, pick a winner.

use crate::analyzer::round_to;
use crate::config::EvalConfig;
use crate::dispatch::{DispatchConfig, Dispatcher, SingleModelResult};
use crate::error::EvalResult;
use crate::judge::{JudgeConfig, JudgeScorer, ScoreBreakdown};
use crate::request::{Category, Dialect, EvaluationRequest};
use crate::winner;
use chrono::{DateTime, Utc};
use model::{AdapterTable, ModelRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// One model's dispatch result paired with its judge scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEvaluation {
    #[serde(flatten)]
    pub result: SingleModelResult,
    pub scores: ScoreBreakdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub evaluation_id: Uuid,
    pub prompt: String,
    pub dialect: Dialect,
    pub category: Category,
    pub model_ids: Vec<String>,
    /// Aligned with `model_ids`.
    pub responses: Vec<ModelEvaluation>,
    pub winner_model_id: Option<String>,
    pub ranking: Vec<String>,
    pub total_cost_usd: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl EvaluationOutcome {
    pub fn response(&self, model_id: &str) -> Option<&ModelEvaluation> {
        self.responses.iter().find(|r| r.result.model_id == model_id)
    }
}

pub struct EvaluationPipeline {
    registry: Arc<ModelRegistry>,
    dispatcher: Dispatcher,
    scorer: JudgeScorer,
}

impl EvaluationPipeline {
    /// Builds provider clients for every credentialed family in the builtin registry.
    pub fn from_config(config: &EvalConfig) -> EvalResult<Self> {
        config.validate()?;
        let registry = Arc::new(ModelRegistry::builtin());
        let adapters = Arc::new(AdapterTable::from_registry(&registry, &config.provider)?);
        Ok(Self::new(
            registry,
            adapters,
            config.dispatch_config(),
            config.judge.clone(),
        ))
    }

    pub fn new(
        registry: Arc<ModelRegistry>,
        adapters: Arc<AdapterTable>,
        dispatch: DispatchConfig,
        judge: JudgeConfig,
    ) -> Self {
        let scorer = JudgeScorer::from_table(&adapters, judge);
        let dispatcher = Dispatcher::new(Arc::clone(&registry), adapters, dispatch);
        Self {
            registry,
            dispatcher,
            scorer,
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn scorer(&self) -> &JudgeScorer {
        &self.scorer
    }

    /// Runs one evaluation. Only an invalid request is an error; every
    /// per-model fault is reported inside the outcome.
    pub async fn run(&self, request: &EvaluationRequest) -> EvalResult<EvaluationOutcome> {
        request.validate(&self.registry)?;

        let evaluation_id = Uuid::new_v4();
        let started_at = Utc::now();
        debug!(
            "Evaluation {} started for {} models ({}, {})",
            evaluation_id,
            request.model_ids.len(),
            request.dialect,
            request.category
        );

        let results = self
            .dispatcher
            .dispatch(
                &request.prompt,
                request.dialect,
                &request.model_ids,
                request.max_tokens,
            )
            .await;

        let scores = self
            .scorer
            .score_all(
                &results,
                &request.prompt,
                request.dialect,
                request.category,
                request.reference_answer.as_deref(),
            )
            .await;

        let responses: Vec<ModelEvaluation> = results
            .into_iter()
            .zip(scores)
            .map(|(result, scores)| ModelEvaluation { result, scores })
            .collect();

        let winner_model_id = winner::select_winner(&responses);
        let ranking = winner::ranking(&responses);
        let total_cost_usd = round_to(responses.iter().map(|r| r.result.cost_usd).sum(), 6);

        info!(
            "Evaluation {} completed. Winner: {}",
            evaluation_id,
            winner_model_id.as_deref().unwrap_or("none")
        );

        Ok(EvaluationOutcome {
            evaluation_id,
            prompt: request.prompt.clone(),
            dialect: request.dialect,
            category: request.category,
            model_ids: request.model_ids.clone(),
            responses,
            winner_model_id,
            ranking,
            total_cost_usd,
            started_at,
            completed_at: Utc::now(),
        })
    }
}
