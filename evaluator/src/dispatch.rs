//! Concurrent fan-out of one prompt to every requested model.

use crate::analyzer::{self, round_to, LinguisticMetrics};
use crate::error::DispatchError;
use crate::prompts::SYSTEM_PROMPT;
use crate::request::Dialect;
use futures::future::join_all;
use model::{AdapterTable, ModelRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Outcome of one model call. Exactly one of `response_text` / `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleModelResult {
    pub model_id: String,
    pub model_name: String,
    pub provider: String,
    pub response_text: Option<String>,
    pub latency_ms: u64,
    pub token_count: usize,
    pub cost_usd: f64,
    pub error: Option<String>,
    pub linguistic_metrics: Option<LinguisticMetrics>,
}

impl SingleModelResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.response_text.is_some()
    }

    fn failed(model_id: &str, meta: &ModelMeta, latency: Duration, err: DispatchError) -> Self {
        Self {
            model_id: model_id.to_string(),
            model_name: meta.name.clone(),
            provider: meta.provider.clone(),
            response_text: None,
            latency_ms: latency.as_millis() as u64,
            token_count: 0,
            cost_usd: 0.0,
            error: Some(err.to_string()),
            linguistic_metrics: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Bound applied to each provider call on its own.
    pub timeout: Duration,
    pub temperature: f32,
    pub max_parallel: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            temperature: 0.3,
            max_parallel: 6,
        }
    }
}

impl DispatchConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ModelMeta {
    pub name: String,
    pub provider: String,
    pub cost_per_1k_out: f64,
}

impl ModelMeta {
    pub(crate) fn lookup(registry: &ModelRegistry, model_id: &str) -> Self {
        match registry.get(model_id) {
            Some(info) => Self {
                name: info.name.clone(),
                provider: info.provider.clone(),
                cost_per_1k_out: info.cost_per_1k_output_usd,
            },
            None => Self {
                name: model_id.to_string(),
                provider: "unknown".to_string(),
                cost_per_1k_out: 0.0,
            },
        }
    }
}

/// Whitespace-separated word count of a response.
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn estimate_cost(token_count: usize, cost_per_1k_out: f64) -> f64 {
    round_to(token_count as f64 / 1000.0 * cost_per_1k_out, 6)
}

pub struct Dispatcher {
    registry: Arc<ModelRegistry>,
    adapters: Arc<AdapterTable>,
    config: DispatchConfig,
    permits: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ModelRegistry>,
        adapters: Arc<AdapterTable>,
        config: DispatchConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_parallel.max(1)));
        Self {
            registry,
            adapters,
            config,
            permits,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn adapters(&self) -> &Arc<AdapterTable> {
        &self.adapters
    }

    /// Returns one result per id, in the order of `model_ids`. Never fails.
    pub async fn dispatch(
        &self,
        prompt: &str,
        dialect: Dialect,
        model_ids: &[String],
        max_tokens: u32,
    ) -> Vec<SingleModelResult> {
        let prompt: Arc<str> = Arc::from(prompt);

        let handles: Vec<_> = model_ids
            .iter()
            .map(|model_id| {
                let call = ModelCall {
                    model_id: model_id.clone(),
                    meta: ModelMeta::lookup(&self.registry, model_id),
                    adapters: Arc::clone(&self.adapters),
                    permits: Arc::clone(&self.permits),
                    prompt: Arc::clone(&prompt),
                    dialect,
                    max_tokens,
                    timeout: self.config.timeout,
                    temperature: self.config.temperature,
                };
                tokio::spawn(call.run())
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(model_ids)
            .map(|(joined, model_id)| match joined {
                Ok(result) => result,
                Err(join_err) => {
                    error!("Dispatch task for {} aborted: {}", model_id, join_err);
                    SingleModelResult::failed(
                        model_id,
                        &ModelMeta::lookup(&self.registry, model_id),
                        Duration::ZERO,
                        DispatchError::TaskFailed(join_err.to_string()),
                    )
                }
            })
            .collect()
    }
}

struct ModelCall {
    model_id: String,
    meta: ModelMeta,
    adapters: Arc<AdapterTable>,
    permits: Arc<Semaphore>,
    prompt: Arc<str>,
    dialect: Dialect,
    max_tokens: u32,
    timeout: Duration,
    temperature: f32,
}

impl ModelCall {
    async fn run(self) -> SingleModelResult {
        let adapter = match self.adapters.resolve(&self.model_id) {
            Ok(adapter) => adapter,
            Err(err) => {
                warn!("Model {} not available: {}", self.model_id, err);
                return SingleModelResult::failed(
                    &self.model_id,
                    &self.meta,
                    Duration::ZERO,
                    DispatchError::ModelNotAvailable(err),
                );
            }
        };

        // Closed only if the dispatcher is gone, which cannot happen while we hold an Arc.
        let _permit = self.permits.acquire().await.ok();

        debug!(
            "Sending prompt to {} via {} (max_tokens={})",
            self.model_id,
            adapter.provider_name(),
            self.max_tokens
        );

        let start = Instant::now();
        let call = adapter.send(SYSTEM_PROMPT, &self.prompt, self.max_tokens, self.temperature);

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(text)) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                let token_count = count_tokens(&text);
                info!(
                    "Model {} responded in {}ms ({} tokens)",
                    self.model_id, latency_ms, token_count
                );
                SingleModelResult {
                    model_id: self.model_id,
                    model_name: self.meta.name,
                    provider: self.meta.provider,
                    latency_ms,
                    token_count,
                    cost_usd: estimate_cost(token_count, self.meta.cost_per_1k_out),
                    error: None,
                    linguistic_metrics: Some(analyzer::analyze(&text, self.dialect)),
                    response_text: Some(text),
                }
            }
            Ok(Err(err)) => {
                warn!("Model {} failed: {}", self.model_id, err);
                SingleModelResult::failed(
                    &self.model_id,
                    &self.meta,
                    start.elapsed(),
                    DispatchError::Provider(err),
                )
            }
            Err(_) => {
                warn!(
                    "Model {} timed out after {:?}",
                    self.model_id, self.timeout
                );
                SingleModelResult::failed(
                    &self.model_id,
                    &self.meta,
                    self.timeout,
                    DispatchError::Timeout(self.timeout),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{stub_table, Step};

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn dispatcher(table: AdapterTable, timeout: Duration) -> Dispatcher {
        Dispatcher::new(
            Arc::new(ModelRegistry::builtin()),
            Arc::new(table),
            DispatchConfig::default().with_timeout(timeout),
        )
    }

    #[test]
    fn test_cost_rounding() {
        assert_eq!(count_tokens("  واحد اثنان\nثلاثة  "), 3);
        assert_eq!(estimate_cost(3, 0.015), 0.000045);
        assert_eq!(estimate_cost(1234, 0.0007), 0.000864);
        assert_eq!(estimate_cost(0, 0.075), 0.0);
    }

    #[test]
    fn test_unknown_metadata_fallback() {
        let meta = ModelMeta::lookup(&ModelRegistry::builtin(), "bert-base");
        assert_eq!(meta.name, "bert-base");
        assert_eq!(meta.provider, "unknown");
        assert_eq!(meta.cost_per_1k_out, 0.0);
    }

    #[tokio::test]
    async fn test_results_follow_request_order() {
        let table = stub_table(vec![
            ("gpt-4o", vec![Step::Slow(Duration::from_millis(80), "رد بطيء".into())]),
            ("claude-3-5-sonnet", vec![Step::Reply("رد سريع جدا".into())]),
            ("gemini-1.5-flash", vec![Step::Slow(Duration::from_millis(30), "رد".into())]),
        ]);
        let dispatcher = dispatcher(table, Duration::from_secs(5));
        let order = ids(&["gpt-4o", "claude-3-5-sonnet", "gemini-1.5-flash"]);

        let results = dispatcher.dispatch("prompt", Dialect::Msa, &order, 256).await;

        let got: Vec<&str> = results.iter().map(|r| r.model_id.as_str()).collect();
        assert_eq!(got, vec!["gpt-4o", "claude-3-5-sonnet", "gemini-1.5-flash"]);
        assert!(results.iter().all(SingleModelResult::is_success));
        assert_eq!(results[1].token_count, 3);
        assert_eq!(results[1].model_name, "Claude 3.5 Sonnet");
        assert!(results[1].linguistic_metrics.is_some());
    }

    #[tokio::test]
    async fn test_timeout_isolated_from_siblings() {
        let table = stub_table(vec![
            ("gpt-4o", vec![Step::Slow(Duration::from_secs(10), "late".into())]),
            ("mistral-large", vec![Step::Reply("في الوقت".into())]),
        ]);
        let dispatcher = dispatcher(table, Duration::from_millis(50));

        let results = dispatcher
            .dispatch("prompt", Dialect::Msa, &ids(&["gpt-4o", "mistral-large"]), 256)
            .await;

        let timed_out = &results[0];
        assert_eq!(timed_out.latency_ms, 50);
        assert!(timed_out.response_text.is_none());
        assert!(timed_out.error.as_deref().unwrap().contains("timed out"));
        assert_eq!(timed_out.cost_usd, 0.0);
        assert!(timed_out.linguistic_metrics.is_none());

        assert!(results[1].is_success());
    }

    #[tokio::test]
    async fn test_provider_fault_carries_raw_message() {
        let table = stub_table(vec![(
            "gpt-4o",
            vec![Step::ApiError("upstream exploded".into())],
        )]);
        let dispatcher = dispatcher(table, Duration::from_secs(1));

        let results = dispatcher
            .dispatch("prompt", Dialect::Msa, &ids(&["gpt-4o"]), 256)
            .await;
        assert_eq!(
            results[0].error.as_deref(),
            Some("stub API error (500): upstream exploded")
        );
    }

    #[tokio::test]
    async fn test_unavailable_and_unknown_models() {
        let mut table = stub_table(vec![("gpt-4o", vec![Step::Reply("نعم".into())])]);
        table.mark_unavailable("jais-30b", "JAIS_API_KEY is not set");
        let dispatcher = dispatcher(table, Duration::from_secs(1));

        let results = dispatcher
            .dispatch(
                "prompt",
                Dialect::Gulf,
                &ids(&["jais-30b", "gpt-4o", "bert-base"]),
                256,
            )
            .await;

        assert_eq!(results.len(), 3);
        let jais = &results[0];
        assert!(jais.error.as_deref().unwrap().contains("JAIS_API_KEY"));
        assert_eq!(jais.provider, "G42/MBZUAI");
        assert_eq!(jais.latency_ms, 0);
        assert!(results[1].is_success());
        assert_eq!(results[2].provider, "unknown");
        assert!(results[2].error.as_deref().unwrap().contains("unknown model id"));
    }

    #[tokio::test]
    async fn test_panicking_provider_becomes_error_slot() {
        let table = stub_table(vec![
            ("gpt-4o", vec![Step::Panic]),
            ("gpt-4-turbo", vec![Step::Reply("ok".into())]),
        ]);
        let dispatcher = dispatcher(table, Duration::from_secs(1));

        let results = dispatcher
            .dispatch("prompt", Dialect::Msa, &ids(&["gpt-4o", "gpt-4-turbo"]), 256)
            .await;
        assert!(results[0].error.as_deref().unwrap().contains("aborted"));
        assert_eq!(results[0].model_id, "gpt-4o");
        assert!(results[1].is_success());
    }
}
