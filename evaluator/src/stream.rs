//! Token-by-token evaluation sessions.
//!
//! A session streams every requested model concurrently into one channel.
//! Fragments of one model arrive in provider order; fragments of different
//! models interleave freely. Once the receiving side is dropped, no further
//! events are produced and the in-flight provider streams are dropped with
//! their tasks.

use crate::analyzer::{self, LinguisticMetrics};
use crate::dispatch::{count_tokens, DispatchConfig};
use crate::error::{DispatchError, EvalError, EvalResult};
use crate::prompts::SYSTEM_PROMPT;
use crate::request::{Dialect, StreamRequest};
use futures::future::join_all;
use futures::StreamExt;
use model::{AdapterTable, ModelAdapter, ModelError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    EvaluationStart {
        evaluation_id: Uuid,
        models: Vec<String>,
    },
    StreamStart {
        model_id: String,
    },
    Token {
        model_id: String,
        token: String,
    },
    StreamEnd {
        model_id: String,
        latency_ms: u64,
        token_count: usize,
        linguistic_metrics: LinguisticMetrics,
    },
    StreamError {
        model_id: String,
        error: String,
    },
    EvaluationComplete {
        evaluation_id: Uuid,
    },
    Error {
        message: String,
    },
}

impl StreamEvent {
    pub fn model_id(&self) -> Option<&str> {
        match self {
            Self::StreamStart { model_id }
            | Self::Token { model_id, .. }
            | Self::StreamEnd { model_id, .. }
            | Self::StreamError { model_id, .. } => Some(model_id),
            _ => None,
        }
    }
}

type Closed = mpsc::error::SendError<StreamEvent>;

pub struct StreamSession {
    adapters: Arc<AdapterTable>,
    config: DispatchConfig,
}

impl StreamSession {
    pub fn new(adapters: Arc<AdapterTable>, config: DispatchConfig) -> Self {
        Self { adapters, config }
    }

    /// Streams `request` into `events` and returns the session id.
    ///
    /// An empty prompt yields a single `error` event and an error result.
    pub async fn run(
        &self,
        request: StreamRequest,
        events: mpsc::Sender<StreamEvent>,
    ) -> EvalResult<Uuid> {
        let evaluation_id = Uuid::new_v4();

        let request = match request.normalized() {
            Ok(request) => request,
            Err(err) => {
                let message = match &err {
                    EvalError::InvalidRequest { reason } => reason.clone(),
                    other => other.to_string(),
                };
                let _ = events.send(StreamEvent::Error { message }).await;
                return Err(err);
            }
        };

        let start = StreamEvent::EvaluationStart {
            evaluation_id,
            models: request.models.clone(),
        };
        if events.send(start).await.is_err() {
            info!("Client disconnected from stream {}", evaluation_id);
            return Ok(evaluation_id);
        }

        let prompt: Arc<str> = Arc::from(request.prompt.as_str());
        let handles: Vec<_> = request
            .models
            .iter()
            .map(|model_id| {
                let job = ModelStream {
                    model_id: model_id.clone(),
                    adapters: Arc::clone(&self.adapters),
                    prompt: Arc::clone(&prompt),
                    dialect: request.dialect,
                    max_tokens: request.max_tokens,
                    temperature: self.config.temperature,
                    timeout: self.config.timeout,
                    events: events.clone(),
                };
                tokio::spawn(job.run())
            })
            .collect();

        let mut disconnected = false;
        for (joined, model_id) in join_all(handles).await.into_iter().zip(&request.models) {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(_closed)) => disconnected = true,
                Err(join_err) => {
                    error!("Stream task for {} aborted: {}", model_id, join_err);
                    let event = StreamEvent::StreamError {
                        model_id: model_id.clone(),
                        error: DispatchError::TaskFailed(join_err.to_string()).to_string(),
                    };
                    disconnected |= events.send(event).await.is_err();
                }
            }
        }

        if disconnected
            || events
                .send(StreamEvent::EvaluationComplete { evaluation_id })
                .await
                .is_err()
        {
            info!("Client disconnected from stream {}", evaluation_id);
        }
        Ok(evaluation_id)
    }
}

struct ModelStream {
    model_id: String,
    adapters: Arc<AdapterTable>,
    prompt: Arc<str>,
    dialect: Dialect,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    events: mpsc::Sender<StreamEvent>,
}

impl ModelStream {
    async fn run(self) -> Result<(), Closed> {
        let adapter = match self.adapters.resolve(&self.model_id) {
            Ok(adapter) => adapter,
            Err(err) => {
                warn!("Model {} not available for streaming: {}", self.model_id, err);
                return self.fail(err.to_string()).await;
            }
        };

        self.emit(StreamEvent::StreamStart {
            model_id: self.model_id.clone(),
        })
        .await?;

        let start = Instant::now();
        match tokio::time::timeout(self.timeout, self.relay(&adapter)).await {
            Ok(Ok(Ok(text))) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                let token_count = count_tokens(&text);
                debug!(
                    "Model {} streamed {} tokens in {}ms",
                    self.model_id, token_count, latency_ms
                );
                self.emit(StreamEvent::StreamEnd {
                    model_id: self.model_id.clone(),
                    latency_ms,
                    token_count,
                    linguistic_metrics: analyzer::analyze(&text, self.dialect),
                })
                .await
            }
            Ok(Ok(Err(err))) => {
                warn!("Streaming error for {}: {}", self.model_id, err);
                self.fail(err.to_string()).await
            }
            Ok(Err(closed)) => Err(closed),
            Err(_) => {
                warn!("Model {} stream timed out after {:?}", self.model_id, self.timeout);
                self.fail(DispatchError::Timeout(self.timeout).to_string())
                    .await
            }
        }
    }

    /// Forwards fragments as they arrive; the outer result is the channel state.
    async fn relay(&self, adapter: &ModelAdapter) -> Result<Result<String, ModelError>, Closed> {
        let mut fragments = match adapter
            .send_stream(SYSTEM_PROMPT, &self.prompt, self.max_tokens, self.temperature)
            .await
        {
            Ok(fragments) => fragments,
            Err(err) => return Ok(Err(err)),
        };

        let mut text = String::new();
        while let Some(fragment) = fragments.next().await {
            let token = match fragment {
                Ok(token) => token,
                Err(err) => return Ok(Err(err)),
            };
            if token.is_empty() {
                continue;
            }
            text.push_str(&token);
            self.emit(StreamEvent::Token {
                model_id: self.model_id.clone(),
                token,
            })
            .await?;
        }
        Ok(Ok(text))
    }

    async fn emit(&self, event: StreamEvent) -> Result<(), Closed> {
        self.events.send(event).await
    }

    async fn fail(&self, error: String) -> Result<(), Closed> {
        self.emit(StreamEvent::StreamError {
            model_id: self.model_id.clone(),
            error,
        })
        .await
    }
}
