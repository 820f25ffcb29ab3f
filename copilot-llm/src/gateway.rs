//! Transport fallback and deadline enforcement.
//!
//! Blocking: primary `complete`, then secondary `complete`.
//! Streaming: primary `open_stream`; if it cannot be opened, the blocking
//! chain runs and its text is delivered as a single chunk. A stream that has
//! started is never restarted on another transport.

use crate::{
    ChunkStream, Generation, GatewayObserver, ModelBackend, ModelGateway, NoopObserver,
};
use async_trait::async_trait;
use copilot_core::{GenerationMode, HealthCheck, ModelError};
use futures_util::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

/// Gateway over a primary transport with an optional secondary fallback.
pub struct FallbackGateway {
    primary: Arc<dyn ModelBackend>,
    secondary: Option<Arc<dyn ModelBackend>>,
    model: String,
    observer: Arc<dyn GatewayObserver>,
}

impl FallbackGateway {
    /// Create a gateway.
    ///
    /// # Arguments
    /// * `primary` - Tried first in both modes
    /// * `secondary` - Blocking-only fallback, `None` to disable
    /// * `model` - Identifier reported by [`ModelGateway::model_id`]
    pub fn new(
        primary: Arc<dyn ModelBackend>,
        secondary: Option<Arc<dyn ModelBackend>>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            primary,
            secondary,
            model: model.into(),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn GatewayObserver>) -> Self {
        self.observer = observer;
        self
    }

    async fn attempt<F, T>(&self, transport: &str, call: F) -> Result<T, ModelError>
    where
        F: Future<Output = Result<T, ModelError>>,
    {
        let started = Instant::now();
        let result = call.await;
        let elapsed = started.elapsed();
        self.observer.on_attempt(transport, result.is_ok(), elapsed);
        match &result {
            Ok(_) => tracing::debug!(
                transport,
                elapsed_ms = elapsed.as_millis() as u64,
                "Model transport succeeded"
            ),
            Err(e) => tracing::warn!(
                transport,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "Model transport failed"
            ),
        }
        result
    }

    /// Primary `complete`, then secondary `complete`. No deadline here; the
    /// caller wraps the whole chain.
    async fn blocking_chain(&self, prompt: &str) -> Result<String, ModelError> {
        let primary_err = match self
            .attempt(self.primary.transport(), self.primary.complete(prompt))
            .await
        {
            Ok(text) => return Ok(text),
            Err(e) => e,
        };

        let Some(secondary) = &self.secondary else {
            return Err(primary_err);
        };

        self.observer
            .on_fallback(self.primary.transport(), secondary.transport(), &primary_err);
        tracing::info!(
            from = self.primary.transport(),
            to = secondary.transport(),
            reason = %primary_err,
            "Falling back to secondary model transport"
        );

        self.attempt(secondary.transport(), secondary.complete(prompt))
            .await
            .map_err(|secondary_err| {
                ModelError::unavailable(
                    "all",
                    format!(
                        "{}: {}; {}: {}",
                        self.primary.transport(),
                        primary_err,
                        secondary.transport(),
                        secondary_err
                    ),
                )
            })
    }

    async fn streaming(
        &self,
        prompt: &str,
        deadline: Instant,
        budget: Duration,
    ) -> Result<Generation, ModelError> {
        let opened = self
            .attempt(self.primary.transport(), self.primary.open_stream(prompt))
            .await;

        match opened {
            Ok(chunks) => Ok(Generation::Stream(with_deadline(chunks, deadline, budget))),
            Err(open_err) => {
                self.observer.on_fallback(
                    self.primary.transport(),
                    "blocking",
                    &open_err,
                );
                tracing::info!(
                    reason = %open_err,
                    "Stream could not be opened, using blocking transports"
                );
                let text = self.blocking_chain(prompt).await?;
                Ok(Generation::Stream(Generation::single_chunk(text)))
            }
        }
    }
}

/// End `chunks` with `ModelError::Timeout` once `deadline` passes. Items after
/// the first error are never polled.
pub fn with_deadline(chunks: ChunkStream, deadline: Instant, budget: Duration) -> ChunkStream {
    let after_ms = budget.as_millis() as u64;
    Box::pin(stream::unfold(Some(chunks), move |state| async move {
        let mut chunks = state?;
        match timeout_at(deadline, chunks.next()).await {
            Ok(Some(Ok(text))) => Some((Ok(text), Some(chunks))),
            Ok(Some(Err(e))) => Some((Err(e), None)),
            Ok(None) => None,
            Err(_) => Some((Err(ModelError::Timeout { after_ms }), None)),
        }
    }))
}

#[async_trait]
impl ModelGateway for FallbackGateway {
    async fn generate(
        &self,
        prompt: &str,
        mode: GenerationMode,
        timeout: Duration,
    ) -> Result<Generation, ModelError> {
        let deadline = Instant::now() + timeout;
        let timed_out = || ModelError::Timeout {
            after_ms: timeout.as_millis() as u64,
        };

        match mode {
            GenerationMode::Blocking => timeout_at(deadline, self.blocking_chain(prompt))
                .await
                .map_err(|_| timed_out())?
                .map(Generation::Text),
            GenerationMode::Streaming => {
                timeout_at(deadline, self.streaming(prompt, deadline, timeout))
                    .await
                    .map_err(|_| timed_out())?
            }
        }
    }

    async fn ping(&self) -> HealthCheck {
        self.primary
            .health_check()
            .await
            .with_metadata("model", serde_json::json!(self.model))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for FallbackGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackGateway")
            .field("primary", &self.primary.transport())
            .field(
                "secondary",
                &self.secondary.as_ref().map(|s| s.transport().to_string()),
            )
            .field("model", &self.model)
            .finish()
    }
}
