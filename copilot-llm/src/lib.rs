//! Copilot LLM - Model Gateway
//!
//! Transport-agnostic access to the language-model backend, plus the parser
//! that turns its free text into a [`StructuredResponse`].
//!
//! [`StructuredResponse`]: copilot_core::StructuredResponse

use async_trait::async_trait;
use copilot_core::{GenerationMode, HealthCheck, HealthStatus, ModelError};
use futures_util::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;

pub mod gateway;
pub mod providers;
pub mod response;

pub use gateway::FallbackGateway;
pub use providers::{OllamaHttpBackend, ProcessBackend};
pub use response::{ParseOutcome, ResponseParser};

// ============================================================================
// GENERATION RESULTS
// ============================================================================

/// Lazy sequence of text chunks. An `Err` item is terminal.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, ModelError>> + Send>>;

/// What a successful `generate` call hands back.
pub enum Generation {
    /// Whole response, blocking mode
    Text(String),
    /// Chunks in arrival order, streaming mode
    Stream(ChunkStream),
}

impl Generation {
    /// Wrap a complete text as a one-chunk stream.
    pub fn single_chunk(text: String) -> ChunkStream {
        Box::pin(stream::once(async move { Ok(text) }))
    }

    /// Drain into a single string. Stops at the first error.
    pub async fn collect(self) -> Result<String, ModelError> {
        match self {
            Generation::Text(text) => Ok(text),
            Generation::Stream(mut chunks) => {
                let mut text = String::new();
                while let Some(chunk) = chunks.next().await {
                    text.push_str(&chunk?);
                }
                Ok(text)
            }
        }
    }
}

impl std::fmt::Debug for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Generation::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            Generation::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

// ============================================================================
// TRAITS
// ============================================================================

/// One way of reaching the model (HTTP API, local process, ...).
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Short transport name used in logs and metrics.
    fn transport(&self) -> &str;

    /// Run the prompt to completion.
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;

    /// Open a chunk stream for the prompt.
    async fn open_stream(&self, _prompt: &str) -> Result<ChunkStream, ModelError> {
        Err(ModelError::unavailable(
            self.transport(),
            "streaming not supported by this transport",
        ))
    }

    /// Liveness check.
    async fn health_check(&self) -> HealthCheck {
        HealthCheck {
            status: HealthStatus::Unknown,
            component: self.transport().to_string(),
            message: Some("no health check for this transport".to_string()),
            response_time_ms: None,
            metadata: None,
        }
    }
}

/// Entry point used by the intake pipeline.
///
/// # Example
/// ```ignore
/// let generation = gateway
///     .generate(&prompt, GenerationMode::Blocking, Duration::from_secs(600))
///     .await?;
/// let text = generation.collect().await?;
/// ```
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Send a prompt to the model.
    ///
    /// # Arguments
    /// * `prompt` - Fully rendered prompt
    /// * `mode` - Blocking returns [`Generation::Text`], streaming returns [`Generation::Stream`]
    /// * `timeout` - Budget for the whole call, fallback included
    ///
    /// # Returns
    /// * `Err(ModelError::Unavailable)` - Every transport failed
    /// * `Err(ModelError::Timeout)` - Budget exhausted before any text was produced.
    ///   Once a stream has started, a timeout arrives as its final item instead.
    async fn generate(
        &self,
        prompt: &str,
        mode: GenerationMode,
        timeout: Duration,
    ) -> Result<Generation, ModelError>;

    /// Check the backend without generating anything.
    async fn ping(&self) -> HealthCheck;

    /// Model identifier sent to the backend.
    fn model_id(&self) -> &str;
}

/// Hooks for metrics. Every method defaults to a no-op.
pub trait GatewayObserver: Send + Sync {
    /// A transport attempt finished.
    fn on_attempt(&self, _transport: &str, _ok: bool, _elapsed: Duration) {}

    /// The gateway moved from one transport to the next.
    fn on_fallback(&self, _from: &str, _to: &str, _reason: &ModelError) {}
}

/// Observer that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl GatewayObserver for NoopObserver {}
