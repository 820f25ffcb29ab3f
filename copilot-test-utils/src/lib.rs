//! Copilot Test Utilities
//!
//! Shared test infrastructure for the workspace:
//! - Scripted model gateways (succeed, fail, slow, chunked)
//! - A store that refuses every write
//! - Category and report fixtures
//! - Proptest generators for raw model text

pub use copilot_core::{
    CategorySet, CategoryTemplate, CopilotError, CopilotResult, Disposition, GenerationMode,
    HealthCheck, IncidentId, IncidentRecord, IncidentReport, ModelError, NewIncidentRecord,
    Severity, StorageError, StructuredResponse,
};
pub use copilot_storage::{InMemoryIncidentStore, IncidentStore, StoreStatistics};

use async_trait::async_trait;
use copilot_llm::gateway::with_deadline;
use copilot_llm::{ChunkStream, Generation, ModelGateway};
use futures_util::stream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// SCRIPTED GATEWAY
// ============================================================================

/// What a [`ScriptedGateway`] does on every call.
#[derive(Debug, Clone)]
pub enum Script {
    /// Whole text in one piece
    Text(String),
    /// Chunks in order; blocking mode joins them
    Chunks(Vec<String>),
    /// Chunks, then a terminal error. Blocking mode returns the error.
    ChunksThenFail(Vec<String>, ModelError),
    /// Chunks with `delay` before each one, bounded by the caller's timeout
    Slow { chunks: Vec<String>, delay: Duration },
    /// Every call fails
    Fail(ModelError),
}

/// Gateway that replays a fixed script and records the prompts it saw.
#[derive(Debug)]
pub struct ScriptedGateway {
    script: Script,
    model: String,
    health: HealthCheck,
    open_delay: Duration,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            model: "scripted:test".to_string(),
            health: HealthCheck::healthy("model"),
            open_delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with `text`.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Script::Text(text.into()))
    }

    /// Streams `chunks` in order.
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Script::Chunks(chunks.into_iter().map(Into::into).collect()))
    }

    /// Every transport is down. Health checks report unhealthy too.
    pub fn unavailable() -> Self {
        Self::new(Script::Fail(ModelError::unavailable("all", "connection refused")))
            .with_health(HealthCheck::unhealthy("model", "connection refused"))
    }

    /// Every call exceeds its budget.
    pub fn timing_out() -> Self {
        Self::new(Script::Fail(ModelError::Timeout { after_ms: 600_000 }))
    }

    /// Slow chunked output.
    pub fn slow<I, S>(chunks: I, delay: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Script::Slow {
            chunks: chunks.into_iter().map(Into::into).collect(),
            delay,
        })
    }

    pub fn with_health(mut self, health: HealthCheck) -> Self {
        self.health = health;
        self
    }

    /// Stall `delay` inside `generate` before the script runs, bounded by
    /// the caller's timeout.
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn chunk_stream(chunks: Vec<String>, tail: Option<ModelError>) -> ChunkStream {
        let items = chunks
            .into_iter()
            .map(Ok)
            .chain(tail.into_iter().map(Err));
        Box::pin(stream::iter(items))
    }

    fn slow_stream(chunks: Vec<String>, delay: Duration) -> ChunkStream {
        Box::pin(stream::unfold(chunks.into_iter(), move |mut rest| async move {
            let next = rest.next()?;
            tokio::time::sleep(delay).await;
            Some((Ok(next), rest))
        }))
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn generate(
        &self,
        prompt: &str,
        mode: GenerationMode,
        timeout: Duration,
    ) -> Result<Generation, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let timed_out = ModelError::Timeout {
            after_ms: timeout.as_millis() as u64,
        };

        if !self.open_delay.is_zero() {
            tokio::time::timeout(timeout, tokio::time::sleep(self.open_delay))
                .await
                .map_err(|_| timed_out.clone())?;
        }

        match (&self.script, mode) {
            (Script::Fail(e), _) => Err(e.clone()),
            (Script::Text(text), GenerationMode::Blocking) => Ok(Generation::Text(text.clone())),
            (Script::Text(text), GenerationMode::Streaming) => {
                Ok(Generation::Stream(Generation::single_chunk(text.clone())))
            }
            (Script::Chunks(chunks), GenerationMode::Blocking) => {
                Ok(Generation::Text(chunks.concat()))
            }
            (Script::Chunks(chunks), GenerationMode::Streaming) => {
                Ok(Generation::Stream(Self::chunk_stream(chunks.clone(), None)))
            }
            (Script::ChunksThenFail(_, e), GenerationMode::Blocking) => Err(e.clone()),
            (Script::ChunksThenFail(chunks, e), GenerationMode::Streaming) => Ok(
                Generation::Stream(Self::chunk_stream(chunks.clone(), Some(e.clone()))),
            ),
            (Script::Slow { chunks, delay }, GenerationMode::Blocking) => {
                let total = delay.saturating_mul(chunks.len() as u32);
                tokio::time::timeout(timeout, tokio::time::sleep(total))
                    .await
                    .map_err(|_| timed_out)?;
                Ok(Generation::Text(chunks.concat()))
            }
            (Script::Slow { chunks, delay }, GenerationMode::Streaming) => {
                let deadline = tokio::time::Instant::now() + timeout;
                Ok(Generation::Stream(with_deadline(
                    Self::slow_stream(chunks.clone(), *delay),
                    deadline,
                    timeout,
                )))
            }
        }
    }

    async fn ping(&self) -> HealthCheck {
        self.health.clone()
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// FAILING STORE
// ============================================================================

/// Store whose backing medium is gone. Every read and write fails.
#[derive(Debug, Default)]
pub struct FailingStore {
    attempts: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `append` calls attempted.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IncidentStore for FailingStore {
    async fn append(&self, _record: NewIncidentRecord) -> CopilotResult<IncidentId> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::unavailable("disk unavailable").into())
    }

    async fn list_recent(&self, _limit: usize) -> CopilotResult<Vec<IncidentRecord>> {
        Err(StorageError::unavailable("disk unavailable").into())
    }

    async fn health_check(&self) -> CopilotResult<StoreStatistics> {
        Err(StorageError::unavailable("disk unavailable").into())
    }

    async fn flush(&self) -> CopilotResult<()> {
        Ok(())
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;

    /// Model output carrying a well-formed answer between prose.
    pub const PARSEABLE_OUTPUT: &str = r#"Here you go: {"investigation_steps":["check pool"],"commands":["pg_isready -h db"],"fixes":["restart pgbouncer"],"severity":"high","recommended_action":"restart","notes":"pool saturated"} thanks"#;

    /// Model output with no structured object at all.
    pub const PROSE_OUTPUT: &str = "I think you should restart the pod";

    /// A set holding only `database_down`.
    pub fn database_down_only() -> CategorySet {
        CategorySet::from_templates([CategoryTemplate::new(
            "database_down",
            "Database on {{agent}} is unreachable. Report: {{incident}}",
        )
        .with_hints("Postgres 15 behind pgbouncer")])
    }

    /// The categories shipped with the sample configuration.
    pub fn standard_categories() -> CategorySet {
        CategorySet::from_templates([
            CategoryTemplate::new(
                "database_down",
                "Database on {{agent}} is unreachable. Report: {{incident}}",
            )
            .with_hints("Postgres 15 behind pgbouncer"),
            CategoryTemplate::new(
                "high_cpu",
                "Host {{agent}} reports sustained CPU load. Details: {{incident}}",
            ),
            CategoryTemplate::new(
                "disk_full",
                "A volume on {{agent}} is near capacity ({{hints}}). Details: {{incident}}",
            )
            .with_hints("ext4, logs under /var/log"),
        ])
    }

    pub fn report(category: &str) -> IncidentReport {
        IncidentReport::new(
            category,
            "linux_agent",
            "connection refused on 5432 since 02:14 UTC",
        )
    }

    /// A record ready for `IncidentStore::append`.
    pub fn new_record(category: &str) -> NewIncidentRecord {
        NewIncidentRecord::from_report(
            &report(category),
            PROSE_OUTPUT,
            StructuredResponse::degraded(PROSE_OUTPUT),
            Disposition::Degraded,
        )
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;

    /// Category names as they appear in configuration files.
    pub fn arb_category_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,23}"
    }

    /// Free-form agent identifiers, including empty ones.
    pub fn arb_agent_identifier() -> impl Strategy<Value = String> {
        prop_oneof![Just(String::new()), "[A-Za-z0-9_.:-]{1,32}"]
    }

    pub fn arb_severity_label() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("low".to_string()),
            Just("MEDIUM".to_string()),
            Just("High".to_string()),
            Just("critical".to_string()),
            "[a-z]{0,8}",
        ]
    }

    /// A well-formed model answer using a subset of the known keys.
    pub fn arb_model_json() -> impl Strategy<Value = String> {
        (
            prop::collection::vec("[a-z ]{1,20}", 0..4),
            prop::collection::vec("[a-z -]{1,20}", 0..4),
            prop::option::of(arb_severity_label()),
            prop::option::of("[a-z ]{0,20}"),
        )
            .prop_map(|(steps, commands, severity, action)| {
                let mut object = serde_json::Map::new();
                object.insert("investigation_steps".into(), serde_json::json!(steps));
                object.insert("commands".into(), serde_json::json!(commands));
                if let Some(severity) = severity {
                    object.insert("severity".into(), serde_json::json!(severity));
                }
                if let Some(action) = action {
                    object.insert("recommended_action".into(), serde_json::json!(action));
                }
                serde_json::Value::Object(object).to_string()
            })
    }

    /// Anything a model might emit: prose, JSON wrapped in prose, or noise.
    pub fn arb_model_text() -> impl Strategy<Value = String> {
        prop_oneof![
            any::<String>(),
            "[a-zA-Z .,!?]{0,80}",
            arb_model_json(),
            ("[a-zA-Z .:]{0,40}", arb_model_json(), "[a-zA-Z .]{0,40}")
                .prop_map(|(before, json, after)| format!("{}{}{}", before, json, after)),
            "[{}\\[\\]\",:a-z ]{0,60}",
        ]
    }
}
