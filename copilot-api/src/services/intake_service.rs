//! Intake Service
//!
//! Runs one incident report through the pipeline:
//! `RECEIVED -> PROMPT_BUILT -> MODEL_INVOKED -> {PARSED | DEGRADED | MODEL_FAILED}
//! -> PERSISTED -> RESPONDED`, with `REJECTED` for unknown categories.
//!
//! Every accepted report produces exactly one persisted record, whatever the
//! model does. Only an unknown category or a store failure reaches the caller
//! as an error.

use std::sync::Arc;
use std::time::Instant;

use copilot_context::PromptBuilder;
use copilot_core::{
    CategorySet, Disposition, GenerationMode, IncidentRecord, IncidentReport, IntakeConfig,
    ModelError, NewIncidentRecord, StructuredResponse,
};
use copilot_llm::{ChunkStream, Generation, ModelGateway, ResponseParser};
use copilot_storage::IncidentStore;
use futures_util::StreamExt;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::telemetry::global_metrics;

/// Agent label used when a report carries none.
pub const UNKNOWN_AGENT: &str = "unknown";

/// Upper bound on concurrently running pipelines; `shutdown` claims all of them.
const PIPELINE_SLOTS: u32 = 1 << 20;

// ============================================================================
// TYPES
// ============================================================================

/// Process-scoped collaborators of the pipeline.
pub struct IntakeContext {
    /// Loaded once at startup, read-only afterwards
    pub categories: Arc<CategorySet>,
    pub prompts: PromptBuilder,
    pub gateway: Arc<dyn ModelGateway>,
    pub store: Arc<dyn IncidentStore>,
    pub config: IntakeConfig,
}

/// Result of one completed pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeOutcome {
    pub record: IncidentRecord,
    pub disposition: Disposition,
}

/// Events delivered to a streaming caller. Exactly one terminal event
/// (`Recorded` or `Failed`) follows the chunks.
#[derive(Debug, Clone)]
pub enum IntakeEvent {
    /// Raw model text as it arrived
    Chunk(String),
    Recorded(IntakeOutcome),
    Failed(ApiError),
}

/// How a streaming model call ended.
enum StreamEnd {
    Finished,
    Failed(ModelError),
    Cancelled,
}

// ============================================================================
// SERVICE
// ============================================================================

/// Orchestrates prompt building, the model call, parsing and persistence.
#[derive(Clone)]
pub struct IntakeService {
    ctx: Arc<IntakeContext>,
    /// One permit per running pipeline task
    in_flight: Arc<Semaphore>,
}

impl IntakeService {
    pub fn new(ctx: IntakeContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            in_flight: Arc::new(Semaphore::new(PIPELINE_SLOTS as usize)),
        }
    }

    /// Known category names, sorted.
    pub fn categories(&self) -> Vec<String> {
        self.ctx.categories.names()
    }

    pub fn gateway(&self) -> &Arc<dyn ModelGateway> {
        &self.ctx.gateway
    }

    pub fn store(&self) -> &Arc<dyn IncidentStore> {
        &self.ctx.store
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.ctx.config
    }

    /// Submit a report and wait for the persisted record.
    ///
    /// The pipeline runs on its own task, so the record is still written if
    /// the caller stops waiting.
    ///
    /// # Errors
    /// - `UnknownCategory` - no model call made, nothing persisted
    /// - `StorageUnavailable` - the record could not be written
    /// - `ServiceUnavailable` - shutdown has started
    pub async fn submit(&self, report: IncidentReport) -> ApiResult<IntakeOutcome> {
        let permit = self.admit()?;
        let (report, prompt) = self.accept(report)?;
        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move {
            let _permit = permit;
            run_blocking(&ctx, report, prompt).await
        })
        .await
            .map_err(|e| ApiError::internal_error(format!("Intake task failed: {}", e)))?
    }

    /// Submit a report and receive model output as it is produced.
    ///
    /// Dropping the receiver cancels the model call; a `cancelled` record
    /// holding the partial output is still persisted.
    ///
    /// # Errors
    /// `UnknownCategory` or `ServiceUnavailable`, before any streaming starts.
    pub fn submit_streaming(
        &self,
        report: IncidentReport,
    ) -> ApiResult<mpsc::Receiver<IntakeEvent>> {
        let permit = self.admit()?;
        let (report, prompt) = self.accept(report)?;
        let (tx, rx) = mpsc::channel(self.ctx.config.stream_buffer);
        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move {
            let _permit = permit;
            run_streaming(&ctx, report, prompt, tx).await
        });
        Ok(rx)
    }

    /// Most recent records, newest first.
    ///
    /// # Errors
    /// `InvalidRange` if `limit` is outside `1..=max_list_limit`.
    pub async fn list_recent(&self, limit: Option<usize>) -> ApiResult<Vec<IncidentRecord>> {
        let config = &self.ctx.config;
        let limit = limit.unwrap_or(config.default_list_limit);
        if limit == 0 || limit > config.max_list_limit {
            return Err(ApiError::invalid_range("limit", 1, config.max_list_limit));
        }

        let started = Instant::now();
        let result = self.ctx.store.list_recent(limit).await;
        if let Some(m) = global_metrics() {
            m.record_store_operation(
                "list_recent",
                result.is_ok(),
                started.elapsed().as_secs_f64(),
            );
        }
        Ok(result?)
    }

    /// Stop admitting reports, wait for running pipelines to persist their
    /// records, then flush the store. Call once before the process exits.
    pub async fn shutdown(&self) -> ApiResult<()> {
        let running = PIPELINE_SLOTS as usize - self.in_flight.available_permits();
        info!(running, "Waiting for in-flight incidents");
        // Err only if a previous shutdown already closed the semaphore.
        let drained = self.in_flight.acquire_many(PIPELINE_SLOTS).await.ok();
        self.in_flight.close();
        drop(drained);

        info!("Flushing incident store");
        self.ctx.store.flush().await?;
        Ok(())
    }

    /// Reserve a pipeline slot, refused once shutdown has started.
    fn admit(&self) -> ApiResult<OwnedSemaphorePermit> {
        Arc::clone(&self.in_flight)
            .try_acquire_owned()
            .map_err(|_| ApiError::service_unavailable("Intake is shutting down"))
    }

    /// `RECEIVED -> PROMPT_BUILT`, or `REJECTED`.
    fn accept(&self, mut report: IncidentReport) -> ApiResult<(IncidentReport, String)> {
        if report.agent_identifier.trim().is_empty() {
            report.agent_identifier = UNKNOWN_AGENT.to_string();
        }
        debug!(
            state = "RECEIVED",
            category = %report.category,
            agent = %report.agent_identifier,
            incident_len = report.raw_text.len(),
            "Incident received"
        );

        let template = match self.ctx.categories.get(&report.category) {
            Ok(template) => template,
            Err(e) => {
                warn!(
                    state = "REJECTED",
                    category = %report.category,
                    agent = %report.agent_identifier,
                    "Unknown category"
                );
                if let Some(m) = global_metrics() {
                    m.record_intake("rejected");
                }
                return Err(e.into());
            }
        };

        let prompt = self.ctx.prompts.build(template, &report);
        debug!(
            state = "PROMPT_BUILT",
            category = %report.category,
            prompt_tokens = copilot_context::estimate_tokens(&prompt),
            "Prompt built"
        );
        Ok((report, prompt))
    }
}

impl std::fmt::Debug for IntakeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntakeService")
            .field("categories", &self.ctx.categories.len())
            .field("model", &self.ctx.gateway.model_id())
            .field("config", &self.ctx.config)
            .finish()
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

async fn run_blocking(
    ctx: &IntakeContext,
    report: IncidentReport,
    prompt: String,
) -> ApiResult<IntakeOutcome> {
    debug!(
        state = "MODEL_INVOKED",
        category = %report.category,
        mode = "blocking",
        "Calling model"
    );
    let started = Instant::now();

    let result = match ctx
        .gateway
        .generate(&prompt, GenerationMode::Blocking, ctx.config.model_timeout)
        .await
    {
        Ok(generation) => generation.collect().await,
        Err(e) => Err(e),
    };

    let (raw, response, disposition) = match result {
        Ok(raw) => {
            let (response, disposition) = interpret(&report, &raw, started);
            (raw, response, disposition)
        }
        Err(e) => model_failed(&report, String::new(), &e, started),
    };

    persist(ctx, &report, raw, response, disposition).await
}

async fn run_streaming(
    ctx: &IntakeContext,
    report: IncidentReport,
    prompt: String,
    tx: mpsc::Sender<IntakeEvent>,
) {
    debug!(
        state = "MODEL_INVOKED",
        category = %report.category,
        mode = "streaming",
        "Calling model"
    );
    let started = Instant::now();
    let mut raw = String::new();

    let opening = ctx
        .gateway
        .generate(&prompt, GenerationMode::Streaming, ctx.config.model_timeout);
    let opened = tokio::select! {
        biased;
        _ = tx.closed() => None,
        generation = opening => Some(generation),
    };

    let end = match opened {
        None => StreamEnd::Cancelled,
        Some(Err(e)) => StreamEnd::Failed(e),
        Some(Ok(generation)) => forward(into_chunks(generation), &tx, &mut raw).await,
    };

    let (raw, response, disposition) = match end {
        StreamEnd::Finished => {
            let (response, disposition) = interpret(&report, &raw, started);
            (raw, response, disposition)
        }
        StreamEnd::Failed(e) => model_failed(&report, raw, &e, started),
        StreamEnd::Cancelled => {
            warn!(
                category = %report.category,
                agent = %report.agent_identifier,
                partial_len = raw.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Caller went away before the model finished"
            );
            let notes = format!(
                "Request cancelled before the model finished. Partial output:\n{}",
                raw
            );
            (raw, StructuredResponse::degraded(notes), Disposition::Cancelled)
        }
    };

    let event = match persist(ctx, &report, raw, response, disposition).await {
        Ok(outcome) => IntakeEvent::Recorded(outcome),
        Err(e) => IntakeEvent::Failed(e),
    };
    // The receiver may already be gone; the record is persisted either way.
    let _ = tx.send(event).await;
}

fn into_chunks(generation: Generation) -> ChunkStream {
    match generation {
        Generation::Text(text) => Generation::single_chunk(text),
        Generation::Stream(chunks) => chunks,
    }
}

/// Forward chunks in arrival order, accumulating them into `raw`.
async fn forward(
    mut chunks: ChunkStream,
    tx: &mpsc::Sender<IntakeEvent>,
    raw: &mut String,
) -> StreamEnd {
    loop {
        let next = tokio::select! {
            biased;
            _ = tx.closed() => return StreamEnd::Cancelled,
            next = chunks.next() => next,
        };
        match next {
            None => return StreamEnd::Finished,
            Some(Err(e)) => return StreamEnd::Failed(e),
            Some(Ok(text)) => {
                raw.push_str(&text);
                if tx.send(IntakeEvent::Chunk(text)).await.is_err() {
                    return StreamEnd::Cancelled;
                }
            }
        }
    }
}

/// `MODEL_INVOKED -> PARSED | DEGRADED`
fn interpret(
    report: &IncidentReport,
    raw: &str,
    started: Instant,
) -> (StructuredResponse, Disposition) {
    let outcome = ResponseParser::parse_outcome(raw);
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if outcome.degraded {
        warn!(
            state = "DEGRADED",
            category = %report.category,
            agent = %report.agent_identifier,
            raw_len = raw.len(),
            elapsed_ms,
            "No structured object in model output, keeping raw text"
        );
        if let Some(m) = global_metrics() {
            m.record_parse_degraded();
        }
        (outcome.response, Disposition::Degraded)
    } else {
        debug!(
            state = "PARSED",
            category = %report.category,
            severity = %outcome.response.severity,
            elapsed_ms,
            "Model output parsed"
        );
        (outcome.response, Disposition::Parsed)
    }
}

/// `MODEL_INVOKED -> MODEL_FAILED`
fn model_failed(
    report: &IncidentReport,
    partial: String,
    err: &ModelError,
    started: Instant,
) -> (String, StructuredResponse, Disposition) {
    warn!(
        state = "MODEL_FAILED",
        category = %report.category,
        agent = %report.agent_identifier,
        error = %err,
        timeout = err.is_timeout(),
        partial_len = partial.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Model call failed, recording degraded response"
    );
    (
        partial,
        StructuredResponse::model_failure(err),
        Disposition::ModelFailed,
    )
}

/// `-> PERSISTED`. A store failure is the only hard error after acceptance.
async fn persist(
    ctx: &IntakeContext,
    report: &IncidentReport,
    raw: String,
    response: StructuredResponse,
    disposition: Disposition,
) -> ApiResult<IntakeOutcome> {
    let new = NewIncidentRecord::from_report(report, raw, response, disposition);
    let started = Instant::now();
    let result = ctx.store.append(new.clone()).await;
    if let Some(m) = global_metrics() {
        m.record_store_operation("append", result.is_ok(), started.elapsed().as_secs_f64());
    }

    match result {
        Ok(id) => {
            info!(
                state = "PERSISTED",
                incident_id = id,
                category = %report.category,
                agent = %report.agent_identifier,
                %disposition,
                "Incident recorded"
            );
            if let Some(m) = global_metrics() {
                m.record_intake(disposition.as_str());
            }
            Ok(IntakeOutcome {
                record: new.with_id(id),
                disposition,
            })
        }
        Err(e) => {
            error!(
                category = %report.category,
                agent = %report.agent_identifier,
                %disposition,
                error = %e,
                "Failed to persist incident"
            );
            if let Some(m) = global_metrics() {
                m.record_intake("storage_failed");
            }
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use copilot_core::Severity;
    use copilot_storage::InMemoryIncidentStore;
    use copilot_test_utils::fixtures::{self, PARSEABLE_OUTPUT, PROSE_OUTPUT};
    use copilot_test_utils::{FailingStore, ScriptedGateway};
    use std::time::Duration;

    fn service_with(
        gateway: Arc<ScriptedGateway>,
        store: Arc<dyn IncidentStore>,
        categories: CategorySet,
    ) -> IntakeService {
        IntakeService::new(IntakeContext {
            categories: Arc::new(categories),
            prompts: PromptBuilder::new(),
            gateway,
            store,
            config: IntakeConfig {
                model_timeout: Duration::from_secs(5),
                ..IntakeConfig::default()
            },
        })
    }

    fn setup(
        gateway: ScriptedGateway,
    ) -> (IntakeService, Arc<ScriptedGateway>, Arc<InMemoryIncidentStore>) {
        let gateway = Arc::new(gateway);
        let store = Arc::new(InMemoryIncidentStore::new());
        let service = service_with(
            gateway.clone(),
            store.clone(),
            fixtures::standard_categories(),
        );
        (service, gateway, store)
    }

    async fn drain(mut rx: mpsc::Receiver<IntakeEvent>) -> (Vec<String>, Option<IntakeEvent>) {
        let mut chunks = Vec::new();
        let mut terminal = None;
        while let Some(event) = rx.recv().await {
            match event {
                IntakeEvent::Chunk(text) => chunks.push(text),
                other => terminal = Some(other),
            }
        }
        (chunks, terminal)
    }

    #[tokio::test]
    async fn test_parsed_submission_is_recorded() -> ApiResult<()> {
        let (service, gateway, store) = setup(ScriptedGateway::text(PARSEABLE_OUTPUT));
        let outcome = service.submit(fixtures::report("database_down")).await?;

        assert_eq!(outcome.disposition, Disposition::Parsed);
        assert_eq!(outcome.record.structured_response.severity, Severity::High);
        assert_eq!(outcome.record.raw_model_text, PARSEABLE_OUTPUT);
        assert_eq!(outcome.record.id, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(gateway.calls(), 1);
        assert!(gateway.prompts()[0].contains("connection refused on 5432"));
        Ok(())
    }

    #[tokio::test]
    async fn test_degraded_submission_keeps_raw_text() -> ApiResult<()> {
        let (service, _, store) = setup(ScriptedGateway::text(PROSE_OUTPUT));
        let outcome = service.submit(fixtures::report("high_cpu")).await?;

        assert_eq!(outcome.disposition, Disposition::Degraded);
        assert_eq!(outcome.record.structured_response.notes, PROSE_OUTPUT);
        assert_eq!(
            outcome.record.structured_response.recommended_action,
            copilot_core::FALLBACK_ACTION
        );
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_category_rejected_without_side_effects() {
        let gateway = Arc::new(ScriptedGateway::text(PARSEABLE_OUTPUT));
        let store = Arc::new(InMemoryIncidentStore::new());
        let service = service_with(gateway.clone(), store.clone(), fixtures::database_down_only());

        let err = service
            .submit(fixtures::report("not_a_real_category"))
            .await
            .expect_err("category is not configured");

        assert_eq!(err.code, ErrorCode::UnknownCategory);
        assert_eq!(
            err.details,
            Some(serde_json::json!({ "valid_categories": ["database_down"] }))
        );
        assert_eq!(store.len(), 0);
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_model_failure_still_records() -> ApiResult<()> {
        let (service, _, store) = setup(ScriptedGateway::unavailable());
        for _ in 0..3 {
            let outcome = service.submit(fixtures::report("database_down")).await?;
            assert_eq!(outcome.disposition, Disposition::ModelFailed);
            let response = &outcome.record.structured_response;
            assert_eq!(response.severity, Severity::Unknown);
            assert!(response.notes.contains("Model backend failed"));
            assert!(response.investigation_steps.is_empty());
        }
        assert_eq!(store.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_model_timeout_still_records() -> ApiResult<()> {
        let (service, _, store) = setup(ScriptedGateway::timing_out());
        let outcome = service.submit(fixtures::report("disk_full")).await?;
        assert_eq!(outcome.disposition, Disposition::ModelFailed);
        assert!(outcome.record.structured_response.notes.contains("timed out"));
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_storage_failure_is_hard_error() {
        let gateway = Arc::new(ScriptedGateway::text(PARSEABLE_OUTPUT));
        let store = Arc::new(FailingStore::new());
        let service = service_with(gateway, store.clone(), fixtures::standard_categories());

        let err = service
            .submit(fixtures::report("database_down"))
            .await
            .expect_err("store refuses writes");
        assert_eq!(err.code, ErrorCode::StorageUnavailable);
        assert_eq!(store.attempts(), 1);
    }

    #[tokio::test]
    async fn test_empty_agent_becomes_unknown() -> ApiResult<()> {
        let (service, _, _) = setup(ScriptedGateway::text(PARSEABLE_OUTPUT));
        let report = IncidentReport::new("database_down", "  ", "");
        let outcome = service.submit(report).await?;
        assert_eq!(outcome.record.agent_identifier, UNKNOWN_AGENT);
        Ok(())
    }

    #[tokio::test]
    async fn test_streaming_forwards_chunks_then_record() -> ApiResult<()> {
        let (service, _, store) = setup(ScriptedGateway::chunks([
            "Here you go: {\"severity\":",
            "\"critical\",\"fixes\":[\"failover\"]}",
        ]));
        let rx = service.submit_streaming(fixtures::report("database_down"))?;
        let (chunks, terminal) = drain(rx).await;

        assert_eq!(chunks.len(), 2);
        let Some(IntakeEvent::Recorded(outcome)) = terminal else {
            panic!("expected a record event, got {:?}", terminal);
        };
        assert_eq!(outcome.disposition, Disposition::Parsed);
        assert_eq!(outcome.record.raw_model_text, chunks.concat());
        assert_eq!(outcome.record.structured_response.severity, Severity::Critical);
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_streaming_mid_stream_failure_records_partial() -> ApiResult<()> {
        let gateway = ScriptedGateway::new(copilot_test_utils::Script::ChunksThenFail(
            vec!["partial ".to_string(), "answer".to_string()],
            ModelError::Timeout { after_ms: 5000 },
        ));
        let (service, _, store) = setup(gateway);
        let rx = service.submit_streaming(fixtures::report("high_cpu"))?;
        let (chunks, terminal) = drain(rx).await;

        assert_eq!(chunks, vec!["partial ", "answer"]);
        let Some(IntakeEvent::Recorded(outcome)) = terminal else {
            panic!("expected a record event, got {:?}", terminal);
        };
        assert_eq!(outcome.disposition, Disposition::ModelFailed);
        assert_eq!(outcome.record.raw_model_text, "partial answer");
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_streaming_unknown_category_rejected_up_front() {
        let (service, gateway, store) = setup(ScriptedGateway::text(PARSEABLE_OUTPUT));
        let err = service
            .submit_streaming(fixtures::report("nope"))
            .expect_err("category is not configured");
        assert_eq!(err.code, ErrorCode::UnknownCategory);
        assert_eq!(gateway.calls(), 0);
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_streaming_cancellation_persists_cancelled_record() -> ApiResult<()> {
        let (service, _, store) = setup(ScriptedGateway::slow(
            ["first ", "second ", "third"],
            Duration::from_millis(50),
        ));
        let mut rx = service.submit_streaming(fixtures::report("database_down"))?;
        match rx.recv().await {
            Some(IntakeEvent::Chunk(text)) => assert_eq!(text, "first "),
            other => panic!("expected the first chunk, got {:?}", other),
        }
        drop(rx);

        let mut waited = Duration::ZERO;
        while store.is_empty() && waited < Duration::from_secs(2) {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += Duration::from_millis(10);
        }

        let records = store.list_recent(10).await?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].disposition, Disposition::Cancelled);
        assert!(records[0].raw_model_text.starts_with("first "));
        assert!(records[0].structured_response.notes.contains("first "));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_while_stream_opens_persists_empty_record() -> ApiResult<()> {
        let (service, gateway, store) =
            setup(ScriptedGateway::chunks(["late"]).with_open_delay(Duration::from_secs(2)));
        let started = tokio::time::Instant::now();
        let rx = service.submit_streaming(fixtures::report("database_down"))?;
        while gateway.calls() == 0 {
            tokio::task::yield_now().await;
        }
        drop(rx);

        while store.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(started.elapsed() < Duration::from_secs(2));

        let records = store.list_recent(10).await?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].disposition, Disposition::Cancelled);
        assert!(records[0].raw_model_text.is_empty());
        assert!(records[0]
            .structured_response
            .notes
            .starts_with("Request cancelled before the model finished"));
        assert_eq!(gateway.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_submissions_each_recorded() -> ApiResult<()> {
        let (service, _, store) = setup(ScriptedGateway::text(PARSEABLE_OUTPUT));
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.submit(fixtures::report("database_down")).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            let outcome = handle
                .await
                .map_err(|e| ApiError::internal_error(e.to_string()))??;
            ids.push(outcome.record.id);
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=10).collect::<Vec<u64>>());
        assert_eq!(store.len(), 10);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_recent_limit_bounds() -> ApiResult<()> {
        let (service, _, _) = setup(ScriptedGateway::text(PARSEABLE_OUTPUT));
        for category in ["database_down", "high_cpu", "disk_full"] {
            service.submit(fixtures::report(category)).await?;
        }

        let recent = service.list_recent(Some(2)).await?;
        let categories: Vec<&str> = recent.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(categories, vec!["disk_full", "high_cpu"]);
        assert_eq!(service.list_recent(None).await?.len(), 3);

        let err = service.list_recent(Some(0)).await.expect_err("zero limit");
        assert_eq!(err.code, ErrorCode::InvalidRange);
        let err = service.list_recent(Some(501)).await.expect_err("over max");
        assert_eq!(err.code, ErrorCode::InvalidRange);
        Ok(())
    }

    #[tokio::test]
    async fn test_shutdown_flushes() -> ApiResult<()> {
        let (service, _, _) = setup(ScriptedGateway::text(PARSEABLE_OUTPUT));
        service.shutdown().await
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_running_pipelines() -> ApiResult<()> {
        let (service, gateway, store) = setup(ScriptedGateway::slow(
            ["first ", "second"],
            Duration::from_millis(200),
        ));
        let rx = service.submit_streaming(fixtures::report("database_down"))?;
        let blocking = {
            let service = service.clone();
            tokio::spawn(async move { service.submit(fixtures::report("high_cpu")).await })
        };
        while gateway.calls() < 2 {
            tokio::task::yield_now().await;
        }

        service.shutdown().await?;
        assert_eq!(store.len(), 2);

        let (chunks, terminal) = drain(rx).await;
        assert_eq!(chunks.concat(), "first second");
        assert!(matches!(terminal, Some(IntakeEvent::Recorded(_))));
        let outcome = blocking
            .await
            .map_err(|e| ApiError::internal_error(e.to_string()))??;
        assert_eq!(outcome.record.category, "high_cpu");
        Ok(())
    }

    #[tokio::test]
    async fn test_submissions_refused_after_shutdown() -> ApiResult<()> {
        let (service, gateway, store) = setup(ScriptedGateway::text(PARSEABLE_OUTPUT));
        service.shutdown().await?;

        let err = service
            .submit(fixtures::report("database_down"))
            .await
            .expect_err("intake is closed");
        assert_eq!(err.code, ErrorCode::ServiceUnavailable);
        let err = service
            .submit_streaming(fixtures::report("database_down"))
            .expect_err("intake is closed");
        assert_eq!(err.code, ErrorCode::ServiceUnavailable);

        assert_eq!(gateway.calls(), 0);
        assert_eq!(store.len(), 0);
        service.shutdown().await
    }
}
