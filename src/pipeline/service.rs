//! Orchestrator running one trigger event through extraction, enrichment, and persistence.

use crate::{
    config::Config,
    extraction::ExtractionPort,
    metrics::{MetricsSnapshot, PipelineMetrics},
    pipeline::{
        source::{compose_source_url, content_hash, content_type_for},
        types::{IngestionEvent, IngestionOutcome, PipelineError, validate_event},
    },
    retry::RetryPolicy,
    semantic::SemanticPort,
    storage::{DocumentStore, NewDocument},
    text::{flatten_paragraphs, truncate_chars},
};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Tunables for [`IngestionPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Base URL that source names are appended to.
    pub source_base_url: String,
    /// Character cap applied to text before semantic analysis.
    pub semantic_input_char_limit: usize,
    /// Largest accepted document in bytes.
    pub max_document_bytes: usize,
    /// Policy used when the store reports a transient failure.
    pub persistence_retry: RetryPolicy,
}

impl PipelineSettings {
    /// Derive pipeline settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_base_url: config.source_base_url.clone(),
            semantic_input_char_limit: config.semantic_input_char_limit,
            max_document_bytes: config.max_document_bytes,
            persistence_retry: config.retry_policy(),
        }
    }
}

/// Runs the ingestion pipeline for each delivered file.
///
/// The ports are built once at startup and shared by every run; the pipeline holds no
/// per-document state, so concurrent runs are independent. Extraction failures abort the run
/// before anything is written, semantic failures are stored as a degraded insight, and
/// persistence failures surface to the caller.
pub struct IngestionPipeline {
    extractor: Box<dyn ExtractionPort>,
    analyzer: Box<dyn SemanticPort>,
    store: Box<dyn DocumentStore>,
    settings: PipelineSettings,
    metrics: Arc<PipelineMetrics>,
}

/// Abstraction over the pipeline used by trigger surfaces.
#[async_trait]
pub trait IngestionApi: Send + Sync {
    /// Process one event and describe the stored document.
    async fn ingest(&self, event: IngestionEvent) -> Result<IngestionOutcome, PipelineError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl IngestionPipeline {
    /// Assemble a pipeline from already-constructed ports.
    pub fn new(
        extractor: Box<dyn ExtractionPort>,
        analyzer: Box<dyn SemanticPort>,
        store: Box<dyn DocumentStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            extractor,
            analyzer,
            store,
            settings,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Process one event and return the identifier of the stored document.
    pub async fn process(&self, event: IngestionEvent) -> Result<Uuid, PipelineError> {
        self.ingest_document(event).await.map(|outcome| outcome.id)
    }

    /// Process one event and return the full outcome.
    pub async fn ingest_document(
        &self,
        event: IngestionEvent,
    ) -> Result<IngestionOutcome, PipelineError> {
        let result = self.run(event).await;
        if let Err(error) = &result {
            self.metrics.record_failure();
            tracing::error!(
                stage = %error.stage(),
                retryable = error.is_retryable(),
                error = %error,
                "Ingestion failed"
            );
        }
        result
    }

    async fn run(&self, event: IngestionEvent) -> Result<IngestionOutcome, PipelineError> {
        validate_event(&event, self.settings.max_document_bytes)?;
        let IngestionEvent {
            source_name,
            raw_bytes,
            ..
        } = event;

        let content_type = content_type_for(&source_name);
        let content_hash = content_hash(&raw_bytes);
        tracing::info!(
            source = %source_name,
            bytes = raw_bytes.len(),
            content_type,
            "Processing document"
        );

        let extraction = self
            .extractor
            .extract(raw_bytes, content_type)
            .await
            .map_err(PipelineError::Extraction)?;
        let page_count = extraction.pages.len();
        let paragraph_count = extraction.paragraphs.len();
        tracing::info!(
            source = %source_name,
            pages = page_count,
            paragraphs = paragraph_count,
            tables = extraction.tables.len(),
            "Layout extracted"
        );

        let text = flatten_paragraphs(&extraction.paragraphs);
        let bounded = truncate_chars(&text, self.settings.semantic_input_char_limit);
        if bounded.len() < text.len() {
            tracing::debug!(
                source = %source_name,
                limit = self.settings.semantic_input_char_limit,
                "Truncated text before semantic analysis"
            );
        }
        let insight = self.analyzer.analyze(bounded).await;
        let insight_degraded = insight.is_degraded();
        match insight.insight() {
            Some(found) => tracing::info!(
                source = %source_name,
                document_type = %found.document_type,
                entities = found.key_entities.len(),
                "Semantic analysis complete"
            ),
            None => tracing::warn!(
                source = %source_name,
                "Persisting degraded insight"
            ),
        }

        let source_url = compose_source_url(&self.settings.source_base_url, &source_name);
        let document = NewDocument {
            filename: source_name,
            source_url,
            content_hash,
            extraction: extraction.raw,
            insight: insight.to_payload(),
        };

        let id = self
            .settings
            .persistence_retry
            .run("persistence", || self.store.save(&document))
            .await
            .map_err(PipelineError::Persistence)?;

        self.metrics
            .record_document(page_count as u64, insight_degraded);
        tracing::info!(
            %id,
            source = %document.filename,
            source_url = %document.source_url,
            insight_degraded,
            "Document persisted"
        );

        let NewDocument {
            filename,
            source_url,
            ..
        } = document;
        Ok(IngestionOutcome {
            id,
            filename,
            source_url,
            page_count,
            paragraph_count,
            insight_degraded,
        })
    }

    /// Snapshot of pipeline counters.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl IngestionApi for IngestionPipeline {
    async fn ingest(&self, event: IngestionEvent) -> Result<IngestionOutcome, PipelineError> {
        self.ingest_document(event).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        IngestionPipeline::metrics_snapshot(self)
    }
}
