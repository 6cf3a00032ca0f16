use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity.
#[derive(Default)]
pub struct PipelineMetrics {
    documents_persisted: AtomicU64,
    degraded_insights: AtomicU64,
    failed_runs: AtomicU64,
    pages_extracted: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a persisted document, its page count, and whether its insight was degraded.
    pub fn record_document(&self, page_count: u64, insight_degraded: bool) {
        self.documents_persisted.fetch_add(1, Ordering::Relaxed);
        self.pages_extracted.fetch_add(page_count, Ordering::Relaxed);
        if insight_degraded {
            self.degraded_insights.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a run that ended without a persisted document.
    pub fn record_failure(&self) {
        self.failed_runs.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_persisted: self.documents_persisted.load(Ordering::Relaxed),
            degraded_insights: self.degraded_insights.load(Ordering::Relaxed),
            failed_runs: self.failed_runs.load(Ordering::Relaxed),
            pages_extracted: self.pages_extracted.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents written to the store since startup.
    pub documents_persisted: u64,
    /// Persisted documents whose insight is an error placeholder.
    pub degraded_insights: u64,
    /// Runs that failed validation, extraction, or persistence.
    pub failed_runs: u64,
    /// Total pages across persisted documents.
    pub pages_extracted: u64,
}
