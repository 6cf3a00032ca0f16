//! Events, outcomes, and errors of the ingestion pipeline.

use crate::extraction::ExtractionError;
use crate::retry::Transient;
use crate::storage::PersistenceError;
use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// A newly landed file, as delivered by the storage trigger.
#[derive(Debug, Clone)]
pub struct IngestionEvent {
    /// Blob name or path of the file.
    pub source_name: String,
    /// File contents.
    pub raw_bytes: Bytes,
    /// Size announced by the trigger.
    pub size_bytes: usize,
}

impl IngestionEvent {
    /// Event whose declared size is the length of `raw_bytes`.
    pub fn new(source_name: impl Into<String>, raw_bytes: impl Into<Bytes>) -> Self {
        let raw_bytes = raw_bytes.into();
        Self {
            source_name: source_name.into(),
            size_bytes: raw_bytes.len(),
            raw_bytes,
        }
    }

    /// Override the size announced by the trigger.
    pub fn with_declared_size(mut self, size_bytes: usize) -> Self {
        self.size_bytes = size_bytes;
        self
    }
}

/// Reasons a trigger event is rejected before any remote call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The event carried no file name.
    #[error("source name is empty")]
    EmptySourceName,
    /// The event carried no bytes.
    #[error("document is empty")]
    EmptyDocument,
    /// Received byte count differs from the announced size.
    #[error("declared size of {declared} bytes does not match the {actual} bytes received")]
    SizeMismatch {
        /// Size announced by the trigger.
        declared: usize,
        /// Bytes actually received.
        actual: usize,
    },
    /// The document exceeds the configured limit.
    #[error("document of {size} bytes exceeds the {limit} byte limit")]
    TooLarge {
        /// Bytes received.
        size: usize,
        /// Configured maximum.
        limit: usize,
    },
}

/// Pipeline stage that produced a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Trigger input checks.
    Validation,
    /// Layout extraction.
    Extraction,
    /// Document persistence.
    Persistence,
}

impl Stage {
    /// Lowercase stage label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Extraction => "extraction",
            Self::Persistence => "persistence",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal pipeline failure tagged with the stage that produced it.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Trigger input was malformed.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    /// Layout extraction failed permanently or exhausted its retries; nothing was persisted.
    #[error("extraction stage failed: {0}")]
    Extraction(#[source] ExtractionError),
    /// The document could not be written.
    #[error("persistence stage failed: {0}")]
    Persistence(#[source] PersistenceError),
}

impl PipelineError {
    /// Stage at which the run stopped.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Validation(_) => Stage::Validation,
            Self::Extraction(_) => Stage::Extraction,
            Self::Persistence(_) => Stage::Persistence,
        }
    }

    /// Whether re-delivering the same event may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::Extraction(error) => error.is_transient(),
            Self::Persistence(error) => error.is_transient(),
        }
    }
}

/// Result of a completed pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionOutcome {
    /// Identifier of the stored document.
    pub id: Uuid,
    /// Name of the ingested file.
    pub filename: String,
    /// Source URL recorded with the document.
    pub source_url: String,
    /// Pages reported by extraction.
    pub page_count: usize,
    /// Paragraphs reported by extraction.
    pub paragraph_count: usize,
    /// Whether the stored insight is an error placeholder.
    pub insight_degraded: bool,
}

/// Check an event before spending any remote calls on it.
pub(crate) fn validate_event(
    event: &IngestionEvent,
    max_document_bytes: usize,
) -> Result<(), ValidationError> {
    if event.source_name.trim().is_empty() {
        return Err(ValidationError::EmptySourceName);
    }
    let actual = event.raw_bytes.len();
    if actual == 0 {
        return Err(ValidationError::EmptyDocument);
    }
    if event.size_bytes != actual {
        return Err(ValidationError::SizeMismatch {
            declared: event.size_bytes,
            actual,
        });
    }
    if actual > max_document_bytes {
        return Err(ValidationError::TooLarge {
            size: actual,
            limit: max_document_bytes,
        });
    }
    Ok(())
}
