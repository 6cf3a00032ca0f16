//! Records and errors for the document store.

use crate::retry::Transient;
use deadpool_postgres::PoolError;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Errors returned while persisting documents.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Connection string or pool settings are unusable.
    #[error("Invalid document store configuration: {0}")]
    Configuration(String),
    /// No pooled connection could be obtained.
    #[error("Failed to obtain a document store connection: {0}")]
    Pool(#[from] PoolError),
    /// Statement failed for a reason other than a constraint violation.
    #[error("Document store query failed: {0}")]
    Query(#[from] tokio_postgres::Error),
    /// Store refused the row (integrity constraint violated).
    #[error("Document store rejected the record: {0}")]
    Constraint(String),
    /// Call did not complete within the configured timeout.
    #[error("Document store call timed out after {0:?}")]
    Timeout(Duration),
}

impl Transient for PersistenceError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            // Backend errors without a SQLSTATE come from the socket or the handshake.
            Self::Pool(PoolError::Backend(error)) => {
                error.code().is_none() || is_transient_postgres(error)
            }
            Self::Pool(PoolError::Timeout(_)) => true,
            Self::Pool(_) => false,
            Self::Query(error) => is_transient_postgres(error),
            Self::Configuration(_) | Self::Constraint(_) => false,
        }
    }
}

fn is_transient_postgres(error: &tokio_postgres::Error) -> bool {
    if error.is_closed() {
        return true;
    }
    error.code().is_some_and(|state| {
        let code = state.code();
        code.starts_with("08") || code == "40001" || code == "40P01" || code == "57P01"
    })
}

/// Everything needed to write one document row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewDocument {
    /// Name of the ingested file as delivered by the trigger.
    pub filename: String,
    /// Deterministic URL of the source blob.
    pub source_url: String,
    /// Hex-encoded SHA-256 of the raw bytes.
    pub content_hash: String,
    /// Extraction payload stored verbatim.
    pub extraction: Value,
    /// Insight payload (analyzed or degraded).
    pub insight: Value,
}

/// Persisted document row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRecord {
    /// Identifier assigned on first insert.
    pub id: Uuid,
    /// Name of the ingested file.
    pub filename: String,
    /// Deterministic URL of the source blob.
    pub source_url: String,
    /// Hex-encoded SHA-256 of the raw bytes.
    pub content_hash: String,
    /// Extraction payload.
    pub extraction: Value,
    /// Insight payload.
    pub insight: Value,
    /// Time the row was first written.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
