//! Layout extraction port and its document-intelligence adapter.

pub mod client;
mod mapping;
pub mod types;

use async_trait::async_trait;
use bytes::Bytes;

pub use client::{DocumentIntelligenceClient, ExtractionSettings};
pub use types::{ExtractionError, ExtractionResult, Page, Paragraph, Table, TableCell};

/// Interface implemented by layout extraction backends.
///
/// Implementations retry transient failures themselves; an `Err` reaching the caller means the
/// retry budget is exhausted or the failure is permanent.
#[async_trait]
pub trait ExtractionPort: Send + Sync {
    /// Analyze raw document bytes tagged with their content type.
    async fn extract(
        &self,
        document: Bytes,
        content_type: &str,
    ) -> Result<ExtractionResult, ExtractionError>;
}
