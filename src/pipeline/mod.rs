//! Ingestion pipeline: validation, layout extraction, semantic enrichment, persistence.

pub mod service;
pub mod source;
pub mod types;

pub use service::{IngestionApi, IngestionPipeline, PipelineSettings};
pub use types::{IngestionEvent, IngestionOutcome, PipelineError, Stage, ValidationError};
