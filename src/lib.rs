#![deny(missing_docs)]

//! Event-driven document ingestion: layout extraction, semantic enrichment, and persistence.

/// HTTP trigger routes.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Layout extraction port and adapter.
pub mod extraction;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline counters.
pub mod metrics;
/// Ingestion orchestrator.
pub mod pipeline;
/// Backoff policy for transient failures.
pub mod retry;
/// Semantic analysis port and adapter.
pub mod semantic;
/// Document persistence port and adapter.
pub mod storage;
/// Text flattening and truncation.
pub mod text;
