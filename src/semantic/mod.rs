//! Semantic enrichment port and its chat-completions adapter.
//!
//! Providers implement the fallible [`SemanticPort::summarize`]; the pipeline only ever calls
//! [`SemanticPort::analyze`], which folds every failure into a degraded [`InsightResult`] so an
//! enrichment problem can never abort a run.

pub mod client;
mod prompt;
pub mod types;

use async_trait::async_trait;

pub use client::{OpenAiSemanticClient, SemanticSettings};
pub use types::{Insight, InsightResult, SEMANTIC_FAILURE, SemanticError};

/// Interface implemented by semantic analysis providers.
#[async_trait]
pub trait SemanticPort: Send + Sync {
    /// Produce a structured insight for the supplied text.
    async fn summarize(&self, text: &str) -> Result<Insight, SemanticError>;

    /// Infallible boundary used by the pipeline.
    async fn analyze(&self, text: &str) -> InsightResult {
        match self.summarize(text).await {
            Ok(insight) => InsightResult::Analyzed(insight),
            Err(error) => {
                tracing::error!(error = %error, "Semantic analysis failed");
                InsightResult::degraded(error)
            }
        }
    }
}
