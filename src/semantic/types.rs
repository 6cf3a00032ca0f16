//! Insight model returned by semantic analysis.

use crate::retry::Transient;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt::Display;
use thiserror::Error;

/// Error label stored in place of an insight when analysis could not be completed.
pub const SEMANTIC_FAILURE: &str = "Semantic analysis failed";

/// Errors surfaced by semantic analysis providers.
#[derive(Debug, Error)]
pub enum SemanticError {
    /// Endpoint, key, or deployment missing or malformed.
    #[error("Invalid semantic analysis configuration: {0}")]
    Configuration(String),
    /// HTTP layer failed before receiving a response.
    #[error("Semantic analysis request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider returned an error response.
    #[error("Unexpected semantic analysis response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Provider answered without any message content.
    #[error("Semantic analysis returned no content")]
    EmptyResponse,
    /// Provider content did not satisfy the structured output contract.
    #[error("Malformed semantic analysis output: {0}")]
    InvalidResponse(String),
}

impl Transient for SemanticError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Http(error) => error.is_timeout() || error.is_connect() || error.is_body(),
            Self::UnexpectedStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS
                    || *status == StatusCode::REQUEST_TIMEOUT
                    || status.is_server_error()
            }
            Self::Configuration(_) | Self::EmptyResponse | Self::InvalidResponse(_) => false,
        }
    }
}

/// Structured insight produced by the language model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Insight {
    /// Short summary of the document.
    pub summary: String,
    /// Classification such as `Invoice`, `Contract`, or `Memo`.
    #[serde(alias = "document_type")]
    pub document_type: String,
    /// Companies, people, or products named in the document.
    #[serde(alias = "key_entities")]
    pub key_entities: Vec<String>,
    /// Next steps or deadlines mentioned in the document.
    #[serde(alias = "action_items")]
    pub action_items: Vec<String>,
}

/// Outcome of the semantic stage: either a full insight or an error-only placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum InsightResult {
    /// Analysis completed and satisfied the output contract.
    Analyzed(Insight),
    /// Analysis failed; none of the insight fields are available.
    Degraded {
        /// Always [`SEMANTIC_FAILURE`].
        error: String,
        /// Description of the underlying failure.
        details: String,
    },
}

impl InsightResult {
    /// Build the degraded placeholder for a failed analysis.
    pub fn degraded(cause: impl Display) -> Self {
        Self::Degraded {
            error: SEMANTIC_FAILURE.to_string(),
            details: cause.to_string(),
        }
    }

    /// Whether the insight is an error placeholder.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// The successful insight, if any.
    pub fn insight(&self) -> Option<&Insight> {
        match self {
            Self::Analyzed(insight) => Some(insight),
            Self::Degraded { .. } => None,
        }
    }

    /// JSON payload persisted with the document record.
    pub fn to_payload(&self) -> Value {
        match self {
            Self::Analyzed(insight) => json!({
                "summary": insight.summary,
                "documentType": insight.document_type,
                "keyEntities": insight.key_entities,
                "actionItems": insight.action_items,
            }),
            Self::Degraded { error, details } => json!({
                "error": error,
                "details": details,
            }),
        }
    }
}
