//! Language-neutral document model produced by layout extraction.

use crate::retry::Transient;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors returned while extracting document layout.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Endpoint or credentials are missing or malformed.
    #[error("Invalid extraction configuration: {0}")]
    Configuration(String),
    /// HTTP layer failed before receiving a response.
    #[error("Extraction request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Service responded with an unexpected status code.
    #[error("Unexpected extraction response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the service.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Analysis did not finish within the allotted time.
    #[error("Layout analysis did not complete within {0:?}")]
    Timeout(Duration),
    /// Service accepted the document but reported the analysis as failed.
    #[error("Layout analysis failed: {code}: {message}")]
    AnalysisFailed {
        /// Service error code.
        code: String,
        /// Human readable message from the service.
        message: String,
    },
    /// Response could not be decoded into the document model.
    #[error("Malformed extraction response: {0}")]
    InvalidResponse(String),
}

impl Transient for ExtractionError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Http(error) => error.is_timeout() || error.is_connect() || error.is_body(),
            Self::UnexpectedStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS
                    || *status == StatusCode::REQUEST_TIMEOUT
                    || status.is_server_error()
            }
            Self::Timeout(_) => true,
            Self::AnalysisFailed { code, .. } => {
                code.eq_ignore_ascii_case("InternalServerError")
                    || code.eq_ignore_ascii_case("ServiceUnavailable")
            }
            Self::Configuration(_) | Self::InvalidResponse(_) => false,
        }
    }
}

/// Structured output of a layout analysis.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// Pages in document order.
    pub pages: Vec<Page>,
    /// Paragraphs in the order reported by the service.
    pub paragraphs: Vec<Paragraph>,
    /// Tables detected across the document.
    pub tables: Vec<Table>,
    /// Untouched service payload, persisted verbatim.
    pub raw: Value,
}

impl ExtractionResult {
    /// An extraction with no content; `raw` is an empty object.
    pub fn empty() -> Self {
        Self {
            pages: Vec::new(),
            paragraphs: Vec::new(),
            tables: Vec::new(),
            raw: Value::Object(Default::default()),
        }
    }
}

/// Single page of an analyzed document.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 1-based page number.
    pub page_number: u32,
    /// Page width in `unit`.
    pub width: Option<f64>,
    /// Page height in `unit`.
    pub height: Option<f64>,
    /// Measurement unit (`pixel`, `inch`).
    pub unit: Option<String>,
    /// Number of text lines detected on the page.
    pub line_count: usize,
    /// Number of words detected on the page.
    pub word_count: usize,
}

/// Block of text recognized as a paragraph.
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    /// Paragraph text.
    pub content: String,
    /// Zero-based position in the service's reading order.
    pub order: usize,
    /// Semantic role (`title`, `sectionHeading`, `pageHeader`, ...), when reported.
    pub role: Option<String>,
    /// Page the paragraph starts on, when reported.
    pub page_number: Option<u32>,
}

/// Table detected in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Number of rows.
    pub row_count: u32,
    /// Number of columns.
    pub column_count: u32,
    /// Cells in service order.
    pub cells: Vec<TableCell>,
}

/// Individual table cell.
#[derive(Debug, Clone, PartialEq)]
pub struct TableCell {
    /// Zero-based row index.
    pub row_index: u32,
    /// Zero-based column index.
    pub column_index: u32,
    /// Cell text.
    pub content: String,
    /// Cell kind (`content`, `columnHeader`, ...), when reported.
    pub kind: Option<String>,
}
