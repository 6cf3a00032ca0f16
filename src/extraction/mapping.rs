//! Conversion from the layout service's `analyzeResult` into [`ExtractionResult`].
//!
//! All knowledge of the vendor's field names lives here; the rest of the crate only sees the
//! neutral document model.

use super::types::{ExtractionError, ExtractionResult, Page, Paragraph, Table, TableCell};
use serde::Deserialize;
use serde::de::IgnoredAny;
use serde_json::Value;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResult {
    #[serde(default)]
    pages: Vec<RawPage>,
    #[serde(default)]
    paragraphs: Vec<RawParagraph>,
    #[serde(default)]
    tables: Vec<RawTable>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPage {
    page_number: u32,
    #[serde(default)]
    width: Option<f64>,
    #[serde(default)]
    height: Option<f64>,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    lines: Vec<IgnoredAny>,
    #[serde(default)]
    words: Vec<IgnoredAny>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawParagraph {
    content: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    bounding_regions: Vec<RawBoundingRegion>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBoundingRegion {
    page_number: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTable {
    row_count: u32,
    column_count: u32,
    #[serde(default)]
    cells: Vec<RawCell>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCell {
    row_index: u32,
    column_index: u32,
    #[serde(default)]
    content: String,
    #[serde(default)]
    kind: Option<String>,
}

/// Map a raw `analyzeResult` object into the neutral model, keeping the payload for storage.
pub(crate) fn map_analyze_result(raw: Value) -> Result<ExtractionResult, ExtractionError> {
    if !raw.is_object() {
        return Err(ExtractionError::InvalidResponse(
            "analyzeResult is not a JSON object".into(),
        ));
    }

    let parsed = AnalyzeResult::deserialize(&raw).map_err(|error| {
        ExtractionError::InvalidResponse(format!("failed to decode analyzeResult: {error}"))
    })?;

    let pages = parsed
        .pages
        .into_iter()
        .map(|page| Page {
            page_number: page.page_number,
            width: page.width,
            height: page.height,
            unit: page.unit,
            line_count: page.lines.len(),
            word_count: page.words.len(),
        })
        .collect();

    let paragraphs = parsed
        .paragraphs
        .into_iter()
        .enumerate()
        .map(|(order, paragraph)| Paragraph {
            content: paragraph.content,
            order,
            role: paragraph.role,
            page_number: paragraph
                .bounding_regions
                .first()
                .map(|region| region.page_number),
        })
        .collect();

    let tables = parsed
        .tables
        .into_iter()
        .map(|table| Table {
            row_count: table.row_count,
            column_count: table.column_count,
            cells: table
                .cells
                .into_iter()
                .map(|cell| TableCell {
                    row_index: cell.row_index,
                    column_index: cell.column_index,
                    content: cell.content,
                    kind: cell.kind,
                })
                .collect(),
        })
        .collect();

    Ok(ExtractionResult {
        pages,
        paragraphs,
        tables,
        raw,
    })
}
