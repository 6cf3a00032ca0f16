//! Provenance helpers: source URLs, content types, and content hashes.

use sha2::{Digest, Sha256};

/// Content type used when the file extension is unknown.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Compose the deterministic source URL recorded for a document.
///
/// The base is injected configuration; exactly one `/` separates it from the source name.
pub fn compose_source_url(base_url: &str, source_name: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        source_name.trim_start_matches('/')
    )
}

/// Map a file name to the content type submitted to the layout service.
pub fn content_type_for(source_name: &str) -> &'static str {
    let extension = source_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        "heif" | "heic" => "image/heif",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "htm" | "html" => "text/html",
        _ => FALLBACK_CONTENT_TYPE,
    }
}

/// Hex-encoded SHA-256 of the raw document bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
