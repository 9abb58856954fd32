//! Content type detection for uploaded registration documents
//!
//! Declared content types select the decoding branch, but clients often send
//! a generic or wrong type. This module compares the declared type with the
//! file's magic bytes and, for local files, guesses a type from the extension.

use std::path::Path;
use tracing::{debug, warn};

/// Method used for content type detection
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionMethod {
    /// Detected using magic bytes/file signature
    MagicBytes,
    /// Declared by the client and confirmed by the magic bytes
    Confirmed,
    /// Detected using file extension
    Extension,
    /// Fallback to default type
    Fallback,
}

#[derive(Debug, Clone)]
pub struct MimeDetectionResult {
    pub mime_type: String,
    pub detection_method: DetectionMethod,
    pub declared_type: Option<String>,
}

impl MimeDetectionResult {
    fn new(mime_type: String, detection_method: DetectionMethod, declared_type: Option<&str>) -> Self {
        Self {
            mime_type,
            detection_method,
            declared_type: declared_type.map(|s| s.to_string()),
        }
    }

    /// Whether the detected type disagrees with what the client declared
    pub fn is_mismatch(&self) -> bool {
        match &self.declared_type {
            Some(declared) => {
                self.detection_method == DetectionMethod::MagicBytes
                    && !are_mime_types_compatible(&self.mime_type, declared)
            }
            None => false,
        }
    }
}

/// Detect a content type from magic bytes, falling back to the file name
pub fn detect_mime_from_content(content: &[u8], filename: &str, declared_type: Option<&str>) -> MimeDetectionResult {
    debug!(
        "Detecting MIME type from content: filename={}, declared={:?}, content_len={}",
        filename,
        declared_type,
        content.len()
    );

    if let Some(detected) = infer::get(content) {
        let mime_type = detected.mime_type().to_string();
        let method = match declared_type {
            Some(declared) if are_mime_types_compatible(&mime_type, declared) => DetectionMethod::Confirmed,
            _ => DetectionMethod::MagicBytes,
        };
        return MimeDetectionResult::new(mime_type, method, declared_type);
    }

    detect_from_extension(filename, declared_type)
}

/// Log when the bytes of an upload do not look like its declared type
pub fn warn_on_mismatch(content: &[u8], declared_type: &str) {
    let result = detect_mime_from_content(content, "", Some(declared_type));
    if result.is_mismatch() {
        warn!(
            "MIME type mismatch: declared={}, content={}. Decoding from content",
            declared_type, result.mime_type
        );
    }
}

/// Content type for a local file, from its bytes first and its extension second
pub fn content_type_for_file(path: &Path, content: &[u8]) -> String {
    let filename = path.to_string_lossy();
    detect_mime_from_content(content, &filename, None).mime_type
}

/// Whether `%PDF-` appears in the first kilobyte. Some PDFs carry leading
/// null bytes or other metadata before the header.
pub fn is_valid_pdf(data: &[u8]) -> bool {
    let search_limit = data.len().min(1024);
    data[..search_limit].windows(5).any(|window| window == b"%PDF-")
}

fn detect_from_extension(filename: &str, declared_type: Option<&str>) -> MimeDetectionResult {
    match mime_guess::from_path(Path::new(filename)).first() {
        Some(mime_type) => {
            debug!("Extension-based detection: {} -> {}", filename, mime_type);
            MimeDetectionResult::new(mime_type.to_string(), DetectionMethod::Extension, declared_type)
        }
        None => MimeDetectionResult::new(
            "application/octet-stream".to_string(),
            DetectionMethod::Fallback,
            declared_type,
        ),
    }
}

/// Check if two MIME types are equivalent (e.g. "image/jpg" vs "image/jpeg")
fn are_mime_types_compatible(type1: &str, type2: &str) -> bool {
    let type1 = type1.trim().to_ascii_lowercase();
    let type2 = type2.trim().to_ascii_lowercase();
    if type1 == type2 {
        return true;
    }

    matches!(
        (type1.as_str(), type2.as_str()),
        ("image/jpeg", "image/jpg")
            | ("image/jpg", "image/jpeg")
            | ("application/pdf", "application/x-pdf")
            | ("application/x-pdf", "application/pdf")
    )
}
