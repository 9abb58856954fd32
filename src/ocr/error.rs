use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Unsupported content type: {content_type}")]
    UnsupportedContentType { content_type: String },

    #[error("Could not decode {content_type} upload: {details}")]
    Decode { content_type: String, details: String },

    #[error("PDF rendering is not available in this build")]
    PdfSupportDisabled,

    #[error("Tesseract is not installed on the system")]
    TesseractNotInstalled,

    #[error("Tesseract language data not found for '{lang}'. Please install tesseract-ocr-{lang}")]
    LanguageDataNotFound { lang: String },

    #[error("OCR backend initialization failed: {details}")]
    InitializationFailed { details: String },

    #[error("OCR backend '{engine}' is not available: {details}")]
    BackendUnavailable { engine: String, details: String },

    #[error("OCR backend '{engine}' produced no usable text")]
    EmptyResult { engine: String },

    #[error("Recognition failed with {engine}: {details}")]
    Recognition { engine: String, details: String },

    #[error("All OCR configurations failed. Last error: {last_error}")]
    Exhausted { last_error: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl OcrError {
    pub fn decode(content_type: &str, details: impl fmt::Display) -> Self {
        OcrError::Decode {
            content_type: content_type.to_string(),
            details: details.to_string(),
        }
    }

    pub fn recognition(engine: &str, details: impl fmt::Display) -> Self {
        OcrError::Recognition {
            engine: engine.to_string(),
            details: details.to_string(),
        }
    }

    /// Errors caused by the uploaded document rather than by the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            OcrError::UnsupportedContentType { .. } | OcrError::Decode { .. }
        )
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            OcrError::TesseractNotInstalled
                | OcrError::LanguageDataNotFound { .. }
                | OcrError::PdfSupportDisabled
                | OcrError::BackendUnavailable { .. }
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            OcrError::UnsupportedContentType { .. } => "OCR_UNSUPPORTED_TYPE",
            OcrError::Decode { .. } => "OCR_DECODE_FAILED",
            OcrError::PdfSupportDisabled => "OCR_PDF_DISABLED",
            OcrError::TesseractNotInstalled => "OCR_NOT_INSTALLED",
            OcrError::LanguageDataNotFound { .. } => "OCR_LANG_MISSING",
            OcrError::InitializationFailed { .. } => "OCR_INIT_FAILED",
            OcrError::BackendUnavailable { .. } => "OCR_BACKEND_UNAVAILABLE",
            OcrError::EmptyResult { .. } => "OCR_EMPTY_RESULT",
            OcrError::Recognition { .. } => "OCR_RECOGNITION_FAILED",
            OcrError::Exhausted { .. } => "OCR_EXHAUSTED",
            OcrError::Io(_) => "OCR_IO_ERROR",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OcrDiagnostics {
    pub tesseract_version: Option<String>,
    pub available_languages: Vec<String>,
    pub tessdata_path: Option<String>,
    pub neural_backend_loaded: bool,
    pub pdf_rendering: bool,
}

impl fmt::Display for OcrDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "OCR Diagnostics:")?;
        writeln!(f, "  Tesseract Version: {}", self.tesseract_version.as_deref().unwrap_or("Not installed"))?;
        writeln!(f, "  Tessdata Path: {}", self.tessdata_path.as_deref().unwrap_or("Not set"))?;
        writeln!(f, "  Available Languages: {}", self.available_languages.join(", "))?;
        writeln!(f, "  Neural Backend: {}", if self.neural_backend_loaded { "loaded" } else { "unavailable" })?;
        writeln!(f, "  PDF Rendering: {}", if self.pdf_rendering { "enabled" } else { "disabled" })?;
        Ok(())
    }
}
