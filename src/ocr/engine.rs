use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::ocr::decode::Frame;
use crate::ocr::error::OcrError;

/// One recognition attempt made while looking for usable text.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct OcrAttempt {
    pub engine: String,
    /// Backend-specific configuration label, such as `fra/psm6`.
    pub config: Option<String>,
    /// Recognized text, trimmed. Empty for failed attempts.
    pub text: String,
    /// Characters in `text`.
    pub chars: usize,
    pub error: Option<String>,
}

impl OcrAttempt {
    pub fn succeeded(engine: &str, config: Option<String>, text: &str) -> Self {
        let text = text.trim().to_string();
        Self {
            engine: engine.to_string(),
            config,
            chars: text.chars().count(),
            text,
            error: None,
        }
    }

    pub fn failed(engine: &str, config: Option<String>, error: &OcrError) -> Self {
        Self {
            engine: engine.to_string(),
            config,
            text: String::new(),
            chars: 0,
            error: Some(error.to_string()),
        }
    }
}

/// Text produced by a single backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendText {
    pub text: String,
    pub config: Option<String>,
}

/// A recognition strategy the engine can fall back across.
pub trait OcrBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the backend can run at all in this process.
    fn is_available(&self) -> bool {
        true
    }

    /// Recognize text in `frame`, recording every attempt made along the way.
    ///
    /// An empty result is an error so the engine moves on to the next backend.
    fn recognize(&self, frame: &Frame, attempts: &mut Vec<OcrAttempt>) -> Result<BackendText, OcrError>;
}

/// Outcome of a successful recognition.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Recognition {
    /// Backend that produced the text.
    pub engine: String,
    pub config: Option<String>,
    #[serde(skip)]
    pub text: String,
    pub attempts: Vec<OcrAttempt>,
}

/// Backends tried in priority order until one yields non-empty text.
pub struct OcrEngine {
    backends: Vec<Box<dyn OcrBackend>>,
}

impl OcrEngine {
    pub fn new(backends: Vec<Box<dyn OcrBackend>>) -> Self {
        Self { backends }
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn is_backend_available(&self, name: &str) -> bool {
        self.backends.iter().any(|b| b.name() == name && b.is_available())
    }

    pub fn recognize(&self, frame: &Frame) -> Result<Recognition, OcrError> {
        let mut attempts = Vec::new();
        let mut last_error: Option<OcrError> = None;

        for backend in &self.backends {
            if !backend.is_available() {
                let error = OcrError::BackendUnavailable {
                    engine: backend.name().to_string(),
                    details: "backend could not be initialized".to_string(),
                };
                info!("Skipping OCR backend {}: unavailable", backend.name());
                attempts.push(OcrAttempt::failed(backend.name(), None, &error));
                last_error = Some(error);
                continue;
            }

            info!("Attempting recognition with {}", backend.name());
            match backend.recognize(frame, &mut attempts) {
                Ok(BackendText { text, config }) => {
                    info!(
                        "{} succeeded with {} characters{}",
                        backend.name(),
                        text.chars().count(),
                        config.as_deref().map(|c| format!(" ({})", c)).unwrap_or_default()
                    );
                    return Ok(Recognition {
                        engine: backend.name().to_string(),
                        config,
                        text,
                        attempts,
                    });
                }
                Err(e) => {
                    warn!("OCR backend {} failed: {}. Falling back", backend.name(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e @ OcrError::Exhausted { .. }) => e,
            Some(e) => OcrError::Exhausted { last_error: e.to_string() },
            None => OcrError::Exhausted {
                last_error: "no OCR backend is configured".to_string(),
            },
        })
    }
}
