pub mod classical;
pub mod decode;
pub mod engine;
pub mod error;
pub mod health;
pub mod neural;
pub mod normalize;
pub mod preprocess;
pub mod quality;

pub use decode::{decode_upload, Frame, UploadKind, ALLOWED_CONTENT_TYPES, MAX_FRAME_DIMENSION};
pub use engine::{BackendText, OcrAttempt, OcrBackend, OcrEngine, Recognition};
pub use error::{OcrDiagnostics, OcrError};
pub use normalize::normalize_text;
pub use preprocess::{preprocess, PreprocessBranch, Preprocessed};
pub use quality::{assess, ImageStatistics, MetricsSource, QualityMetrics, QualityVerdict};

use tracing::info;

use crate::config::Config;
#[cfg(feature = "ocr")]
use classical::ClassicalBackend;
use neural::NeuralBackend;

/// Build the engine with the backends this build and configuration allow,
/// neural first and classical as the fallback.
pub fn engine_from_config(config: &Config) -> OcrEngine {
    let mut backends: Vec<Box<dyn OcrBackend>> = Vec::new();

    if config.neural_ocr_enabled {
        backends.push(Box::new(neural_backend(config)));
    }

    #[cfg(feature = "ocr")]
    backends.push(Box::new(ClassicalBackend::tesseract(config.tessdata_path.clone())));

    let engine = OcrEngine::new(backends);
    info!("OCR backends in priority order: {:?}", engine.backend_names());
    engine
}

#[cfg(feature = "neural")]
fn neural_backend(config: &Config) -> NeuralBackend {
    match (&config.ocrs_detection_model, &config.ocrs_recognition_model) {
        (Some(detection), Some(recognition)) => NeuralBackend::ocrs(detection, recognition),
        _ => NeuralBackend::unavailable("OCRS_DETECTION_MODEL and OCRS_RECOGNITION_MODEL must both be set"),
    }
}

#[cfg(not(feature = "neural"))]
fn neural_backend(_config: &Config) -> NeuralBackend {
    NeuralBackend::unavailable("built without the `neural` feature")
}
