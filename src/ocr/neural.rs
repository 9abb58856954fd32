//! Neural line recognition, tried before the classical engine.
//!
//! Lines scoring at or below [`LINE_CONFIDENCE_THRESHOLD`] are dropped and the
//! survivors are joined with single spaces.

use image::RgbImage;
use std::sync::Arc;
use tracing::{debug, info};

use crate::ocr::decode::Frame;
use crate::ocr::engine::{BackendText, OcrAttempt, OcrBackend};
use crate::ocr::error::OcrError;

pub const ENGINE_NAME: &str = "neural";
pub const LINE_CONFIDENCE_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedLine {
    pub text: String,
    pub confidence: f32,
}

/// Detects and reads text lines in a color image.
pub trait LineRecognizer: Send + Sync {
    fn recognize_lines(&self, rgb: &RgbImage) -> Result<Vec<RecognizedLine>, OcrError>;
}

pub struct NeuralBackend {
    recognizer: Result<Arc<dyn LineRecognizer>, String>,
}

impl NeuralBackend {
    pub fn new(recognizer: Arc<dyn LineRecognizer>) -> Self {
        Self { recognizer: Ok(recognizer) }
    }

    /// A backend that reports itself unavailable, e.g. when models failed to load.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self { recognizer: Err(reason.into()) }
    }

    #[cfg(feature = "neural")]
    pub fn ocrs(detection_model: &str, recognition_model: &str) -> Self {
        match ocrs_impl::shared(detection_model, recognition_model) {
            Ok(recognizer) => Self::new(recognizer),
            Err(e) => Self::unavailable(e.to_string()),
        }
    }
}

impl OcrBackend for NeuralBackend {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn is_available(&self) -> bool {
        self.recognizer.is_ok()
    }

    fn recognize(&self, frame: &Frame, attempts: &mut Vec<OcrAttempt>) -> Result<BackendText, OcrError> {
        let result = self.recognize_text(frame);
        match &result {
            Ok(text) => attempts.push(OcrAttempt::succeeded(ENGINE_NAME, None, text)),
            Err(e) => attempts.push(OcrAttempt::failed(ENGINE_NAME, None, e)),
        }
        result.map(|text| BackendText { text, config: None })
    }
}

impl NeuralBackend {
    fn recognize_text(&self, frame: &Frame) -> Result<String, OcrError> {
        let recognizer = self.recognizer.as_ref().map_err(|details| OcrError::BackendUnavailable {
            engine: ENGINE_NAME.to_string(),
            details: details.clone(),
        })?;

        let lines = recognizer.recognize_lines(&frame.as_image().to_rgb8())?;
        let total = lines.len();

        let kept: Vec<&str> = lines
            .iter()
            .filter(|line| line.confidence > LINE_CONFIDENCE_THRESHOLD)
            .map(|line| line.text.trim())
            .filter(|text| !text.is_empty())
            .collect();
        debug!("Kept {} of {} recognized lines", kept.len(), total);

        let text = kept.join(" ");
        if text.is_empty() {
            return Err(OcrError::EmptyResult { engine: ENGINE_NAME.to_string() });
        }

        info!("Neural recognition extracted {} characters", text.chars().count());
        Ok(text)
    }
}

/// Heuristic confidence for a recognized line when the model reports none.
///
/// Share of alphanumeric characters among visible ones, zeroed out as soon as
/// a tenth of the line is made of symbols outside ASCII punctuation.
pub fn line_confidence(text: &str) -> f32 {
    let visible = text.chars().filter(|c| !c.is_whitespace()).count();
    if visible == 0 {
        return 0.0;
    }

    let alphanumeric = text.chars().filter(|c| c.is_alphanumeric()).count();
    let special = text
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace() && !c.is_ascii_punctuation())
        .count();

    let special_penalty = 1.0 - (special as f32 / visible as f32 * 10.0).min(1.0);
    (alphanumeric as f32 / visible as f32 * special_penalty).clamp(0.0, 1.0)
}

#[cfg(feature = "neural")]
mod ocrs_impl {
    use super::*;
    use ocrs::{DecodeMethod, ImageSource, OcrEngine as OcrsEngine, OcrEngineParams};
    use rten::Model;
    use std::sync::OnceLock;

    static SHARED: OnceLock<Result<Arc<OcrsRecognizer>, String>> = OnceLock::new();

    /// Models are loaded once per process; later calls reuse the first outcome.
    pub fn shared(detection_model: &str, recognition_model: &str) -> Result<Arc<dyn LineRecognizer>, OcrError> {
        SHARED
            .get_or_init(|| OcrsRecognizer::load(detection_model, recognition_model).map(Arc::new))
            .clone()
            .map(|r| r as Arc<dyn LineRecognizer>)
            .map_err(|details| OcrError::BackendUnavailable {
                engine: ENGINE_NAME.to_string(),
                details,
            })
    }

    pub struct OcrsRecognizer {
        engine: OcrsEngine,
    }

    impl OcrsRecognizer {
        fn load(detection_model: &str, recognition_model: &str) -> Result<Self, String> {
            info!("Loading neural OCR models from {} and {}", detection_model, recognition_model);

            let detection = Model::load_file(detection_model)
                .map_err(|e| format!("Failed to load detection model: {}", e))?;
            let recognition = Model::load_file(recognition_model)
                .map_err(|e| format!("Failed to load recognition model: {}", e))?;

            let engine = OcrsEngine::new(OcrEngineParams {
                detection_model: Some(detection),
                recognition_model: Some(recognition),
                decode_method: DecodeMethod::Greedy,
                ..Default::default()
            })
            .map_err(|e| format!("Failed to create OCR engine: {}", e))?;

            info!("Neural OCR engine initialized");
            Ok(Self { engine })
        }
    }

    impl LineRecognizer for OcrsRecognizer {
        fn recognize_lines(&self, rgb: &RgbImage) -> Result<Vec<RecognizedLine>, OcrError> {
            let source = ImageSource::from_bytes(rgb.as_raw(), rgb.dimensions())
                .map_err(|e| OcrError::recognition(ENGINE_NAME, format!("invalid image source: {}", e)))?;
            let input = self
                .engine
                .prepare_input(source)
                .map_err(|e| OcrError::recognition(ENGINE_NAME, format!("failed to prepare input: {}", e)))?;
            let words = self
                .engine
                .detect_words(&input)
                .map_err(|e| OcrError::recognition(ENGINE_NAME, format!("failed to detect words: {}", e)))?;
            let line_rects = self.engine.find_text_lines(&input, &words);
            let lines = self
                .engine
                .recognize_text(&input, &line_rects)
                .map_err(|e| OcrError::recognition(ENGINE_NAME, format!("failed to recognize text: {}", e)))?;

            Ok(lines
                .iter()
                .filter_map(|line| line.as_ref())
                .map(|line| {
                    let text = line.words().map(|w| w.to_string()).collect::<Vec<_>>().join(" ");
                    let confidence = line_confidence(&text);
                    RecognizedLine { text, confidence }
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    struct FixedLines(Vec<RecognizedLine>);

    impl LineRecognizer for FixedLines {
        fn recognize_lines(&self, _rgb: &RgbImage) -> Result<Vec<RecognizedLine>, OcrError> {
            Ok(self.0.clone())
        }
    }

    fn line(text: &str, confidence: f32) -> RecognizedLine {
        RecognizedLine { text: text.to_string(), confidence }
    }

    fn frame() -> Frame {
        Frame::from_luma(GrayImage::new(10, 10))
    }

    #[test]
    fn test_low_confidence_lines_are_dropped() {
        let backend = NeuralBackend::new(Arc::new(FixedLines(vec![
            line("A: AB-123-CD", 0.93),
            line("~~ smudge ~~", 0.5),
            line("D.1 RENAULT", 0.81),
        ])));
        let mut attempts = Vec::new();

        let result = backend.recognize(&frame(), &mut attempts).unwrap();

        assert_eq!(result.text, "A: AB-123-CD D.1 RENAULT");
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].error.is_none());
    }

    #[test]
    fn test_nothing_confident_is_empty_result() {
        let backend = NeuralBackend::new(Arc::new(FixedLines(vec![line("???", 0.2)])));
        let mut attempts = Vec::new();

        let err = backend.recognize(&frame(), &mut attempts).unwrap_err();

        assert!(matches!(err, OcrError::EmptyResult { .. }));
        assert!(attempts[0].error.is_some());
    }

    #[test]
    fn test_unavailable_backend() {
        let backend = NeuralBackend::unavailable("models missing");
        assert!(!backend.is_available());

        let err = backend.recognize(&frame(), &mut Vec::new()).unwrap_err();
        assert_eq!(err.error_code(), "OCR_BACKEND_UNAVAILABLE");
    }

    #[test]
    fn test_line_confidence_heuristic() {
        assert_eq!(line_confidence(""), 0.0);
        assert_eq!(line_confidence("RENAULT"), 1.0);
        assert!(line_confidence("AB-123-CD") > LINE_CONFIDENCE_THRESHOLD);
        assert!(line_confidence("|-|-|-") <= LINE_CONFIDENCE_THRESHOLD);
        assert!(line_confidence("§§ ©© RENAULT") < LINE_CONFIDENCE_THRESHOLD);
    }
}
