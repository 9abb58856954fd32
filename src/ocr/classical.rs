//! Classical (Tesseract) recognition over an ordered list of page configurations.

use image::GrayImage;
use std::fmt;
use tracing::{debug, info, warn};

use crate::ocr::decode::Frame;
use crate::ocr::engine::{BackendText, OcrAttempt, OcrBackend};
use crate::ocr::error::OcrError;

pub const ENGINE_NAME: &str = "tesseract";

/// Text longer than this stops the search even for non-French configurations.
pub const EARLY_STOP_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSegmentation {
    /// PSM 3, fully automatic page segmentation.
    Auto,
    /// PSM 4, a single column of text of variable sizes.
    SingleColumn,
    /// PSM 6, a single uniform block of text.
    SingleBlock,
}

impl PageSegmentation {
    pub fn code(&self) -> u8 {
        match self {
            PageSegmentation::Auto => 3,
            PageSegmentation::SingleColumn => 4,
            PageSegmentation::SingleBlock => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageConfig {
    /// Tesseract language code; `None` uses the engine default.
    pub language: Option<&'static str>,
    pub segmentation: PageSegmentation,
}

impl PageConfig {
    pub const fn new(language: Option<&'static str>, segmentation: PageSegmentation) -> Self {
        Self { language, segmentation }
    }

    pub fn is_french(&self) -> bool {
        self.language == Some("fra")
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/psm{}", self.language.unwrap_or("default"), self.segmentation.code())
    }
}

/// Configurations in preference order: French first, then English, then the engine default.
pub const PAGE_CONFIGS: [PageConfig; 6] = [
    PageConfig::new(Some("fra"), PageSegmentation::SingleBlock),
    PageConfig::new(Some("fra"), PageSegmentation::SingleColumn),
    PageConfig::new(Some("fra"), PageSegmentation::Auto),
    PageConfig::new(Some("eng"), PageSegmentation::SingleBlock),
    PageConfig::new(Some("eng"), PageSegmentation::SingleColumn),
    PageConfig::new(None, PageSegmentation::SingleBlock),
];

/// Recognizes a whole grayscale page under one configuration.
pub trait PageRecognizer: Send + Sync {
    fn recognize_page(&self, gray: &GrayImage, config: &PageConfig) -> Result<String, OcrError>;
}

pub struct ClassicalBackend {
    recognizer: Box<dyn PageRecognizer>,
    configs: Vec<PageConfig>,
}

impl ClassicalBackend {
    pub fn new(recognizer: Box<dyn PageRecognizer>) -> Self {
        Self::with_configs(recognizer, PAGE_CONFIGS.to_vec())
    }

    pub fn with_configs(recognizer: Box<dyn PageRecognizer>, configs: Vec<PageConfig>) -> Self {
        Self { recognizer, configs }
    }

    #[cfg(feature = "ocr")]
    pub fn tesseract(tessdata_path: Option<String>) -> Self {
        Self::new(Box::new(TesseractRecognizer::new(tessdata_path)))
    }
}

impl OcrBackend for ClassicalBackend {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn recognize(&self, frame: &Frame, attempts: &mut Vec<OcrAttempt>) -> Result<BackendText, OcrError> {
        let gray = frame.to_luma();
        let mut best: Option<(String, PageConfig)> = None;
        let mut last_error: Option<OcrError> = None;

        for config in &self.configs {
            debug!("Trying OCR configuration {}", config);
            let text = match self.recognizer.recognize_page(&gray, config) {
                Ok(raw) => raw.trim().to_string(),
                Err(e) => {
                    warn!("OCR configuration {} failed: {}", config, e);
                    attempts.push(OcrAttempt::failed(ENGINE_NAME, Some(config.label()), &e));
                    last_error = Some(e);
                    continue;
                }
            };

            let length = text.chars().count();
            attempts.push(OcrAttempt::succeeded(ENGINE_NAME, Some(config.label()), &text));
            if length == 0 {
                continue;
            }
            info!("Configuration {} extracted {} characters", config, length);

            if config.is_french() || length > EARLY_STOP_CHARS {
                return Ok(BackendText { text, config: Some(config.label()) });
            }

            let best_length = best.as_ref().map(|(t, _)| t.chars().count()).unwrap_or(0);
            if length > best_length {
                best = Some((text, *config));
            }
        }

        match best {
            Some((text, config)) => {
                info!("Using best result from {}: {} characters", config, text.chars().count());
                Ok(BackendText { text, config: Some(config.label()) })
            }
            None => Err(OcrError::Exhausted {
                last_error: last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no configuration produced text".to_string()),
            }),
        }
    }
}

#[cfg(feature = "ocr")]
pub use self::tesseract_impl::TesseractRecognizer;

#[cfg(feature = "ocr")]
mod tesseract_impl {
    use super::*;
    use tesseract::{PageSegMode, Tesseract};

    /// Runs the system Tesseract library, one fresh instance per configuration.
    pub struct TesseractRecognizer {
        tessdata_path: Option<String>,
    }

    impl TesseractRecognizer {
        pub fn new(tessdata_path: Option<String>) -> Self {
            Self { tessdata_path }
        }
    }

    impl PageRecognizer for TesseractRecognizer {
        fn recognize_page(&self, gray: &GrayImage, config: &PageConfig) -> Result<String, OcrError> {
            let (width, height) = gray.dimensions();

            let tesseract = Tesseract::new(self.tessdata_path.as_deref(), config.language).map_err(|e| {
                OcrError::InitializationFailed {
                    details: format!("{} ({})", e, config),
                }
            })?;

            let mut tesseract = tesseract
                .set_frame(gray.as_raw(), width as i32, height as i32, 1, width as i32)
                .map_err(|e| OcrError::recognition(ENGINE_NAME, e))?;

            tesseract.set_page_seg_mode(match config.segmentation {
                PageSegmentation::Auto => PageSegMode::PsmAuto,
                PageSegmentation::SingleColumn => PageSegMode::PsmSingleColumn,
                PageSegmentation::SingleBlock => PageSegMode::PsmSingleBlock,
            });

            tesseract
                .get_text()
                .map_err(|e| OcrError::recognition(ENGINE_NAME, format!("failed to extract text: {}", e)))
        }
    }
}
