#![allow(dead_code)]

use axum::Router;
use cartegrise::{
    config::Config,
    create_app,
    ocr::{
        preprocess::rotate_about_center, quality::FixedMetrics, BackendText, Frame, OcrAttempt, OcrBackend, OcrEngine, OcrError, QualityMetrics,
    },
    pipeline::ExtractionPipeline,
    AppState,
};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Arc;

pub const FULL_DOCUMENT: &str = "CERTIFICAT D IMMATRICULATION A: AB-123-CD B 15/03/2019 D.1 RENAULT D.2 CLIO \
E VF1RJA00068123456 P.1 1461 P.3 DIESEL S.1 5";

pub const BOUNDARY: &str = "cartegrise-test-boundary";

/// Backend that returns a fixed answer regardless of the frame.
pub struct ScriptedBackend {
    pub name: &'static str,
    pub answer: Result<String, String>,
}

impl ScriptedBackend {
    pub fn text(name: &'static str, text: &str) -> Self {
        Self { name, answer: Ok(text.to_string()) }
    }

    pub fn failing(name: &'static str, error: &str) -> Self {
        Self { name, answer: Err(error.to_string()) }
    }
}

impl OcrBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn recognize(&self, _frame: &Frame, attempts: &mut Vec<OcrAttempt>) -> Result<BackendText, OcrError> {
        match &self.answer {
            Ok(text) if !text.trim().is_empty() => {
                attempts.push(OcrAttempt::succeeded(self.name, None, text));
                Ok(BackendText { text: text.clone(), config: None })
            }
            Ok(_) => {
                let error = OcrError::EmptyResult { engine: self.name.to_string() };
                attempts.push(OcrAttempt::failed(self.name, None, &error));
                Err(error)
            }
            Err(details) => {
                let error = OcrError::recognition(self.name, details);
                attempts.push(OcrAttempt::failed(self.name, None, &error));
                Err(error)
            }
        }
    }
}

pub fn good_metrics() -> FixedMetrics {
    FixedMetrics(QualityMetrics { contrast: 60.0, sharpness: 400.0, noise_level: 5.0 })
}

pub fn noisy_metrics() -> FixedMetrics {
    FixedMetrics(QualityMetrics { contrast: 60.0, sharpness: 400.0, noise_level: 7.6 })
}

pub fn low_contrast_metrics() -> FixedMetrics {
    FixedMetrics(QualityMetrics { contrast: 12.0, sharpness: 400.0, noise_level: 5.0 })
}

pub fn pipeline_with(backends: Vec<Box<dyn OcrBackend>>, metrics: FixedMetrics) -> ExtractionPipeline {
    ExtractionPipeline::new(OcrEngine::new(backends)).with_metrics_source(Box::new(metrics))
}

pub fn pipeline_reading(text: &str) -> ExtractionPipeline {
    pipeline_with(vec![Box::new(ScriptedBackend::text("tesseract", text))], good_metrics())
}

/// A light page with a dark band, encoded as PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |_, y| {
        if y > height / 3 && y < height / 2 {
            Rgb([20, 20, 20])
        } else {
            Rgb([235, 235, 235])
        }
    });
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// A 600x600 page of text-like bands tilted `degrees` counter-clockwise, as PNG.
pub fn skewed_scan_png(degrees: f32) -> Vec<u8> {
    let page = GrayImage::from_fn(600, 600, |_, y| if (y / 20) % 2 == 0 { Luma([70]) } else { Luma([190]) });
    let skewed = rotate_about_center(&page, degrees);
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(skewed)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

pub fn test_app(pipeline: ExtractionPipeline, max_upload_size_mb: u64) -> Router {
    let config = Config {
        max_upload_size_mb,
        neural_ocr_enabled: false,
        ..Config::default()
    };
    create_app(Arc::new(AppState {
        config,
        pipeline: Arc::new(pipeline),
    }))
}

/// One-part multipart/form-data body.
pub fn multipart_body(field: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"carte_grise\"\r\nContent-Type: {}\r\n\r\n",
            field, content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}
