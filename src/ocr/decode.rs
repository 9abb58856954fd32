//! Turns an uploaded byte buffer into a single raster [`Frame`].
//!
//! Images are decoded directly; PDF documents have their first page rendered
//! at native resolution. Every decoded frame is bounded to
//! [`MAX_FRAME_DIMENSION`] on its longer side.

use image::{DynamicImage, GrayImage};
use tracing::{debug, info};

use crate::mime_detection;
use crate::ocr::error::OcrError;

/// Longer side, in pixels, above which a decoded frame is downscaled.
pub const MAX_FRAME_DIMENSION: u32 = 2000;

/// Content types accepted at the upload boundary.
pub const ALLOWED_CONTENT_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/jpg", "application/pdf"];

/// A raster image flowing through the pipeline.
///
/// Stages never mutate a frame in place; each transformation yields a new one.
#[derive(Debug, Clone)]
pub struct Frame {
    image: DynamicImage,
}

impl Frame {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn from_luma(gray: GrayImage) -> Self {
        Self { image: DynamicImage::ImageLuma8(gray) }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    pub fn is_grayscale(&self) -> bool {
        matches!(self.image, DynamicImage::ImageLuma8(_))
    }

    pub fn as_image(&self) -> &DynamicImage {
        &self.image
    }

    /// Single-channel luminance copy of this frame.
    pub fn to_luma(&self) -> GrayImage {
        match &self.image {
            DynamicImage::ImageLuma8(gray) => gray.clone(),
            other => other.to_luma8(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Jpeg,
    Png,
    Pdf,
}

impl UploadKind {
    pub fn from_content_type(content_type: &str) -> Result<Self, OcrError> {
        match content_type.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Ok(UploadKind::Jpeg),
            "image/png" => Ok(UploadKind::Png),
            "application/pdf" | "application/x-pdf" => Ok(UploadKind::Pdf),
            _ => Err(OcrError::UnsupportedContentType {
                content_type: content_type.to_string(),
            }),
        }
    }

    /// Whether an upload may be accepted: one of [`ALLOWED_CONTENT_TYPES`], exactly.
    pub fn is_allowed(content_type: &str) -> bool {
        ALLOWED_CONTENT_TYPES.contains(&content_type)
    }
}

/// Decode an upload into one color frame, bounded to [`MAX_FRAME_DIMENSION`].
pub fn decode_upload(bytes: &[u8], content_type: &str) -> Result<Frame, OcrError> {
    let kind = UploadKind::from_content_type(content_type)?;
    if bytes.is_empty() {
        return Err(OcrError::decode(content_type, "empty upload"));
    }

    let image = match kind {
        UploadKind::Jpeg | UploadKind::Png => decode_image(bytes, content_type)?,
        UploadKind::Pdf => render_first_page(bytes)?,
    };

    info!("Decoded {} upload to {}x{} frame", content_type, image.width(), image.height());

    let frame = Frame::new(DynamicImage::ImageRgb8(image.into_rgb8()));
    Ok(bound_frame(frame, MAX_FRAME_DIMENSION))
}

fn decode_image(bytes: &[u8], content_type: &str) -> Result<DynamicImage, OcrError> {
    // The declared type only selects the branch; decoding follows the actual bytes.
    mime_detection::warn_on_mismatch(bytes, content_type);

    image::load_from_memory(bytes).map_err(|e| OcrError::decode(content_type, e))
}

/// Target size that brings the longer side down to `max_dimension`,
/// preserving aspect ratio. Returns the input unchanged when already within bounds.
pub fn bounded_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width.max(height) <= max_dimension {
        return (width, height);
    }

    if width >= height {
        let scaled = (height as f64 * (max_dimension as f64 / width as f64)) as u32;
        (max_dimension, scaled.max(1))
    } else {
        let scaled = (width as f64 * (max_dimension as f64 / height as f64)) as u32;
        (scaled.max(1), max_dimension)
    }
}

/// Downscale with area averaging when the longer side exceeds `max_dimension`.
pub fn bound_frame(frame: Frame, max_dimension: u32) -> Frame {
    let (width, height) = frame.dimensions();
    let (new_width, new_height) = bounded_dimensions(width, height, max_dimension);
    if (new_width, new_height) == (width, height) {
        return frame;
    }

    info!(
        "Scaling down large frame ({}x{}) to {}x{}",
        width, height, new_width, new_height
    );
    Frame::new(frame.image.thumbnail_exact(new_width, new_height))
}

#[cfg(feature = "pdf")]
fn render_first_page(bytes: &[u8]) -> Result<DynamicImage, OcrError> {
    use image::RgbaImage;
    use pdfium_render::prelude::PdfRenderConfig;

    const PDF: &str = "application/pdf";

    if !mime_detection::is_valid_pdf(bytes) {
        return Err(OcrError::decode(PDF, "missing or corrupted PDF header"));
    }

    let pdfium = pdfium::shared()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| OcrError::decode(PDF, e))?;
    let page = document
        .pages()
        .first()
        .map_err(|e| OcrError::decode(PDF, format!("document has no first page: {}", e)))?;

    // One PDF point per pixel keeps the page at its native resolution.
    let target_width = page.width().value.round().max(1.0) as i32;
    debug!("Rendering first PDF page at {} px wide", target_width);

    let bitmap = page
        .render_with_config(&PdfRenderConfig::new().set_target_width(target_width))
        .map_err(|e| OcrError::decode(PDF, e))?;

    let width = bitmap.width() as u32;
    let height = bitmap.height() as u32;
    let rgba = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes())
        .ok_or_else(|| OcrError::decode(PDF, "rendered bitmap has an unexpected size"))?;

    Ok(DynamicImage::ImageRgba8(rgba))
}

#[cfg(not(feature = "pdf"))]
fn render_first_page(_bytes: &[u8]) -> Result<DynamicImage, OcrError> {
    Err(OcrError::PdfSupportDisabled)
}

#[cfg(feature = "pdf")]
pub(crate) mod pdfium {
    use pdfium_render::prelude::Pdfium;
    use std::sync::OnceLock;
    use tracing::{info, warn};

    use crate::ocr::error::OcrError;

    static PDFIUM: OnceLock<Result<Pdfium, String>> = OnceLock::new();

    /// Process-wide Pdfium binding, bound on first use.
    pub fn shared() -> Result<&'static Pdfium, OcrError> {
        PDFIUM
            .get_or_init(bind)
            .as_ref()
            .map_err(|details| OcrError::BackendUnavailable {
                engine: "pdfium".to_string(),
                details: details.clone(),
            })
    }

    pub fn is_available() -> bool {
        shared().is_ok()
    }

    fn bind() -> Result<Pdfium, String> {
        let from_env = std::env::var("PDFIUM_LIBRARY_PATH").ok().and_then(|dir| {
            match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir)) {
                Ok(bindings) => Some(bindings),
                Err(e) => {
                    warn!("Failed to bind Pdfium from PDFIUM_LIBRARY_PATH={}: {}", dir, e);
                    None
                }
            }
        });

        let bindings = match from_env {
            Some(bindings) => bindings,
            None => Pdfium::bind_to_system_library().map_err(|e| e.to_string())?,
        };

        info!("Pdfium library bound");
        Ok(Pdfium::new(bindings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, format).expect("encode test image");
        buffer.into_inner()
    }

    #[test]
    fn test_bounded_dimensions_landscape() {
        assert_eq!(bounded_dimensions(4000, 3000, 2000), (2000, 1500));
        assert_eq!(bounded_dimensions(3001, 1000, 2000), (2000, 666));
    }

    #[test]
    fn test_bounded_dimensions_portrait() {
        assert_eq!(bounded_dimensions(1500, 3000, 2000), (1000, 2000));
    }

    #[test]
    fn test_bounded_dimensions_within_bounds() {
        assert_eq!(bounded_dimensions(2000, 2000, 2000), (2000, 2000));
        assert_eq!(bounded_dimensions(640, 480, 2000), (640, 480));
    }

    #[test]
    fn test_decode_png_downscales_long_side() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(3000, 1200, Rgb([200, 200, 200])));
        let bytes = encode(image, ImageFormat::Png);

        let frame = decode_upload(&bytes, "image/png").unwrap();

        assert_eq!(frame.dimensions(), (2000, 800));
        assert!(!frame.is_grayscale());
    }

    #[test]
    fn test_decode_jpeg_keeps_small_frame() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(320, 240, Rgb([10, 120, 240])));
        let bytes = encode(image, ImageFormat::Jpeg);

        let frame = decode_upload(&bytes, "image/jpg").unwrap();

        assert_eq!(frame.dimensions(), (320, 240));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_upload(b"definitely not an image", "image/jpeg").unwrap_err();
        assert!(matches!(err, OcrError::Decode { .. }));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_decode_rejects_empty_buffer() {
        let err = decode_upload(&[], "image/png").unwrap_err();
        assert_eq!(err.error_code(), "OCR_DECODE_FAILED");
    }

    #[test]
    fn test_decode_rejects_unknown_content_type() {
        let err = decode_upload(b"GIF89a", "image/gif").unwrap_err();
        assert!(matches!(err, OcrError::UnsupportedContentType { .. }));
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn test_decode_pdf_without_header_fails_before_rendering() {
        let err = decode_upload(b"\x89PNG not a pdf", "application/pdf").unwrap_err();
        assert!(matches!(err, OcrError::Decode { .. }));
    }

    #[test]
    fn test_upload_kind_accepts_allowed_types() {
        for content_type in ALLOWED_CONTENT_TYPES {
            assert!(UploadKind::is_allowed(content_type), "{} should be allowed", content_type);
        }
        assert!(!UploadKind::is_allowed("application/x-pdf"));
        assert!(!UploadKind::is_allowed("IMAGE/PNG"));
        assert_eq!(UploadKind::from_content_type("IMAGE/PNG").unwrap(), UploadKind::Png);
    }

    #[test]
    fn test_frame_luma_conversion() {
        let frame = Frame::new(DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]))));
        let gray = frame.to_luma();
        assert_eq!(gray.dimensions(), (4, 4));
        assert!(gray.pixels().all(|p| p[0] == 255));
    }
}
