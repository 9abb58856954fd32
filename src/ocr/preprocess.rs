//! Light and aggressive preprocessing branches.
//!
//! The light branch only converts to luminance and guarantees a minimum
//! height. The aggressive branch additionally straightens, equalizes,
//! denoises, sharpens and binarizes the frame.

use image::{imageops::FilterType, GrayImage, Luma};
use imageproc::{
    edges::canny,
    filter::{gaussian_blur_f32, median_filter},
    hough::{detect_lines, LineDetectionOptions, PolarLine},
};
use serde::Serialize;
use std::cmp::Reverse;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::ocr::decode::Frame;
use crate::ocr::quality::QualityVerdict;

pub const LIGHT_MIN_HEIGHT: u32 = 400;
pub const AGGRESSIVE_MIN_HEIGHT: u32 = 600;

/// Mean skew, in degrees, above which the frame is rotated back.
pub const SKEW_CORRECTION_THRESHOLD: f32 = 1.0;
const SKEW_MAX_LINES: usize = 10;

const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;
const HOUGH_VOTE_THRESHOLD: u32 = 100;
const HOUGH_SUPPRESSION_RADIUS: u32 = 8;

const CLAHE_GRID: u32 = 8;
const CLAHE_CLIP_LIMIT: f32 = 3.0;

/// Gaussian sigma matching an 11px adaptive-threshold window.
const THRESHOLD_SIGMA: f32 = 2.0;
const THRESHOLD_OFFSET: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PreprocessBranch {
    Light,
    Aggressive,
}

impl From<QualityVerdict> for PreprocessBranch {
    fn from(verdict: QualityVerdict) -> Self {
        match verdict {
            QualityVerdict::Good => PreprocessBranch::Light,
            QualityVerdict::Poor => PreprocessBranch::Aggressive,
        }
    }
}

impl fmt::Display for PreprocessBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreprocessBranch::Light => write!(f, "light"),
            PreprocessBranch::Aggressive => write!(f, "aggressive"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub frame: Frame,
    pub branch: PreprocessBranch,
    pub preprocessing_applied: Vec<String>,
    /// Mean skew that was detected, whether or not it was corrected.
    pub skew_degrees: Option<f32>,
}

/// Run the branch selected by `verdict`. Always yields a single-channel frame.
pub fn preprocess(frame: &Frame, verdict: QualityVerdict) -> Preprocessed {
    let branch = PreprocessBranch::from(verdict);
    info!("Preprocessing {}x{} frame with {} branch", frame.width(), frame.height(), branch);

    match branch {
        PreprocessBranch::Light => light(frame),
        PreprocessBranch::Aggressive => aggressive(frame),
    }
}

fn light(frame: &Frame) -> Preprocessed {
    let mut steps = vec!["grayscale".to_string()];
    let mut gray = frame.to_luma();

    if let Some(upscaled) = upscale_to_height(&gray, LIGHT_MIN_HEIGHT) {
        gray = upscaled;
        steps.push(format!("upscale_to_{}px", LIGHT_MIN_HEIGHT));
    }

    Preprocessed {
        frame: Frame::from_luma(gray),
        branch: PreprocessBranch::Light,
        preprocessing_applied: steps,
        skew_degrees: None,
    }
}

fn aggressive(frame: &Frame) -> Preprocessed {
    let mut steps = vec!["grayscale".to_string()];
    let mut gray = frame.to_luma();

    if let Some(upscaled) = upscale_to_height(&gray, AGGRESSIVE_MIN_HEIGHT) {
        gray = upscaled;
        steps.push(format!("upscale_to_{}px", AGGRESSIVE_MIN_HEIGHT));
    }

    let skew = match catch_unwind(AssertUnwindSafe(|| detect_skew(&gray))) {
        Ok(skew) => skew,
        Err(_) => {
            warn!("Skew detection panicked, skipping rotation");
            None
        }
    };

    match skew {
        Some(angle) if angle.abs() > SKEW_CORRECTION_THRESHOLD => {
            info!("Correcting skew of {:.2} degrees", angle);
            gray = rotate_about_center(&gray, angle);
            steps.push(format!("deskew_{:.2}deg", angle));
        }
        Some(angle) => debug!("Skew of {:.2} degrees is within tolerance", angle),
        None => debug!("No lines found for skew detection"),
    }

    gray = equalize_local_contrast(&gray, CLAHE_GRID, CLAHE_CLIP_LIMIT);
    steps.push("clahe".to_string());

    gray = median_filter(&gray, 1, 1);
    steps.push("median_3x3".to_string());

    gray = sharpen(&gray);
    steps.push("sharpen".to_string());

    gray = binarize_adaptive(&gray, THRESHOLD_SIGMA, THRESHOLD_OFFSET);
    steps.push("adaptive_threshold".to_string());

    Preprocessed {
        frame: Frame::from_luma(gray),
        branch: PreprocessBranch::Aggressive,
        preprocessing_applied: steps,
        skew_degrees: skew,
    }
}

/// Cubic upscale so the height equals `min_height`. `None` when already tall enough.
fn upscale_to_height(gray: &GrayImage, min_height: u32) -> Option<GrayImage> {
    let (width, height) = gray.dimensions();
    if height == 0 || height >= min_height {
        return None;
    }

    let new_width = ((width as f64 * min_height as f64 / height as f64) as u32).max(1);
    debug!("Upscaling {}x{} to {}x{}", width, height, new_width, min_height);
    Some(image::imageops::resize(gray, new_width, min_height, FilterType::CatmullRom))
}

/// Mean deviation from horizontal, in degrees, of the strongest detected lines.
///
/// A negative value means the text rises to the right; rotating by the
/// returned angle straightens it.
pub fn detect_skew(gray: &GrayImage) -> Option<f32> {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return None;
    }

    let edges = canny(gray, CANNY_LOW, CANNY_HIGH);
    let lines = detect_lines(
        &edges,
        LineDetectionOptions {
            vote_threshold: HOUGH_VOTE_THRESHOLD,
            suppression_radius: HOUGH_SUPPRESSION_RADIUS,
        },
    );

    // detect_lines orders by angle; rank by support instead.
    let edge_points: Vec<(f32, f32)> = edges
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] > 0)
        .map(|(x, y, _)| (x as f32, y as f32))
        .collect();
    let mut ranked: Vec<(usize, &PolarLine)> =
        lines.iter().map(|line| (line_votes(line, &edge_points), line)).collect();
    ranked.sort_by_key(|(votes, _)| Reverse(*votes));

    let deviations: Vec<f32> = ranked
        .iter()
        .take(SKEW_MAX_LINES)
        .map(|(_, line)| line.angle_in_degrees as f32 - 90.0)
        .collect();

    if deviations.is_empty() {
        return None;
    }

    Some(deviations.iter().sum::<f32>() / deviations.len() as f32)
}

/// Edge pixels lying within one accumulator bin of `line`.
fn line_votes(line: &PolarLine, edge_points: &[(f32, f32)]) -> usize {
    let (sin, cos) = (line.angle_in_degrees as f32).to_radians().sin_cos();
    edge_points
        .iter()
        .filter(|(x, y)| (x * cos + y * sin - line.r).abs() < 1.0)
        .count()
}

/// Bilinear rotation by `degrees` (counter-clockwise on screen) about the
/// image center. Samples outside the source replicate the nearest edge pixel.
pub fn rotate_about_center(gray: &GrayImage, degrees: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let (sin, cos) = degrees.to_radians().sin_cos();
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let max_x = width as f32 - 1.0;
    let max_y = height as f32 - 1.0;

    GrayImage::from_fn(width, height, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        // Inverse mapping: destination pixel back into the source.
        let sx = (cos * dx - sin * dy + cx).clamp(0.0, max_x);
        let sy = (sin * dx + cos * dy + cy).clamp(0.0, max_y);
        Luma([sample_bilinear(gray, sx, sy)])
    })
}

fn sample_bilinear(gray: &GrayImage, x: f32, y: f32) -> u8 {
    let (width, height) = gray.dimensions();
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = gray.get_pixel(x0, y0)[0] as f32;
    let p10 = gray.get_pixel(x1, y0)[0] as f32;
    let p01 = gray.get_pixel(x0, y1)[0] as f32;
    let p11 = gray.get_pixel(x1, y1)[0] as f32;

    let top = p00 + (p10 - p00) * fx;
    let bottom = p01 + (p11 - p01) * fx;
    (top + (bottom - top) * fy).round().clamp(0.0, 255.0) as u8
}

/// Contrast-limited adaptive histogram equalization over a `grid` x `grid`
/// tiling, blending neighbouring tile mappings bilinearly.
pub fn equalize_local_contrast(gray: &GrayImage, grid: u32, clip_limit: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let grid_x = grid.min(width).max(1);
    let grid_y = grid.min(height).max(1);
    let tile_w = width as f32 / grid_x as f32;
    let tile_h = height as f32 / grid_y as f32;

    let mut luts = Vec::with_capacity((grid_x * grid_y) as usize);
    for ty in 0..grid_y {
        for tx in 0..grid_x {
            let x0 = tx * width / grid_x;
            let x1 = (tx + 1) * width / grid_x;
            let y0 = ty * height / grid_y;
            let y1 = (ty + 1) * height / grid_y;
            luts.push(clipped_tile_mapping(gray, x0, x1, y0, y1, clip_limit));
        }
    }

    let neighbours = |pos: f32, tile: f32, count: u32| -> (usize, usize, f32) {
        let f = (pos + 0.5) / tile - 0.5;
        let lower = f.floor().clamp(0.0, (count - 1) as f32) as u32;
        let upper = (lower + 1).min(count - 1);
        let weight = (f - lower as f32).clamp(0.0, 1.0);
        (lower as usize, upper as usize, weight)
    };

    GrayImage::from_fn(width, height, |x, y| {
        let value = gray.get_pixel(x, y)[0] as usize;
        let (tx0, tx1, wx) = neighbours(x as f32, tile_w, grid_x);
        let (ty0, ty1, wy) = neighbours(y as f32, tile_h, grid_y);
        let row = grid_x as usize;

        let top = luts[ty0 * row + tx0][value] * (1.0 - wx) + luts[ty0 * row + tx1][value] * wx;
        let bottom = luts[ty1 * row + tx0][value] * (1.0 - wx) + luts[ty1 * row + tx1][value] * wx;
        Luma([(top * (1.0 - wy) + bottom * wy).round().clamp(0.0, 255.0) as u8])
    })
}

fn clipped_tile_mapping(gray: &GrayImage, x0: u32, x1: u32, y0: u32, y1: u32, clip_limit: f32) -> [f32; 256] {
    let mut histogram = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            histogram[gray.get_pixel(x, y)[0] as usize] += 1;
        }
    }

    let area = ((x1 - x0) * (y1 - y0)).max(1);
    let clip = ((clip_limit * area as f32 / 256.0) as u32).max(1);

    let mut excess = 0u32;
    for count in histogram.iter_mut() {
        if *count > clip {
            excess += *count - clip;
            *count = clip;
        }
    }

    let bonus = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, count) in histogram.iter_mut().enumerate() {
        *count += bonus + u32::from(i < remainder);
    }

    let scale = 255.0 / area as f32;
    let mut lut = [0f32; 256];
    let mut cumulative = 0u32;
    for (i, count) in histogram.iter().enumerate() {
        cumulative += count;
        lut[i] = (cumulative as f32 * scale).min(255.0);
    }
    lut
}

/// 3x3 sharpening with kernel `[-1 -1 -1; -1 9 -1; -1 -1 -1]` and replicated borders.
pub fn sharpen(gray: &GrayImage) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let at = |x: i64, y: i64| -> f32 {
        let cx = x.clamp(0, width as i64 - 1) as u32;
        let cy = y.clamp(0, height as i64 - 1) as u32;
        gray.get_pixel(cx, cy)[0] as f32
    };

    GrayImage::from_fn(width, height, |x, y| {
        let (x, y) = (x as i64, y as i64);
        let mut neighbours = 0.0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx != 0 || dy != 0 {
                    neighbours += at(x + dx, y + dy);
                }
            }
        }
        let value = 9.0 * at(x, y) - neighbours;
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

/// Pixels brighter than their Gaussian-weighted neighbourhood minus `offset`
/// become white, everything else black.
pub fn binarize_adaptive(gray: &GrayImage, sigma: f32, offset: f32) -> GrayImage {
    let blurred = gaussian_blur_f32(gray, sigma);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let local = blurred.get_pixel(x, y)[0] as f32 - offset;
        if gray.get_pixel(x, y)[0] as f32 > local {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn color_frame(width: u32, height: u32) -> Frame {
        Frame::new(DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            if (x / 10 + y / 10) % 2 == 0 {
                Rgb([30, 30, 30])
            } else {
                Rgb([220, 220, 220])
            }
        })))
    }

    #[test]
    fn test_light_branch_upscales_short_frames() {
        let result = preprocess(&color_frame(300, 200), QualityVerdict::Good);

        assert_eq!(result.branch, PreprocessBranch::Light);
        assert!(result.frame.is_grayscale());
        assert_eq!(result.frame.dimensions(), (600, 400));
        assert!(result.preprocessing_applied.contains(&"upscale_to_400px".to_string()));
    }

    #[test]
    fn test_light_branch_keeps_tall_frames() {
        let result = preprocess(&color_frame(500, 800), QualityVerdict::Good);

        assert_eq!(result.frame.dimensions(), (500, 800));
        assert_eq!(result.preprocessing_applied, vec!["grayscale".to_string()]);
    }

    #[test]
    fn test_aggressive_branch_is_binary() {
        let result = preprocess(&color_frame(300, 200), QualityVerdict::Poor);

        assert_eq!(result.branch, PreprocessBranch::Aggressive);
        assert_eq!(result.frame.height(), 600);
        let gray = result.frame.to_luma();
        assert!(gray.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert_eq!(result.preprocessing_applied.last().map(String::as_str), Some("adaptive_threshold"));
    }

    #[test]
    fn test_aggressive_branch_survives_blank_frame() {
        let blank = Frame::new(DynamicImage::ImageRgb8(RgbImage::from_pixel(50, 50, Rgb([255, 255, 255]))));
        let result = preprocess(&blank, QualityVerdict::Poor);

        assert_eq!(result.skew_degrees, None);
        assert!(!result.preprocessing_applied.iter().any(|s| s.starts_with("deskew")));
    }

    #[test]
    fn test_detect_skew_on_horizontal_stripes_is_flat() {
        let stripes = GrayImage::from_fn(400, 400, |_, y| if (y / 20) % 2 == 0 { Luma([0]) } else { Luma([255]) });
        let skew = detect_skew(&stripes).expect("stripes produce lines");
        assert!(skew.abs() <= SKEW_CORRECTION_THRESHOLD, "unexpected skew {}", skew);
    }

    /// Upright page: long horizontal bars plus one short vertical rule.
    fn ruled_page() -> GrayImage {
        GrayImage::from_fn(800, 600, |x, y| {
            let on_bar = (100..700).contains(&x) && (80..480).contains(&y) && (y - 80) % 50 < 20;
            let on_rule = (50..54).contains(&x) && (200..400).contains(&y);
            if on_bar || on_rule {
                Luma([0])
            } else {
                Luma([255])
            }
        })
    }

    fn stripes(size: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |_, y| if (y / 20) % 2 == 0 { Luma([0]) } else { Luma([255]) })
    }

    #[test]
    fn test_vertical_rule_does_not_skew_upright_page() {
        let page = ruled_page();
        let skew = detect_skew(&page).expect("bars produce lines");
        assert!(skew.abs() <= SKEW_CORRECTION_THRESHOLD, "unexpected skew {}", skew);

        let result = preprocess(&Frame::from_luma(page), QualityVerdict::Poor);
        assert!(
            !result.preprocessing_applied.iter().any(|s| s.starts_with("deskew_")),
            "upright page was rotated: {:?}",
            result.preprocessing_applied
        );
    }

    #[test]
    fn test_rotated_stripes_are_detected_and_straightened() {
        let skewed = rotate_about_center(&stripes(600), 5.0);

        let skew = detect_skew(&skewed).expect("stripes produce lines");
        assert!((skew + 5.0).abs() <= 1.5, "expected about -5 degrees, got {}", skew);

        let straightened = rotate_about_center(&skewed, skew);
        let residual = detect_skew(&straightened).expect("stripes produce lines");
        assert!(residual.abs() <= SKEW_CORRECTION_THRESHOLD, "residual skew {}", residual);
    }

    #[test]
    fn test_aggressive_branch_records_deskew() {
        let skewed = rotate_about_center(&stripes(600), 5.0);
        let result = preprocess(&Frame::from_luma(skewed), QualityVerdict::Poor);

        let skew = result.skew_degrees.expect("skew measured");
        assert!((skew + 5.0).abs() <= 1.5, "expected about -5 degrees, got {}", skew);
        assert!(result.preprocessing_applied.iter().any(|s| s.starts_with("deskew_")));
        assert!(!result.preprocessing_applied.iter().any(|s| s.starts_with("upscale")));
    }

    #[test]
    fn test_rotate_zero_degrees_is_identity() {
        let gray = GrayImage::from_fn(20, 10, |x, y| Luma([(x * 10 + y) as u8]));
        assert_eq!(rotate_about_center(&gray, 0.0), gray);
    }

    #[test]
    fn test_rotate_replicates_borders() {
        let gray = GrayImage::from_pixel(40, 40, Luma([77]));
        let rotated = rotate_about_center(&gray, 15.0);
        assert!(rotated.pixels().all(|p| p[0] == 77));
    }

    #[test]
    fn test_sharpen_preserves_flat_regions() {
        let gray = GrayImage::from_pixel(10, 10, Luma([120]));
        assert_eq!(sharpen(&gray), gray);
    }

    #[test]
    fn test_sharpen_amplifies_edges() {
        let gray = GrayImage::from_fn(10, 10, |x, _| if x < 5 { Luma([100]) } else { Luma([150]) });
        let sharpened = sharpen(&gray);
        assert!(sharpened.get_pixel(4, 5)[0] < 100);
        assert!(sharpened.get_pixel(5, 5)[0] > 150);
    }

    #[test]
    fn test_clahe_spreads_low_contrast_values() {
        let gray = GrayImage::from_fn(64, 64, |x, _| Luma([100 + (x % 8) as u8]));
        let equalized = equalize_local_contrast(&gray, CLAHE_GRID, CLAHE_CLIP_LIMIT);

        let (min, max) = equalized
            .pixels()
            .fold((255u8, 0u8), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
        assert!(max - min > 7, "range {}..{} was not stretched", min, max);
    }

    #[test]
    fn test_clahe_handles_images_smaller_than_grid() {
        let gray = GrayImage::from_pixel(3, 2, Luma([50]));
        assert_eq!(equalize_local_contrast(&gray, CLAHE_GRID, CLAHE_CLIP_LIMIT).dimensions(), (3, 2));
    }

    #[test]
    fn test_binarize_uniform_image_is_white() {
        let gray = GrayImage::from_pixel(16, 16, Luma([90]));
        let binary = binarize_adaptive(&gray, THRESHOLD_SIGMA, THRESHOLD_OFFSET);
        assert!(binary.pixels().all(|p| p[0] == 255));
    }
}
