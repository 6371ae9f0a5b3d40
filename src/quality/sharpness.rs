//! Sobel-based sharpness estimation
//!
//! The score is the variance of the gradient magnitude over a centered square
//! window. In-focus frames have a wide spread of gradient strengths (hard edges
//! next to flat areas); defocused frames have uniformly weak gradients.

use crate::assert_invariant;
use crate::config::QualityConfig;
use crate::invariant_ppt::contracts;
use image::{DynamicImage, GenericImageView, RgbImage};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SHARPNESS_THRESHOLD: f64 = 220.0;
const DEFAULT_AREA_FRACTION: f32 = 0.17;
const DEFAULT_MAX_SIDE: u32 = 768;
const DEFAULT_MIN_SIDE: u32 = 32;

/// Result of a sharpness evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SharpnessReport {
    /// Gradient magnitude variance (0.0 when skipped)
    pub score: f64,
    pub is_sharp: bool,
    /// Side of the analysed window in pixels
    pub crop_side: u32,
    /// The window was too small to be meaningful and the frame passed unchecked
    pub skipped: bool,
}

impl SharpnessReport {
    fn skipped(crop_side: u32) -> Self {
        Self {
            score: 0.0,
            is_sharp: true,
            crop_side,
            skipped: true,
        }
    }
}

/// Stateless focus-quality evaluator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharpnessEvaluator {
    pub threshold: f64,
    pub area_fraction: f32,
    pub max_side: u32,
    pub min_side: u32,
}

impl Default for SharpnessEvaluator {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SHARPNESS_THRESHOLD,
            area_fraction: DEFAULT_AREA_FRACTION,
            max_side: DEFAULT_MAX_SIDE,
            min_side: DEFAULT_MIN_SIDE,
        }
    }
}

/// Evaluate `image` against `threshold` with the default window rules
pub fn evaluate(image: &RgbImage, threshold: f64) -> SharpnessReport {
    SharpnessEvaluator::with_threshold(threshold).evaluate(image)
}

impl SharpnessEvaluator {
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold,
            ..Default::default()
        }
    }

    pub fn from_config(config: &QualityConfig) -> Self {
        Self {
            threshold: config.sharpness_threshold,
            area_fraction: config.analysis_area_fraction,
            max_side: config.max_analysis_side,
            min_side: config.min_analysis_side,
        }
    }

    /// Side of the analysis window for an image of the given size
    pub fn analysis_side(&self, width: u32, height: u32) -> u32 {
        let percent_based = (width.min(height) as f32 * self.area_fraction) as u32;
        percent_based.min(self.max_side)
    }

    /// Top-left corner and side of the centered analysis window, or the
    /// undersized side when the window is below the minimum
    fn window(&self, width: u32, height: u32) -> Result<(u32, u32, u32), u32> {
        let side = self.analysis_side(width, height);
        // A 3x3 kernel needs at least one interior pixel.
        if side < self.min_side.max(3) {
            return Err(side);
        }
        let (x0, y0) = ((width - side) / 2, (height - side) / 2);
        assert_invariant!(
            x0 + side <= width && y0 + side <= height,
            contracts::ANALYSIS_WINDOW_INSIDE,
            "SharpnessEvaluator::window"
        );
        Ok((x0, y0, side))
    }

    pub fn evaluate(&self, image: &RgbImage) -> SharpnessReport {
        let (width, height) = image.dimensions();
        let (x0, y0, side) = match self.window(width, height) {
            Ok(w) => w,
            Err(side) => {
                log::warn!(
                    "Analysis window {}px is too small for a {}x{} image, skipping sharpness check",
                    side,
                    width,
                    height
                );
                return SharpnessReport::skipped(side);
            }
        };

        let gray = luminance_window(image, x0, y0, side);
        self.report(&gray, side)
    }

    /// Evaluate a decoded image of any colour type
    ///
    /// Only the analysis window is converted to RGB.
    pub fn evaluate_dynamic(&self, image: &DynamicImage) -> SharpnessReport {
        let (width, height) = image.dimensions();
        let (x0, y0, side) = match self.window(width, height) {
            Ok(w) => w,
            Err(side) => {
                log::warn!(
                    "Analysis window {}px is too small for a {}x{} image, skipping sharpness check",
                    side,
                    width,
                    height
                );
                return SharpnessReport::skipped(side);
            }
        };

        let crop = image.crop_imm(x0, y0, side, side).to_rgb8();
        let gray = luminance_window(&crop, 0, 0, side);
        self.report(&gray, side)
    }

    fn report(&self, gray: &[i32], side: u32) -> SharpnessReport {
        let score = gradient_variance(gray, side as usize, side as usize);
        let is_sharp = score > self.threshold;

        log::debug!(
            "Sharpness analysis {}x{}: variance={:.2} threshold={:.2} sharp={}",
            side,
            side,
            score,
            self.threshold,
            is_sharp
        );

        SharpnessReport {
            score,
            is_sharp,
            crop_side: side,
            skipped: false,
        }
    }
}

/// Integer luminance of a square window, row-major
fn luminance_window(image: &RgbImage, x0: u32, y0: u32, side: u32) -> Vec<i32> {
    let mut gray = Vec::with_capacity((side * side) as usize);
    for y in y0..y0 + side {
        for x in x0..x0 + side {
            let [r, g, b] = image.get_pixel(x, y).0;
            let luma = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
            gray.push(luma as i32);
        }
    }
    gray
}

/// Variance of the Sobel gradient magnitude over all interior pixels
fn gradient_variance(gray: &[i32], w: usize, h: usize) -> f64 {
    if w < 3 || h < 3 {
        return 0.0;
    }

    let n = ((w - 2) * (h - 2)) as f64;
    let mut sum = 0.0f64;
    let mut sq_sum = 0.0f64;

    for i in 1..h - 1 {
        let above = &gray[(i - 1) * w..i * w];
        let row = &gray[i * w..(i + 1) * w];
        let below = &gray[(i + 1) * w..(i + 2) * w];

        for j in 1..w - 1 {
            let gx = (above[j + 1] + 2 * row[j + 1] + below[j + 1])
                - (above[j - 1] + 2 * row[j - 1] + below[j - 1]);
            let gy = (below[j - 1] + 2 * below[j] + below[j + 1])
                - (above[j - 1] + 2 * above[j] + above[j + 1]);

            let g = ((gx * gx + gy * gy) as f64).sqrt();
            sum += g;
            sq_sum += g * g;
        }
    }

    ((sq_sum - (sum * sum) / n) / n).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn checkerboard(size: u32, cell: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            if ((x / cell) + (y / cell)) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    #[test]
    fn test_analysis_side_rules() {
        let evaluator = SharpnessEvaluator::default();
        assert_eq!(evaluator.analysis_side(1000, 2000), 170);
        assert_eq!(evaluator.analysis_side(10_000, 8_000), 768);
        assert_eq!(evaluator.analysis_side(100, 100), 17);
    }

    #[test]
    fn test_uniform_image_has_zero_variance() {
        let image = RgbImage::from_pixel(400, 400, Rgb([90, 140, 200]));
        let report = evaluate(&image, 1.0);
        assert!(!report.skipped);
        assert_eq!(report.score, 0.0);
        assert!(!report.is_sharp);
    }

    #[test]
    fn test_checkerboard_is_sharp() {
        let report = evaluate(&checkerboard(400, 8), DEFAULT_SHARPNESS_THRESHOLD);
        assert!(report.score > DEFAULT_SHARPNESS_THRESHOLD);
        assert!(report.is_sharp);
        assert_eq!(report.crop_side, 68);
    }

    #[test]
    fn test_small_image_skips_check() {
        // 0.17 * 150 = 25px window, below the 32px floor
        let image = RgbImage::from_pixel(150, 300, Rgb([0, 0, 0]));
        let report = evaluate(&image, 1_000_000.0);
        assert!(report.skipped);
        assert!(report.is_sharp);
    }

    #[test]
    fn test_degenerate_image_does_not_panic() {
        let image = RgbImage::new(0, 0);
        let report = SharpnessEvaluator::default().evaluate(&image);
        assert!(report.skipped && report.is_sharp);
    }

    #[test]
    fn test_dynamic_matches_rgb_path() {
        let rgb = checkerboard(512, 5);
        let evaluator = SharpnessEvaluator::default();
        let direct = evaluator.evaluate(&rgb);
        let dynamic = evaluator.evaluate_dynamic(&DynamicImage::ImageRgb8(rgb));
        assert_eq!(direct, dynamic);
    }

    #[test]
    fn test_luminance_truncates() {
        let image = RgbImage::from_pixel(1, 1, Rgb([1, 1, 1]));
        // 0.299 + 0.587 + 0.114 lands a hair under 1.0 in f64
        let gray = luminance_window(&image, 0, 0, 1);
        assert!(gray[0] == 0 || gray[0] == 1);

        let image = RgbImage::from_pixel(1, 1, Rgb([10, 0, 0]));
        assert_eq!(luminance_window(&image, 0, 0, 1)[0], 2);
    }

    #[test]
    fn test_single_vertical_edge_gradient() {
        // Left half 0, right half 100: the two columns at the edge see |gx| = 400
        let w = 6;
        let gray: Vec<i32> = (0..w * w)
            .map(|i| if i % w >= 3 { 100 } else { 0 })
            .collect();
        let variance = gradient_variance(&gray, w, w);
        // 16 samples: 8 at 400, 8 at 0 -> mean 200, variance 40000
        assert!((variance - 40_000.0).abs() < 1e-6);
    }
}
