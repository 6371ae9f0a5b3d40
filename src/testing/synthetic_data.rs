//! Synthetic frames for offline testing
//!
//! Sharp frames are high-contrast checkerboards, blurry frames are shallow
//! gradients whose Sobel response is nearly flat.

use crate::errors::CaptureError;
use image::{DynamicImage, Rgb, RgbImage};

/// Checkerboard cell size used for sharp frames
pub const SHARP_CELL: u32 = 8;

/// High-contrast checkerboard, far above the default threshold
pub fn sharp_frame(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        if ((x / SHARP_CELL) + (y / SHARP_CELL)) % 2 == 0 {
            Rgb([240, 240, 240])
        } else {
            Rgb([16, 16, 16])
        }
    })
}

/// Gentle horizontal ramp with a score well under the default threshold
pub fn blurry_frame(width: u32, height: u32) -> RgbImage {
    let width_f = width.max(1) as f32;
    RgbImage::from_fn(width, height, |x, _| {
        let v = 96 + (x as f32 / width_f * 48.0) as u8;
        Rgb([v, v, v])
    })
}

/// Frame whose sharpness grows with `level` (0 = flat)
pub fn textured_frame(width: u32, height: u32, level: u8) -> RgbImage {
    let amplitude = level as i32;
    RgbImage::from_fn(width, height, |x, y| {
        let on = ((x / 4) + (y / 4)) % 2 == 0;
        let v = if on { 128 + amplitude / 2 } else { 128 - amplitude / 2 };
        let v = v.clamp(0, 255) as u8;
        Rgb([v, v, v])
    })
}

/// JPEG-encode a synthetic frame
pub fn encode_frame(frame: &RgbImage, quality: u8) -> Result<Vec<u8>, CaptureError> {
    let mut buffer = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    DynamicImage::ImageRgb8(frame.clone()).write_with_encoder(encoder)?;
    Ok(buffer)
}
