//! Saved-frame post-processing
//!
//! Square modes bake the EXIF orientation into the pixels, crop the centered
//! square, cap its side and re-encode in place. The rewritten file carries no
//! EXIF block, so its orientation reads as normal.

use crate::errors::CaptureError;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// EXIF orientation value meaning "no transform"
pub const ORIENTATION_NORMAL: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostProcessOptions {
    pub square_crop: bool,
    pub max_side: u32,
    pub jpeg_quality: u8,
}

/// EXIF orientation of an encoded image, `1` when absent or unreadable
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(r) => r,
        Err(_) => return ORIENTATION_NORMAL,
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(ORIENTATION_NORMAL)
}

pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Centered square crop with side `min(width, height)`
pub fn center_square(img: &DynamicImage) -> DynamicImage {
    let (width, height) = img.dimensions();
    let side = width.min(height);
    img.crop_imm((width - side) / 2, (height - side) / 2, side, side)
}

/// Downscale so neither side exceeds `max_side`, keeping the aspect ratio
pub fn cap_side(img: DynamicImage, max_side: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= max_side && height <= max_side {
        return img;
    }
    // Bilinear
    img.resize(max_side, max_side, FilterType::Triangle)
}

pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, CaptureError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buffer = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    rgb.write_with_encoder(encoder)?;
    Ok(buffer)
}

/// Orient, crop, cap and encode an already decoded frame
pub fn square_and_encode(
    img: DynamicImage,
    orientation: u32,
    options: &PostProcessOptions,
) -> Result<(DynamicImage, Vec<u8>), CaptureError> {
    let oriented = apply_orientation(img, orientation);
    let square = cap_side(center_square(&oriented), options.max_side);
    let bytes = encode_jpeg(&square, options.jpeg_quality)?;
    Ok((square, bytes))
}

/// Post-process the frame at `path` and return the pixels the sharpness
/// check should see
///
/// Blocking; callers on the runtime use `spawn_blocking`.
pub fn process_file(path: &Path, options: &PostProcessOptions) -> Result<DynamicImage, CaptureError> {
    let bytes = fs::read(path)?;
    let decoded = image::load_from_memory(&bytes)?;

    if !options.square_crop {
        log::debug!("Leaving {:?} as captured ({}x{})", path, decoded.width(), decoded.height());
        return Ok(decoded);
    }

    let orientation = read_exif_orientation(&bytes);
    let (width, height) = decoded.dimensions();
    let (processed, encoded) = square_and_encode(decoded, orientation, options)?;
    fs::write(path, encoded)?;

    log::debug!(
        "Processed {:?}: {}x{} orientation {} -> {}x{} q{}",
        path,
        width,
        height,
        orientation,
        processed.width(),
        processed.height(),
        options.jpeg_quality
    );
    Ok(processed)
}
