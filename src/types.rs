//! Core value types shared across the capture pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Lens mode selected by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    #[default]
    Standard,
    Macro,
    Wide,
}

impl CaptureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMode::Standard => "standard",
            CaptureMode::Macro => "macro",
            CaptureMode::Wide => "wide",
        }
    }

    /// Whether captures in this mode are post-cropped to a centered square
    pub fn crops_to_square(&self) -> bool {
        !matches!(self, CaptureMode::Wide)
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "macro" => Ok(Self::Macro),
            "wide" => Ok(Self::Wide),
            other => Err(format!("unknown capture mode: {other}")),
        }
    }
}

/// Operator-chosen orientation for non-wide modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn rotation_degrees(&self) -> u16 {
        match self {
            Orientation::Portrait => 0,
            Orientation::Landscape => 90,
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Orientation::Portrait => Orientation::Landscape,
            Orientation::Landscape => Orientation::Portrait,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    Ratio4x3,
    Ratio16x9,
}

/// Full pixel geometry of a sensor's active array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelArray {
    pub width: u32,
    pub height: u32,
}

/// Rectangle in sensor pixel coordinates, right/bottom exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropRect {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// Centered rectangle scaled down by `factor` on each axis
    pub fn centered(array: PixelArray, factor: f32) -> Self {
        let crop_width = (array.width as f32 / factor) as u32;
        let crop_height = (array.height as f32 / factor) as u32;
        let left = (array.width - crop_width) / 2;
        let top = (array.height - crop_height) / 2;
        Self {
            left,
            top,
            right: left + crop_width,
            bottom: top + crop_height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AfMode {
    ContinuousPicture,
    Macro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AwbMode {
    Auto,
    Daylight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoiseReductionMode {
    Off,
    Minimal,
    Fast,
    HighQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeMode {
    Off,
    Fast,
    HighQuality,
}

/// Handle to a stored image asset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageHandle(PathBuf);

impl ImageHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// File stem, used as the asset's display name
    pub fn name(&self) -> String {
        self.0
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl fmt::Display for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Inventory id with any trailing `-` removed, as used in asset names
pub fn clean_inventory_id(inventory_id: &str) -> &str {
    inventory_id.strip_suffix('-').unwrap_or(inventory_id)
}

/// Asset name for the `index`-th (1-based) photo of an item
pub fn photo_name(inventory_id: &str, index: u32) -> String {
    format!("{}-{}", clean_inventory_id(inventory_id), index)
}
