//! Physical lens discovery
//!
//! Phones expose their rear cameras as one logical multi-camera backed by
//! several physical sensors. Macro mode needs to address one of those
//! physical sensors directly, so the ids and sensor geometry are resolved
//! once through a [`CapabilityProvider`] and cached for the process lifetime.

pub mod resolver;

pub use resolver::{resolve_auxiliary_lens, resolve_lenses, LensCache};

use crate::errors::CaptureError;
use crate::types::PixelArray;
use serde::{Deserialize, Serialize};

/// Static characteristics reported for one sensor id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorCharacteristics {
    pub is_logical_multi_camera: bool,
    pub physical_ids: Vec<String>,
    /// Nominal focal lengths in millimetres, first entry is the primary one
    pub focal_lengths: Vec<f32>,
    pub active_array: Option<PixelArray>,
}

/// Capability query interface over the camera stack
pub trait CapabilityProvider: Send + Sync {
    /// Ids of all rear-facing sensors, logical ones included
    fn list_rear_sensors(&self) -> Result<Vec<String>, CaptureError>;

    fn characteristics(&self, id: &str) -> Result<SensorCharacteristics, CaptureError>;
}

/// One physical lens usable for mode binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensProfile {
    pub physical_id: Option<String>,
    pub active_array: Option<PixelArray>,
    pub focal_length: f32,
}

/// Lenses picked out of the logical camera's physical sensors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLenses {
    /// Shortest focal length (ultra-wide)
    pub auxiliary: LensProfile,
    /// Third-shortest focal length, when at least three sensors exist
    pub telephoto: Option<LensProfile>,
    /// All candidates sorted by ascending focal length
    pub candidates: Vec<LensProfile>,
}
