//! Capture mode binding
//!
//! Turns the operator's lens mode and orientation into the concrete request
//! sent to the capture device.

use crate::assert_invariant;
use crate::config::{CameraConfig, MacroStrategy};
use crate::invariant_ppt::contracts;
use crate::lens::{LensProfile, ResolvedLenses};
use crate::types::{
    AfMode, AspectRatio, AwbMode, CaptureMode, CropRect, EdgeMode, NoiseReductionMode,
    Orientation,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const WIDE_ROTATION_DEGREES: u16 = 90;

/// Fully resolved parameters for one capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub requested_mode: CaptureMode,
    pub effective_mode: CaptureMode,
    /// Macro was requested but no suitable lens exists
    pub degraded: bool,
    pub aspect_ratio: AspectRatio,
    pub rotation_degrees: u16,
    pub physical_lens_id: Option<String>,
    /// Capture-time region of interest in sensor coordinates
    pub sensor_crop: Option<CropRect>,
    pub zoom_ratio: f32,
    pub af_mode: AfMode,
    pub awb_mode: AwbMode,
    pub noise_reduction: NoiseReductionMode,
    pub edge_mode: EdgeMode,
    pub jpeg_quality: u8,
    pub orientation_toggle_enabled: bool,
    /// Barcode analysis on the preview stream
    pub scan_analysis_enabled: bool,
    /// Post-process to a centered square
    pub square_crop: bool,
}

/// Builds [`CaptureRequest`]s from the current mode over the resolved lenses
#[derive(Debug, Clone)]
pub struct ModeBinder {
    lenses: Option<Arc<ResolvedLenses>>,
    config: CameraConfig,
}

impl ModeBinder {
    pub fn new(lenses: Option<Arc<ResolvedLenses>>, config: CameraConfig) -> Self {
        Self { lenses, config }
    }

    pub fn lenses(&self) -> Option<&ResolvedLenses> {
        self.lenses.as_deref()
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    fn macro_lens(&self) -> Option<&LensProfile> {
        let lenses = self.lenses.as_deref()?;
        match self.config.macro_strategy {
            MacroStrategy::UltraWideCrop => Some(&lenses.auxiliary),
            MacroStrategy::Telephoto => lenses.telephoto.as_ref(),
        }
    }

    /// Whether `mode` can bind without degrading
    pub fn is_mode_available(&self, mode: CaptureMode) -> bool {
        match mode {
            CaptureMode::Standard | CaptureMode::Wide => true,
            CaptureMode::Macro => self
                .macro_lens()
                .is_some_and(|lens| lens.physical_id.is_some()),
        }
    }

    pub fn bind(&self, mode: CaptureMode, orientation: Orientation) -> CaptureRequest {
        match mode {
            CaptureMode::Standard => self.standard(mode, orientation, false),
            CaptureMode::Wide => self.wide(),
            CaptureMode::Macro => match self.macro_lens() {
                Some(lens) if lens.physical_id.is_some() => self.macro_request(lens, orientation),
                _ => {
                    log::warn!(
                        "No lens available for {:?} macro, falling back to standard",
                        self.config.macro_strategy
                    );
                    self.standard(mode, orientation, true)
                }
            },
        }
    }

    fn base(&self, requested_mode: CaptureMode) -> CaptureRequest {
        CaptureRequest {
            requested_mode,
            effective_mode: CaptureMode::Standard,
            degraded: false,
            aspect_ratio: AspectRatio::Ratio4x3,
            rotation_degrees: 0,
            physical_lens_id: None,
            sensor_crop: None,
            zoom_ratio: self.config.standard_zoom_ratio,
            af_mode: AfMode::ContinuousPicture,
            awb_mode: AwbMode::Daylight,
            noise_reduction: NoiseReductionMode::Minimal,
            edge_mode: EdgeMode::Fast,
            jpeg_quality: self.config.jpeg_quality,
            orientation_toggle_enabled: true,
            scan_analysis_enabled: true,
            square_crop: true,
        }
    }

    fn standard(
        &self,
        requested_mode: CaptureMode,
        orientation: Orientation,
        degraded: bool,
    ) -> CaptureRequest {
        CaptureRequest {
            degraded,
            rotation_degrees: orientation.rotation_degrees(),
            ..self.base(requested_mode)
        }
    }

    fn wide(&self) -> CaptureRequest {
        CaptureRequest {
            effective_mode: CaptureMode::Wide,
            aspect_ratio: AspectRatio::Ratio16x9,
            rotation_degrees: WIDE_ROTATION_DEGREES,
            zoom_ratio: self.config.wide_zoom_ratio,
            orientation_toggle_enabled: false,
            square_crop: false,
            ..self.base(CaptureMode::Wide)
        }
    }

    fn macro_request(&self, lens: &LensProfile, orientation: Orientation) -> CaptureRequest {
        let base = CaptureRequest {
            effective_mode: CaptureMode::Macro,
            rotation_degrees: orientation.rotation_degrees(),
            physical_lens_id: lens.physical_id.clone(),
            // Physical lenses always run at native zoom.
            zoom_ratio: 1.0,
            scan_analysis_enabled: false,
            ..self.base(CaptureMode::Macro)
        };

        match self.config.macro_strategy {
            MacroStrategy::UltraWideCrop => {
                let sensor_crop = lens.active_array.map(|array| {
                    let crop = CropRect::centered(array, self.config.macro_crop_factor);
                    assert_invariant!(
                        crop.right <= array.width && crop.bottom <= array.height,
                        contracts::MACRO_CROP_INSIDE,
                        "ModeBinder::macro_request"
                    );
                    crop
                });
                if sensor_crop.is_none() {
                    log::warn!("Active array unknown for lens {:?}, macro crop disabled", lens.physical_id);
                }
                CaptureRequest { sensor_crop, ..base }
            }
            MacroStrategy::Telephoto => CaptureRequest {
                af_mode: AfMode::Macro,
                ..base
            },
        }
    }
}
