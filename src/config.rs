//! Configuration management for stockcam
//!
//! Provides configuration loading, saving, and validation for lens mode
//! binding, sharpness gating, scan acceptance rules and storage locations.

use crate::errors::CaptureError;
use crate::types::{CaptureMode, Orientation};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockcamConfig {
    pub camera: CameraConfig,
    pub quality: QualityConfig,
    pub scan: ScanConfig,
    pub storage: StorageConfig,
}

/// Which physical lens macro mode binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroStrategy {
    /// Shortest-focal lens with a centered sensor crop
    UltraWideCrop,
    /// Third-shortest lens with macro autofocus
    Telephoto,
}

/// Lens and request configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Mode the engine starts in
    pub default_mode: CaptureMode,
    /// Orientation the engine starts in
    pub default_orientation: Orientation,
    pub macro_strategy: MacroStrategy,
    /// Linear sensor crop factor for ultra-wide macro (1.25 = 64% area)
    pub macro_crop_factor: f32,
    pub standard_zoom_ratio: f32,
    pub wide_zoom_ratio: f32,
    /// JPEG quality requested from the device and used on re-encode (1-100)
    pub jpeg_quality: u8,
}

/// Sharpness gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Gradient-magnitude variance above which a frame counts as sharp
    pub sharpness_threshold: f64,
    /// Fraction of the shorter image side used as the analysis window
    pub analysis_area_fraction: f32,
    /// Maximum analysis window side in pixels
    pub max_analysis_side: u32,
    /// Analysis windows smaller than this skip the check
    pub min_analysis_side: u32,
    /// Processed captures are downscaled to at most this side length
    pub max_output_side: u32,
    /// Delay before the focus indicator recovers after a rejection
    pub focus_restore_delay_ms: u64,
    /// Pause between the three error pulses
    pub error_pulse_gap_ms: u64,
}

/// Scan acceptance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Codes without this prefix are rejected
    pub required_prefix: String,
    /// Photos an item needs before a different item may be scanned
    pub min_photos_per_item: u32,
    /// JPEG quality for the preview snapshot taken at scan time
    pub snapshot_jpeg_quality: u8,
}

/// Storage and file management configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory captured assets are written to
    pub output_directory: String,
    /// JSON snapshot of photos and scan logs
    pub store_path: String,
    /// Persisted batch counter
    pub batch_counter_path: String,
    /// Upload folder is this prefix followed by the batch id
    pub upload_folder_prefix: String,
}

impl Default for StockcamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                default_mode: CaptureMode::Standard,
                default_orientation: Orientation::Portrait,
                macro_strategy: MacroStrategy::UltraWideCrop,
                macro_crop_factor: 1.25,
                standard_zoom_ratio: 1.0,
                wide_zoom_ratio: 0.6,
                jpeg_quality: 92,
            },
            quality: QualityConfig {
                sharpness_threshold: 220.0,
                analysis_area_fraction: 0.17,
                max_analysis_side: 768,
                min_analysis_side: 32,
                max_output_side: 3000,
                focus_restore_delay_ms: 500,
                error_pulse_gap_ms: 250,
            },
            scan: ScanConfig {
                required_prefix: "INV".to_string(),
                min_photos_per_item: 3,
                snapshot_jpeg_quality: 95,
            },
            storage: StorageConfig {
                output_directory: "./captures".to_string(),
                store_path: "./captures/stockcam-store.json".to_string(),
                batch_counter_path: "./captures/batch.toml".to_string(),
                upload_folder_prefix: "batch-".to_string(),
            },
        }
    }
}

impl StorageConfig {
    /// Move every storage location under `root`, keeping file names
    pub fn relocate<P: AsRef<Path>>(&mut self, root: P) {
        let root = root.as_ref();
        let under = |current: &str, fallback: &str| -> String {
            let name = Path::new(current)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| fallback.to_string());
            root.join(name).to_string_lossy().into_owned()
        };
        self.store_path = under(&self.store_path, "stockcam-store.json");
        self.batch_counter_path = under(&self.batch_counter_path, "batch.toml");
        self.output_directory = root.to_string_lossy().into_owned();
    }
}

impl StockcamConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            CaptureError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        let config: StockcamConfig = toml::from_str(&contents).map_err(|e| {
            CaptureError::ConfigError(format!("Failed to parse config file: {}", e))
        })?;

        config.validate().map_err(CaptureError::ConfigError)?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CaptureError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CaptureError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            CaptureError::ConfigError(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, toml_string).map_err(|e| {
            CaptureError::ConfigError(format!("Failed to write config file: {}", e))
        })?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("stockcam.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.camera.macro_crop_factor < 1.0 {
            return Err("Macro crop factor must be at least 1.0".to_string());
        }
        if self.camera.standard_zoom_ratio <= 0.0 || self.camera.wide_zoom_ratio <= 0.0 {
            return Err("Zoom ratios must be positive".to_string());
        }
        if self.camera.jpeg_quality == 0 || self.camera.jpeg_quality > 100 {
            return Err("JPEG quality must be between 1 and 100".to_string());
        }

        if self.quality.sharpness_threshold < 0.0 {
            return Err("Sharpness threshold must not be negative".to_string());
        }
        if !(self.quality.analysis_area_fraction > 0.0 && self.quality.analysis_area_fraction <= 1.0)
        {
            return Err("Analysis area fraction must be in (0.0, 1.0]".to_string());
        }
        if self.quality.min_analysis_side < 3 {
            return Err("Minimum analysis side must be at least 3 pixels".to_string());
        }
        if self.quality.max_analysis_side < self.quality.min_analysis_side {
            return Err("Maximum analysis side is below the minimum".to_string());
        }
        if self.quality.max_output_side == 0 {
            return Err("Maximum output side must be positive".to_string());
        }

        if self.scan.required_prefix.is_empty() {
            return Err("Required scan prefix must not be empty".to_string());
        }
        if self.scan.min_photos_per_item == 0 {
            return Err("Minimum photos per item must be at least 1".to_string());
        }
        if self.scan.snapshot_jpeg_quality == 0 || self.scan.snapshot_jpeg_quality > 100 {
            return Err("Snapshot JPEG quality must be between 1 and 100".to_string());
        }

        if self.storage.output_directory.is_empty() {
            return Err("Output directory must not be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StockcamConfig::default();
        assert_eq!(config.quality.sharpness_threshold, 220.0);
        assert_eq!(config.scan.required_prefix, "INV");
        assert_eq!(config.scan.min_photos_per_item, 3);
        assert_eq!(config.camera.jpeg_quality, 92);
        assert_eq!(config.camera.macro_strategy, MacroStrategy::UltraWideCrop);
    }

    #[test]
    fn test_config_validation() {
        let config = StockcamConfig::default();
        assert!(config.validate().is_ok());

        let mut bad_crop = config.clone();
        bad_crop.camera.macro_crop_factor = 0.5;
        assert!(bad_crop.validate().is_err());

        let mut bad_fraction = StockcamConfig::default();
        bad_fraction.quality.analysis_area_fraction = 1.5;
        assert!(bad_fraction.validate().is_err());

        let mut bad_prefix = StockcamConfig::default();
        bad_prefix.scan.required_prefix.clear();
        assert!(bad_prefix.validate().is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("nested").join("stockcam.toml");

        let mut config = StockcamConfig::default();
        config.camera.macro_strategy = MacroStrategy::Telephoto;
        config.quality.sharpness_threshold = 150.0;
        assert!(config.save_to_file(&config_path).is_ok());

        let loaded = StockcamConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.camera.macro_strategy, MacroStrategy::Telephoto);
        assert_eq!(loaded.quality.sharpness_threshold, 150.0);
        assert_eq!(loaded.scan.min_photos_per_item, 3);
    }

    #[test]
    fn test_config_toml_format() {
        let config = StockcamConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[camera]"));
        assert!(toml_string.contains("[quality]"));
        assert!(toml_string.contains("[scan]"));
        assert!(toml_string.contains("[storage]"));
        assert!(toml_string.contains("macro_strategy = \"ultra_wide_crop\""));
        assert!(toml_string.contains("default_mode = \"standard\""));
    }

    #[test]
    fn test_relocate_storage() {
        let mut storage = StockcamConfig::default().storage;
        storage.relocate("/srv/station");
        assert_eq!(storage.output_directory, "/srv/station");
        assert_eq!(storage.store_path, "/srv/station/stockcam-store.json");
        assert_eq!(storage.batch_counter_path, "/srv/station/batch.toml");
        assert_eq!(storage.upload_folder_prefix, "batch-");
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = StockcamConfig::load_from_file("nonexistent_stockcam.toml");
        assert!(result.is_ok());
        assert_eq!(result.unwrap().quality.max_analysis_side, 768);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        let mut config = StockcamConfig::default();
        config.camera.jpeg_quality = 0;
        fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let result = StockcamConfig::load_from_file(&path);
        assert!(matches!(result, Err(CaptureError::ConfigError(_))));
    }
}
