//! stockcam: sharpness-gated inventory photo capture
//!
//! An operator scans a QR code for an inventory item, then captures a series
//! of photos through one of three lens modes. Every capture is post-processed
//! and scored for focus; blurry frames are deleted on the spot so the
//! operator can retake them without rescanning.
//!
//! # Features
//! - Physical lens discovery and macro binding (ultra-wide crop or telephoto)
//! - Sobel gradient-variance sharpness gate
//! - Scan acceptance rules (prefix, duplicates, minimum photos per item)
//! - Actor-based engine with a live photo count per item
//! - Batch numbering and batch upload to an image host
//!
//! Camera hardware, persistence, operator feedback and network services sit
//! behind traits; [`testing`] provides simulated versions of all of them.
//!
//! # Usage
//! ```rust,ignore
//! use stockcam::engine::{CaptureEngine, EngineParts};
//!
//! let engine = CaptureEngine::start(&config, &provider, parts);
//! engine.scan("INV0042").await?;
//! let pending = engine.trigger_capture().await?;
//! println!("{:?}", pending.outcome().await);
//! ```
pub mod batch;
pub mod binder;
pub mod capture;
pub mod config;
pub mod engine;
pub mod errors;
pub mod feedback;
pub mod invariant_ppt;
pub mod lens;
pub mod quality;
pub mod scan;
pub mod store;
pub mod types;
pub mod upload;

// Testing utilities - simulated hardware for offline testing
pub mod testing;

// Re-exports for convenience
pub use binder::{CaptureRequest, ModeBinder};
pub use capture::{CaptureDevice, CaptureOutcome, CaptureSession};
pub use config::StockcamConfig;
pub use engine::{CaptureEngine, EngineParts, EngineStatus, PendingCapture, ShutterRejection};
pub use errors::CaptureError;
pub use quality::{SharpnessEvaluator, SharpnessReport};
pub use scan::{ScanDecision, ScanGate, ScanSession};
pub use types::{CaptureMode, ImageHandle, Orientation};

/// Initialize logging for the capture engine
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "stockcam=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        default_sharpness_threshold: quality::DEFAULT_SHARPNESS_THRESHOLD,
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub default_sharpness_threshold: f64,
}
