/// Capture quality gating
///
/// Provides the focus-quality check run on every captured frame before it is
/// accepted: a Sobel gradient-magnitude variance over a centered window.
pub mod sharpness;

pub use sharpness::{evaluate, SharpnessEvaluator, SharpnessReport, DEFAULT_SHARPNESS_THRESHOLD};
