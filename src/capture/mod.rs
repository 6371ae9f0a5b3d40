/// Still capture pipeline
///
/// The device trait, saved-frame post-processing and the per-attempt
/// session that locks exposure, captures, evaluates sharpness and keeps or
/// discards the frame.
pub mod device;
pub mod postprocess;
pub mod session;

pub use device::CaptureDevice;
pub use postprocess::PostProcessOptions;
pub use session::{
    CaptureJob, CaptureOutcome, CaptureSession, CaptureState, InFlightCounter, InFlightTicket,
};
