//! Testing utilities for stockcam
//!
//! Synthetic frames, a simulated camera and recording collaborators so the
//! whole pipeline runs without hardware or network.

pub mod recording;
pub mod simulated;
pub mod synthetic_data;

pub use recording::{MemoryImageHost, RecordingNotifier, RecordingSink, SinkEvent};
pub use simulated::{FrameScript, SimulatedCaptureDevice, StaticCapabilityProvider};
pub use synthetic_data::{blurry_frame, encode_frame, sharp_frame, textured_frame};
