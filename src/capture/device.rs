use crate::binder::CaptureRequest;
use crate::errors::CaptureError;
use crate::types::ImageHandle;
use async_trait::async_trait;

/// Camera hardware behind the capture pipeline
///
/// Implementations save frames themselves and hand back where they went.
/// Only [`crate::capture::CaptureSession`] locks and unlocks exposure.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn lock_exposure(&self) -> Result<(), CaptureError>;

    /// Capture one still with `request` and save it as `name`
    async fn trigger_capture(
        &self,
        request: &CaptureRequest,
        name: &str,
    ) -> Result<ImageHandle, CaptureError>;

    async fn unlock_exposure(&self) -> Result<(), CaptureError>;

    /// Save the current preview frame as `name`
    async fn snapshot_preview(&self, name: &str) -> Result<ImageHandle, CaptureError>;
}
