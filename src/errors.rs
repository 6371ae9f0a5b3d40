use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureError {
    InitializationError(String),
    LensQueryError(String),
    DeviceError(String),
    ExposureError(String),
    ProcessingError(String),
    StorageError(String),
    NotificationError(String),
    UploadError(String),
    ConfigError(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CaptureError::InitializationError(msg) => write!(f, "Initialization error: {}", msg),
            CaptureError::LensQueryError(msg) => write!(f, "Lens query error: {}", msg),
            CaptureError::DeviceError(msg) => write!(f, "Capture device error: {}", msg),
            CaptureError::ExposureError(msg) => write!(f, "Exposure control error: {}", msg),
            CaptureError::ProcessingError(msg) => write!(f, "Image processing error: {}", msg),
            CaptureError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            CaptureError::NotificationError(msg) => write!(f, "Notification error: {}", msg),
            CaptureError::UploadError(msg) => write!(f, "Upload error: {}", msg),
            CaptureError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for CaptureError {}

impl From<image::ImageError> for CaptureError {
    fn from(e: image::ImageError) -> Self {
        CaptureError::ProcessingError(e.to_string())
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(e: std::io::Error) -> Self {
        CaptureError::StorageError(e.to_string())
    }
}

impl From<tokio::task::JoinError> for CaptureError {
    fn from(e: tokio::task::JoinError) -> Self {
        CaptureError::ProcessingError(format!("Task join error: {}", e))
    }
}
