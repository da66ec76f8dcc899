use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("Camera initialization error: {0}")]
    InitializationError(String),
    #[error("Permission denied error: {0}")]
    PermissionDenied(String),
    #[error("Capture error: {0}")]
    CaptureError(String),
    #[error("Session configuration error: {0}")]
    ConfigurationError(String),
    #[error("Image processing error: {0}")]
    ProcessingError(String),
    #[error("Media store error: {0}")]
    MediaStoreError(String),
    #[error("Recording error: {0}")]
    RecordingError(String),
    #[error("Preferences error: {0}")]
    PreferencesError(String),
    #[error("Invalid session state: {0}")]
    InvalidState(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for CameraError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            CameraError::PermissionDenied(e.to_string())
        } else {
            CameraError::IoError(e.to_string())
        }
    }
}

impl From<image::ImageError> for CameraError {
    fn from(e: image::ImageError) -> Self {
        CameraError::ProcessingError(e.to_string())
    }
}
