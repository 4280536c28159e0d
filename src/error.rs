use thiserror::Error;

/// Failures surfaced by the scanning orchestrator.
///
/// None of these are fatal: each one leaves the camera and the staged file in
/// a state the user can recover from with a fresh action.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied, no device, or the device never produced a frame.
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("camera frame not ready")]
    FrameNotReady,

    #[error("camera is not active")]
    CameraInactive,

    #[error("unsupported file type: {0}")]
    InvalidType(String),

    #[error("file too large: {size} bytes (maximum {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("no file staged for scanning")]
    NoFileStaged,

    #[error("text cannot be empty")]
    EmptyText,

    /// Transport failure or a `{success: false}` / non-2xx reply.
    #[error("recognition service error: {0}")]
    RecognitionService(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScanError {
    pub fn service(message: impl Into<String>) -> Self {
        ScanError::RecognitionService(message.into())
    }

    /// Input validation failures, rejected before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ScanError::InvalidType(_)
                | ScanError::TooLarge { .. }
                | ScanError::NoFileStaged
                | ScanError::EmptyText
        )
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ScanError::RecognitionService("request timed out".into())
        } else {
            ScanError::RecognitionService(format!("transport error: {err}"))
        }
    }
}

pub type ScanResult<T> = Result<T, ScanError>;
