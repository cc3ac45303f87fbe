//! Error types and handling
//!
//! Error taxonomy shared by the capture and transcode pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures while acquiring or reading from a capture device
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Device error: {0}")]
    Unknown(String),
}

/// Failures raised by the transcode engine or its virtual filesystem
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscodeError {
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Seek offset of {offset_ms}ms is beyond the end of the recording")]
    SeekBeyondDuration { offset_ms: u64 },

    #[error("Engine failure: {0}")]
    EngineFailure(String),

    #[error("No such file in engine filesystem: {0}")]
    NotFound(String),
}

impl From<std::io::Error> for TranscodeError {
    fn from(error: std::io::Error) -> Self {
        TranscodeError::EngineFailure(error.to_string())
    }
}

/// Registry misuse: revoking or resolving a handle that is not live
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Handle is not live: {0}")]
    NotLive(String),
}

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Event '{event}' is not valid in state '{state}'")]
    InvalidState {
        state: &'static str,
        event: &'static str,
    },

    #[error("Resource leak: {0}")]
    ResourceLeak(String),

    #[error("Upload error: {0}")]
    Upload(String),
}

impl AppError {
    /// Whether this error ends the current session
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AppError::InvalidState { .. })
    }
}

/// Error payload shown to the user as a status message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(error: &AppError) -> Self {
        let code = match error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Device(DeviceError::PermissionDenied(_)) => "PERMISSION_DENIED",
            AppError::Device(DeviceError::NotSupported(_)) => "NOT_SUPPORTED",
            AppError::Device(DeviceError::Unknown(_)) => "DEVICE_ERROR",
            AppError::Transcode(TranscodeError::UnsupportedInput(_)) => "UNSUPPORTED_INPUT",
            AppError::Transcode(TranscodeError::SeekBeyondDuration { .. }) => {
                "SEEK_BEYOND_DURATION"
            }
            AppError::Transcode(TranscodeError::EngineFailure(_)) => "ENGINE_FAILURE",
            AppError::Transcode(TranscodeError::NotFound(_)) => "ENGINE_FILE_NOT_FOUND",
            AppError::Registry(_) => "REGISTRY_ERROR",
            AppError::InvalidState { .. } => "INVALID_STATE",
            AppError::ResourceLeak(_) => "RESOURCE_LEAK",
            AppError::Upload(_) => "UPLOAD_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        ErrorResponse::from(&error)
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
