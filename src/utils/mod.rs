//! Shared utilities

pub mod error;

pub use error::{
    AppError, AppResult, DeviceError, ErrorResponse, RegistryError, TranscodeError,
};
