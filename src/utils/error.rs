//! Error types and handling
//!
//! Common error types used across the application and the stable codes
//! reported to front ends.

use crate::capture::RecordingError;
use crate::config::ConfigError;
use crate::export::ExportError;
use crate::preset::PresetError;
use crate::snapshot::SnapshotError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Recording(#[from] RecordingError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Preset(#[from] PresetError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Category of a reported error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    CaptureUnsupported,
    AlreadyRecording,
    NotRecording,
    CaptureFailed,
    InvalidConfig,
    EngineUnavailable,
    TranscodeFailed,
    NothingToDownload,
    PresetError,
    SnapshotError,
    IoError,
    SerializationError,
}

impl ErrorKind {
    /// Stable code string
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::CaptureUnsupported => "CAPTURE_UNSUPPORTED",
            ErrorKind::AlreadyRecording => "ALREADY_RECORDING",
            ErrorKind::NotRecording => "NOT_RECORDING",
            ErrorKind::CaptureFailed => "CAPTURE_FAILED",
            ErrorKind::InvalidConfig => "INVALID_CONFIG",
            ErrorKind::EngineUnavailable => "ENGINE_UNAVAILABLE",
            ErrorKind::TranscodeFailed => "TRANSCODE_FAILED",
            ErrorKind::NothingToDownload => "NOTHING_TO_DOWNLOAD",
            ErrorKind::PresetError => "PRESET_ERROR",
            ErrorKind::SnapshotError => "SNAPSHOT_ERROR",
            ErrorKind::IoError => "IO_ERROR",
            ErrorKind::SerializationError => "SERIALIZATION_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl From<&ExportError> for ErrorKind {
    fn from(error: &ExportError) -> Self {
        match error {
            ExportError::Io(_) => ErrorKind::IoError,
            ExportError::EngineUnavailable(_) => ErrorKind::EngineUnavailable,
            ExportError::TranscodeFailed(_) => ErrorKind::TranscodeFailed,
            ExportError::NothingToDownload => ErrorKind::NothingToDownload,
        }
    }
}

impl From<&RecordingError> for ErrorKind {
    fn from(error: &RecordingError) -> Self {
        match error {
            RecordingError::CaptureUnsupported(_) => ErrorKind::CaptureUnsupported,
            RecordingError::AlreadyRecording => ErrorKind::AlreadyRecording,
            RecordingError::NotRecording => ErrorKind::NotRecording,
            RecordingError::CaptureError(_) => ErrorKind::CaptureFailed,
            RecordingError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            RecordingError::Export(e) => ErrorKind::from(e),
            RecordingError::Io(_) => ErrorKind::IoError,
        }
    }
}

impl From<&AppError> for ErrorKind {
    fn from(error: &AppError) -> Self {
        match error {
            AppError::Recording(e) => ErrorKind::from(e),
            AppError::Export(e) => ErrorKind::from(e),
            AppError::Config(ConfigError::Json(_)) => ErrorKind::SerializationError,
            AppError::Config(_) => ErrorKind::InvalidConfig,
            AppError::Preset(_) => ErrorKind::PresetError,
            AppError::Snapshot(_) => ErrorKind::SnapshotError,
            AppError::Io(_) => ErrorKind::IoError,
            AppError::Serialization(_) => ErrorKind::SerializationError,
        }
    }
}

/// Error response for front ends
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        ErrorResponse {
            code: ErrorKind::from(&error).code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
