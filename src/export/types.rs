//! Export types and configuration
//!
//! This module defines the types used for delivery format selection,
//! transcoding configuration and error handling.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Container formats a recording can be delivered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Mp4,
    Webm,
}

impl ExportFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Mp4 => "mp4",
            ExportFormat::Webm => "webm",
        }
    }

    /// Get the FFmpeg video codec for this format
    pub fn video_codec(&self) -> &'static str {
        match self {
            ExportFormat::Mp4 => "libx264",
            ExportFormat::Webm => "libvpx-vp9",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Quality/speed trade-off for re-encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeSettings {
    /// Constant rate factor; lower values = higher quality, larger files
    #[serde(default = "default_crf")]
    pub crf: u8,
    /// Encoder speed preset
    #[serde(default = "default_preset")]
    pub preset: String,
    /// Give up on the engine after this many seconds (None = wait forever)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: Option<u64>,
}

fn default_crf() -> u8 {
    22
}

fn default_preset() -> String {
    "fast".to_string()
}

fn default_timeout_secs() -> Option<u64> {
    Some(300)
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self {
            crf: default_crf(),
            preset: default_preset(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Outcome of the transcode step for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeResult {
    /// Final payload
    pub payload: Vec<u8>,
    /// File extension matching the payload
    pub extension: String,
    /// Whether the payload was re-encoded by the transcoding engine
    pub used_fallback: bool,
}

impl TranscodeResult {
    /// Keep the natively recorded payload
    pub fn native(payload: Vec<u8>, format: ExportFormat) -> Self {
        Self {
            payload,
            extension: format.extension().to_string(),
            used_fallback: false,
        }
    }

    /// Payload re-encoded into `format`
    pub fn converted(payload: Vec<u8>, format: ExportFormat) -> Self {
        Self {
            payload,
            extension: format.extension().to_string(),
            used_fallback: true,
        }
    }
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transcoding engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Transcoding failed: {0}")]
    TranscodeFailed(String),

    #[error("Nothing to download")]
    NothingToDownload,
}

impl From<ExportError> for String {
    fn from(e: ExportError) -> String {
        e.to_string()
    }
}

/// Result type for export operations
pub type ExportResult<T> = Result<T, ExportError>;
