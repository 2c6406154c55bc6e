//! Capture trait definitions
//!
//! Platform-agnostic traits for renderable surfaces and the live streams
//! they produce while a recording is in progress.

use crate::export::ExportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur during recording
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Capture unsupported: {0}")]
    CaptureUnsupported(String),

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,

    #[error("Capture error: {0}")]
    CaptureError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for recording operations
pub type RecordingResult<T> = Result<T, RecordingError>;

/// Sender half used by a capture stream to deliver encoded fragments
pub type ChunkSender = mpsc::UnboundedSender<Vec<u8>>;

/// Information about a renderable surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceInfo {
    /// Unique surface ID
    pub id: String,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,
}

/// Parameters for opening a live stream on a surface
#[derive(Debug, Clone)]
pub struct StreamRequest {
    /// Sampling rate in frames per second
    pub fps: u32,

    /// Container/codec identifier negotiated for this session
    pub mime: String,

    /// Target video bitrate
    pub video_bits_per_second: u64,

    /// How often buffered output is handed over as a chunk
    pub timeslice: Duration,
}

/// Platform capability query for recording formats
pub trait FormatSupport {
    /// Whether the given MIME identifier can be recorded natively
    fn is_format_supported(&self, mime: &str) -> bool;
}

/// A surface that can be captured as a live binary stream
///
/// Implementations hand every encoded fragment to the `ChunkSender` in
/// emission order. All clones of the sender must be dropped by the time
/// [`CaptureStream::stop`] returns.
#[async_trait]
pub trait CaptureSurface: FormatSupport + Send + Sync {
    /// Describe the surface
    fn info(&self) -> SurfaceInfo;

    /// Acquire the capture capability and start emitting chunks
    async fn open_stream(
        &self,
        request: &StreamRequest,
        chunks: ChunkSender,
    ) -> RecordingResult<Box<dyn CaptureStream>>;
}

/// A live stream acquired from a [`CaptureSurface`]
#[async_trait]
pub trait CaptureStream: Send {
    /// Flush any buffered output and release the underlying resources
    async fn stop(&mut self) -> RecordingResult<()>;
}
