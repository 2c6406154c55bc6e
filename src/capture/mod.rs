//! Capture sources
//!
//! This module provides the surface/stream traits, frame renderers and
//! an FFmpeg-backed surface implementation.

pub mod ffmpeg_stream;
pub mod pattern;
pub mod traits;

pub use ffmpeg_stream::FfmpegSurface;
pub use pattern::{FrameRenderer, TestPattern};
pub use traits::{
    CaptureStream, CaptureSurface, ChunkSender, FormatSupport, RecordingError, RecordingResult,
    StreamRequest, SurfaceInfo,
};
