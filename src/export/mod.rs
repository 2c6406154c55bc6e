//! Export module
//!
//! This module turns a finished recording into a downloadable artifact:
//! optional re-encoding into the delivery format, then publishing.

pub mod engine;
pub mod publisher;
pub mod transcode;
pub mod types;

pub use engine::{EngineAssets, FfmpegEngine, TranscodeEngine};
pub use publisher::{ArtifactHandle, ArtifactPublisher};
pub use transcode::{TranscodeOutcome, Transcoder};
pub use types::{ExportError, ExportFormat, ExportResult, TranscodeResult, TranscodeSettings};
