//! Surface Recorder - time-bounded video capture of live rendering surfaces.
//!
//! This is the main library crate. It provides the capture pipeline
//! (codec negotiation, session state machine, duration watchdog), the
//! export side (transcode fallback, artifact publishing) and the
//! presets and snapshots that go with a visual sketch.

pub mod capture;
pub mod commands;
pub mod config;
pub mod export;
pub mod preset;
pub mod recorder;
pub mod snapshot;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod utils;

pub use capture::{CaptureSurface, FfmpegSurface, FrameRenderer, RecordingError, TestPattern};
pub use config::RecorderConfig;
pub use export::{ArtifactHandle, ArtifactPublisher, ExportFormat, FfmpegEngine, Transcoder};
pub use recorder::{CaptureSession, RecordingEvent, RecordingState};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging
///
/// Honors `RUST_LOG`. Calling this more than once is harmless.
pub fn init_tracing() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "surface_recorder=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();

    if result.is_ok() {
        tracing::info!("Starting Surface Recorder v{}", env!("CARGO_PKG_VERSION"));
    }
}
