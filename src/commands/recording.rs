//! Recording commands

use crate::capture::{FfmpegSurface, TestPattern};
use crate::config::RecorderConfig;
use crate::export::{EngineAssets, FfmpegEngine, Transcoder};
use crate::recorder::{CaptureSession, RecordingEvent};
use crate::utils::error::ErrorKind;
use anyhow::{bail, Context};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Options for a single recording run
#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub config: Option<PathBuf>,
    pub duration: Option<u64>,
    pub name: Option<String>,
    pub width: u32,
    pub height: u32,
    pub transcode: bool,
    pub out: Option<PathBuf>,
    pub ffmpeg: PathBuf,
    pub preset: Option<PathBuf>,
}

/// Build the effective config: file, then environment, then flags
pub fn resolve_config(options: &RecordOptions) -> anyhow::Result<RecorderConfig> {
    let config = match &options.config {
        Some(path) => RecorderConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RecorderConfig::default(),
    };

    let mut config = config.with_env_overrides();
    if let Some(duration) = options.duration {
        config.duration_secs = duration;
    }
    if let Some(out) = &options.out {
        config.download_dir = out.clone();
    }
    if let Some(name) = &options.name {
        config.suggested_name = name.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Load test pattern settings from a preset, or use the defaults
pub fn load_pattern(preset: Option<&PathBuf>) -> anyhow::Result<TestPattern> {
    let Some(path) = preset else {
        return Ok(TestPattern::default());
    };
    let preset = crate::preset::load_preset(path)?;
    let pattern = serde_json::from_value(preset.settings)
        .with_context(|| format!("preset {} does not describe a test pattern", path.display()))?;
    Ok(pattern)
}

/// Record the test pattern until the duration limit or Ctrl-C, then
/// save the artifact into the download directory
pub async fn run_record(options: RecordOptions) -> anyhow::Result<PathBuf> {
    let config = resolve_config(&options)?;
    let pattern = load_pattern(options.preset.as_ref())?;

    let surface = FfmpegSurface::new("test-pattern", options.width, options.height, pattern)
        .with_program(&options.ffmpeg);

    let transcoder = if options.transcode {
        match FfmpegEngine::new() {
            Ok(engine) => Transcoder::new(
                Arc::new(engine),
                EngineAssets {
                    program: options.ffmpeg.clone(),
                },
                config.transcode.clone(),
            ),
            Err(e) => {
                tracing::warn!("Transcoding disabled: {}", e);
                Transcoder::without_engine()
            }
        }
    } else {
        Transcoder::without_engine()
    };

    let session = CaptureSession::new(
        Arc::new(surface),
        Arc::new(transcoder),
        config.clone(),
    );
    let mut events = session.subscribe();

    session.start().await?;

    let mut interrupted = false;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    print_event(&event);
                    match event {
                        RecordingEvent::Ready { .. } => break,
                        RecordingEvent::Error { kind, message } if is_fatal(kind) => {
                            bail!("recording failed: {}", message)
                        }
                        _ => {}
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Skipped {} status events", skipped);
                }
                Err(RecvError::Closed) => bail!("recording session closed unexpectedly"),
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                println!("Stopping...");
                session.stop().await?;
            }
        }
    }

    let path = session.download(&config.suggested_name)?;
    session.dispose().await;

    println!("Saved {}", path.display());
    Ok(path)
}

/// Errors after which no artifact will follow
fn is_fatal(kind: ErrorKind) -> bool {
    !matches!(
        kind,
        ErrorKind::EngineUnavailable | ErrorKind::TranscodeFailed | ErrorKind::CaptureFailed
    )
}

fn print_event(event: &RecordingEvent) {
    match event {
        RecordingEvent::Started { mime, .. } => println!("Recording as {}", mime),
        RecordingEvent::Progress { remaining_secs } => {
            tracing::debug!("{}s remaining", remaining_secs)
        }
        RecordingEvent::Stopped { trigger } => println!("Stopped ({:?})", trigger),
        RecordingEvent::Converting { from, to } => println!("Converting {} to {}...", from, to),
        RecordingEvent::Ready {
            extension,
            used_fallback,
        } => {
            if *used_fallback {
                println!("Ready as {} (converted)", extension)
            } else {
                println!("Ready as {}", extension)
            }
        }
        RecordingEvent::Error { kind, message } => eprintln!("{}: {}", kind, message),
    }
}
