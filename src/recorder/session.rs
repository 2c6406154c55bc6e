//! Capture session
//!
//! Owns one surface's recording lifecycle: negotiates a format, opens the
//! capture stream, accumulates chunks, runs the duration watchdog and, on
//! stop, hands the assembled buffer to the transcoder and publisher.

use super::negotiator::select_format;
use super::state::{ChunkBuffer, RecordingState, SessionInfo, StopTrigger};
use super::watchdog::Watchdog;
use crate::capture::traits::{
    CaptureStream, CaptureSurface, RecordingError, RecordingResult, StreamRequest,
};
use crate::config::RecorderConfig;
use crate::export::{ArtifactHandle, ArtifactPublisher, ExportError, ExportFormat, Transcoder};
use crate::utils::error::ErrorKind;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

/// Events emitted during recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum RecordingEvent {
    /// Recording started
    Started { session_id: Uuid, mime: String },
    /// Whole seconds left before auto-stop
    Progress { remaining_secs: u64 },
    /// Capture stream released
    Stopped { trigger: StopTrigger },
    /// Re-encoding into the delivery format
    Converting { from: ExportFormat, to: ExportFormat },
    /// Artifact published and ready for download
    Ready { extension: String, used_fallback: bool },
    /// Error occurred
    Error { kind: ErrorKind, message: String },
}

/// What a toggle did
#[derive(Debug, Clone)]
pub enum ToggleOutcome {
    Started(SessionInfo),
    Stopped(Option<ArtifactHandle>),
}

/// A recording that is currently running
struct ActiveCapture {
    info: SessionInfo,
    delivery: ExportFormat,
    stream: Box<dyn CaptureStream>,
    pump: JoinHandle<ChunkBuffer>,
    watchdog: Watchdog,
}

struct Shared {
    surface: Arc<dyn CaptureSurface>,
    transcoder: Arc<Transcoder>,
    publisher: Mutex<ArtifactPublisher>,
    config: RwLock<RecorderConfig>,
    state: RwLock<RecordingState>,
    active: Mutex<Option<ActiveCapture>>,
    last_session: RwLock<Option<SessionInfo>>,
    /// Serializes start against the Recording -> Stopping transition
    lifecycle: tokio::sync::Mutex<()>,
    event_tx: broadcast::Sender<RecordingEvent>,
}

/// Recording lifecycle for one capture surface
pub struct CaptureSession {
    shared: Arc<Shared>,
}

impl CaptureSession {
    /// Create a new session for `surface`
    ///
    /// Downloads go to the configured download directory.
    pub fn new(
        surface: Arc<dyn CaptureSurface>,
        transcoder: Arc<Transcoder>,
        config: RecorderConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let publisher = ArtifactPublisher::new(&config.download_dir);
        tracing::info!("Created capture session for surface {}", surface.info().id);

        Self {
            shared: Arc::new(Shared {
                surface,
                transcoder,
                publisher: Mutex::new(publisher),
                config: RwLock::new(config),
                state: RwLock::new(RecordingState::Idle),
                active: Mutex::new(None),
                last_session: RwLock::new(None),
                lifecycle: tokio::sync::Mutex::new(()),
                event_tx,
            }),
        }
    }

    /// Get the current recording state
    pub fn state(&self) -> RecordingState {
        *self.shared.state.read()
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Current configuration
    pub fn config(&self) -> RecorderConfig {
        self.shared.config.read().clone()
    }

    /// Change the duration limit for the next recording
    ///
    /// A recording already in progress keeps the limit it started with.
    pub fn set_duration(&self, secs: u64) -> RecordingResult<()> {
        if secs == 0 {
            return Err(RecordingError::InvalidConfig(
                "duration must be at least 1 second".to_string(),
            ));
        }
        self.shared.config.write().duration_secs = secs;
        tracing::debug!("Duration limit set to {}s", secs);
        Ok(())
    }

    /// Active session, or the last one that ran
    pub fn session_info(&self) -> Option<SessionInfo> {
        self.shared.last_session.read().clone()
    }

    /// Handle of the last published artifact
    pub fn current_artifact(&self) -> Option<ArtifactHandle> {
        self.shared.publisher.lock().current().cloned()
    }

    /// Whether a duration watchdog is currently counting down
    pub fn is_watchdog_active(&self) -> bool {
        self.shared
            .active
            .lock()
            .as_ref()
            .map_or(false, |active| active.watchdog.is_active())
    }

    /// Start recording
    pub async fn start(&self) -> RecordingResult<SessionInfo> {
        let shared = &self.shared;
        let _guard = shared
            .lifecycle
            .try_lock()
            .map_err(|_| RecordingError::AlreadyRecording)?;

        let current_state = *shared.state.read();
        if current_state != RecordingState::Idle {
            return Err(RecordingError::AlreadyRecording);
        }

        let config = shared.config.read().clone();
        config
            .validate()
            .map_err(|e| RecordingError::InvalidConfig(e.to_string()))?;

        let format = select_format(
            &config.format_preferences,
            shared.surface.as_ref(),
            config.delivery_format,
        );
        let request = StreamRequest {
            fps: config.fps,
            mime: format.mime.clone(),
            video_bits_per_second: config.video_bits_per_second,
            timeslice: config.timeslice(),
        };

        tracing::info!("Starting recording as {} at {}fps", request.mime, request.fps);

        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let stream = match shared.surface.open_stream(&request, chunk_tx).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!("Failed to start capture: {}", e);
                shared.emit_error(ErrorKind::from(&e), e.to_string());
                return Err(e);
            }
        };

        let info = SessionInfo::new(config.duration_secs, format);
        let pump = tokio::spawn(pump_chunks(chunk_rx));

        let weak = Arc::downgrade(shared);
        let watchdog = Watchdog::spawn(
            Instant::now(),
            config.duration(),
            config.tick(),
            shared.event_tx.clone(),
            move || async move {
                if let Some(shared) = weak.upgrade() {
                    if let Err(e) = shared.stop(StopTrigger::DurationElapsed).await {
                        tracing::error!("Automatic stop failed: {}", e);
                    }
                }
            },
        );

        *shared.active.lock() = Some(ActiveCapture {
            info: info.clone(),
            delivery: config.delivery_format,
            stream,
            pump,
            watchdog,
        });
        *shared.last_session.write() = Some(info.clone());
        *shared.state.write() = RecordingState::Recording;

        let _ = shared.event_tx.send(RecordingEvent::Started {
            session_id: info.id,
            mime: info.format.mime.clone(),
        });

        tracing::info!("Recording {} started", info.id);
        Ok(info)
    }

    /// Stop recording and publish the result
    ///
    /// Returns `None` when there was nothing to stop.
    pub async fn stop(&self) -> RecordingResult<Option<ArtifactHandle>> {
        self.shared.stop(StopTrigger::Manual).await
    }

    /// Start when idle, stop when recording
    pub async fn toggle(&self) -> RecordingResult<ToggleOutcome> {
        if self.state() == RecordingState::Recording {
            self.stop().await.map(ToggleOutcome::Stopped)
        } else {
            self.start().await.map(ToggleOutcome::Started)
        }
    }

    /// Save the last published artifact into the download directory
    pub fn download(&self, suggested_name: &str) -> Result<PathBuf, ExportError> {
        let result = self.shared.publisher.lock().download(suggested_name);
        if let Err(e) = &result {
            tracing::warn!("Download failed: {}", e);
            self.shared.emit_error(ErrorKind::from(e), e.to_string());
        }
        result
    }

    /// Stop any recording and release the published artifact
    pub async fn dispose(self) {
        if let Err(e) = self.shared.stop(StopTrigger::Disposed).await {
            tracing::warn!("Failed to stop recording on dispose: {}", e);
        }
        self.shared.publisher.lock().release();
        tracing::info!("Capture session for {} disposed", self.shared.surface.info().id);
    }
}

impl Shared {
    fn emit_error(&self, kind: ErrorKind, message: String) {
        let _ = self.event_tx.send(RecordingEvent::Error { kind, message });
    }

    async fn stop(&self, trigger: StopTrigger) -> RecordingResult<Option<ArtifactHandle>> {
        let active = {
            let _guard = self.lifecycle.lock().await;
            let mut state = self.state.write();
            if *state != RecordingState::Recording {
                tracing::debug!("Stop ignored in state {:?}", *state);
                return Ok(None);
            }
            *state = RecordingState::Stopping;
            self.active.lock().take()
        };

        let Some(active) = active else {
            *self.state.write() = RecordingState::Idle;
            return Ok(None);
        };

        let ActiveCapture {
            info,
            delivery,
            mut stream,
            pump,
            watchdog,
        } = active;
        watchdog.cancel();
        drop(watchdog);

        tracing::info!("Stopping recording {} ({:?})", info.id, trigger);

        // Release the capture capability before touching the chunks
        if let Err(e) = stream.stop().await {
            tracing::warn!("Capture stream did not release cleanly: {}", e);
            self.emit_error(ErrorKind::from(&e), e.to_string());
        }
        drop(stream);
        let _ = self.event_tx.send(RecordingEvent::Stopped { trigger });

        *self.state.write() = RecordingState::Finalizing;

        let chunks = match pump.await {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::error!("Chunk pump failed: {}", e);
                ChunkBuffer::default()
            }
        };
        tracing::info!(
            "Assembled {} chunks ({} bytes)",
            chunks.len(),
            chunks.total_bytes()
        );
        if chunks.is_empty() {
            tracing::warn!("Recording {} produced no data", info.id);
        }

        let native = info.format.container();
        if native != delivery && self.transcoder.has_engine() {
            let _ = self.event_tx.send(RecordingEvent::Converting {
                from: native,
                to: delivery,
            });
        }

        let outcome = self
            .transcoder
            .convert(chunks.concat(), native, delivery)
            .await;
        if let Some(e) = &outcome.error {
            self.emit_error(ErrorKind::from(e), e.to_string());
        }

        let published = self.publisher.lock().publish(&outcome.result);
        *self.state.write() = RecordingState::Idle;

        match published {
            Ok(handle) => {
                let _ = self.event_tx.send(RecordingEvent::Ready {
                    extension: handle.extension.clone(),
                    used_fallback: outcome.result.used_fallback,
                });
                tracing::info!("Recording {} ready as {}", info.id, handle.extension);
                Ok(Some(handle))
            }
            Err(e) => {
                tracing::error!("Failed to publish recording {}: {}", info.id, e);
                self.emit_error(ErrorKind::from(&e), e.to_string());
                Err(e.into())
            }
        }
    }
}

/// Collect chunks until every sender is gone
async fn pump_chunks(mut chunk_rx: mpsc::UnboundedReceiver<Vec<u8>>) -> ChunkBuffer {
    let mut buffer = ChunkBuffer::default();
    while let Some(chunk) = chunk_rx.recv().await {
        let len = chunk.len();
        if buffer.push(chunk) {
            tracing::trace!("Received chunk of {} bytes", len);
        } else {
            tracing::trace!("Discarded empty chunk");
        }
    }
    buffer
}
