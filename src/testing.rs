//! Scripted capture surfaces and transcoding engines for tests.
//!
//! These stand in for a real renderer and a real `ffmpeg`, so session
//! behavior can be exercised deterministically under a paused clock.

use crate::capture::traits::{
    CaptureStream, CaptureSurface, ChunkSender, FormatSupport, RecordingError, RecordingResult,
    StreamRequest, SurfaceInfo,
};
use crate::export::engine::{EngineAssets, TranscodeEngine};
use crate::export::types::{ExportError, ExportResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Surface that emits a fixed script of chunks.
pub struct ScriptedSurface {
    supported: Vec<String>,
    interval: Duration,
    chunks: Vec<Vec<u8>>,
    repeating: Option<Vec<u8>>,
    tail: Option<Vec<u8>>,
    available: bool,
    failing_release: bool,
    open_count: Arc<AtomicUsize>,
    stop_count: Arc<AtomicUsize>,
    last_request: Mutex<Option<StreamRequest>>,
}

impl ScriptedSurface {
    /// Create a surface that natively records the given MIME identifiers.
    pub fn new(supported: &[&str]) -> Self {
        Self {
            supported: supported.iter().map(|mime| mime.to_string()).collect(),
            interval: Duration::from_millis(100),
            chunks: Vec::new(),
            repeating: None,
            tail: None,
            available: true,
            failing_release: false,
            open_count: Arc::new(AtomicUsize::new(0)),
            stop_count: Arc::new(AtomicUsize::new(0)),
            last_request: Mutex::new(None),
        }
    }

    /// Emit `chunks` once, one every `interval`.
    pub fn with_chunks(mut self, interval: Duration, chunks: Vec<Vec<u8>>) -> Self {
        self.interval = interval;
        self.chunks = chunks;
        self
    }

    /// Emit `chunk` every `interval` until stopped.
    pub fn with_repeating(mut self, interval: Duration, chunk: Vec<u8>) -> Self {
        self.interval = interval;
        self.repeating = Some(chunk);
        self
    }

    /// Flush `chunk` while the stream is being released.
    pub fn with_tail(mut self, chunk: Vec<u8>) -> Self {
        self.tail = Some(chunk);
        self
    }

    /// Refuse to open any stream.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Report an error when the stream is released.
    pub fn failing_release(mut self) -> Self {
        self.failing_release = true;
        self
    }

    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stop_count.load(Ordering::SeqCst)
    }

    /// Request passed to the most recent `open_stream`.
    pub fn last_request(&self) -> Option<StreamRequest> {
        self.last_request.lock().clone()
    }
}

impl FormatSupport for ScriptedSurface {
    fn is_format_supported(&self, mime: &str) -> bool {
        self.supported.iter().any(|supported| supported == mime)
    }
}

#[async_trait]
impl CaptureSurface for ScriptedSurface {
    fn info(&self) -> SurfaceInfo {
        SurfaceInfo {
            id: "scripted".to_string(),
            width: 320,
            height: 240,
        }
    }

    async fn open_stream(
        &self,
        request: &StreamRequest,
        chunks: ChunkSender,
    ) -> RecordingResult<Box<dyn CaptureStream>> {
        *self.last_request.lock() = Some(request.clone());
        if !self.available {
            return Err(RecordingError::CaptureUnsupported(
                "scripted surface is unavailable".to_string(),
            ));
        }
        self.open_count.fetch_add(1, Ordering::SeqCst);

        let interval = self.interval;
        let script = self.chunks.clone();
        let repeating = self.repeating.clone();
        let emitter_tx = chunks.clone();
        let emitter = tokio::spawn(async move {
            for chunk in script {
                tokio::time::sleep(interval).await;
                if emitter_tx.send(chunk).is_err() {
                    return;
                }
            }
            if let Some(chunk) = repeating {
                loop {
                    tokio::time::sleep(interval).await;
                    if emitter_tx.send(chunk.clone()).is_err() {
                        return;
                    }
                }
            }
        });

        Ok(Box::new(ScriptedStream {
            sender: Some(chunks),
            emitter: Some(emitter),
            tail: self.tail.clone(),
            failing_release: self.failing_release,
            stop_count: self.stop_count.clone(),
        }))
    }
}

struct ScriptedStream {
    sender: Option<ChunkSender>,
    emitter: Option<JoinHandle<()>>,
    tail: Option<Vec<u8>>,
    failing_release: bool,
    stop_count: Arc<AtomicUsize>,
}

#[async_trait]
impl CaptureStream for ScriptedStream {
    async fn stop(&mut self) -> RecordingResult<()> {
        self.stop_count.fetch_add(1, Ordering::SeqCst);

        if let Some(emitter) = self.emitter.take() {
            emitter.abort();
            let _ = emitter.await;
        }
        if let (Some(sender), Some(tail)) = (self.sender.as_ref(), self.tail.take()) {
            let _ = sender.send(tail);
        }
        self.sender = None;

        if self.failing_release {
            return Err(RecordingError::CaptureError(
                "scripted release failure".to_string(),
            ));
        }
        Ok(())
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        if let Some(emitter) = self.emitter.take() {
            emitter.abort();
        }
    }
}

/// How a [`ScriptedEngine`] responds to `execute`.
#[derive(Debug, Clone)]
pub enum EngineBehavior {
    /// Write these bytes as the output file
    Succeed(Vec<u8>),
    /// Fail with this message
    Fail(String),
    /// Never finish
    Hang,
}

/// In-memory transcoding engine.
pub struct ScriptedEngine {
    behavior: EngineBehavior,
    files: Mutex<HashMap<String, Vec<u8>>>,
    inputs: Mutex<Vec<Vec<u8>>>,
    load_count: AtomicUsize,
    execute_count: AtomicUsize,
    failing_loads: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new(behavior: EngineBehavior) -> Self {
        Self {
            behavior,
            files: Mutex::new(HashMap::new()),
            inputs: Mutex::new(Vec::new()),
            load_count: AtomicUsize::new(0),
            execute_count: AtomicUsize::new(0),
            failing_loads: AtomicUsize::new(0),
        }
    }

    /// Make the next `n` loads fail.
    pub fn fail_next_loads(&self, n: usize) {
        self.failing_loads.store(n, Ordering::SeqCst);
    }

    pub fn load_count(&self) -> usize {
        self.load_count.load(Ordering::SeqCst)
    }

    pub fn execute_count(&self) -> usize {
        self.execute_count.load(Ordering::SeqCst)
    }

    /// Every input written so far, in order.
    pub fn inputs(&self) -> Vec<Vec<u8>> {
        self.inputs.lock().clone()
    }
}

#[async_trait]
impl TranscodeEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn load(&self, _assets: &EngineAssets) -> ExportResult<()> {
        self.load_count.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_loads.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_loads.store(failing - 1, Ordering::SeqCst);
            return Err(ExportError::EngineUnavailable(
                "scripted load failure".to_string(),
            ));
        }
        Ok(())
    }

    async fn write_input(&self, name: &str, bytes: &[u8]) -> ExportResult<()> {
        self.inputs.lock().push(bytes.to_vec());
        self.files.lock().insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn execute(&self, args: &[String]) -> ExportResult<()> {
        self.execute_count.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            EngineBehavior::Succeed(output) => {
                let name = args.last().ok_or_else(|| {
                    ExportError::TranscodeFailed("no output file given".to_string())
                })?;
                self.files.lock().insert(name.clone(), output.clone());
                Ok(())
            }
            EngineBehavior::Fail(message) => Err(ExportError::TranscodeFailed(message.clone())),
            EngineBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }

    async fn read_output(&self, name: &str) -> ExportResult<Vec<u8>> {
        self.files
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| ExportError::TranscodeFailed(format!("missing output {}", name)))
    }

    async fn remove(&self, name: &str) -> ExportResult<()> {
        self.files.lock().remove(name);
        Ok(())
    }
}
