//! FFmpeg-backed capture surface
//!
//! Renders frames from a [`FrameRenderer`] at the requested rate, pipes
//! them into an `ffmpeg` process as raw RGBA and forwards the encoded
//! stream from its stdout as chunks, one per timeslice.

use super::pattern::{frame_len, FrameRenderer};
use super::traits::{
    CaptureStream, CaptureSurface, ChunkSender, FormatSupport, RecordingError, RecordingResult,
    StreamRequest, SurfaceInfo,
};
use crate::export::ExportFormat;
use crate::recorder::negotiator::CaptureFormat;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Capture surface that encodes rendered frames with FFmpeg
pub struct FfmpegSurface {
    /// Surface identifier
    id: String,

    /// Frame width in pixels
    width: u32,

    /// Frame height in pixels
    height: u32,

    /// FFmpeg executable
    program: PathBuf,

    /// Renderer shared with the frame feeder task
    renderer: Arc<Mutex<Box<dyn FrameRenderer>>>,

    /// Whether fragmented MP4 can be produced natively
    fragmented_mp4: bool,
}

impl FfmpegSurface {
    /// Create a new surface of the given size
    pub fn new(
        id: impl Into<String>,
        width: u32,
        height: u32,
        renderer: impl FrameRenderer,
    ) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            program: PathBuf::from("ffmpeg"),
            renderer: Arc::new(Mutex::new(Box::new(renderer))),
            fragmented_mp4: false,
        }
    }

    /// Use a specific FFmpeg executable
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Allow MP4 to be recorded natively as fragmented MP4
    pub fn with_fragmented_mp4(mut self, enabled: bool) -> Self {
        self.fragmented_mp4 = enabled;
        self
    }

    /// Build the FFmpeg arguments for a stream request
    fn encoder_args(&self, request: &StreamRequest, format: &CaptureFormat) -> Vec<String> {
        let mut args = vec![
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgba".to_string(),
            "-s".to_string(),
            format!("{}x{}", self.width, self.height),
            "-r".to_string(),
            request.fps.to_string(),
            "-i".to_string(),
            "-".to_string(), // stdin for rendered frames
        ];

        match format.container {
            ExportFormat::Webm => {
                let codec = match format.codec.as_deref() {
                    Some("vp9") => "libvpx-vp9",
                    _ => "libvpx",
                };
                args.extend([
                    "-c:v".to_string(),
                    codec.to_string(),
                    "-b:v".to_string(),
                    request.video_bits_per_second.to_string(),
                    "-deadline".to_string(),
                    "realtime".to_string(),
                    "-cpu-used".to_string(),
                    "8".to_string(),
                    "-f".to_string(),
                    "webm".to_string(),
                ]);
            }
            ExportFormat::Mp4 => {
                args.extend([
                    "-c:v".to_string(),
                    "libx264".to_string(),
                    "-preset".to_string(),
                    "ultrafast".to_string(),
                    "-pix_fmt".to_string(),
                    "yuv420p".to_string(),
                    "-b:v".to_string(),
                    request.video_bits_per_second.to_string(),
                    "-movflags".to_string(),
                    "frag_keyframe+empty_moov+default_base_moof".to_string(),
                    "-f".to_string(),
                    "mp4".to_string(),
                ]);
            }
        }

        args.push("pipe:1".to_string());
        args
    }
}

impl FormatSupport for FfmpegSurface {
    fn is_format_supported(&self, mime: &str) -> bool {
        let Some(format) = CaptureFormat::parse(mime) else {
            return false;
        };

        match format.container {
            ExportFormat::Webm => {
                matches!(format.codec.as_deref(), None | Some("vp8") | Some("vp9"))
            }
            ExportFormat::Mp4 => {
                self.fragmented_mp4
                    && format
                        .codec
                        .as_deref()
                        .map_or(true, |codec| codec.starts_with("avc1") || codec == "h264")
            }
        }
    }
}

#[async_trait]
impl CaptureSurface for FfmpegSurface {
    fn info(&self) -> SurfaceInfo {
        SurfaceInfo {
            id: self.id.clone(),
            width: self.width,
            height: self.height,
        }
    }

    async fn open_stream(
        &self,
        request: &StreamRequest,
        chunks: ChunkSender,
    ) -> RecordingResult<Box<dyn CaptureStream>> {
        if self.width == 0 || self.height == 0 {
            return Err(RecordingError::CaptureUnsupported(format!(
                "Surface {} has no drawable area",
                self.id
            )));
        }

        let frame_bytes = frame_len(self.width, self.height).ok_or_else(|| {
            RecordingError::CaptureUnsupported(format!(
                "Surface {} is too large ({}x{})",
                self.id, self.width, self.height
            ))
        })?;

        let format = CaptureFormat::parse(&request.mime)
            .filter(|_| self.is_format_supported(&request.mime))
            .ok_or_else(|| {
                RecordingError::CaptureUnsupported(format!(
                    "Format {} is not supported",
                    request.mime
                ))
            })?;

        let args = self.encoder_args(request, &format);
        tracing::info!("Starting FFmpeg capture for {}: {:?}", self.id, args);

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RecordingError::CaptureUnsupported(format!(
                        "{} not found",
                        self.program.display()
                    ))
                } else {
                    RecordingError::CaptureError(format!("Failed to start FFmpeg: {}", e))
                }
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| capture_error("Failed to capture FFmpeg stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| capture_error("Failed to capture FFmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| capture_error("Failed to capture FFmpeg stderr"))?;

        let is_recording = Arc::new(AtomicBool::new(true));
        let feeder = tokio::spawn(feed_frames(
            stdin,
            self.renderer.clone(),
            self.width,
            self.height,
            frame_bytes,
            request.fps,
            is_recording.clone(),
        ));
        let reader = tokio::spawn(forward_chunks(stdout, chunks, request.timeslice));
        let stderr = tokio::spawn(collect_stderr(stderr));

        Ok(Box::new(FfmpegStream {
            child,
            is_recording,
            feeder: Some(feeder),
            reader: Some(reader),
            stderr: Some(stderr),
        }))
    }
}

/// A running FFmpeg capture
struct FfmpegStream {
    child: Child,
    is_recording: Arc<AtomicBool>,
    feeder: Option<JoinHandle<u64>>,
    reader: Option<JoinHandle<u64>>,
    stderr: Option<JoinHandle<String>>,
}

#[async_trait]
impl CaptureStream for FfmpegStream {
    async fn stop(&mut self) -> RecordingResult<()> {
        if !self.is_recording.swap(false, Ordering::SeqCst) {
            return Err(RecordingError::NotRecording);
        }

        // Feeder closes stdin on exit, which lets FFmpeg flush the container
        if let Some(feeder) = self.feeder.take() {
            match feeder.await {
                Ok(frames) => tracing::info!("Rendered {} frames", frames),
                Err(e) => tracing::warn!("Frame feeder task failed: {}", e),
            }
        }

        if let Some(reader) = self.reader.take() {
            match reader.await {
                Ok(bytes) => tracing::debug!("Forwarded {} encoded bytes", bytes),
                Err(e) => tracing::warn!("Chunk reader task failed: {}", e),
            }
        }

        let status = self.child.wait().await?;
        let stderr = match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            return Err(RecordingError::CaptureError(format!(
                "FFmpeg exited with {}: {}",
                status,
                stderr.trim()
            )));
        }

        tracing::info!("FFmpeg capture stopped");
        Ok(())
    }
}

impl Drop for FfmpegStream {
    fn drop(&mut self) {
        self.is_recording.store(false, Ordering::SeqCst);
    }
}

fn capture_error(message: &str) -> RecordingError {
    RecordingError::CaptureError(message.to_string())
}

/// Render frames at a fixed rate and write them to FFmpeg
async fn feed_frames(
    mut stdin: ChildStdin,
    renderer: Arc<Mutex<Box<dyn FrameRenderer>>>,
    width: u32,
    height: u32,
    frame_bytes: usize,
    fps: u32,
    is_recording: Arc<AtomicBool>,
) -> u64 {
    let mut frame = vec![0u8; frame_bytes];
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(fps.max(1))));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut index = 0u64;
    while is_recording.load(Ordering::SeqCst) {
        ticker.tick().await;
        renderer.lock().render(index, width, height, &mut frame);

        if let Err(e) = stdin.write_all(&frame).await {
            tracing::warn!("Failed to write frame {}: {}", index, e);
            break;
        }
        index += 1;
    }

    if let Err(e) = stdin.shutdown().await {
        tracing::debug!("FFmpeg stdin already closed: {}", e);
    }
    index
}

/// Read encoded output and hand it over once per timeslice
async fn forward_chunks(mut stdout: ChildStdout, chunks: ChunkSender, timeslice: Duration) -> u64 {
    let mut pending = Vec::new();
    let mut buf = vec![0u8; 64 * 1024];
    let mut flush = tokio::time::interval(timeslice);
    flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut total = 0u64;
    loop {
        tokio::select! {
            read = stdout.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => pending.extend_from_slice(&buf[..n]),
                Err(e) => {
                    tracing::warn!("Failed to read FFmpeg output: {}", e);
                    break;
                }
            },
            _ = flush.tick() => {
                if !pending.is_empty() {
                    total += pending.len() as u64;
                    if chunks.send(std::mem::take(&mut pending)).is_err() {
                        break;
                    }
                }
            }
        }
    }

    if !pending.is_empty() {
        total += pending.len() as u64;
        let _ = chunks.send(pending);
    }
    total
}

async fn collect_stderr(mut stderr: ChildStderr) -> String {
    let mut out = String::new();
    let _ = stderr.read_to_string(&mut out).await;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::pattern::TestPattern;
    use tokio::sync::mpsc;

    fn request(mime: &str) -> StreamRequest {
        StreamRequest {
            fps: 60,
            mime: mime.to_string(),
            video_bits_per_second: 25_000_000,
            timeslice: Duration::from_millis(100),
        }
    }

    #[test]
    fn test_supports_webm_but_not_plain_mp4() {
        let surface = FfmpegSurface::new("canvas", 64, 64, TestPattern::default());
        assert!(surface.is_format_supported("video/webm"));
        assert!(surface.is_format_supported("video/webm;codecs=vp9"));
        assert!(!surface.is_format_supported("video/mp4"));
        assert!(!surface.is_format_supported("video/webm;codecs=av1"));
        assert!(!surface.is_format_supported("audio/ogg"));
    }

    #[test]
    fn test_fragmented_mp4_enables_mp4() {
        let surface =
            FfmpegSurface::new("canvas", 64, 64, TestPattern::default()).with_fragmented_mp4(true);
        assert!(surface.is_format_supported("video/mp4"));
        assert!(surface.is_format_supported("video/mp4;codecs=avc1.42E01E"));
    }

    #[test]
    fn test_encoder_args_vp9() {
        let surface = FfmpegSurface::new("canvas", 320, 240, TestPattern::default());
        let req = request("video/webm;codecs=vp9");
        let format = CaptureFormat::parse(&req.mime).unwrap();
        let args = surface.encoder_args(&req, &format);

        assert!(args.windows(2).any(|w| w[0] == "-s" && w[1] == "320x240"));
        assert!(args.windows(2).any(|w| w[0] == "-c:v" && w[1] == "libvpx-vp9"));
        assert!(args.windows(2).any(|w| w[0] == "-b:v" && w[1] == "25000000"));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }

    #[test]
    fn test_encoder_args_plain_webm_uses_vp8() {
        let surface = FfmpegSurface::new("canvas", 320, 240, TestPattern::default());
        let req = request("video/webm");
        let format = CaptureFormat::parse(&req.mime).unwrap();
        let args = surface.encoder_args(&req, &format);

        assert!(args.windows(2).any(|w| w[0] == "-c:v" && w[1] == "libvpx"));
    }

    #[tokio::test]
    async fn test_zero_sized_surface_is_unsupported() {
        let surface = FfmpegSurface::new("empty", 0, 0, TestPattern::default());
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = surface.open_stream(&request("video/webm"), tx).await;
        assert!(matches!(result, Err(RecordingError::CaptureUnsupported(_))));
    }

    #[cfg(target_pointer_width = "64")]
    #[tokio::test]
    async fn test_oversized_surface_is_unsupported() {
        let surface = FfmpegSurface::new("huge", u32::MAX, u32::MAX, TestPattern::default())
            .with_program("/nonexistent/ffmpeg-binary");
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = surface.open_stream(&request("video/webm"), tx).await;
        match result {
            Err(RecordingError::CaptureUnsupported(message)) => {
                assert!(message.contains("too large"))
            }
            _ => panic!("expected CaptureUnsupported"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_unsupported() {
        let surface = FfmpegSurface::new("canvas", 16, 16, TestPattern::default())
            .with_program("/nonexistent/ffmpeg-binary");
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = surface.open_stream(&request("video/webm"), tx).await;
        assert!(matches!(result, Err(RecordingError::CaptureUnsupported(_))));
    }
}
