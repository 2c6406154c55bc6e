//! Transcode fallback
//!
//! Re-encodes a natively recorded buffer into the delivery format when
//! they differ. Every failure degrades to the native buffer, so a
//! conversion can only upgrade the artifact, never lose it.

use super::engine::{EngineAssets, TranscodeEngine};
use super::types::{ExportError, ExportFormat, ExportResult, TranscodeResult, TranscodeSettings};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Result of a conversion attempt
#[derive(Debug)]
pub struct TranscodeOutcome {
    /// Artifact to publish, always present
    pub result: TranscodeResult,
    /// Why the native format was kept, if a conversion was wanted
    pub error: Option<ExportError>,
}

impl TranscodeOutcome {
    fn ok(result: TranscodeResult) -> Self {
        Self {
            result,
            error: None,
        }
    }

    fn degraded(result: TranscodeResult, error: ExportError) -> Self {
        Self {
            result,
            error: Some(error),
        }
    }
}

/// Converts recordings with an optional external engine
pub struct Transcoder {
    engine: Option<Arc<dyn TranscodeEngine>>,
    assets: EngineAssets,
    settings: TranscodeSettings,
    loaded: OnceCell<()>,
}

impl Transcoder {
    /// Create a transcoder backed by `engine`
    pub fn new(
        engine: Arc<dyn TranscodeEngine>,
        assets: EngineAssets,
        settings: TranscodeSettings,
    ) -> Self {
        Self {
            engine: Some(engine),
            assets,
            settings,
            loaded: OnceCell::new(),
        }
    }

    /// Create a transcoder with no engine; conversions keep the native format
    pub fn without_engine() -> Self {
        Self {
            engine: None,
            assets: EngineAssets::default(),
            settings: TranscodeSettings::default(),
            loaded: OnceCell::new(),
        }
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// Whether the engine has been loaded successfully
    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// Convert `buffer` from `native` into `desired`
    ///
    /// Never fails; the outcome carries the reason when the native
    /// format had to be kept.
    pub async fn convert(
        &self,
        buffer: Vec<u8>,
        native: ExportFormat,
        desired: ExportFormat,
    ) -> TranscodeOutcome {
        if native == desired {
            return TranscodeOutcome::ok(TranscodeResult::native(buffer, native));
        }

        let Some(engine) = self.engine.as_ref() else {
            tracing::warn!("No transcoding engine, keeping {}", native);
            return TranscodeOutcome::degraded(
                TranscodeResult::native(buffer, native),
                ExportError::EngineUnavailable("No transcoding engine configured".to_string()),
            );
        };

        tracing::info!(
            "Converting {} bytes from {} to {} with {}",
            buffer.len(),
            native,
            desired,
            engine.name()
        );

        let attempt = self.run_engine(engine.as_ref(), &buffer, native, desired);
        let converted = match self.settings.timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), attempt)
                .await
                .unwrap_or_else(|_| {
                    Err(ExportError::TranscodeFailed(format!(
                        "Timed out after {}s",
                        secs
                    )))
                }),
            None => attempt.await,
        };

        match converted {
            Ok(payload) => {
                tracing::info!("Converted to {} ({} bytes)", desired, payload.len());
                TranscodeOutcome::ok(TranscodeResult::converted(payload, desired))
            }
            Err(e) => {
                tracing::warn!("Conversion failed, keeping {}: {}", native, e);
                TranscodeOutcome::degraded(TranscodeResult::native(buffer, native), e)
            }
        }
    }

    async fn ensure_loaded(&self, engine: &dyn TranscodeEngine) -> ExportResult<()> {
        self.loaded
            .get_or_try_init(|| async {
                tracing::info!("Loading transcoding engine {}", engine.name());
                engine.load(&self.assets).await
            })
            .await
            .map(|_| ())
    }

    async fn run_engine(
        &self,
        engine: &dyn TranscodeEngine,
        buffer: &[u8],
        native: ExportFormat,
        desired: ExportFormat,
    ) -> ExportResult<Vec<u8>> {
        self.ensure_loaded(engine).await?;

        let stem = Uuid::new_v4().simple().to_string();
        let input = format!("input-{}.{}", stem, native.extension());
        let output = format!("output-{}.{}", stem, desired.extension());

        engine.write_input(&input, buffer).await?;
        let args = build_transcode_args(&input, &output, desired, &self.settings);
        let result = match engine.execute(&args).await {
            Ok(()) => engine.read_output(&output).await,
            Err(e) => Err(e),
        };

        for name in [&input, &output] {
            if let Err(e) = engine.remove(name).await {
                tracing::debug!("Failed to remove {}: {}", name, e);
            }
        }

        let payload = result?;
        if payload.is_empty() {
            return Err(ExportError::TranscodeFailed("Engine produced no output".to_string()));
        }
        Ok(payload)
    }
}

/// Build the engine command line for a conversion
pub fn build_transcode_args(
    input: &str,
    output: &str,
    desired: ExportFormat,
    settings: &TranscodeSettings,
) -> Vec<String> {
    let mut args = vec!["-i".to_string(), input.to_string()];

    match desired {
        ExportFormat::Mp4 => {
            args.extend([
                "-c:v".to_string(),
                desired.video_codec().to_string(),
                "-preset".to_string(),
                settings.preset.clone(),
                "-crf".to_string(),
                settings.crf.to_string(),
                "-pix_fmt".to_string(),
                "yuv420p".to_string(),
                "-movflags".to_string(),
                "+faststart".to_string(),
            ]);
        }
        ExportFormat::Webm => {
            args.extend([
                "-c:v".to_string(),
                desired.video_codec().to_string(),
                "-crf".to_string(),
                settings.crf.to_string(),
                "-b:v".to_string(),
                "0".to_string(),
            ]);
        }
    }

    args.push(output.to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EngineBehavior, ScriptedEngine};

    fn scripted(behavior: EngineBehavior) -> (Arc<ScriptedEngine>, Transcoder) {
        scripted_with(behavior, TranscodeSettings::default())
    }

    fn scripted_with(
        behavior: EngineBehavior,
        settings: TranscodeSettings,
    ) -> (Arc<ScriptedEngine>, Transcoder) {
        let engine = Arc::new(ScriptedEngine::new(behavior));
        let transcoder = Transcoder::new(engine.clone(), EngineAssets::default(), settings);
        (engine, transcoder)
    }

    async fn webm_to_mp4(transcoder: &Transcoder) -> TranscodeOutcome {
        transcoder
            .convert(b"webm".to_vec(), ExportFormat::Webm, ExportFormat::Mp4)
            .await
    }

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn test_mp4_args() {
        let settings = TranscodeSettings::default();
        let args = build_transcode_args("in.webm", "out.mp4", ExportFormat::Mp4, &settings);
        assert_eq!(&args[..2], &["-i", "in.webm"]);
        assert!(has_pair(&args, "-c:v", "libx264"));
        assert!(has_pair(&args, "-preset", "fast"));
        assert!(has_pair(&args, "-crf", "22"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn test_webm_args() {
        let settings = TranscodeSettings::default();
        let args = build_transcode_args("in.mp4", "out.webm", ExportFormat::Webm, &settings);
        assert!(has_pair(&args, "-c:v", "libvpx-vp9"));
        assert!(has_pair(&args, "-b:v", "0"));
    }

    #[tokio::test]
    async fn test_same_format_skips_engine() {
        let (engine, transcoder) = scripted(EngineBehavior::Succeed(b"mp4".to_vec()));

        let first = transcoder
            .convert(b"data".to_vec(), ExportFormat::Webm, ExportFormat::Webm)
            .await;
        let second = transcoder
            .convert(b"data".to_vec(), ExportFormat::Webm, ExportFormat::Webm)
            .await;

        assert_eq!(first.result, second.result);
        assert_eq!(first.result.payload, b"data");
        assert!(!first.result.used_fallback);
        assert!(first.error.is_none());
        assert_eq!(engine.load_count(), 0);
        assert_eq!(engine.execute_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_engine_keeps_native() {
        let transcoder = Transcoder::without_engine();
        assert!(!transcoder.has_engine());

        let outcome = webm_to_mp4(&transcoder).await;

        assert_eq!(outcome.result.payload, b"webm");
        assert_eq!(outcome.result.extension, "webm");
        assert!(!outcome.result.used_fallback);
        assert!(matches!(outcome.error, Some(ExportError::EngineUnavailable(_))));
    }

    #[tokio::test]
    async fn test_successful_conversion() {
        let (engine, transcoder) = scripted(EngineBehavior::Succeed(b"mp4-bytes".to_vec()));
        assert!(transcoder.has_engine());

        let outcome = webm_to_mp4(&transcoder).await;

        assert_eq!(outcome.result.payload, b"mp4-bytes");
        assert_eq!(outcome.result.extension, "mp4");
        assert!(outcome.result.used_fallback);
        assert!(outcome.error.is_none());
        assert_eq!(engine.inputs(), vec![b"webm".to_vec()]);
    }

    #[tokio::test]
    async fn test_engine_loaded_once() {
        let (engine, transcoder) = scripted(EngineBehavior::Succeed(b"mp4".to_vec()));

        for _ in 0..3 {
            webm_to_mp4(&transcoder).await;
        }

        assert!(transcoder.is_loaded());
        assert_eq!(engine.load_count(), 1);
        assert_eq!(engine.execute_count(), 3);
    }

    #[tokio::test]
    async fn test_engine_failure_degrades() {
        let (_engine, transcoder) = scripted(EngineBehavior::Fail("corrupt input".to_string()));

        let outcome = webm_to_mp4(&transcoder).await;

        assert_eq!(outcome.result.payload, b"webm");
        assert_eq!(outcome.result.extension, "webm");
        assert!(!outcome.result.used_fallback);
        assert!(matches!(outcome.error, Some(ExportError::TranscodeFailed(_))));
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let (engine, transcoder) = scripted(EngineBehavior::Succeed(b"mp4".to_vec()));
        engine.fail_next_loads(1);

        let first = webm_to_mp4(&transcoder).await;
        assert!(matches!(first.error, Some(ExportError::EngineUnavailable(_))));
        assert_eq!(first.result.extension, "webm");

        let second = webm_to_mp4(&transcoder).await;
        assert!(second.error.is_none());
        assert_eq!(second.result.extension, "mp4");
        assert_eq!(engine.load_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_engine_times_out() {
        let settings = TranscodeSettings {
            timeout_secs: Some(5),
            ..TranscodeSettings::default()
        };
        let (_engine, transcoder) = scripted_with(EngineBehavior::Hang, settings);

        let outcome = webm_to_mp4(&transcoder).await;

        assert_eq!(outcome.result.extension, "webm");
        assert!(matches!(outcome.error, Some(ExportError::TranscodeFailed(_))));
    }

    #[tokio::test]
    async fn test_empty_output_degrades() {
        let (_engine, transcoder) = scripted(EngineBehavior::Succeed(Vec::new()));

        let outcome = webm_to_mp4(&transcoder).await;
        assert_eq!(outcome.result.extension, "webm");
        assert!(outcome.error.is_some());
    }
}
