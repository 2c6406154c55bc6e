//! Transcoding engines
//!
//! An engine is an external re-encoder driven through a tiny virtual
//! filesystem: write an input file, run a command line, read the output.

use super::types::{ExportError, ExportResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Where the engine's executable assets live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineAssets {
    /// Engine executable
    pub program: PathBuf,
}

impl Default for EngineAssets {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
        }
    }
}

/// An external transcoding engine
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Engine name for logging
    fn name(&self) -> &str;

    /// Prepare the engine for use
    async fn load(&self, assets: &EngineAssets) -> ExportResult<()>;

    /// Place `bytes` in the engine's filesystem under `name`
    async fn write_input(&self, name: &str, bytes: &[u8]) -> ExportResult<()>;

    /// Run the engine with the given arguments
    async fn execute(&self, args: &[String]) -> ExportResult<()>;

    /// Read a file the engine produced
    async fn read_output(&self, name: &str) -> ExportResult<Vec<u8>>;

    /// Remove a file from the engine's filesystem
    async fn remove(&self, _name: &str) -> ExportResult<()> {
        Ok(())
    }
}

/// Engine backed by the system `ffmpeg` binary
///
/// Files live in a private scratch directory that is deleted with the
/// engine.
pub struct FfmpegEngine {
    scratch: tempfile::TempDir,
    program: RwLock<Option<PathBuf>>,
}

impl FfmpegEngine {
    /// Create an engine with a fresh scratch directory
    pub fn new() -> ExportResult<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("surface-recorder-ffmpeg-")
            .tempdir()?;

        Ok(Self {
            scratch,
            program: RwLock::new(None),
        })
    }

    /// Scratch directory used for inputs and outputs
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    fn scratch_path(&self, name: &str) -> ExportResult<PathBuf> {
        let is_plain = !name.is_empty()
            && Path::new(name).file_name().map_or(false, |f| f == name)
            && name != "."
            && name != "..";
        if !is_plain {
            return Err(ExportError::TranscodeFailed(format!("Invalid file name: {}", name)));
        }
        Ok(self.scratch.path().join(name))
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn load(&self, assets: &EngineAssets) -> ExportResult<()> {
        let output = Command::new(&assets.program)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                ExportError::EngineUnavailable(format!(
                    "Failed to run {}: {}",
                    assets.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(ExportError::EngineUnavailable(format!(
                "{} -version exited with {}",
                assets.program.display(),
                output.status
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout);
        tracing::info!(
            "Loaded transcoding engine: {}",
            version.lines().next().unwrap_or("unknown version")
        );

        *self.program.write() = Some(assets.program.clone());
        Ok(())
    }

    async fn write_input(&self, name: &str, bytes: &[u8]) -> ExportResult<()> {
        let path = self.scratch_path(name)?;
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn execute(&self, args: &[String]) -> ExportResult<()> {
        let program = self
            .program
            .read()
            .clone()
            .ok_or_else(|| ExportError::EngineUnavailable("Engine not loaded".to_string()))?;

        tracing::info!("Starting FFmpeg transcode: {:?}", args);

        let output = Command::new(&program)
            .args(["-y", "-loglevel", "error"])
            .args(args)
            .current_dir(self.scratch.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExportError::TranscodeFailed(format!("Failed to start FFmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExportError::TranscodeFailed(format!(
                "FFmpeg exited with error: {}",
                stderr.trim()
            )));
        }

        Ok(())
    }

    async fn read_output(&self, name: &str) -> ExportResult<Vec<u8>> {
        let path = self.scratch_path(name)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| ExportError::TranscodeFailed(format!("Missing output {}: {}", name, e)))
    }

    async fn remove(&self, name: &str) -> ExportResult<()> {
        let path = self.scratch_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_read_roundtrip_in_scratch() {
        let engine = FfmpegEngine::new().unwrap();
        engine.write_input("input.webm", b"abc").await.unwrap();

        assert!(engine.scratch_dir().join("input.webm").exists());
        assert_eq!(engine.read_output("input.webm").await.unwrap(), b"abc");

        engine.remove("input.webm").await.unwrap();
        engine.remove("input.webm").await.unwrap();
        assert!(!engine.scratch_dir().join("input.webm").exists());
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let engine = FfmpegEngine::new().unwrap();
        let result = engine.write_input("../escape.webm", b"x").await;
        assert!(matches!(result, Err(ExportError::TranscodeFailed(_))));
        let result = engine.write_input("", b"x").await;
        assert!(matches!(result, Err(ExportError::TranscodeFailed(_))));
    }

    #[tokio::test]
    async fn test_execute_requires_load() {
        let engine = FfmpegEngine::new().unwrap();
        let result = engine.execute(&["-i".to_string(), "in.webm".to_string()]).await;
        assert!(matches!(result, Err(ExportError::EngineUnavailable(_))));
    }

    #[tokio::test]
    async fn test_load_missing_program() {
        let engine = FfmpegEngine::new().unwrap();
        let assets = EngineAssets {
            program: PathBuf::from("/nonexistent/ffmpeg-binary"),
        };
        let result = engine.load(&assets).await;
        assert!(matches!(result, Err(ExportError::EngineUnavailable(_))));
    }

    #[tokio::test]
    async fn test_missing_output_is_transcode_failure() {
        let engine = FfmpegEngine::new().unwrap();
        let result = engine.read_output("output.mp4").await;
        assert!(matches!(result, Err(ExportError::TranscodeFailed(_))));
    }
}
