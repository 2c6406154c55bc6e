//! Artifact publishing
//!
//! Turns the final payload into a retrievable handle and saves it to the
//! download directory on request. Only the most recent artifact is kept;
//! publishing a new one deletes the previous file.

use super::types::{ExportError, ExportResult, TranscodeResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// Retrievable reference to a published recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactHandle {
    /// `file://` URL of the artifact
    pub retrieval_url: String,
    /// File extension of the payload
    pub extension: String,
}

struct PublishedArtifact {
    handle: ArtifactHandle,
    file: TempPath,
}

/// Holds the single most recent artifact
pub struct ArtifactPublisher {
    download_dir: PathBuf,
    current: Option<PublishedArtifact>,
}

impl ArtifactPublisher {
    /// Create a publisher that saves downloads into `download_dir`
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            current: None,
        }
    }

    /// Current handle, if anything has been published
    pub fn current(&self) -> Option<&ArtifactHandle> {
        self.current.as_ref().map(|artifact| &artifact.handle)
    }

    /// Location of the current artifact's backing file
    pub fn artifact_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|artifact| &*artifact.file)
    }

    /// Publish a payload, releasing whatever was published before
    pub fn publish(&mut self, result: &TranscodeResult) -> ExportResult<ArtifactHandle> {
        let suffix = format!(".{}", result.extension);
        let mut file = tempfile::Builder::new()
            .prefix("surface-recording-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(&result.payload)?;
        file.flush()?;

        let file = file.into_temp_path();
        let handle = ArtifactHandle {
            retrieval_url: file_url(&file),
            extension: result.extension.clone(),
        };

        self.release();
        tracing::info!(
            "Published {} bytes as {} ({})",
            result.payload.len(),
            handle.extension,
            handle.retrieval_url
        );

        self.current = Some(PublishedArtifact {
            handle: handle.clone(),
            file,
        });
        Ok(handle)
    }

    /// Drop the current artifact and delete its file
    pub fn release(&mut self) {
        if let Some(previous) = self.current.take() {
            let url = previous.handle.retrieval_url;
            match previous.file.close() {
                Ok(()) => tracing::debug!("Released artifact {}", url),
                Err(e) => tracing::warn!("Failed to release artifact {}: {}", url, e),
            }
        }
    }

    /// Save the current artifact as `{suggested_name}-{unix_ms}.{ext}`
    pub fn download(&self, suggested_name: &str) -> ExportResult<PathBuf> {
        let artifact = self.current.as_ref().ok_or(ExportError::NothingToDownload)?;

        std::fs::create_dir_all(&self.download_dir)?;
        let file_name = artifact_file_name(
            suggested_name,
            Utc::now().timestamp_millis(),
            &artifact.handle.extension,
        );
        let target = self.download_dir.join(file_name);
        std::fs::copy(&artifact.file, &target)?;

        tracing::info!("Saved recording to {:?}", target);
        Ok(target)
    }
}

impl Drop for ArtifactPublisher {
    fn drop(&mut self) {
        self.release();
    }
}

/// File name used when saving a recording
pub fn artifact_file_name(suggested_name: &str, unix_millis: i64, extension: &str) -> String {
    let name = if suggested_name.trim().is_empty() {
        "recording"
    } else {
        suggested_name
    };
    format!("{}-{}.{}", name, unix_millis, extension)
}

/// Build a `file://` URL with every path segment percent-encoded
pub fn file_url(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let encoded: Vec<String> = raw
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    let joined = encoded.join("/");

    if joined.starts_with('/') {
        format!("file://{}", joined)
    } else {
        format!("file:///{}", joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ExportFormat;
    use tempfile::tempdir;

    fn result(payload: &[u8], format: ExportFormat) -> TranscodeResult {
        TranscodeResult::native(payload.to_vec(), format)
    }

    #[test]
    fn test_download_without_publish() {
        let dir = tempdir().unwrap();
        let publisher = ArtifactPublisher::new(dir.path());

        assert!(matches!(publisher.download("clip"), Err(ExportError::NothingToDownload)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_publish_and_download() {
        let dir = tempdir().unwrap();
        let mut publisher = ArtifactPublisher::new(dir.path().join("downloads"));

        let handle = publisher.publish(&result(b"video", ExportFormat::Mp4)).unwrap();
        assert_eq!(handle.extension, "mp4");
        assert!(handle.retrieval_url.starts_with("file:///"));
        assert_eq!(publisher.current(), Some(&handle));

        let saved = publisher.download("clip").unwrap();
        let name = saved.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("clip-"));
        assert!(name.ends_with(".mp4"));
        assert_eq!(std::fs::read(&saved).unwrap(), b"video");
    }

    #[test]
    fn test_republish_releases_previous() {
        let dir = tempdir().unwrap();
        let mut publisher = ArtifactPublisher::new(dir.path());

        publisher.publish(&result(b"first", ExportFormat::Webm)).unwrap();
        let first_path = publisher.artifact_path().unwrap().to_path_buf();
        assert!(first_path.exists());

        let second = publisher.publish(&result(b"second", ExportFormat::Mp4)).unwrap();
        let second_path = publisher.artifact_path().unwrap().to_path_buf();

        assert!(!first_path.exists());
        assert!(second_path.exists());
        assert_eq!(publisher.current(), Some(&second));
    }

    #[test]
    fn test_release_and_drop_delete_file() {
        let dir = tempdir().unwrap();
        let mut publisher = ArtifactPublisher::new(dir.path());

        publisher.publish(&result(b"x", ExportFormat::Webm)).unwrap();
        let path = publisher.artifact_path().unwrap().to_path_buf();
        publisher.release();
        assert!(!path.exists());
        assert!(publisher.current().is_none());

        publisher.publish(&result(b"y", ExportFormat::Webm)).unwrap();
        let path = publisher.artifact_path().unwrap().to_path_buf();
        drop(publisher);
        assert!(!path.exists());
    }

    #[test]
    fn test_artifact_file_name() {
        assert_eq!(artifact_file_name("clip", 1700000000000, "mp4"), "clip-1700000000000.mp4");
        assert_eq!(artifact_file_name("  ", 1, "webm"), "recording-1.webm");
    }

    #[test]
    fn test_file_url_encodes_segments() {
        let url = file_url(Path::new("/tmp/my clips/a#b.mp4"));
        assert_eq!(url, "file:///tmp/my%20clips/a%23b.mp4");
    }
}
