//! Recording state management
//!
//! Defines the recording state machine, per-session bookkeeping and the
//! ordered chunk buffer.

use super::negotiator::CodecChoice;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current state of a capture session
///
/// `Idle -> Recording -> Stopping -> Finalizing -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording in progress
    #[default]
    Idle,
    /// Chunks are being captured
    Recording,
    /// Capture stream is being released
    Stopping,
    /// Chunks are being assembled, converted and published
    Finalizing,
}

/// What caused a recording to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopTrigger {
    /// Stop requested by the user
    Manual,
    /// Duration limit reached
    DurationElapsed,
    /// Session disposed while recording
    Disposed,
}

/// Information about one recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Unique session ID
    pub id: Uuid,

    /// Unix timestamp when the session started
    pub unix_start_ms: u64,

    /// Duration limit snapshotted at start
    pub duration_limit_secs: u64,

    /// Negotiated recording format
    pub format: CodecChoice,
}

impl SessionInfo {
    /// Create a new session starting now
    pub fn new(duration_limit_secs: u64, format: CodecChoice) -> Self {
        Self {
            id: Uuid::new_v4(),
            unix_start_ms: Utc::now().timestamp_millis() as u64,
            duration_limit_secs,
            format,
        }
    }
}

/// Encoded fragments in arrival order
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    chunks: Vec<Vec<u8>>,
    total_bytes: usize,
}

impl ChunkBuffer {
    /// Append a fragment; zero-length fragments are discarded
    ///
    /// Returns whether the fragment was kept.
    pub fn push(&mut self, chunk: Vec<u8>) -> bool {
        if chunk.is_empty() {
            return false;
        }
        self.total_bytes += chunk.len();
        self.chunks.push(chunk);
        true
    }

    /// Number of kept fragments
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total payload size in bytes
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Concatenate all fragments into one buffer
    pub fn concat(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_bytes);
        for chunk in self.chunks {
            out.extend_from_slice(&chunk);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_chunks_are_discarded() {
        let mut buffer = ChunkBuffer::default();
        assert!(buffer.push(vec![1, 2]));
        assert!(!buffer.push(vec![]));
        assert!(buffer.push(vec![3]));
        assert!(!buffer.push(Vec::new()));
        assert!(buffer.push(vec![4, 5, 6]));

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.total_bytes(), 6);
        assert_eq!(buffer.concat(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_empty_buffer_concat() {
        let buffer = ChunkBuffer::default();
        assert!(buffer.is_empty());
        assert!(buffer.concat().is_empty());
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&RecordingState::Finalizing).unwrap();
        assert_eq!(json, "\"finalizing\"");
        assert_eq!(RecordingState::default(), RecordingState::Idle);
    }
}
