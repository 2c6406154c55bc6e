//! Recording system module
//!
//! This module implements the capture pipeline:
//! - Codec negotiation against the surface's capabilities
//! - CaptureSession state machine and chunk accumulation
//! - Duration watchdog for auto-stop and progress

pub mod negotiator;
pub mod session;
pub mod state;
pub mod watchdog;

pub use negotiator::{select_format, CaptureFormat, CodecChoice};
pub use session::{CaptureSession, RecordingEvent, ToggleOutcome};
pub use state::{ChunkBuffer, RecordingState, SessionInfo, StopTrigger};
pub use watchdog::Watchdog;
