//! Command handlers
//!
//! This module contains the handlers behind each command-line
//! subcommand. They wire the library together and report to the user.

pub mod preset;
pub mod recording;
pub mod snapshot;
