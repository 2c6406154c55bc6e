//! Snapshot commands

use crate::capture::TestPattern;
use crate::snapshot::save_snapshot;
use crate::utils::error::AppResult;
use std::path::Path;

/// Save frame `frame` of the test pattern as a PNG
pub fn run_snapshot(
    mut pattern: TestPattern,
    width: u32,
    height: u32,
    frame: u64,
    out: &Path,
) -> AppResult<()> {
    save_snapshot(&mut pattern, width, height, frame, out)?;
    println!("Saved snapshot to {}", out.display());
    Ok(())
}
