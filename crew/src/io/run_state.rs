//! Run state storage for phase and round bookkeeping.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::round::RoundDisposition;

/// Persisted bookkeeping (`_coordination/state/round_state.json`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunState {
    /// Next phase sequence number (1-indexed, monotonically increasing across
    /// both drivers; used to name phase artifact directories).
    pub phase_seq: u64,
    /// Lifetime count of finished rounds, for the status dashboard.
    pub rounds_completed: u64,
    /// Disposition of the most recently finished round.
    pub last_round: Option<RoundDisposition>,
    /// Verdict of the most recent Tester run, from either driver.
    pub last_test_passed: Option<bool>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            phase_seq: 1,
            rounds_completed: 0,
            last_round: None,
            last_test_passed: None,
        }
    }
}

/// Load run state from disk. Missing file means a fresh store.
pub fn load_run_state(path: &Path) -> Result<RunState> {
    if !path.exists() {
        return Ok(RunState::default());
    }
    debug!(path = %path.display(), "loading run state");
    let contents =
        fs::read_to_string(path).with_context(|| format!("read run state {}", path.display()))?;
    let state: RunState = serde_json::from_str(&contents)
        .with_context(|| format!("parse run state {}", path.display()))?;
    debug!(phase_seq = state.phase_seq, "run state loaded");
    Ok(state)
}

/// Atomically write run state to disk (temp file + rename).
pub fn write_run_state(path: &Path, state: &RunState) -> Result<()> {
    debug!(path = %path.display(), phase_seq = state.phase_seq, "writing run state");
    let mut buf = serde_json::to_string_pretty(state)?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("run state path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp run state {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace run state {}", path.display()))?;
    Ok(())
}
