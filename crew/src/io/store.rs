//! Narrow access layer for the coordination store.
//!
//! Every read and write of `_coordination/` goes through [`Store`] so that
//! locking and serialization policy stay in one place. Call sites never touch
//! raw paths.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::debug;

use crate::core::bugs::BugLedger;
use crate::core::types::{Document, Role};
use crate::io::config::{CrewConfig, load_config};
use crate::io::history;
use crate::io::paths::StorePaths;
use crate::io::run_state::{RunState, load_run_state, write_run_state};

#[derive(Debug, Clone)]
pub struct Store {
    paths: StorePaths,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            paths: StorePaths::new(root),
        }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// True when the coordination directory has been scaffolded.
    pub fn exists(&self) -> bool {
        self.paths.coordination_dir.is_dir()
    }

    pub fn document_exists(&self, doc: Document) -> bool {
        self.paths.document_path(doc).is_file()
    }

    pub fn read_document(&self, doc: Document) -> Result<String> {
        let path = self.paths.document_path(doc);
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
    }

    /// Read a document, returning `None` when it does not exist yet.
    pub fn read_document_opt(&self, doc: Document) -> Result<Option<String>> {
        if !self.document_exists(doc) {
            return Ok(None);
        }
        self.read_document(doc).map(Some)
    }

    pub fn write_document(&self, doc: Document, contents: &str) -> Result<()> {
        let path = self.paths.document_path(doc);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn load_config(&self) -> Result<CrewConfig> {
        load_config(&self.paths.config_path)
    }

    /// Load the bug ledger. Missing file means an empty ledger.
    pub fn load_bugs(&self) -> Result<BugLedger> {
        let path = &self.paths.bugs_path;
        if !path.exists() {
            return Ok(BugLedger::default());
        }
        let contents =
            fs::read_to_string(path).with_context(|| format!("read bugs {}", path.display()))?;
        let ledger: BugLedger = serde_json::from_str(&contents)
            .with_context(|| format!("parse bugs {}", path.display()))?;
        Ok(ledger)
    }

    /// Atomically write the bug ledger (temp file + rename).
    pub fn write_bugs(&self, ledger: &BugLedger) -> Result<()> {
        debug!(bugs = ledger.bugs.len(), "writing bug ledger");
        let mut buf = serde_json::to_string_pretty(ledger)?;
        buf.push('\n');
        write_atomic(&self.paths.bugs_path, &buf)
    }

    pub fn load_run_state(&self) -> Result<RunState> {
        load_run_state(&self.paths.run_state_path)
    }

    pub fn write_run_state(&self, state: &RunState) -> Result<()> {
        write_run_state(&self.paths.run_state_path, state)
    }

    /// Append one `timestamp pass|fail` line to the history log.
    pub fn append_history(&self, passed: bool) -> Result<()> {
        let line = history::history_line(Utc::now(), passed);
        history::append_line(&self.paths.history_path, &line)
    }

    /// Full history log contents; empty when no run has been recorded.
    pub fn read_history(&self) -> Result<String> {
        let path = &self.paths.history_path;
        if !path.exists() {
            return Ok(String::new());
        }
        fs::read_to_string(path).with_context(|| format!("read history {}", path.display()))
    }

    pub fn phase_dir(&self, seq: u64, role: Role) -> PathBuf {
        self.paths.phase_dir(seq, role)
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("bugs path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp bugs {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace bugs {}", path.display()))?;
    Ok(())
}
