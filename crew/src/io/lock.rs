//! Exclusive store lock serializing the two phase drivers.
//!
//! The lock is a real mutual-exclusion primitive, not an advisory marker: it
//! is created with `O_EXCL` semantics and held through an RAII guard. The
//! round loop waits for it with a bounded poll; the background poll loop
//! try-acquires and skips its cycle when busy. A lock file left behind by a
//! killed process is taken over once its mtime exceeds the stale threshold.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Holder metadata written into the lock file for the status display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockInfo {
    pub pid: u32,
    /// Which driver holds the lock (`run`, `watch`, `phase`).
    pub label: String,
    pub acquired_at: String,
}

/// The store lock could not be acquired within the configured wait.
#[derive(Debug)]
pub struct LockBusyError {
    pub holder: Option<LockInfo>,
}

impl fmt::Display for LockBusyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.holder {
            Some(info) => write!(
                f,
                "store lock is busy (held by pid {} as '{}' since {})",
                info.pid, info.label, info.acquired_at
            ),
            None => write!(f, "store lock is busy"),
        }
    }
}

impl std::error::Error for LockBusyError {}

/// RAII guard over `_coordination/.lock`; the file is removed on drop.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    /// Acquire the lock if it is free, returning `None` when it is held.
    pub fn try_acquire(path: &Path, label: &str) -> Result<Option<StoreLock>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        match OpenOptions::new().create_new(true).write(true).open(path) {
            Ok(mut file) => {
                let info = LockInfo {
                    pid: std::process::id(),
                    label: label.to_string(),
                    acquired_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                };
                let mut buf = serde_json::to_string_pretty(&info)?;
                buf.push('\n');
                file.write_all(buf.as_bytes())
                    .with_context(|| format!("write lock info {}", path.display()))?;
                debug!(path = %path.display(), label, "acquired store lock");
                Ok(Some(StoreLock {
                    path: path.to_path_buf(),
                }))
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
            Err(err) => Err(err).with_context(|| format!("create lock {}", path.display())),
        }
    }

    /// Acquire the lock, polling up to `wait` and taking over stale locks.
    ///
    /// Returns a [`LockBusyError`] when the wait expires; the CLI maps it to
    /// the `LOCKED` exit code.
    pub fn acquire(
        path: &Path,
        label: &str,
        wait: Duration,
        stale_after: Duration,
    ) -> Result<StoreLock> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(lock) = Self::try_acquire(path, label)? {
                return Ok(lock);
            }
            if lock_is_stale(path, stale_after)? {
                warn!(path = %path.display(), "removing stale store lock");
                remove_lock_file(path)?;
                continue;
            }
            if Instant::now() >= deadline {
                let holder = read_lock_info(path).unwrap_or(None);
                return Err(anyhow::Error::new(LockBusyError { holder })
                    .context(format!("acquire store lock {}", path.display())));
            }
            std::thread::sleep(LOCK_POLL_INTERVAL);
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Holder metadata of the current lock, `None` when free or unreadable.
pub fn read_lock_info(path: &Path) -> Result<Option<LockInfo>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read lock {}", path.display()))?;
    Ok(serde_json::from_str(&contents).ok())
}

fn lock_is_stale(path: &Path, stale_after: Duration) -> Result<bool> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        // Freed between the acquire attempt and this check.
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err).with_context(|| format!("stat lock {}", path.display())),
    };
    let modified = metadata
        .modified()
        .with_context(|| format!("read lock mtime {}", path.display()))?;
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO);
    Ok(age >= stale_after)
}

fn remove_lock_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("remove lock {}", path.display())),
    }
}
