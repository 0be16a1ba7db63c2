//! Orchestrator configuration stored under `_coordination/state/config.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Crew configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CrewConfig {
    /// Maximum rounds per `crew run` invocation.
    pub max_rounds: u32,

    /// Sleep between background poll cycles in seconds.
    pub poll_interval_secs: u64,

    /// Store document watched by the background poll loop.
    pub watch_file: String,

    /// Wall-clock bound for one tool session in seconds. Absent means no
    /// timeout: sessions may legitimately run for hours.
    pub phase_timeout_secs: Option<u64>,

    /// Truncate session stdout/stderr logs beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Byte budget for a rendered prompt; droppable sections are shed first.
    pub prompt_budget_bytes: usize,

    /// How long `crew run` and `crew phase` wait for the store lock in seconds.
    pub lock_wait_secs: u64,

    /// Locks whose file is older than this many seconds are treated as stale
    /// leftovers of a killed process and taken over.
    pub lock_stale_secs: u64,

    pub tool: ToolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolConfig {
    /// Command invoked for each phase session (e.g. `["claude","--print"]`).
    /// The rendered role prompt is fed via stdin.
    pub command: Vec<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            command: vec!["claude".to_string(), "--print".to_string()],
        }
    }
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            poll_interval_secs: 10,
            watch_file: "BUILD_LOG.md".to_string(),
            phase_timeout_secs: None,
            output_limit_bytes: 100_000,
            prompt_budget_bytes: 40_000,
            lock_wait_secs: 600,
            lock_stale_secs: 3600,
            tool: ToolConfig::default(),
        }
    }
}

impl CrewConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_rounds == 0 {
            return Err(anyhow!("max_rounds must be > 0"));
        }
        if self.poll_interval_secs == 0 {
            return Err(anyhow!("poll_interval_secs must be > 0"));
        }
        if self.watch_file.trim().is_empty() {
            return Err(anyhow!("watch_file must not be empty"));
        }
        if self.watch_file.contains(['/', '\\']) {
            return Err(anyhow!(
                "watch_file must be a bare file name inside the coordination directory"
            ));
        }
        if self.phase_timeout_secs == Some(0) {
            return Err(anyhow!(
                "phase_timeout_secs must be > 0 (omit it to disable the timeout)"
            ));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.prompt_budget_bytes == 0 {
            return Err(anyhow!("prompt_budget_bytes must be > 0"));
        }
        if self.lock_stale_secs == 0 {
            return Err(anyhow!("lock_stale_secs must be > 0"));
        }
        if self.tool.command.is_empty() || self.tool.command[0].trim().is_empty() {
            return Err(anyhow!("tool.command must be a non-empty array"));
        }
        Ok(())
    }

    pub fn phase_timeout(&self) -> Option<Duration> {
        self.phase_timeout_secs.map(Duration::from_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_secs(self.lock_wait_secs)
    }

    pub fn lock_stale(&self) -> Duration {
        Duration::from_secs(self.lock_stale_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CrewConfig::default()`.
pub fn load_config(path: &Path) -> Result<CrewConfig> {
    if !path.exists() {
        let cfg = CrewConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CrewConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &CrewConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, CrewConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = CrewConfig {
            phase_timeout_secs: Some(1200),
            ..CrewConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let cfg = CrewConfig {
            phase_timeout_secs: Some(0),
            ..CrewConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn watch_file_must_stay_inside_the_store() {
        let cfg = CrewConfig {
            watch_file: "../escape.md".to_string(),
            ..CrewConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_tool_command_is_rejected() {
        let cfg = CrewConfig {
            tool: ToolConfig {
                command: Vec::new(),
            },
            ..CrewConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
