//! Creates the `_coordination/` store layout: shared documents, state files,
//! report schemas, and the phase output directory.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{debug, instrument};

use crate::core::bugs::BugLedger;
use crate::io::config::{CrewConfig, write_config};
use crate::io::paths::StorePaths;
use crate::io::run_state::{RunState, write_run_state};

pub const PHASE_REPORT_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/phase_report.schema.json"
));
pub const TESTER_REPORT_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/tester_report.schema.json"
));

const GITIGNORE: &str = "phases/\n.lock\n";

const NEXT_ACTIONS_PLACEHOLDER: &str = "# Next Actions

Populated by the architect during bootstrap.
";

const BUILD_LOG_PLACEHOLDER: &str = "# Build Log

No build has run yet.
";

const TEST_REPORT_PLACEHOLDER: &str = "# Test Report

No test run has been recorded yet.
";

const DEPLOYMENT_LOG_PLACEHOLDER: &str = "# Deployment Log

Nothing has been deployed yet.
";

#[derive(Debug, Clone, Copy, Default)]
pub struct InitOptions {
    pub force: bool,
}

/// Create a fresh store under `root`, refusing to clobber an existing one
/// unless `force` is set.
#[instrument(skip_all, fields(root = %root.display(), force = options.force))]
pub fn init_store(root: &Path, options: &InitOptions) -> Result<StorePaths> {
    let paths = StorePaths::new(root);
    if paths.coordination_dir.exists() {
        if !options.force {
            bail!(
                "coordination store {} already exists (use --force to overwrite)",
                paths.coordination_dir.display()
            );
        }
        fs::remove_dir_all(&paths.coordination_dir)
            .with_context(|| format!("remove {}", paths.coordination_dir.display()))?;
    }
    populate(&paths)?;
    Ok(paths)
}

/// Create any missing parts of the store without touching existing files.
pub fn ensure_store(root: &Path) -> Result<StorePaths> {
    let paths = StorePaths::new(root);
    populate(&paths)?;
    Ok(paths)
}

fn populate(paths: &StorePaths) -> Result<()> {
    for dir in [&paths.coordination_dir, &paths.state_dir, &paths.phases_dir] {
        fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    }
    // ARCHITECTURE.md is deliberately absent: its presence marks a completed
    // bootstrap, so the architect must be the one to create it.
    write_if_missing(&paths.gitignore_path, GITIGNORE)?;
    write_if_missing(&paths.next_actions_path, NEXT_ACTIONS_PLACEHOLDER)?;
    write_if_missing(&paths.build_log_path, BUILD_LOG_PLACEHOLDER)?;
    write_if_missing(&paths.test_report_path, TEST_REPORT_PLACEHOLDER)?;
    write_if_missing(&paths.deployment_log_path, DEPLOYMENT_LOG_PLACEHOLDER)?;
    write_if_missing(&paths.history_path, "")?;
    write_if_missing(&paths.phase_report_schema_path, PHASE_REPORT_SCHEMA)?;
    write_if_missing(&paths.tester_report_schema_path, TESTER_REPORT_SCHEMA)?;
    if !paths.config_path.exists() {
        write_config(&paths.config_path, &CrewConfig::default())?;
    }
    if !paths.bugs_path.exists() {
        let mut contents = serde_json::to_string_pretty(&BugLedger::default())?;
        contents.push('\n');
        fs::write(&paths.bugs_path, contents)
            .with_context(|| format!("write {}", paths.bugs_path.display()))?;
    }
    if !paths.run_state_path.exists() {
        write_run_state(&paths.run_state_path, &RunState::default())?;
    }
    Ok(())
}

fn write_if_missing(path: &Path, contents: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))?;
    debug!(path = %path.display(), "created store file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies the full layout lands on disk and that the bootstrap marker
    /// document is not pre-created.
    #[test]
    fn init_creates_layout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_store(temp.path(), &InitOptions::default()).expect("init");

        assert!(paths.coordination_dir.is_dir());
        assert!(paths.state_dir.is_dir());
        assert!(paths.phases_dir.is_dir());
        assert!(paths.next_actions_path.is_file());
        assert!(paths.build_log_path.is_file());
        assert!(paths.test_report_path.is_file());
        assert!(paths.deployment_log_path.is_file());
        assert!(paths.history_path.is_file());
        assert!(paths.gitignore_path.is_file());
        assert!(paths.config_path.is_file());
        assert!(paths.bugs_path.is_file());
        assert!(paths.run_state_path.is_file());
        assert!(paths.phase_report_schema_path.is_file());
        assert!(paths.tester_report_schema_path.is_file());
        assert!(!paths.architecture_path.exists());
    }

    #[test]
    fn init_refuses_existing_store() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_store(temp.path(), &InitOptions::default()).expect("first init");

        let err = init_store(temp.path(), &InitOptions::default()).expect_err("second init");
        assert!(format!("{err:#}").contains("--force"));
    }

    #[test]
    fn force_resets_the_store() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_store(temp.path(), &InitOptions::default()).expect("init");
        fs::write(&paths.build_log_path, "edited\n").expect("write");
        fs::write(&paths.architecture_path, "# Architecture\n").expect("write");

        init_store(temp.path(), &InitOptions { force: true }).expect("force init");
        let build_log = fs::read_to_string(&paths.build_log_path).expect("read");
        assert_eq!(build_log, BUILD_LOG_PLACEHOLDER);
        assert!(!paths.architecture_path.exists());
    }

    /// Verifies `ensure_store` backfills missing files but never rewrites
    /// existing ones.
    #[test]
    fn ensure_store_preserves_existing_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = ensure_store(temp.path()).expect("ensure");
        fs::write(&paths.next_actions_path, "- ship it\n").expect("write");
        fs::remove_file(&paths.test_report_path).expect("remove");

        ensure_store(temp.path()).expect("ensure again");
        let actions = fs::read_to_string(&paths.next_actions_path).expect("read");
        assert_eq!(actions, "- ship it\n");
        assert!(paths.test_report_path.is_file());
    }
}
