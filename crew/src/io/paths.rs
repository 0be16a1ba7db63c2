//! Canonical layout of the `_coordination/` store.

use std::path::{Path, PathBuf};

use crate::core::types::{Document, Role};

/// Name of the store directory under the project root.
pub const COORDINATION_DIR: &str = "_coordination";

/// All canonical paths within `_coordination/` for a project root.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub root: PathBuf,
    pub coordination_dir: PathBuf,
    pub state_dir: PathBuf,
    pub phases_dir: PathBuf,
    pub gitignore_path: PathBuf,
    pub architecture_path: PathBuf,
    pub next_actions_path: PathBuf,
    pub build_log_path: PathBuf,
    pub test_report_path: PathBuf,
    pub deployment_log_path: PathBuf,
    pub history_path: PathBuf,
    pub lock_path: PathBuf,
    pub config_path: PathBuf,
    pub bugs_path: PathBuf,
    pub run_state_path: PathBuf,
    pub phase_report_schema_path: PathBuf,
    pub tester_report_schema_path: PathBuf,
}

impl StorePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let coordination_dir = root.join(COORDINATION_DIR);
        let state_dir = coordination_dir.join("state");
        let phases_dir = coordination_dir.join("phases");
        Self {
            root,
            coordination_dir: coordination_dir.clone(),
            state_dir: state_dir.clone(),
            phases_dir,
            gitignore_path: coordination_dir.join(".gitignore"),
            architecture_path: coordination_dir.join(Document::Architecture.file_name()),
            next_actions_path: coordination_dir.join(Document::NextActions.file_name()),
            build_log_path: coordination_dir.join(Document::BuildLog.file_name()),
            test_report_path: coordination_dir.join(Document::TestReport.file_name()),
            deployment_log_path: coordination_dir.join(Document::DeploymentLog.file_name()),
            history_path: coordination_dir.join("history.log"),
            lock_path: coordination_dir.join(".lock"),
            config_path: state_dir.join("config.toml"),
            bugs_path: state_dir.join("bugs.json"),
            run_state_path: state_dir.join("round_state.json"),
            phase_report_schema_path: state_dir.join("phase_report.schema.json"),
            tester_report_schema_path: state_dir.join("tester_report.schema.json"),
        }
    }

    pub fn document_path(&self, doc: Document) -> &Path {
        match doc {
            Document::Architecture => &self.architecture_path,
            Document::NextActions => &self.next_actions_path,
            Document::BuildLog => &self.build_log_path,
            Document::TestReport => &self.test_report_path,
            Document::DeploymentLog => &self.deployment_log_path,
        }
    }

    /// Directory holding the artifacts of one phase invocation.
    pub fn phase_dir(&self, seq: u64, role: Role) -> PathBuf {
        self.phases_dir.join(format!("{seq:03}-{}", role.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_hangs_off_the_coordination_dir() {
        let paths = StorePaths::new("/work/project");
        assert_eq!(
            paths.architecture_path,
            Path::new("/work/project/_coordination/ARCHITECTURE.md")
        );
        assert_eq!(
            paths.bugs_path,
            Path::new("/work/project/_coordination/state/bugs.json")
        );
        assert_eq!(
            paths.phase_dir(7, Role::Tester),
            Path::new("/work/project/_coordination/phases/007-tester")
        );
    }

    #[test]
    fn document_paths_match_fixed_file_names() {
        let paths = StorePaths::new("/p");
        for doc in [
            Document::Architecture,
            Document::NextActions,
            Document::BuildLog,
            Document::TestReport,
            Document::DeploymentLog,
        ] {
            let path = paths.document_path(doc);
            assert_eq!(
                path.file_name().and_then(|n| n.to_str()),
                Some(doc.file_name())
            );
        }
    }
}
