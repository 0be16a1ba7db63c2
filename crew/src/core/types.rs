//! Shared deterministic types for crew core logic.
//!
//! These types define stable contracts between core components. They should not
//! depend on external state or I/O and must remain deterministic across runs.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::severity::Severity;

/// Role persona for one external-tool session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Architect,
    Builder,
    Tester,
    Deployer,
    BugFixer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Architect => "architect",
            Role::Builder => "builder",
            Role::Tester => "tester",
            Role::Deployer => "deployer",
            Role::BugFixer => "bugfixer",
        }
    }

    /// Human-facing name used in summaries and prompts.
    pub fn title(self) -> &'static str {
        match self {
            Role::Architect => "Architect",
            Role::Builder => "Builder",
            Role::Tester => "Tester",
            Role::Deployer => "Deployer",
            Role::BugFixer => "Bug-Fixer",
        }
    }

    pub fn parse(input: &str) -> Result<Role> {
        match input.trim().to_ascii_lowercase().as_str() {
            "architect" => Ok(Role::Architect),
            "builder" => Ok(Role::Builder),
            "tester" => Ok(Role::Tester),
            "deployer" => Ok(Role::Deployer),
            "bugfixer" | "bug-fixer" => Ok(Role::BugFixer),
            other => Err(anyhow!(
                "unknown role '{other}' (expected architect, builder, tester, deployer or bugfixer)"
            )),
        }
    }
}

/// Session-declared outcome of one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseOutcome {
    Ok,
    Failed,
}

/// Structured report every role session must write before exiting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub role: Role,
    pub outcome: PhaseOutcome,
    pub summary: String,
}

/// A defect as reported by a Tester session; ids are assigned on merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedBug {
    pub severity: Severity,
    pub location: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
}

/// Extended report written by Tester sessions.
///
/// `bugs` holds newly discovered defects; `fixed_bug_ids` names previously
/// recorded bugs the session confirmed as fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TesterReport {
    pub role: Role,
    pub outcome: PhaseOutcome,
    pub summary: String,
    pub passed: bool,
    #[serde(default)]
    pub bugs: Vec<ReportedBug>,
    #[serde(default)]
    pub fixed_bug_ids: Vec<String>,
}

impl TesterReport {
    /// True when the session completed and declared the test run green.
    pub fn is_pass(&self) -> bool {
        self.outcome == PhaseOutcome::Ok && self.passed
    }
}

/// Logical documents of the coordination store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Document {
    Architecture,
    NextActions,
    BuildLog,
    TestReport,
    DeploymentLog,
}

impl Document {
    pub fn title(self) -> &'static str {
        match self {
            Document::Architecture => "Architecture",
            Document::NextActions => "Next Actions",
            Document::BuildLog => "Build Log",
            Document::TestReport => "Test Report",
            Document::DeploymentLog => "Deployment Log",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Document::Architecture => "ARCHITECTURE.md",
            Document::NextActions => "NEXT_ACTIONS.md",
            Document::BuildLog => "BUILD_LOG.md",
            Document::TestReport => "TEST_REPORT.md",
            Document::DeploymentLog => "DEPLOYMENT_LOG.md",
        }
    }
}
