//! Typed bug records and the merge rules for Tester reports.

use serde::{Deserialize, Serialize};

use crate::core::severity::Severity;
use crate::core::types::TesterReport;

/// One recorded defect. Appended on discovery, mutated in place to mark fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugRecord {
    /// Orchestrator-assigned id (`bug-001`, `bug-002`, ...).
    pub id: String,
    pub severity: Severity,
    pub location: String,
    pub description: String,
    pub suggested_fix: Option<String>,
    pub fixed: bool,
    /// Set when an unfixed high was surfaced at a decision gate once already.
    pub deferred: bool,
    /// Phase sequence number of the Tester run that reported the bug.
    pub found_in_phase: u64,
    pub fixed_in_phase: Option<u64>,
}

/// The authoritative bug list (`_coordination/state/bugs.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugLedger {
    /// Next numeric id to assign (1-indexed, monotonically increasing).
    pub next_id: u64,
    pub bugs: Vec<BugRecord>,
}

impl Default for BugLedger {
    fn default() -> Self {
        Self {
            next_id: 1,
            bugs: Vec::new(),
        }
    }
}

/// Ids touched while merging one Tester report, in deterministic order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Ids assigned to newly recorded bugs.
    pub added: Vec<String>,
    /// Ids flipped to fixed.
    pub fixed: Vec<String>,
    /// Claimed-fixed ids that matched no open record.
    pub unknown_fixed: Vec<String>,
}

/// Ids of unfixed high-severity bugs surfaced at a decision gate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeferSummary {
    /// Surfaced for the first time; now marked deferred.
    pub newly_deferred: Vec<String>,
    /// Already deferred once and still unfixed.
    pub blocking: Vec<String>,
}

impl BugLedger {
    /// Fold a Tester report into the ledger.
    ///
    /// Fix confirmations are applied first so a session can close a bug and
    /// report a new one in the same run. New findings that exactly duplicate
    /// an open record (same location and description) are skipped rather than
    /// recorded twice.
    pub fn merge_tester_report(&mut self, report: &TesterReport, phase_seq: u64) -> MergeSummary {
        let mut summary = MergeSummary::default();

        for id in &report.fixed_bug_ids {
            match self.bugs.iter_mut().find(|b| &b.id == id && !b.fixed) {
                Some(bug) => {
                    bug.fixed = true;
                    bug.fixed_in_phase = Some(phase_seq);
                    summary.fixed.push(id.clone());
                }
                None => summary.unknown_fixed.push(id.clone()),
            }
        }

        for reported in &report.bugs {
            let duplicate = self.bugs.iter().any(|b| {
                !b.fixed && b.location == reported.location && b.description == reported.description
            });
            if duplicate {
                continue;
            }
            let id = format!("bug-{:03}", self.next_id);
            self.next_id += 1;
            self.bugs.push(BugRecord {
                id: id.clone(),
                severity: reported.severity,
                location: reported.location.clone(),
                description: reported.description.clone(),
                suggested_fix: reported.suggested_fix.clone(),
                fixed: false,
                deferred: false,
                found_in_phase: phase_seq,
                fixed_in_phase: None,
            });
            summary.added.push(id);
        }

        summary
    }

    pub fn unfixed(&self) -> impl Iterator<Item = &BugRecord> {
        self.bugs.iter().filter(|b| !b.fixed)
    }

    pub fn has_unfixed_critical(&self) -> bool {
        self.unfixed().any(|b| b.severity == Severity::Critical)
    }

    pub fn count_unfixed(&self, severity: Severity) -> usize {
        self.unfixed().filter(|b| b.severity == severity).count()
    }

    /// Deployment readiness: latest test run passed and no unfixed critical.
    pub fn deployment_ready(&self, test_passed: bool) -> bool {
        test_passed && !self.has_unfixed_critical()
    }

    /// Surface unfixed high-severity bugs at a decision gate.
    ///
    /// The first surfacing marks a record deferred (the one allowed deferral);
    /// records surfaced again while still unfixed are reported as blocking.
    pub fn surface_highs(&mut self) -> DeferSummary {
        let mut summary = DeferSummary::default();
        for bug in &mut self.bugs {
            if bug.fixed || bug.severity != Severity::High {
                continue;
            }
            if bug.deferred {
                summary.blocking.push(bug.id.clone());
            } else {
                bug.deferred = true;
                summary.newly_deferred.push(bug.id.clone());
            }
        }
        summary
    }
}

/// Render a bug list for prompts and terminal output, one line per record.
pub fn render_bug_lines<'a>(bugs: impl Iterator<Item = &'a BugRecord>) -> String {
    let mut lines = Vec::new();
    for bug in bugs {
        lines.push(format!(
            "- {} [{}] {}: {}",
            bug.id,
            bug.severity.marker(),
            bug.location,
            bug.description
        ));
    }
    lines.join("\n")
}
