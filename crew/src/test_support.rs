//! Test-only scripted fakes for the tool boundary and the decision gate.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;

use anyhow::{Context, Result, anyhow};
use serde_json::json;

use crate::core::menu::{GateChoice, LogChoice};
use crate::core::round::RoundSummary;
use crate::core::types::{Document, PhaseOutcome, ReportedBug, Role, TesterReport};
use crate::gate::DecisionGate;
use crate::io::init::ensure_store;
use crate::io::paths::StorePaths;
use crate::io::store::Store;
use crate::io::tool::{PhaseRequest, PhaseRunner};

/// One scripted tool session: a report to leave behind, optional document
/// edits, or an error instead of either.
#[derive(Debug, Clone)]
pub struct ScriptedPhase {
    report: Option<serde_json::Value>,
    docs: Vec<(Document, String)>,
    error: Option<String>,
}

impl ScriptedPhase {
    /// Session that fails before producing a report.
    pub fn error(message: &str) -> Self {
        Self {
            report: None,
            docs: Vec::new(),
            error: Some(message.to_string()),
        }
    }

    /// Successful non-tester session for `role`.
    pub fn phase_ok(role: Role) -> Self {
        Self {
            report: Some(json!({
                "role": role.as_str(),
                "outcome": "ok",
                "summary": format!("{} finished", role.as_str()),
            })),
            docs: Vec::new(),
            error: None,
        }
    }

    /// Session that reports its own work as failed.
    pub fn phase_failed(role: Role) -> Self {
        Self {
            report: Some(json!({
                "role": role.as_str(),
                "outcome": "failed",
                "summary": format!("{} could not finish", role.as_str()),
            })),
            docs: Vec::new(),
            error: None,
        }
    }

    /// Tester session with the given verdict and findings.
    pub fn tester_report(passed: bool, bugs: Vec<ReportedBug>) -> Self {
        Self::from_tester(TesterReport {
            role: Role::Tester,
            outcome: PhaseOutcome::Ok,
            summary: "test run recorded".to_string(),
            passed,
            bugs,
            fixed_bug_ids: Vec::new(),
        })
    }

    /// Passing tester session that confirms the given bug ids as fixed.
    pub fn tester_fixing(fixed_bug_ids: Vec<String>) -> Self {
        Self::from_tester(TesterReport {
            role: Role::Tester,
            outcome: PhaseOutcome::Ok,
            summary: "fixes confirmed".to_string(),
            passed: true,
            bugs: Vec::new(),
            fixed_bug_ids,
        })
    }

    fn from_tester(report: TesterReport) -> Self {
        Self {
            report: Some(serde_json::to_value(report).expect("serialize tester report")),
            docs: Vec::new(),
            error: None,
        }
    }

    /// Also write `contents` to `doc` when the session runs, to imitate a
    /// tool that edits coordination documents.
    pub fn with_doc(mut self, doc: Document, contents: &str) -> Self {
        self.docs.push((doc, contents.to_string()));
        self
    }
}

/// PhaseRunner that replays a fixed script instead of spawning the tool.
///
/// Entries are consumed in order; running past the end panics, so a test
/// fails loudly when the orchestrator spawns more sessions than expected.
pub struct ScriptedPhaseRunner {
    script: RefCell<VecDeque<ScriptedPhase>>,
}

impl ScriptedPhaseRunner {
    pub fn new(script: Vec<ScriptedPhase>) -> Self {
        Self {
            script: RefCell::new(script.into()),
        }
    }

    /// Fails when scripted sessions were left unconsumed.
    pub fn assert_drained(&self) -> Result<()> {
        let remaining = self.script.borrow().len();
        if remaining > 0 {
            return Err(anyhow!("{remaining} scripted sessions left unconsumed"));
        }
        Ok(())
    }
}

impl PhaseRunner for ScriptedPhaseRunner {
    fn run(&self, request: &PhaseRequest) -> Result<()> {
        let entry = self
            .script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("phase script exhausted at {} session", request.role.as_str()));
        if let Some(message) = entry.error {
            return Err(anyhow!("{message}"));
        }
        let paths = StorePaths::new(&request.workdir);
        for (doc, contents) in &entry.docs {
            fs::write(paths.document_path(*doc), contents)
                .with_context(|| format!("write scripted {}", doc.file_name()))?;
        }
        if let Some(report) = entry.report {
            if let Some(parent) = request.report_path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create directory {}", parent.display()))?;
            }
            let mut buf = serde_json::to_string_pretty(&report)?;
            buf.push('\n');
            fs::write(&request.report_path, buf).with_context(|| {
                format!("write scripted report {}", request.report_path.display())
            })?;
        }
        Ok(())
    }
}

/// DecisionGate that replays scripted choices and records what it was shown.
#[derive(Default)]
pub struct ScriptedGate {
    choices: VecDeque<GateChoice>,
    log_choices: VecDeque<Option<LogChoice>>,
    /// Documents rendered through `show_document`.
    pub shown: Vec<(LogChoice, String)>,
    /// Summaries seen at `choose`, in order.
    pub summaries: Vec<RoundSummary>,
    /// Summaries seen at `close`.
    pub closed: Vec<RoundSummary>,
}

impl ScriptedGate {
    pub fn new(choices: Vec<GateChoice>) -> Self {
        Self {
            choices: choices.into(),
            ..Self::default()
        }
    }

    pub fn with_log_choices(mut self, log_choices: Vec<Option<LogChoice>>) -> Self {
        self.log_choices = log_choices.into();
        self
    }
}

impl DecisionGate for ScriptedGate {
    fn choose(&mut self, summary: &RoundSummary, _next_actions: &str) -> Result<GateChoice> {
        self.summaries.push(summary.clone());
        Ok(self.choices.pop_front().expect("gate script exhausted"))
    }

    fn choose_log(&mut self) -> Result<Option<LogChoice>> {
        Ok(self.log_choices.pop_front().unwrap_or(None))
    }

    fn show_document(&mut self, choice: LogChoice, contents: &str) -> Result<()> {
        self.shown.push((choice, contents.to_string()));
        Ok(())
    }

    fn close(&mut self, summary: &RoundSummary) -> Result<()> {
        self.closed.push(summary.clone());
        Ok(())
    }
}

/// Initialized store in a temporary directory.
pub fn temp_store() -> (tempfile::TempDir, Store) {
    let temp = tempfile::tempdir().expect("tempdir");
    ensure_store(temp.path()).expect("ensure store");
    let store = Store::new(temp.path());
    (temp, store)
}

/// Mark the store bootstrapped by writing a minimal architecture document.
pub fn write_architecture(store: &Store) {
    store
        .write_document(Document::Architecture, "# Architecture\n\nSingle binary.\n")
        .expect("write architecture");
}
