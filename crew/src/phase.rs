//! Orchestration for a single role phase: prompt assembly, tool session,
//! report collection, and sequence bookkeeping.
//!
//! A phase failure (dead tool, missing or malformed report) is recorded as a
//! failed outcome instead of an error so the round machine can take its
//! failure transition; only store-level problems propagate as errors.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::bugs::{BugLedger, MergeSummary};
use crate::core::types::{PhaseOutcome, PhaseReport, Role, TesterReport};
use crate::io::config::CrewConfig;
use crate::io::prompt::{PromptBuilder, PromptInputs};
use crate::io::store::Store;
use crate::io::tool::{PhaseRequest, PhaseRunner, run_and_load_report, run_and_load_tester_report};

/// Result of one non-Tester phase.
#[derive(Debug, Clone)]
pub struct PhaseArtifacts {
    /// Store-wide sequence number of this phase.
    pub seq: u64,
    /// Directory holding prompt, report, and session log.
    pub dir: PathBuf,
    pub report: PhaseReport,
}

/// Result of one Tester phase, including the ledger merge.
#[derive(Debug, Clone)]
pub struct TesterArtifacts {
    pub seq: u64,
    pub dir: PathBuf,
    pub report: TesterReport,
    /// What the merge changed in the bug ledger.
    pub merge: MergeSummary,
    /// Ledger snapshot after the merge.
    pub ledger: BugLedger,
}

/// Run one role session end to end. The caller must hold the store lock.
#[instrument(skip_all, fields(role = role.as_str()))]
pub fn run_phase<R: PhaseRunner>(
    store: &Store,
    runner: &R,
    config: &CrewConfig,
    role: Role,
) -> Result<PhaseArtifacts> {
    let mut run_state = store.load_run_state()?;
    let seq = run_state.phase_seq;
    let (dir, request) = prepare_phase(store, config, role, seq)?;

    let report = match run_and_load_report(runner, &request) {
        Ok(report) => report,
        Err(err) => failed_phase_report(&dir, role, &err)?,
    };

    run_state.phase_seq = seq + 1;
    store.write_run_state(&run_state)?;

    info!(seq, outcome = ?report.outcome, "phase finished");
    Ok(PhaseArtifacts { seq, dir, report })
}

/// Run one Tester session and fold its findings into the bug ledger. The
/// caller must hold the store lock.
#[instrument(skip_all)]
pub fn run_tester<R: PhaseRunner>(
    store: &Store,
    runner: &R,
    config: &CrewConfig,
) -> Result<TesterArtifacts> {
    let mut run_state = store.load_run_state()?;
    let seq = run_state.phase_seq;
    let (dir, request) = prepare_phase(store, config, Role::Tester, seq)?;

    let report = match run_and_load_tester_report(runner, &request) {
        Ok(report) => report,
        Err(err) => failed_tester_report(&dir, &err)?,
    };

    let mut ledger = store.load_bugs()?;
    let merge = ledger.merge_tester_report(&report, seq);
    store.write_bugs(&ledger)?;
    store.append_history(report.is_pass())?;
    if !merge.unknown_fixed.is_empty() {
        warn!(
            ids = ?merge.unknown_fixed,
            "tester claimed fixes for unknown bug ids"
        );
    }

    run_state.phase_seq = seq + 1;
    run_state.last_test_passed = Some(report.is_pass());
    store.write_run_state(&run_state)?;

    info!(
        seq,
        passed = report.is_pass(),
        added = merge.added.len(),
        fixed = merge.fixed.len(),
        "tester phase finished"
    );
    Ok(TesterArtifacts {
        seq,
        dir,
        report,
        merge,
        ledger,
    })
}

fn prepare_phase(
    store: &Store,
    config: &CrewConfig,
    role: Role,
    seq: u64,
) -> Result<(PathBuf, PhaseRequest)> {
    let dir = store.phase_dir(seq, role);
    fs::create_dir_all(&dir).with_context(|| format!("create phase dir {}", dir.display()))?;

    let schema_path = match role {
        Role::Tester => store.paths().tester_report_schema_path.clone(),
        _ => store.paths().phase_report_schema_path.clone(),
    };
    let report_path = dir.join("report.json");

    let inputs = PromptInputs::from_store(
        store,
        role,
        report_path.display().to_string(),
        schema_path.display().to_string(),
    )?;
    let prompt = PromptBuilder::new(config.prompt_budget_bytes)
        .build(&inputs)
        .render();
    let prompt_path = dir.join("prompt.md");
    fs::write(&prompt_path, &prompt)
        .with_context(|| format!("write prompt {}", prompt_path.display()))?;

    let request = PhaseRequest {
        workdir: store.paths().root.clone(),
        role,
        prompt,
        command: config.tool.command.clone(),
        report_schema_path: schema_path,
        report_path,
        session_log_path: dir.join("session.log"),
        timeout: config.phase_timeout(),
        output_limit_bytes: config.output_limit_bytes,
    };
    Ok((dir, request))
}

fn failed_phase_report(dir: &Path, role: Role, err: &anyhow::Error) -> Result<PhaseReport> {
    warn!(role = role.as_str(), err = %err, "session failed, recording failed phase");
    write_phase_error(dir, err)?;
    Ok(PhaseReport {
        role,
        outcome: PhaseOutcome::Failed,
        summary: "session error (see phase_error.log)".to_string(),
    })
}

fn failed_tester_report(dir: &Path, err: &anyhow::Error) -> Result<TesterReport> {
    warn!(err = %err, "tester session failed, recording failed phase");
    write_phase_error(dir, err)?;
    Ok(TesterReport {
        role: Role::Tester,
        outcome: PhaseOutcome::Failed,
        summary: "session error (see phase_error.log)".to_string(),
        passed: false,
        bugs: Vec::new(),
        fixed_bug_ids: Vec::new(),
    })
}

fn write_phase_error(dir: &Path, err: &anyhow::Error) -> Result<()> {
    let path = dir.join("phase_error.log");
    fs::write(&path, format!("phase error: {err:#}\n"))
        .with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::severity::Severity;
    use crate::core::types::ReportedBug;
    use crate::test_support::{ScriptedPhase, ScriptedPhaseRunner, temp_store};

    /// Verifies a dead session becomes a failed report plus an error log
    /// instead of an orchestrator error.
    #[test]
    fn phase_failure_is_recorded_not_propagated() {
        let (_temp, store) = temp_store();
        let runner = ScriptedPhaseRunner::new(vec![ScriptedPhase::error("tool exploded")]);
        let config = CrewConfig::default();

        let artifacts = run_phase(&store, &runner, &config, Role::Builder).expect("phase");
        assert_eq!(artifacts.report.outcome, PhaseOutcome::Failed);
        assert!(artifacts.dir.join("phase_error.log").is_file());
        assert!(artifacts.dir.join("prompt.md").is_file());

        let run_state = store.load_run_state().expect("run state");
        assert_eq!(run_state.phase_seq, artifacts.seq + 1);
    }

    /// Verifies tester findings land in the ledger with assigned ids and the
    /// pass verdict lands in run state.
    #[test]
    fn tester_phase_merges_findings_into_ledger() {
        let (_temp, store) = temp_store();
        let bug = ReportedBug {
            severity: Severity::Critical,
            location: "api.rs".to_string(),
            description: "drops every request".to_string(),
            suggested_fix: None,
        };
        let runner =
            ScriptedPhaseRunner::new(vec![ScriptedPhase::tester_report(false, vec![bug])]);
        let config = CrewConfig::default();

        let artifacts = run_tester(&store, &runner, &config).expect("tester");
        assert_eq!(artifacts.merge.added, vec!["bug-001".to_string()]);
        assert!(artifacts.ledger.has_unfixed_critical());

        let ledger = store.load_bugs().expect("ledger");
        assert_eq!(ledger.bugs.len(), 1);
        assert_eq!(ledger.bugs[0].id, "bug-001");
        assert_eq!(ledger.bugs[0].found_in_phase, artifacts.seq);

        let run_state = store.load_run_state().expect("run state");
        assert_eq!(run_state.last_test_passed, Some(false));
    }

    /// Verifies consecutive phases consume consecutive sequence numbers and
    /// keep separate directories.
    #[test]
    fn phases_consume_consecutive_sequence_numbers() {
        let (_temp, store) = temp_store();
        let runner = ScriptedPhaseRunner::new(vec![
            ScriptedPhase::phase_ok(Role::Architect),
            ScriptedPhase::phase_ok(Role::Builder),
        ]);
        let config = CrewConfig::default();

        let first = run_phase(&store, &runner, &config, Role::Architect).expect("architect");
        let second = run_phase(&store, &runner, &config, Role::Builder).expect("builder");
        assert_eq!(second.seq, first.seq + 1);
        assert_ne!(first.dir, second.dir);
    }
}
