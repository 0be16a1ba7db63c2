//! Drives one Build -> Test -> Deploy round through the round state machine.
//!
//! Each phase runs under the store lock so a concurrent `crew watch` process
//! can never interleave a Tester run mid-phase. Failure transitions come from
//! [`RoundState`]: a failed build round never runs Test or Deploy, and an
//! unready test round never runs Deploy.

use anyhow::Result;
use tracing::{info, instrument};

use crate::core::round::{RoundState, RoundSummary, StageStatus, TestVerdict};
use crate::core::severity::Severity;
use crate::core::types::{PhaseOutcome, Role};
use crate::io::config::CrewConfig;
use crate::io::lock::StoreLock;
use crate::io::store::Store;
use crate::io::tool::PhaseRunner;
use crate::phase::{run_phase, run_tester};

/// Run one full round and report what happened at the decision gate.
#[instrument(skip_all, fields(round, max_rounds))]
pub fn run_round<R: PhaseRunner>(
    store: &Store,
    runner: &R,
    config: &CrewConfig,
    round: u32,
    max_rounds: u32,
) -> Result<RoundSummary> {
    info!(round, max_rounds, "starting round");

    let mut test = StageStatus::Skipped;
    let mut deploy = StageStatus::Skipped;
    let mut test_passed: Option<bool> = None;
    let mut tester_ledger = None;

    let build_artifacts = {
        let _lock = acquire_lock(store, config, Role::Builder.as_str())?;
        run_phase(store, runner, config, Role::Builder)?
    };
    let build = stage_from_outcome(build_artifacts.report.outcome);
    let mut state = RoundState::after_build(build_artifacts.report.outcome);

    if state == RoundState::Test {
        let artifacts = {
            let _lock = acquire_lock(store, config, Role::Tester.as_str())?;
            run_tester(store, runner, config)?
        };
        test_passed = Some(artifacts.report.is_pass());
        test = if artifacts.report.is_pass() {
            StageStatus::Ok
        } else {
            StageStatus::Failed
        };
        let verdict =
            TestVerdict::derive(&artifacts.report, artifacts.ledger.has_unfixed_critical());
        state = RoundState::after_test(verdict);
        tester_ledger = Some(artifacts.ledger);
    }

    if state == RoundState::Deploy {
        let artifacts = {
            let _lock = acquire_lock(store, config, Role::Deployer.as_str())?;
            run_phase(store, runner, config, Role::Deployer)?
        };
        deploy = stage_from_outcome(artifacts.report.outcome);
    }

    // Every path above funnels into the decision gate.
    let _lock = acquire_lock(store, config, "decision")?;
    let mut ledger = match tester_ledger {
        Some(ledger) => ledger,
        None => store.load_bugs()?,
    };
    let defer = ledger.surface_highs();
    store.write_bugs(&ledger)?;

    let summary = RoundSummary {
        round,
        max_rounds,
        build,
        test,
        deploy,
        test_passed,
        ready: ledger.deployment_ready(test_passed.unwrap_or(false)),
        open_critical: ledger.count_unfixed(Severity::Critical),
        open_high: ledger.count_unfixed(Severity::High),
        newly_deferred_high: defer.newly_deferred,
        blocking_high: defer.blocking,
    };

    let mut run_state = store.load_run_state()?;
    run_state.rounds_completed += 1;
    run_state.last_round = Some(summary.disposition());
    store.write_run_state(&run_state)?;

    info!(
        round,
        disposition = summary.disposition().as_str(),
        ready = summary.ready,
        "round finished"
    );
    Ok(summary)
}

fn stage_from_outcome(outcome: PhaseOutcome) -> StageStatus {
    match outcome {
        PhaseOutcome::Ok => StageStatus::Ok,
        PhaseOutcome::Failed => StageStatus::Failed,
    }
}

fn acquire_lock(store: &Store, config: &CrewConfig, label: &str) -> Result<StoreLock> {
    StoreLock::acquire(
        &store.paths().lock_path,
        label,
        config.lock_wait(),
        config.lock_stale(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::round::RoundDisposition;
    use crate::core::severity::Severity;
    use crate::core::types::ReportedBug;
    use crate::test_support::{ScriptedPhase, ScriptedPhaseRunner, temp_store};

    fn high_bug(location: &str) -> ReportedBug {
        ReportedBug {
            severity: Severity::High,
            location: location.to_string(),
            description: "slow path under load".to_string(),
            suggested_fix: None,
        }
    }

    fn critical_bug(location: &str) -> ReportedBug {
        ReportedBug {
            severity: Severity::Critical,
            location: location.to_string(),
            description: "loses data".to_string(),
            suggested_fix: None,
        }
    }

    /// Verifies a green round walks Build -> Test -> Deploy and comes out
    /// ready.
    #[test]
    fn green_round_deploys() {
        let (_temp, store) = temp_store();
        let runner = ScriptedPhaseRunner::new(vec![
            ScriptedPhase::phase_ok(Role::Builder),
            ScriptedPhase::tester_report(true, Vec::new()),
            ScriptedPhase::phase_ok(Role::Deployer),
        ]);
        let config = CrewConfig::default();

        let summary = run_round(&store, &runner, &config, 1, 10).expect("round");
        assert_eq!(summary.build, StageStatus::Ok);
        assert_eq!(summary.test, StageStatus::Ok);
        assert_eq!(summary.deploy, StageStatus::Ok);
        assert!(summary.ready);
        assert_eq!(summary.disposition(), RoundDisposition::Deployed);

        let run_state = store.load_run_state().expect("run state");
        assert_eq!(run_state.rounds_completed, 1);
        assert_eq!(run_state.last_round, Some(RoundDisposition::Deployed));
    }

    /// Verifies the failure transition: a failed build round consults no
    /// further phases (the script holds only the builder entry).
    #[test]
    fn build_failure_skips_test_and_deploy() {
        let (_temp, store) = temp_store();
        let runner = ScriptedPhaseRunner::new(vec![ScriptedPhase::phase_failed(Role::Builder)]);
        let config = CrewConfig::default();

        let summary = run_round(&store, &runner, &config, 1, 10).expect("round");
        assert_eq!(summary.build, StageStatus::Failed);
        assert_eq!(summary.test, StageStatus::Skipped);
        assert_eq!(summary.deploy, StageStatus::Skipped);
        assert_eq!(summary.test_passed, None);
        assert!(!summary.ready);
        assert_eq!(summary.disposition(), RoundDisposition::BuildFailed);
    }

    /// Verifies a critical finding blocks deployment even when the test run
    /// itself was green.
    #[test]
    fn critical_finding_blocks_deploy() {
        let (_temp, store) = temp_store();
        let runner = ScriptedPhaseRunner::new(vec![
            ScriptedPhase::phase_ok(Role::Builder),
            ScriptedPhase::tester_report(true, vec![critical_bug("store.rs")]),
        ]);
        let config = CrewConfig::default();

        let summary = run_round(&store, &runner, &config, 1, 10).expect("round");
        assert_eq!(summary.test, StageStatus::Ok);
        assert_eq!(summary.deploy, StageStatus::Skipped);
        assert!(!summary.ready);
        assert_eq!(summary.open_critical, 1);
        assert_eq!(summary.disposition(), RoundDisposition::NotReady);
    }

    /// Verifies the high-severity surfacing policy across gates: deferred at
    /// the first gate, labeled blocking at the next.
    #[test]
    fn high_bug_defers_once_then_blocks() {
        let (_temp, store) = temp_store();
        let runner = ScriptedPhaseRunner::new(vec![
            ScriptedPhase::phase_ok(Role::Builder),
            ScriptedPhase::tester_report(true, vec![high_bug("cache.rs")]),
            ScriptedPhase::phase_ok(Role::Deployer),
            ScriptedPhase::phase_ok(Role::Builder),
            ScriptedPhase::tester_report(true, Vec::new()),
            ScriptedPhase::phase_ok(Role::Deployer),
        ]);
        let config = CrewConfig::default();

        let first = run_round(&store, &runner, &config, 1, 10).expect("round 1");
        assert_eq!(first.newly_deferred_high, vec!["bug-001".to_string()]);
        assert!(first.blocking_high.is_empty());
        assert!(first.ready, "a high finding alone does not block");

        let second = run_round(&store, &runner, &config, 2, 10).expect("round 2");
        assert!(second.newly_deferred_high.is_empty());
        assert_eq!(second.blocking_high, vec!["bug-001".to_string()]);
    }

    /// Verifies a red test run is recorded in the append-only history.
    #[test]
    fn tester_runs_append_history_lines() {
        let (_temp, store) = temp_store();
        let runner = ScriptedPhaseRunner::new(vec![
            ScriptedPhase::phase_ok(Role::Builder),
            ScriptedPhase::tester_report(false, Vec::new()),
        ]);
        let config = CrewConfig::default();

        let summary = run_round(&store, &runner, &config, 1, 10).expect("round");
        assert_eq!(summary.test, StageStatus::Failed);
        assert_eq!(summary.disposition(), RoundDisposition::TestFailed);

        let history = store.read_history().expect("history");
        let lines: Vec<&str> = history.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with(" fail"));
    }
}
