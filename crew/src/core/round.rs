//! Explicit state machine for one Build -> Test -> Deploy round.
//!
//! A failing build skips straight to the decision gate instead of "testing"
//! and "deploying" a broken tree, and deployment only runs from a ready state.

use serde::{Deserialize, Serialize};

use crate::core::types::{PhaseOutcome, TesterReport};

/// Phase slots of a round, plus the terminal decision gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Build,
    Test,
    Deploy,
    Decision,
}

impl RoundState {
    pub fn after_build(outcome: PhaseOutcome) -> RoundState {
        match outcome {
            PhaseOutcome::Ok => RoundState::Test,
            PhaseOutcome::Failed => RoundState::Decision,
        }
    }

    pub fn after_test(verdict: TestVerdict) -> RoundState {
        match verdict {
            TestVerdict::Ready => RoundState::Deploy,
            TestVerdict::NotReady | TestVerdict::Failed => RoundState::Decision,
        }
    }

    pub fn after_deploy() -> RoundState {
        RoundState::Decision
    }
}

/// Classified result of a Tester run, driving the Test transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestVerdict {
    /// Tests passed and nothing blocks deployment.
    Ready,
    /// Tests passed but an unfixed critical bug blocks deployment.
    NotReady,
    /// The session failed or the test run itself did not pass.
    Failed,
}

impl TestVerdict {
    pub fn derive(report: &TesterReport, has_unfixed_critical: bool) -> TestVerdict {
        if !report.is_pass() {
            return TestVerdict::Failed;
        }
        if has_unfixed_critical {
            return TestVerdict::NotReady;
        }
        TestVerdict::Ready
    }
}

/// What happened in one phase slot of a finished round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Ok,
    Failed,
    Skipped,
}

impl StageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StageStatus::Ok => "ok",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
        }
    }
}

/// One-word classification of a finished round, persisted for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundDisposition {
    Deployed,
    DeployFailed,
    BuildFailed,
    TestFailed,
    NotReady,
}

impl RoundDisposition {
    pub fn as_str(self) -> &'static str {
        match self {
            RoundDisposition::Deployed => "deployed",
            RoundDisposition::DeployFailed => "deploy failed",
            RoundDisposition::BuildFailed => "build failed",
            RoundDisposition::TestFailed => "test failed",
            RoundDisposition::NotReady => "not ready",
        }
    }
}

/// Everything the decision gate displays about a finished round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSummary {
    /// Round number within this session (1-indexed).
    pub round: u32,
    pub max_rounds: u32,
    pub build: StageStatus,
    pub test: StageStatus,
    pub deploy: StageStatus,
    /// Test verdict as declared by the Tester, when the phase ran.
    pub test_passed: Option<bool>,
    /// Deployment readiness after this round's Tester merge.
    pub ready: bool,
    pub open_critical: usize,
    pub open_high: usize,
    /// High-severity ids deferred at this gate for the first time.
    pub newly_deferred_high: Vec<String>,
    /// High-severity ids already deferred once and still unfixed.
    pub blocking_high: Vec<String>,
}

impl RoundSummary {
    pub fn disposition(&self) -> RoundDisposition {
        if self.build == StageStatus::Failed {
            return RoundDisposition::BuildFailed;
        }
        if self.test == StageStatus::Failed {
            return RoundDisposition::TestFailed;
        }
        match self.deploy {
            StageStatus::Ok => RoundDisposition::Deployed,
            StageStatus::Failed => RoundDisposition::DeployFailed,
            StageStatus::Skipped => RoundDisposition::NotReady,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{PhaseOutcome, Role};

    fn tester_report(outcome: PhaseOutcome, passed: bool) -> TesterReport {
        TesterReport {
            role: Role::Tester,
            outcome,
            summary: "ran".to_string(),
            passed,
            bugs: Vec::new(),
            fixed_bug_ids: Vec::new(),
        }
    }

    #[test]
    fn failed_build_goes_straight_to_decision() {
        assert_eq!(
            RoundState::after_build(PhaseOutcome::Failed),
            RoundState::Decision
        );
        assert_eq!(RoundState::after_build(PhaseOutcome::Ok), RoundState::Test);
    }

    #[test]
    fn only_ready_tests_reach_deploy() {
        assert_eq!(
            RoundState::after_test(TestVerdict::Ready),
            RoundState::Deploy
        );
        assert_eq!(
            RoundState::after_test(TestVerdict::NotReady),
            RoundState::Decision
        );
        assert_eq!(
            RoundState::after_test(TestVerdict::Failed),
            RoundState::Decision
        );
        assert_eq!(RoundState::after_deploy(), RoundState::Decision);
    }

    #[test]
    fn verdict_failed_when_session_or_tests_fail() {
        let failed_session = tester_report(PhaseOutcome::Failed, true);
        assert_eq!(
            TestVerdict::derive(&failed_session, false),
            TestVerdict::Failed
        );

        let red_tests = tester_report(PhaseOutcome::Ok, false);
        assert_eq!(TestVerdict::derive(&red_tests, false), TestVerdict::Failed);
    }

    #[test]
    fn verdict_not_ready_when_critical_open() {
        let green = tester_report(PhaseOutcome::Ok, true);
        assert_eq!(TestVerdict::derive(&green, true), TestVerdict::NotReady);
        assert_eq!(TestVerdict::derive(&green, false), TestVerdict::Ready);
    }

    #[test]
    fn disposition_reflects_the_earliest_failure() {
        let mut summary = RoundSummary {
            round: 1,
            max_rounds: 10,
            build: StageStatus::Failed,
            test: StageStatus::Skipped,
            deploy: StageStatus::Skipped,
            test_passed: None,
            ready: false,
            open_critical: 0,
            open_high: 0,
            newly_deferred_high: Vec::new(),
            blocking_high: Vec::new(),
        };
        assert_eq!(summary.disposition(), RoundDisposition::BuildFailed);

        summary.build = StageStatus::Ok;
        summary.test = StageStatus::Failed;
        assert_eq!(summary.disposition(), RoundDisposition::TestFailed);

        summary.test = StageStatus::Ok;
        summary.test_passed = Some(true);
        assert_eq!(summary.disposition(), RoundDisposition::NotReady);

        summary.deploy = StageStatus::Failed;
        assert_eq!(summary.disposition(), RoundDisposition::DeployFailed);

        summary.deploy = StageStatus::Ok;
        summary.ready = true;
        assert_eq!(summary.disposition(), RoundDisposition::Deployed);
    }
}
