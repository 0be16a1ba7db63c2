//! One `crew run` invocation: bootstrap, the round loop, and the gate.

use std::path::Path;

use anyhow::{Result, bail};
use tracing::{debug, info, instrument};

use crate::core::menu::GateChoice;
use crate::core::types::{Document, PhaseOutcome, Role};
use crate::gate::DecisionGate;
use crate::io::config::CrewConfig;
use crate::io::init::ensure_store;
use crate::io::lock::StoreLock;
use crate::io::store::Store;
use crate::io::tool::PhaseRunner;
use crate::phase;
use crate::round::run_round;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStop {
    /// The operator picked stop at the gate.
    Stopped,
    /// The round cap was hit; the closing summary is shown without a menu.
    RoundCapReached,
}

#[derive(Debug)]
pub struct SessionOutcome {
    pub rounds_run: u32,
    pub stop: SessionStop,
    /// Whether this invocation ran the architect.
    pub bootstrapped: bool,
}

/// Drives a full session: ensure the store, bootstrap if needed, then run
/// rounds until the operator stops or the cap is reached.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn run_session<R: PhaseRunner, G: DecisionGate>(
    root: &Path,
    runner: &R,
    gate: &mut G,
    max_rounds_override: Option<u32>,
) -> Result<SessionOutcome> {
    ensure_store(root)?;
    let store = Store::new(root);
    let config = store.load_config()?;
    let max_rounds = max_rounds_override.unwrap_or(config.max_rounds);
    if max_rounds == 0 {
        bail!("max rounds must be at least 1");
    }

    let bootstrapped = bootstrap(&store, runner, &config)?;

    let mut round = 1;
    loop {
        let summary = run_round(&store, runner, &config, round, max_rounds)?;
        if round >= max_rounds {
            gate.close(&summary)?;
            info!(rounds_run = round, "round cap reached");
            return Ok(SessionOutcome {
                rounds_run: round,
                stop: SessionStop::RoundCapReached,
                bootstrapped,
            });
        }
        let next_actions = store
            .read_document_opt(Document::NextActions)?
            .unwrap_or_default();
        loop {
            match gate.choose(&summary, &next_actions)? {
                GateChoice::Continue => break,
                GateChoice::Stop => {
                    info!(rounds_run = round, "stopped at the gate");
                    return Ok(SessionOutcome {
                        rounds_run: round,
                        stop: SessionStop::Stopped,
                        bootstrapped,
                    });
                }
                GateChoice::ViewLogs => view_logs(&store, gate)?,
            }
        }
        round += 1;
    }
}

/// Runs the architect once, keyed on the architecture document.
///
/// Interrupted sessions can be re-run: a store that already has an
/// architecture skips straight to the rounds.
fn bootstrap<R: PhaseRunner>(store: &Store, runner: &R, config: &CrewConfig) -> Result<bool> {
    if store.document_exists(Document::Architecture) {
        debug!("architecture present, skipping bootstrap");
        return Ok(false);
    }
    info!("bootstrapping: running the architect");
    let artifacts = {
        let _lock = StoreLock::acquire(
            &store.paths().lock_path,
            Role::Architect.as_str(),
            config.lock_wait(),
            config.lock_stale(),
        )?;
        phase::run_phase(store, runner, config, Role::Architect)?
    };
    if artifacts.report.outcome != PhaseOutcome::Ok {
        bail!("bootstrap failed: {}", artifacts.report.summary);
    }
    if !store.document_exists(Document::Architecture) {
        bail!(
            "bootstrap finished without writing {}",
            Document::Architecture.file_name()
        );
    }
    Ok(true)
}

/// Walks the log sub-menu until the gate asks to go back. Viewing documents
/// never consumes a round.
fn view_logs<G: DecisionGate>(store: &Store, gate: &mut G) -> Result<()> {
    while let Some(choice) = gate.choose_log()? {
        let contents = match choice.document() {
            Some(doc) => store
                .read_document_opt(doc)?
                .unwrap_or_else(|| "(not written yet)\n".to_string()),
            None => store.read_history()?,
        };
        gate.show_document(choice, &contents)?;
    }
    Ok(())
}
