//! Background poll loop: watch one coordination document and react to edits.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::{info, instrument, warn};

use crate::core::change::ChangeTracker;
use crate::core::severity::Severity;
use crate::core::types::Role;
use crate::io::config::CrewConfig;
use crate::io::lock::StoreLock;
use crate::io::store::Store;
use crate::io::tool::PhaseRunner;
use crate::phase;

/// Counters accumulated over the life of the loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchStats {
    pub cycles: u64,
    pub triggered: u64,
    pub tester_runs: u64,
    pub fixer_runs: u64,
    /// Cycles where a change was seen but the store lock was held elsewhere.
    pub skipped_busy: u64,
}

/// Snapshot handed to the per-cycle callback.
#[derive(Debug, Clone, Copy)]
pub struct CycleStats {
    pub cycle: u64,
    pub triggered: bool,
}

/// Polls the watched document's mtime and runs the tester when it changes.
///
/// The first observation only records a baseline. When the tester leaves a
/// critical finding open, the bug fixer runs, followed by a confirmation
/// tester run. `on_cycle` fires after each poll; tests use it to edit the
/// watched file between cycles.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn run_watch<R: PhaseRunner, F: FnMut(&CycleStats)>(
    root: &Path,
    runner: &R,
    interval_override: Option<Duration>,
    max_cycles: Option<u64>,
    mut on_cycle: F,
) -> Result<WatchStats> {
    let store = Store::new(root);
    if !store.exists() {
        bail!(
            "no coordination store at {}; run `crew init` first",
            store.paths().coordination_dir.display()
        );
    }
    let config = store.load_config()?;
    let interval = interval_override.unwrap_or_else(|| config.poll_interval());
    let watch_path = store.paths().coordination_dir.join(&config.watch_file);
    info!(
        watch = %watch_path.display(),
        interval_secs = interval.as_secs(),
        "watching for changes"
    );

    let mut tracker = ChangeTracker::new();
    let mut stats = WatchStats::default();
    loop {
        if max_cycles.is_some_and(|max| stats.cycles >= max) {
            break;
        }
        stats.cycles += 1;
        let mtime = fs::metadata(&watch_path)
            .ok()
            .and_then(|meta| meta.modified().ok());
        let triggered = tracker.observe(mtime);
        if triggered {
            stats.triggered += 1;
            match StoreLock::try_acquire(&store.paths().lock_path, "watch")? {
                None => {
                    stats.skipped_busy += 1;
                    info!("store lock busy, leaving the change to the holder");
                }
                Some(_lock) => react_to_change(&store, runner, &config, &mut stats)?,
            }
        }
        on_cycle(&CycleStats {
            cycle: stats.cycles,
            triggered,
        });
        let done = max_cycles.is_some_and(|max| stats.cycles >= max);
        if !done {
            thread::sleep(interval);
        }
    }
    info!(
        cycles = stats.cycles,
        triggered = stats.triggered,
        tester_runs = stats.tester_runs,
        "watch loop finished"
    );
    Ok(stats)
}

/// Tester first; a critical finding pulls in the bug fixer and then a
/// confirmation tester run so the readiness gate reflects the fix.
fn react_to_change<R: PhaseRunner>(
    store: &Store,
    runner: &R,
    config: &CrewConfig,
    stats: &mut WatchStats,
) -> Result<()> {
    info!("change detected, running the tester");
    let tested = phase::run_tester(store, runner, config)?;
    stats.tester_runs += 1;
    if !tested.ledger.has_unfixed_critical() {
        return Ok(());
    }
    warn!(
        open_critical = tested.ledger.count_unfixed(Severity::Critical),
        "critical findings open, dispatching the bug fixer"
    );
    phase::run_phase(store, runner, config, Role::BugFixer)?;
    stats.fixer_runs += 1;
    let confirmed = phase::run_tester(store, runner, config)?;
    stats.tester_runs += 1;
    if confirmed.ledger.has_unfixed_critical() {
        warn!("critical findings remain after the fix attempt");
    } else {
        info!("critical findings cleared");
    }
    Ok(())
}
