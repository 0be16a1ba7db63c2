//! Round-based orchestrator for role-driven coding tool sessions.
//!
//! State lives in Markdown and JSON documents under `_coordination/`. Each
//! phase renders a role prompt, pipes it to the external tool over stdin,
//! and reads back a schema-checked JSON session report.

use std::path::Path;
use std::process;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};

use crew::core::types::{PhaseOutcome, Role};
use crew::exit_codes;
use crew::gate::TerminalGate;
use crew::io::init::{InitOptions, init_store};
use crew::io::lock::{LockBusyError, StoreLock};
use crew::io::store::Store;
use crew::io::tool::ToolPhaseRunner;
use crew::phase;
use crew::session::run_session;
use crew::status::{print_bugs, print_status};
use crew::watch::run_watch;

#[derive(Parser)]
#[command(
    name = "crew",
    version,
    about = "Round-based orchestrator for role-driven coding tool sessions"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the `_coordination/` store with placeholder documents.
    Init {
        /// Reset an existing store.
        #[arg(short, long)]
        force: bool,
    },
    /// Bootstrap if needed, then run rounds with a decision gate between them.
    Run {
        /// Round cap for this invocation (defaults to the configured cap).
        #[arg(long)]
        max_rounds: Option<u32>,
    },
    /// Poll the watched document and run the tester when it changes.
    Watch {
        /// Poll interval override in seconds.
        #[arg(long)]
        interval_secs: Option<u64>,
        /// Stop after this many poll cycles (polls forever by default).
        #[arg(long)]
        max_cycles: Option<u64>,
    },
    /// Run a single role session against the store.
    Phase {
        /// One of: architect, builder, tester, deployer, bugfixer.
        role: String,
    },
    /// Print the store dashboard; exit 3 when not ready to deploy.
    Status,
    /// List open bug records.
    Bugs {
        /// Include fixed records.
        #[arg(long)]
        all: bool,
    },
}

fn main() {
    crew::logging::init();
    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            process::exit(exit_code_for(&err));
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<LockBusyError>().is_some() {
        exit_codes::LOCKED
    } else {
        exit_codes::INVALID
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = Path::new(".");
    match cli.command {
        Command::Init { force } => cmd_init(root, force),
        Command::Run { max_rounds } => cmd_run(root, max_rounds),
        Command::Watch {
            interval_secs,
            max_cycles,
        } => cmd_watch(root, interval_secs, max_cycles),
        Command::Phase { role } => cmd_phase(root, &role),
        Command::Status => cmd_status(root),
        Command::Bugs { all } => cmd_bugs(root, all),
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let paths = init_store(root, &InitOptions { force })?;
    println!("initialized {}", paths.coordination_dir.display());
    Ok(exit_codes::OK)
}

fn cmd_run(root: &Path, max_rounds: Option<u32>) -> Result<i32> {
    let mut gate = TerminalGate;
    run_session(root, &ToolPhaseRunner, &mut gate, max_rounds)?;
    Ok(exit_codes::OK)
}

fn cmd_watch(root: &Path, interval_secs: Option<u64>, max_cycles: Option<u64>) -> Result<i32> {
    let interval = interval_secs.map(Duration::from_secs);
    run_watch(root, &ToolPhaseRunner, interval, max_cycles, |_| {})?;
    Ok(exit_codes::OK)
}

fn cmd_phase(root: &Path, role: &str) -> Result<i32> {
    let role = Role::parse(role)?;
    let store = open_store(root)?;
    let config = store.load_config()?;
    let _lock = StoreLock::acquire(
        &store.paths().lock_path,
        role.as_str(),
        config.lock_wait(),
        config.lock_stale(),
    )?;
    let (outcome, summary) = if role == Role::Tester {
        let artifacts = phase::run_tester(&store, &ToolPhaseRunner, &config)?;
        (artifacts.report.outcome, artifacts.report.summary)
    } else {
        let artifacts = phase::run_phase(&store, &ToolPhaseRunner, &config, role)?;
        (artifacts.report.outcome, artifacts.report.summary)
    };
    match outcome {
        PhaseOutcome::Ok => {
            println!("ok: {summary}");
            Ok(exit_codes::OK)
        }
        PhaseOutcome::Failed => {
            println!("failed: {summary}");
            Ok(exit_codes::INVALID)
        }
    }
}

fn cmd_status(root: &Path) -> Result<i32> {
    let store = open_store(root)?;
    let ready = print_status(&store)?;
    Ok(if ready {
        exit_codes::OK
    } else {
        exit_codes::NOT_READY
    })
}

fn cmd_bugs(root: &Path, all: bool) -> Result<i32> {
    let store = open_store(root)?;
    print_bugs(&store, all)?;
    Ok(exit_codes::OK)
}

fn open_store(root: &Path) -> Result<Store> {
    let store = Store::new(root);
    if !store.exists() {
        bail!(
            "no coordination store at {}; run `crew init` first",
            store.paths().coordination_dir.display()
        );
    }
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::parse_from(["crew", "init"]);
        assert!(matches!(cli.command, Command::Init { force: false }));
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["crew", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
    }

    #[test]
    fn parse_run_with_round_cap() {
        let cli = Cli::parse_from(["crew", "run", "--max-rounds", "3"]);
        assert!(matches!(
            cli.command,
            Command::Run {
                max_rounds: Some(3)
            }
        ));
    }

    #[test]
    fn parse_watch_overrides() {
        let cli = Cli::parse_from(["crew", "watch", "--interval-secs", "2", "--max-cycles", "5"]);
        assert!(matches!(
            cli.command,
            Command::Watch {
                interval_secs: Some(2),
                max_cycles: Some(5)
            }
        ));
    }

    #[test]
    fn parse_phase_role() {
        let cli = Cli::parse_from(["crew", "phase", "tester"]);
        let Command::Phase { role } = cli.command else {
            panic!("expected phase command");
        };
        assert_eq!(role, "tester");
    }
}
