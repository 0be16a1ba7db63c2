//! Read-only dashboards for `crew status` and `crew bugs`.

use std::fs;
use std::time::SystemTime;

use anyhow::Result;

use crate::core::bugs::render_bug_lines;
use crate::core::severity::Severity;
use crate::core::types::Document;
use crate::gate::{BOLD, GRAY, GREEN, RED, RESET, YELLOW};
use crate::io::lock;
use crate::io::store::Store;

/// Prints the store dashboard. Returns whether the tree is deployment ready
/// (last tester run passed and no critical finding is open).
pub fn print_status(store: &Store) -> Result<bool> {
    let run_state = store.load_run_state()?;
    let ledger = store.load_bugs()?;
    let bootstrapped = store.document_exists(Document::Architecture);
    let ready = ledger.deployment_ready(run_state.last_test_passed.unwrap_or(false));

    println!("{BOLD}── crew status ──{RESET}");
    println!(
        "  store       {}",
        store.paths().coordination_dir.display()
    );
    if bootstrapped {
        println!("  bootstrap   {GREEN}done{RESET}");
    } else {
        println!("  bootstrap   {YELLOW}pending{RESET}");
    }
    println!("  rounds      {} completed", run_state.rounds_completed);
    if let Some(last) = run_state.last_round {
        println!("  last round  {}", last.as_str());
    }
    match run_state.last_test_passed {
        Some(true) => println!("  last test   {GREEN}pass{RESET}"),
        Some(false) => println!("  last test   {RED}fail{RESET}"),
        None => println!("  last test   {GRAY}never ran{RESET}"),
    }
    println!("  documents");
    for doc in [
        Document::Architecture,
        Document::NextActions,
        Document::BuildLog,
        Document::TestReport,
        Document::DeploymentLog,
    ] {
        let path = store.paths().document_path(doc);
        match fs::metadata(path).and_then(|meta| meta.modified()) {
            Ok(modified) => println!("    {:<18}{}", doc.file_name(), fmt_age(modified)),
            Err(_) => println!("    {:<18}{GRAY}missing{RESET}", doc.file_name()),
        }
    }
    for severity in [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ] {
        let count = ledger.count_unfixed(severity);
        if count > 0 {
            println!("  {}  {count} open", severity.marker());
        }
    }
    if let Some(holder) = lock::read_lock_info(&store.paths().lock_path)? {
        println!(
            "  lock        held by pid {} as '{}' since {}",
            holder.pid, holder.label, holder.acquired_at
        );
    }
    if ready {
        println!("  ready       {GREEN}yes{RESET}");
    } else {
        println!("  ready       {RED}no{RESET}");
    }
    Ok(ready)
}

fn fmt_age(modified: SystemTime) -> String {
    let secs = modified.elapsed().map(|age| age.as_secs()).unwrap_or(0);
    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86_400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86_400)
    }
}

/// Lists bug records; open ones by default, the full ledger with `all`.
pub fn print_bugs(store: &Store, all: bool) -> Result<()> {
    let ledger = store.load_bugs()?;
    let listing = if all {
        render_bug_lines(ledger.bugs.iter())
    } else {
        render_bug_lines(ledger.unfixed())
    };
    if listing.is_empty() {
        println!("no bugs on record");
    } else {
        println!("{listing}");
    }
    if all {
        let fixed = ledger.bugs.iter().filter(|bug| bug.fixed).count();
        if fixed > 0 {
            println!("{GRAY}{fixed} fixed{RESET}");
        }
    }
    Ok(())
}
