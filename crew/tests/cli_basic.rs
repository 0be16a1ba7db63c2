//! CLI tests for crew commands with stable exit codes.
//!
//! Spawns the crew binary and verifies exit codes for init, status, and bugs
//! against fresh, ready, and missing stores.

use std::process::Command;

use crew::exit_codes;
use crew::io::init::ensure_store;
use crew::io::paths::StorePaths;
use crew::io::store::Store;

fn crew(dir: &std::path::Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_crew"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("run crew")
}

#[test]
fn init_creates_the_store_layout() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = crew(temp.path(), &["init"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));

    let paths = StorePaths::new(temp.path());
    assert!(paths.coordination_dir.is_dir());
    assert!(paths.next_actions_path.is_file());
    assert!(paths.config_path.is_file());
    assert!(paths.phase_report_schema_path.is_file());
    assert!(!paths.architecture_path.exists());
}

#[test]
fn init_refuses_an_existing_store() {
    let temp = tempfile::tempdir().expect("tempdir");

    assert_eq!(
        crew(temp.path(), &["init"]).status.code(),
        Some(exit_codes::OK)
    );
    let second = crew(temp.path(), &["init"]);
    assert_eq!(second.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&second.stderr);
    assert!(stderr.contains("--force"));
}

#[test]
fn status_on_a_fresh_store_is_not_ready() {
    let temp = tempfile::tempdir().expect("tempdir");
    ensure_store(temp.path()).expect("ensure store");

    let output = crew(temp.path(), &["status"]);
    assert_eq!(output.status.code(), Some(exit_codes::NOT_READY));
}

#[test]
fn status_after_a_green_test_run_is_ready() {
    let temp = tempfile::tempdir().expect("tempdir");
    ensure_store(temp.path()).expect("ensure store");
    let store = Store::new(temp.path());
    let mut run_state = store.load_run_state().expect("run state");
    run_state.last_test_passed = Some(true);
    store.write_run_state(&run_state).expect("write run state");

    let output = crew(temp.path(), &["status"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
}

#[test]
fn status_without_a_store_is_an_error() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = crew(temp.path(), &["status"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("crew init"));
}

#[test]
fn bugs_lists_nothing_on_a_fresh_store() {
    let temp = tempfile::tempdir().expect("tempdir");
    ensure_store(temp.path()).expect("ensure store");

    let output = crew(temp.path(), &["bugs"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("no bugs on record"));
}
