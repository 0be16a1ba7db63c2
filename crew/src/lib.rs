//! File-coordinated multi-role dev loop for an external AI coding tool.
//!
//! This crate orchestrates repeated sessions of an AI coding assistant CLI in
//! five role personas (Architect, Builder, Tester, Deployer, Bug-Fixer). All
//! state between sessions lives in a `_coordination/` directory of Markdown
//! documents and typed JSON records. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (round transitions, bug merging,
//!   menu parsing, change detection). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (store access, locking, process
//!   execution, prompt assembly). Isolated to enable mocking in tests.
//!
//! Orchestration modules ([`phase`], [`round`], [`session`], [`watch`])
//! coordinate core logic with I/O to implement CLI commands.

pub mod core;
pub mod exit_codes;
pub mod gate;
pub mod io;
pub mod logging;
pub mod phase;
pub mod round;
pub mod session;
pub mod status;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod watch;
