//! I/O helpers for crew commands.

pub mod config;
pub mod history;
pub mod init;
pub mod lock;
pub mod paths;
pub mod process;
pub mod prompt;
pub mod run_state;
pub mod store;
pub mod tool;
