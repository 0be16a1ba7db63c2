//! Stable exit codes for crew CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed due to invalid layout/config/report or other errors.
pub const INVALID: i32 = 1;
/// The store lock could not be acquired within the configured wait.
pub const LOCKED: i32 = 2;
/// `crew status` found the store not ready to deploy.
pub const NOT_READY: i32 = 3;
