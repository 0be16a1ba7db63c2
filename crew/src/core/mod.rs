//! Deterministic, pure logic shared by the crew orchestrator.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod bugs;
pub mod change;
pub mod menu;
pub mod round;
pub mod severity;
pub mod types;
