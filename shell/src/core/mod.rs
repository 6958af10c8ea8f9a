//! Deterministic, pure logic shared by the tick shell.
//!
//! Core modules must be free of I/O side effects. They operate on plain values
//! (loop state, sampled budget) and return decisions suitable for tests.

pub mod gate;
pub mod transitions;
pub mod types;
