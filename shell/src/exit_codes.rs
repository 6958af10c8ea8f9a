//! Stable exit codes for tick-shell CLI commands.

/// Command succeeded; a simulation ran every scripted tick.
pub const OK: i32 = 0;
/// Invalid config or scenario, or another error.
pub const INVALID: i32 = 1;
/// `tick-shell simulate` stopped at a hard-halt request.
pub const HALTED: i32 = 2;
