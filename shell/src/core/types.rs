//! Shared deterministic types for the tick driver.

use std::fmt;

/// Numeric allowance reported by the host each tick (e.g. a CPU bucket).
pub type ResourceBudget = u32;

/// Process-wide state of the tick loop.
///
/// A fresh process always starts at [`LoopState::Uninitialized`]. There is no
/// durable persistence: a hard halt discards it together with the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    /// The computation module has not been brought up yet.
    #[default]
    Uninitialized,
    /// Setup completed; every tick invokes the module once.
    Ready,
    /// A critical-path fault was contained; the next tick requests a hard halt.
    FaultPendingRestart,
}

impl LoopState {
    pub const ALL: [LoopState; 3] = [
        LoopState::Uninitialized,
        LoopState::Ready,
        LoopState::FaultPendingRestart,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LoopState::Uninitialized => "uninitialized",
            LoopState::Ready => "ready",
            LoopState::FaultPendingRestart => "fault_pending_restart",
        }
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What the driver decided to do for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// Ask the host to terminate the process; nothing else runs.
    Halt,
    /// Budget below the initialization threshold; no lifecycle work this tick.
    Wait { budget: ResourceBudget, shortfall: u32 },
    /// Load, initialize and set up the module, then run the first invocation.
    Initialize,
    /// Run the periodic invocation on the already loaded module.
    Invoke,
}

impl TickAction {
    pub fn label(self) -> &'static str {
        match self {
            TickAction::Halt => "halt",
            TickAction::Wait { .. } => "wait",
            TickAction::Initialize => "initialize",
            TickAction::Invoke => "invoke",
        }
    }
}

/// How the module-facing part of a tick ended.
///
/// Only meaningful for [`TickAction::Initialize`] and [`TickAction::Invoke`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Completed,
    Faulted,
}

/// Summary of a single tick, returned to the caller instead of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub action: TickAction,
    pub state_before: LoopState,
    pub state_after: LoopState,
    /// Whether the module's log buffer was written to the host log sink.
    pub flushed_log: bool,
}

/// Result of an externally triggered command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command reached the module and returned normally.
    Forwarded,
    /// The module is not loaded (or not ready); the command never reached it.
    NotReady,
    /// The command faulted inside its own recovery boundary. Never escalates.
    Faulted,
}
