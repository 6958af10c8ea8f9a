//! Tick transition table.
//!
//! Every `(LoopState, tick input)` pair maps to exactly one [`TickAction`], and
//! every `(LoopState, TickAction, StepResult)` triple to exactly one next state.
//! The driver performs the side effects; this module only decides.

use crate::core::gate::{GateDecision, evaluate};
use crate::core::types::{LoopState, ResourceBudget, StepResult, TickAction};

/// Inputs sampled once at the top of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInput {
    pub restart_requested: bool,
    pub budget: ResourceBudget,
    pub threshold: ResourceBudget,
}

/// Decide what the driver does this tick.
pub fn plan_tick(state: LoopState, input: TickInput) -> TickAction {
    if input.restart_requested {
        return TickAction::Halt;
    }
    match state {
        LoopState::Uninitialized => match evaluate(input.budget, input.threshold) {
            GateDecision::Proceed => TickAction::Initialize,
            GateDecision::Defer { shortfall } => TickAction::Wait {
                budget: input.budget,
                shortfall,
            },
        },
        LoopState::Ready => TickAction::Invoke,
        LoopState::FaultPendingRestart => TickAction::Halt,
    }
}

/// State after `action` ran from `current` and ended with `result`.
///
/// `result` is ignored for `Halt` and `Wait`, which never enter the module.
pub fn next_state(current: LoopState, action: TickAction, result: StepResult) -> LoopState {
    match (action, result) {
        (TickAction::Halt, _) | (TickAction::Wait { .. }, _) => current,
        (TickAction::Initialize, StepResult::Completed)
        | (TickAction::Invoke, StepResult::Completed) => LoopState::Ready,
        (TickAction::Initialize, StepResult::Faulted)
        | (TickAction::Invoke, StepResult::Faulted) => LoopState::FaultPendingRestart,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(restart_requested: bool, budget: ResourceBudget) -> TickInput {
        TickInput {
            restart_requested,
            budget,
            threshold: 750,
        }
    }

    #[test]
    fn restart_request_halts_from_every_state() {
        for state in LoopState::ALL {
            for budget in [0, 749, 750, 10_000] {
                assert_eq!(plan_tick(state, input(true, budget)), TickAction::Halt);
            }
        }
    }

    #[test]
    fn uninitialized_waits_below_threshold() {
        assert_eq!(
            plan_tick(LoopState::Uninitialized, input(false, 400)),
            TickAction::Wait {
                budget: 400,
                shortfall: 350
            }
        );
    }

    #[test]
    fn uninitialized_initializes_at_or_above_threshold() {
        for budget in [750, 800, 10_000] {
            assert_eq!(
                plan_tick(LoopState::Uninitialized, input(false, budget)),
                TickAction::Initialize
            );
        }
    }

    #[test]
    fn ready_invokes_regardless_of_budget() {
        for budget in [0, 400, 800] {
            assert_eq!(
                plan_tick(LoopState::Ready, input(false, budget)),
                TickAction::Invoke
            );
        }
    }

    #[test]
    fn pending_restart_halts_even_without_flag() {
        assert_eq!(
            plan_tick(LoopState::FaultPendingRestart, input(false, 10_000)),
            TickAction::Halt
        );
    }

    #[test]
    fn module_steps_settle_to_ready_or_pending_restart() {
        for action in [TickAction::Initialize, TickAction::Invoke] {
            for state in LoopState::ALL {
                assert_eq!(
                    next_state(state, action, StepResult::Completed),
                    LoopState::Ready
                );
                assert_eq!(
                    next_state(state, action, StepResult::Faulted),
                    LoopState::FaultPendingRestart
                );
            }
        }
    }

    #[test]
    fn halt_and_wait_keep_state() {
        let wait = TickAction::Wait {
            budget: 1,
            shortfall: 749,
        };
        for state in LoopState::ALL {
            for result in [StepResult::Completed, StepResult::Faulted] {
                assert_eq!(next_state(state, TickAction::Halt, result), state);
                assert_eq!(next_state(state, wait, result), state);
            }
        }
    }

    #[test]
    fn planned_actions_never_leave_pending_restart() {
        for budget in [0, 750, 10_000] {
            for restart_requested in [false, true] {
                let action = plan_tick(
                    LoopState::FaultPendingRestart,
                    input(restart_requested, budget),
                );
                assert_eq!(
                    next_state(LoopState::FaultPendingRestart, action, StepResult::Completed),
                    LoopState::FaultPendingRestart
                );
            }
        }
    }
}
