//! Resource gate deciding whether initialization may start this tick.

use crate::core::types::ResourceBudget;

/// Default threshold the budget must reach before the module is brought up.
///
/// Leaves enough headroom to finish load, instance initialization and setup in
/// one tick without the host cutting the tick short.
pub const DEFAULT_INIT_THRESHOLD: ResourceBudget = 750;

/// Decision of the resource gate for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    Defer { shortfall: u32 },
}

/// Return whether `budget` is enough to attempt initialization.
pub fn can_initialize(budget: ResourceBudget, threshold: ResourceBudget) -> bool {
    budget >= threshold
}

/// Evaluate the gate, reporting how far the budget is from the threshold.
pub fn evaluate(budget: ResourceBudget, threshold: ResourceBudget) -> GateDecision {
    if can_initialize(budget, threshold) {
        GateDecision::Proceed
    } else {
        GateDecision::Defer {
            shortfall: threshold - budget,
        }
    }
}
