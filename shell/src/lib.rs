//! Tick-driven execution shell around a sandboxed computation module.
//!
//! The host delivers one tick at a time. The shell decides whether to bring the
//! module up (gated on a host-reported resource budget), invokes it exactly once
//! per tick, contains any fault raised inside it and requests a hard halt when
//! containment is not enough. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (loop state, resource gate,
//!   transition table). No I/O, fully testable in isolation.
//! - **[`io`]**: Seams to the environment (host, module contract, transient
//!   store, config on disk). Isolated to enable scripted doubles in tests.
//!
//! Orchestration modules ([`lifecycle`], [`containment`], [`driver`]) combine
//! the two; [`simulate`] replays scripted scenarios for the CLI.

pub mod containment;
pub mod core;
pub mod driver;
pub mod exit_codes;
pub mod io;
pub mod lifecycle;
pub mod logging;
pub mod simulate;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
