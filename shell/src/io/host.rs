//! Host environment abstraction.
//!
//! The [`Host`] trait decouples the tick driver from the environment that
//! delivers ticks. Tests use a recording host; the CLI simulator prints to the
//! console. The durable raw store is deliberately absent: only the module
//! reads and writes it.

use crate::core::types::ResourceBudget;

/// Capabilities the host offers to the tick driver.
pub trait Host {
    /// Resource budget for the current tick. Sampled once per tick.
    fn resource_budget(&self) -> ResourceBudget;

    /// Host clock (tick number) of the current tick.
    fn time(&self) -> u32;

    /// Resources consumed so far during the current tick.
    fn used(&self) -> f64;

    /// Ask the host to terminate the process before the next tick.
    fn halt(&mut self);

    /// Write to the per-tick log sink. May contain lightweight color markup.
    fn log(&mut self, message: &str);

    /// Best-effort out-of-band operator notification.
    fn notify(&mut self, message: &str);
}

/// Wrap `message` in the color marker used for error lines in the log sink.
pub fn colorize(message: &str, color: &str) -> String {
    format!("<span style=\"color: {color}\">{message}</span>")
}

/// Prefix a notification with the host time it was raised at.
pub fn stamp(time: u32, message: &str) -> String {
    format!("[{time}] {message}")
}
