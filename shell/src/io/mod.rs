//! I/O seams between the tick shell and its environment.

pub mod config;
pub mod host;
pub mod module;
pub mod transient;
