//! Contract of the computation module the shell drives.
//!
//! The module's decision logic is opaque to the shell. [`ModuleLoader`] obtains
//! a handle once per process; [`ComputationModule`] is the surface the driver
//! calls into. Every fallible entry point returns `anyhow::Result` so faults
//! arrive as values; panics are caught separately by the containment wrapper.

use anyhow::Result;

use crate::io::transient::TransientStore;

/// Entry points exposed by a loaded computation module.
pub trait ComputationModule {
    /// Readiness marker checked before every call into the module.
    fn is_ready(&self) -> bool;

    /// Prepare the module's internal runtime. Called once, before `setup`.
    fn initialize_instance(&mut self) -> Result<()>;

    /// One-time setup. Called once, before the first `run_loop`.
    fn setup(&mut self) -> Result<()>;

    /// Periodic invocation, once per tick.
    fn run_loop(&mut self, transient: &mut TransientStore) -> Result<()>;

    /// Drain the log lines accumulated since the last call, joined by newlines.
    fn take_log(&mut self) -> String;

    /// Store a named room blueprint supplied from outside the tick cycle.
    fn set_room_blueprint(&mut self, location_id: &str, payload_json: &str) -> Result<()>;
}

/// Source of module handles.
pub trait ModuleLoader {
    type Module: ComputationModule;

    /// Obtain a handle to the module. The shell calls this at most once per process.
    fn load(&mut self) -> Result<Self::Module>;
}
