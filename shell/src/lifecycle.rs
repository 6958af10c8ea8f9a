//! Module lifecycle: load, instance initialization and one-time setup.
//!
//! The three steps form one unit. The handle is installed only after all of
//! them succeed; on any failure (error or unwinding panic) the partially set up
//! module is dropped and nothing is reachable by the next tick.

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::io::module::{ComputationModule, ModuleLoader};

/// Loaded/unloaded state of the computation module.
#[derive(Debug)]
pub enum ModuleSlot<M> {
    Unloaded,
    Loaded(M),
}

/// Owns the module handle for the lifetime of the process.
pub struct Lifecycle<L: ModuleLoader> {
    loader: L,
    slot: ModuleSlot<L::Module>,
    load_attempted: bool,
}

impl<L: ModuleLoader> Lifecycle<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            slot: ModuleSlot::Unloaded,
            load_attempted: false,
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.slot, ModuleSlot::Loaded(_))
    }

    /// Whether `bring_up` has been called in this process, successfully or not.
    pub fn load_attempted(&self) -> bool {
        self.load_attempted
    }

    pub fn module(&self) -> Option<&L::Module> {
        match &self.slot {
            ModuleSlot::Loaded(module) => Some(module),
            ModuleSlot::Unloaded => None,
        }
    }

    pub fn module_mut(&mut self) -> Option<&mut L::Module> {
        match &mut self.slot {
            ModuleSlot::Loaded(module) => Some(module),
            ModuleSlot::Unloaded => None,
        }
    }

    /// Run `load → initialize_instance → setup` exactly once per process.
    ///
    /// A second call fails without touching the loader: a failed load is only
    /// retried by a fresh process after a hard halt.
    pub fn bring_up(&mut self) -> Result<()> {
        if self.load_attempted {
            bail!("module load already attempted in this process");
        }
        self.load_attempted = true;

        debug!("loading computation module");
        let mut module = self.loader.load().context("load module")?;
        if !module.is_ready() {
            bail!("loaded module did not report ready");
        }
        module
            .initialize_instance()
            .context("initialize module instance")?;
        module.setup().context("run module setup")?;

        self.slot = ModuleSlot::Loaded(module);
        info!("computation module loaded and set up");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ModuleScript, ScriptedLoader};

    #[test]
    fn bring_up_runs_steps_in_order() {
        let loader = ScriptedLoader::new(ModuleScript::default());
        let calls = loader.calls();
        let mut lifecycle = Lifecycle::new(loader);

        lifecycle.bring_up().expect("bring up");

        assert!(lifecycle.is_loaded());
        assert_eq!(
            calls.borrow().sequence,
            vec!["load", "initialize_instance", "setup"]
        );
    }

    #[test]
    fn setup_failure_leaves_no_handle() {
        let loader = ScriptedLoader::new(ModuleScript {
            setup_fault: Some("boom".to_string()),
            ..ModuleScript::default()
        });
        let mut lifecycle = Lifecycle::new(loader);

        let err = lifecycle.bring_up().unwrap_err();

        assert_eq!(format!("{err:#}"), "run module setup: boom");
        assert!(!lifecycle.is_loaded());
        assert!(lifecycle.module().is_none());
        assert!(lifecycle.load_attempted());
    }

    #[test]
    fn load_is_attempted_at_most_once() {
        let loader = ScriptedLoader::new(ModuleScript {
            load_fault: Some("missing wasm".to_string()),
            ..ModuleScript::default()
        });
        let calls = loader.calls();
        let mut lifecycle = Lifecycle::new(loader);

        assert!(lifecycle.bring_up().is_err());
        let err = lifecycle.bring_up().unwrap_err();

        assert!(err.to_string().contains("already attempted"));
        assert_eq!(calls.borrow().loads, 1);
    }

    #[test]
    fn module_without_readiness_marker_is_rejected() {
        let loader = ScriptedLoader::new(ModuleScript {
            ready: false,
            ..ModuleScript::default()
        });
        let calls = loader.calls();
        let mut lifecycle = Lifecycle::new(loader);

        let err = lifecycle.bring_up().unwrap_err();

        assert!(err.to_string().contains("did not report ready"));
        assert_eq!(calls.borrow().setups, 0);
        assert!(!lifecycle.is_loaded());
    }
}
