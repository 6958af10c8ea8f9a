//! Tick driver: the single entry point the host invokes once per tick.
//!
//! Each tick samples the host once, asks the transition table what to do,
//! performs that action inside the matching recovery boundary and records the
//! next [`LoopState`]. Nothing escapes [`TickDriver::tick`]; faults are
//! reported through the host and turned into state.

use anyhow::{Context, anyhow, bail};
use tracing::{debug, info, warn};

use crate::containment::{Boundary, Fault, FaultKind, contain};
use crate::core::transitions::{TickInput, next_state, plan_tick};
use crate::core::types::{CommandOutcome, LoopState, StepResult, TickAction, TickReport};
use crate::io::config::ShellConfig;
use crate::io::host::{Host, stamp};
use crate::io::module::{ComputationModule, ModuleLoader};
use crate::io::transient::{TransientBridge, TransientStore};
use crate::lifecycle::Lifecycle;

const SET_NAMED_BLUEPRINT: &str = "set_named_blueprint";

/// Owns all process-wide shell state. Construct one per process.
pub struct TickDriver<L: ModuleLoader> {
    config: ShellConfig,
    state: LoopState,
    restart_requested: bool,
    lifecycle: Lifecycle<L>,
    transient: TransientBridge,
    first_tick: Option<u32>,
}

impl<L: ModuleLoader> TickDriver<L> {
    pub fn new(config: ShellConfig, loader: L) -> Self {
        Self {
            config,
            state: LoopState::Uninitialized,
            restart_requested: false,
            lifecycle: Lifecycle::new(loader),
            transient: TransientBridge::new(),
            first_tick: None,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &Lifecycle<L> {
        &self.lifecycle
    }

    /// Store handed to the most recent periodic invocation.
    pub fn transient(&self) -> &TransientStore {
        self.transient.current()
    }

    /// Run one tick.
    pub fn tick<H: Host>(&mut self, host: &mut H) -> TickReport {
        let state_before = self.state;
        let budget = host.resource_budget();
        let time = host.time();
        let first_tick = *self.first_tick.get_or_insert(time);
        debug!(
            ticks_since_restart = time.saturating_sub(first_tick),
            time,
            budget,
            state = %state_before,
            "tick"
        );

        let action = plan_tick(
            state_before,
            TickInput {
                restart_requested: self.restart_requested,
                budget,
                threshold: self.config.init_budget_threshold,
            },
        );

        let (result, flushed_log) = match action {
            TickAction::Halt => {
                self.request_halt(host);
                (StepResult::Completed, false)
            }
            TickAction::Wait { budget, shortfall } => {
                debug!(budget, shortfall, "deferring module initialization");
                host.log(&format!(
                    "resource budget {budget} below initialization threshold {}; waiting",
                    self.config.init_budget_threshold
                ));
                (StepResult::Completed, false)
            }
            TickAction::Initialize => self.initialize(host),
            TickAction::Invoke => self.invoke(host),
        };

        self.state = next_state(state_before, action, result);
        if self.state != state_before {
            info!(from = %state_before, to = %self.state, action = action.label(), "loop state changed");
        }

        TickReport {
            action,
            state_before,
            state_after: self.state,
            flushed_log,
        }
    }

    /// Forward a named blueprint to the module, outside the tick cycle.
    ///
    /// Faults stay inside the command's own boundary and never change the loop
    /// state.
    pub fn set_named_blueprint<H: Host>(
        &mut self,
        host: &mut H,
        location_id: &str,
        payload_json: &str,
    ) -> CommandOutcome {
        let module = match self.lifecycle.module_mut() {
            Some(module) if self.state == LoopState::Ready && module.is_ready() => module,
            _ => {
                report_not_ready(host, &self.config, SET_NAMED_BLUEPRINT, self.state);
                return CommandOutcome::NotReady;
            }
        };

        let result = contain(
            host,
            &self.config,
            Boundary::Command(SET_NAMED_BLUEPRINT),
            || {
                if location_id.trim().is_empty() {
                    bail!("location id must not be empty");
                }
                serde_json::from_str::<serde_json::Value>(payload_json)
                    .with_context(|| format!("parse blueprint payload for {location_id}"))?;
                module.set_room_blueprint(location_id, payload_json)
            },
        );

        match result {
            Ok(()) => {
                info!(location_id, "blueprint forwarded to module");
                CommandOutcome::Forwarded
            }
            Err(_) => CommandOutcome::Faulted,
        }
    }

    fn request_halt<H: Host>(&mut self, host: &mut H) {
        warn!(state = %self.state, "requesting hard halt");
        self.restart_requested = true;
        host.halt();
    }

    fn initialize<H: Host>(&mut self, host: &mut H) -> (StepResult, bool) {
        let lifecycle = &mut self.lifecycle;
        if contain(host, &self.config, Boundary::Setup, || lifecycle.bring_up()).is_err() {
            return (StepResult::Faulted, false);
        }
        if self.config.report_init_cost {
            let used = host.used();
            host.log(&format!("Initialization used {used:.2} CPU."));
        }
        self.invoke(host)
    }

    fn invoke<H: Host>(&mut self, host: &mut H) -> (StepResult, bool) {
        let store = self.transient.reset_transient_store();
        let module = self.lifecycle.module_mut();
        let outcome = contain(host, &self.config, Boundary::Loop, || {
            let module = module.ok_or_else(|| anyhow!("module handle missing"))?;
            if !module.is_ready() {
                bail!("module no longer reports ready");
            }
            module.run_loop(store)
        });
        self.transient.discard();

        let result = match &outcome {
            Ok(()) => StepResult::Completed,
            Err(_) => StepResult::Faulted,
        };
        // A panicking module never handed control back; its buffer is not trusted.
        if matches!(&outcome, Err(fault) if fault.kind == FaultKind::Panic) {
            return (result, false);
        }

        match self.flush_log(host) {
            Ok(flushed) => (result, flushed),
            Err(_) => (StepResult::Faulted, false),
        }
    }

    /// Write the module's accumulated log lines in one combined write.
    fn flush_log<H: Host>(&mut self, host: &mut H) -> Result<bool, Fault> {
        let Some(module) = self.lifecycle.module_mut() else {
            return Ok(false);
        };
        let log = contain(host, &self.config, Boundary::Loop, || Ok(module.take_log()))?;
        if log.is_empty() {
            return Ok(false);
        }
        host.log(&log);
        Ok(true)
    }
}

fn report_not_ready<H: Host>(
    host: &mut H,
    config: &ShellConfig,
    command: &str,
    state: LoopState,
) {
    debug!(command, state = %state, "command rejected: module not ready");
    let message = format!("{command} ignored: module not ready (state {state})");
    host.log(&message);
    if config.notify_faults {
        let time = host.time();
        host.notify(&stamp(time, &message));
    }
}
