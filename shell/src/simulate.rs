//! Scenario simulation for `tick-shell simulate`.
//!
//! A scenario (TOML) scripts the host's budget per tick, the computation
//! module's behavior and the external commands issued between ticks. The
//! simulator drives a [`TickDriver`] through it and records everything the host
//! would have shown: log lines, notifications and halt requests.

use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::types::{CommandOutcome, LoopState, ResourceBudget, TickAction, TickReport};
use crate::driver::TickDriver;
use crate::io::config::ShellConfig;
use crate::io::host::Host;
use crate::io::module::{ComputationModule, ModuleLoader};
use crate::io::transient::TransientStore;

/// A fault the scripted module raises on its n-th periodic invocation (1-indexed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopFault {
    pub invocation: u32,
    pub message: String,
}

/// Behavior of the scripted computation module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleScript {
    /// Value of the readiness marker.
    pub ready: bool,
    /// Clear the readiness marker once this many periodic invocations have run.
    pub unready_after_invocation: Option<u32>,
    pub load_fault: Option<String>,
    pub init_fault: Option<String>,
    pub setup_fault: Option<String>,
    pub loop_faults: Vec<LoopFault>,
    pub blueprint_fault: Option<String>,
    /// Raise faults by panicking instead of returning an error.
    pub panic_faults: bool,
    /// Lines logged on every periodic invocation, before any fault.
    pub log_lines: Vec<String>,
    /// Key written into the transient store on every periodic invocation.
    pub transient_key: Option<String>,
}

impl Default for ModuleScript {
    fn default() -> Self {
        Self {
            ready: true,
            unready_after_invocation: None,
            load_fault: None,
            init_fault: None,
            setup_fault: None,
            loop_faults: Vec::new(),
            blueprint_fault: None,
            panic_faults: false,
            log_lines: Vec::new(),
            transient_key: None,
        }
    }
}

/// Calls observed on a scripted module, shared with whoever holds the loader.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModuleCalls {
    pub sequence: Vec<&'static str>,
    pub loads: u32,
    pub setups: u32,
    pub loops: u32,
    /// Transient store generation seen by each periodic invocation.
    pub generations: Vec<u64>,
    /// Entries already present in the transient store when each invocation began.
    pub stale_entries: Vec<usize>,
    pub blueprints: Vec<(String, String)>,
}

pub type SharedCalls = Rc<RefCell<ModuleCalls>>;

/// Loader producing [`ScriptedModule`]s.
pub struct ScriptedLoader {
    script: ModuleScript,
    calls: SharedCalls,
}

impl ScriptedLoader {
    pub fn new(script: ModuleScript) -> Self {
        Self {
            script,
            calls: SharedCalls::default(),
        }
    }

    pub fn calls(&self) -> SharedCalls {
        Rc::clone(&self.calls)
    }
}

impl ModuleLoader for ScriptedLoader {
    type Module = ScriptedModule;

    fn load(&mut self) -> Result<ScriptedModule> {
        {
            let mut calls = self.calls.borrow_mut();
            calls.sequence.push("load");
            calls.loads += 1;
        }
        if let Some(message) = &self.script.load_fault {
            raise(self.script.panic_faults, message)?;
        }
        Ok(ScriptedModule {
            script: self.script.clone(),
            calls: Rc::clone(&self.calls),
            buffer: Vec::new(),
        })
    }
}

/// Computation module whose behavior is fixed by a [`ModuleScript`].
pub struct ScriptedModule {
    script: ModuleScript,
    calls: SharedCalls,
    buffer: Vec<String>,
}

impl ScriptedModule {
    fn record(&self, call: &'static str) {
        self.calls.borrow_mut().sequence.push(call);
    }
}

impl ComputationModule for ScriptedModule {
    fn is_ready(&self) -> bool {
        let loops = self.calls.borrow().loops;
        self.script.ready
            && self
                .script
                .unready_after_invocation
                .is_none_or(|limit| loops < limit)
    }

    fn initialize_instance(&mut self) -> Result<()> {
        self.record("initialize_instance");
        match &self.script.init_fault {
            Some(message) => raise(self.script.panic_faults, message),
            None => Ok(()),
        }
    }

    fn setup(&mut self) -> Result<()> {
        self.record("setup");
        self.calls.borrow_mut().setups += 1;
        match &self.script.setup_fault {
            Some(message) => raise(self.script.panic_faults, message),
            None => Ok(()),
        }
    }

    fn run_loop(&mut self, transient: &mut TransientStore) -> Result<()> {
        self.record("run_loop");
        let invocation = {
            let mut calls = self.calls.borrow_mut();
            calls.loops += 1;
            calls.generations.push(transient.generation());
            calls.stale_entries.push(transient.len());
            calls.loops
        };
        if let Some(key) = &self.script.transient_key {
            transient.insert(key.clone(), serde_json::json!(invocation));
        }
        self.buffer.extend(self.script.log_lines.iter().cloned());

        let fault = self
            .script
            .loop_faults
            .iter()
            .find(|fault| fault.invocation == invocation);
        match fault {
            Some(fault) => raise(self.script.panic_faults, &fault.message),
            None => Ok(()),
        }
    }

    fn take_log(&mut self) -> String {
        self.record("take_log");
        let log = self.buffer.join("\n");
        self.buffer.clear();
        log
    }

    fn set_room_blueprint(&mut self, location_id: &str, payload_json: &str) -> Result<()> {
        self.record("set_room_blueprint");
        if let Some(message) = &self.script.blueprint_fault {
            return raise(self.script.panic_faults, message);
        }
        self.calls
            .borrow_mut()
            .blueprints
            .push((location_id.to_string(), payload_json.to_string()));
        Ok(())
    }
}

fn raise(panic_faults: bool, message: &str) -> Result<()> {
    if panic_faults {
        panic!("{message}");
    }
    Err(anyhow!("{message}"))
}

/// Host that replays scripted budgets and records everything written to it.
pub struct ScriptedHost {
    budgets: Vec<ResourceBudget>,
    index: usize,
    time: u32,
    tick_started: Instant,
    pub logs: Vec<String>,
    pub notifications: Vec<String>,
    pub halts: u32,
    /// Log lines and notifications in the order they arrived, tagged with time.
    pub transcript: Vec<String>,
}

impl ScriptedHost {
    /// Budgets are consumed one per tick; the last one repeats.
    pub fn new(budgets: Vec<ResourceBudget>) -> Self {
        Self::starting_at(budgets, 1)
    }

    pub fn starting_at(budgets: Vec<ResourceBudget>, time: u32) -> Self {
        Self {
            budgets,
            index: 0,
            time,
            tick_started: Instant::now(),
            logs: Vec::new(),
            notifications: Vec::new(),
            halts: 0,
            transcript: Vec::new(),
        }
    }

    /// Move to the next tick.
    pub fn advance(&mut self) {
        self.index += 1;
        self.time += 1;
        self.tick_started = Instant::now();
    }

    pub fn mark(&mut self, note: &str) {
        self.transcript.push(format!("[{}] -- {note}", self.time));
    }
}

impl Host for ScriptedHost {
    fn resource_budget(&self) -> ResourceBudget {
        self.budgets
            .get(self.index)
            .or_else(|| self.budgets.last())
            .copied()
            .unwrap_or(0)
    }

    fn time(&self) -> u32 {
        self.time
    }

    /// Milliseconds of wall time since the tick began.
    fn used(&self) -> f64 {
        self.tick_started.elapsed().as_secs_f64() * 1000.0
    }

    fn halt(&mut self) {
        self.halts += 1;
        self.transcript.push(format!("[{}] halt requested", self.time));
    }

    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
        for line in message.lines() {
            self.transcript.push(format!("[{}] {line}", self.time));
        }
    }

    fn notify(&mut self, message: &str) {
        self.notifications.push(message.to_string());
        self.transcript.push(format!("[{}] notify: {message}", self.time));
    }
}

/// External command issued right before the given tick (1-indexed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioCommand {
    pub tick: u32,
    pub location_id: String,
    pub payload: String,
}

/// Scenario file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Host budget for each tick; the number of ticks simulated.
    pub budgets: Vec<ResourceBudget>,
    #[serde(default = "default_start_time")]
    pub start_time: u32,
    #[serde(default)]
    pub module: ModuleScript,
    #[serde(default)]
    pub commands: Vec<ScenarioCommand>,
}

fn default_start_time() -> u32 {
    1
}

impl Scenario {
    pub fn validate(&self) -> Result<()> {
        if self.budgets.is_empty() {
            return Err(anyhow!("budgets must list at least one tick"));
        }
        let ticks = self.budgets.len() as u32;
        for command in &self.commands {
            if command.tick == 0 || command.tick > ticks {
                return Err(anyhow!(
                    "command for {} targets tick {} outside 1..={ticks}",
                    command.location_id,
                    command.tick
                ));
            }
        }
        if self.module.loop_faults.iter().any(|fault| fault.invocation == 0) {
            return Err(anyhow!("loop_faults invocation numbers start at 1"));
        }
        Ok(())
    }
}

/// Load and validate a scenario file.
pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let scenario: Scenario =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    scenario.validate()?;
    Ok(scenario)
}

/// Summary of a simulated run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutcome {
    pub ticks_run: u32,
    /// The run stopped at a hard-halt request.
    pub halted: bool,
    /// Fresh processes started after hard halts (with `restart_on_halt`).
    pub restarts: u32,
    pub final_state: LoopState,
    pub reports: Vec<TickReport>,
    pub commands: Vec<CommandOutcome>,
    pub transcript: Vec<String>,
}

/// Drive a fresh driver through `scenario`.
///
/// A hard-halt request ends the run unless `restart_on_halt` is set, in which
/// case a new driver (a new process) handles the following tick.
pub fn run_scenario(
    scenario: &Scenario,
    config: &ShellConfig,
    restart_on_halt: bool,
) -> SimulationOutcome {
    let new_driver = || TickDriver::new(config.clone(), ScriptedLoader::new(scenario.module.clone()));
    let mut driver = new_driver();
    let mut host = ScriptedHost::starting_at(scenario.budgets.clone(), scenario.start_time);
    let mut reports = Vec::new();
    let mut commands = Vec::new();
    let mut restarts = 0;
    let mut halted = false;

    for tick in 1..=scenario.budgets.len() as u32 {
        if tick > 1 {
            host.advance();
        }
        for command in scenario.commands.iter().filter(|command| command.tick == tick) {
            let outcome =
                driver.set_named_blueprint(&mut host, &command.location_id, &command.payload);
            debug!(tick, location_id = %command.location_id, ?outcome, "scenario command");
            commands.push(outcome);
        }

        let report = driver.tick(&mut host);
        let action = report.action;
        reports.push(report);

        if action == TickAction::Halt {
            if restart_on_halt {
                restarts += 1;
                info!(tick, restarts, "restarting simulated process");
                host.mark("process restarted");
                driver = new_driver();
            } else {
                halted = true;
                break;
            }
        }
    }

    SimulationOutcome {
        ticks_run: reports.len() as u32,
        halted,
        restarts,
        final_state: driver.state(),
        reports,
        commands,
        transcript: host.transcript,
    }
}
