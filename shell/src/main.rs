//! Tick shell CLI.
//!
//! Replays scripted tick scenarios against the shell and validates shell
//! configuration files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tick_shell::exit_codes;
use tick_shell::io::config::{DEFAULT_CONFIG_PATH, load_config, write_config};
use tick_shell::logging;
use tick_shell::simulate::{load_scenario, run_scenario};

#[derive(Parser)]
#[command(
    name = "tick-shell",
    version,
    about = "Tick driver and fault containment shell for a sandboxed computation module"
)]
struct Cli {
    /// Debug-level shell diagnostics on stderr when `RUST_LOG` is unset.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a scenario file against a scripted module and print the host output.
    Simulate {
        /// Scenario TOML (budgets, module script, commands).
        scenario: PathBuf,
        /// Shell config; defaults apply when the file is missing.
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// Start a fresh process after a hard halt instead of stopping.
        #[arg(long)]
        restart_on_halt: bool,
    },
    /// Validate a shell config and print the effective values.
    CheckConfig {
        #[arg(default_value = DEFAULT_CONFIG_PATH)]
        path: PathBuf,
        /// Write the effective values back to the file, filling in defaults.
        #[arg(long)]
        write: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Simulate {
            scenario,
            config,
            restart_on_halt,
        } => cmd_simulate(&scenario, &config, restart_on_halt),
        Command::CheckConfig { path, write } => cmd_check_config(&path, write),
    }
}

fn cmd_simulate(scenario_path: &Path, config_path: &Path, restart_on_halt: bool) -> Result<i32> {
    let config = load_config(config_path)?;
    let scenario = load_scenario(scenario_path)?;
    let outcome = run_scenario(&scenario, &config, restart_on_halt);

    for line in &outcome.transcript {
        println!("{line}");
    }
    println!(
        "ticks: {}  state: {}  restarts: {}",
        outcome.ticks_run, outcome.final_state, outcome.restarts
    );

    if outcome.halted {
        return Ok(exit_codes::HALTED);
    }
    Ok(exit_codes::OK)
}

fn cmd_check_config(path: &Path, write: bool) -> Result<i32> {
    let cfg = load_config(path)?;
    if write {
        write_config(path, &cfg)?;
        eprintln!("wrote {}", path.display());
    }
    let rendered = toml::to_string_pretty(&cfg).context("serialize config toml")?;
    print!("{rendered}");
    Ok(exit_codes::OK)
}
