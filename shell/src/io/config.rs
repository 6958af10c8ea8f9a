//! Shell configuration stored as TOML (default `tick-shell.toml`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::gate::DEFAULT_INIT_THRESHOLD;
use crate::core::types::ResourceBudget;

/// Default location of the shell config, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "tick-shell.toml";

/// Tick shell configuration (TOML).
///
/// Missing fields default to the values the shell ships with, so an empty file
/// is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShellConfig {
    /// Budget the host must report before the module is loaded.
    pub init_budget_threshold: ResourceBudget,

    /// Color marker for fault lines in the host log sink (`#rrggbb`).
    pub fault_color: String,

    /// Forward faults and not-ready reports to the notification channel.
    ///
    /// Faults are always notified unless this is turned off. With `false` they
    /// only reach the host log sink, so an unattended operator never hears of
    /// a halt.
    pub notify_faults: bool,

    /// Log how much of the tick the one-time initialization consumed.
    pub report_init_cost: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            init_budget_threshold: DEFAULT_INIT_THRESHOLD,
            fault_color: "#ff9999".to_string(),
            notify_faults: true,
            report_init_cost: true,
        }
    }
}

impl ShellConfig {
    pub fn validate(&self) -> Result<()> {
        if self.init_budget_threshold == 0 {
            return Err(anyhow!("init_budget_threshold must be > 0"));
        }
        let color = Regex::new(r"^#[0-9a-fA-F]{6}$").context("compile color pattern")?;
        if !color.is_match(&self.fault_color) {
            return Err(anyhow!(
                "fault_color must look like #rrggbb (got {:?})",
                self.fault_color
            ));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ShellConfig::default()`.
pub fn load_config(path: &Path) -> Result<ShellConfig> {
    if !path.exists() {
        let cfg = ShellConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ShellConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ShellConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
