//! Test-only helpers for driving the tick shell against scripted collaborators.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::driver::TickDriver;
use crate::io::config::ShellConfig;
pub use crate::simulate::{
    LoopFault, ModuleCalls, ModuleScript, ScriptedHost as RecordingHost, ScriptedLoader,
    SharedCalls,
};

/// Create a driver with default config plus a handle on the module's call log.
pub fn driver_with(script: ModuleScript) -> (TickDriver<ScriptedLoader>, SharedCalls) {
    let loader = ScriptedLoader::new(script);
    let calls = loader.calls();
    (TickDriver::new(ShellConfig::default(), loader), calls)
}

/// Fault raised on the given periodic invocation.
pub fn loop_fault(invocation: u32, message: &str) -> LoopFault {
    LoopFault {
        invocation,
        message: message.to_string(),
    }
}

/// Scenario file written into a temporary directory that lives as long as this value.
pub struct TempScenario {
    dir: TempDir,
    path: PathBuf,
}

impl TempScenario {
    pub fn new(contents: &str) -> Result<Self> {
        let dir = tempfile::tempdir().context("create tempdir")?;
        let path = dir.path().join("scenario.toml");
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}
