//! CLI command handlers.

use std::path::PathBuf;

use anyhow::Result;
use rollcall_session::RollcallConfig;

pub mod config;
pub mod run;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit config file, if given.
    pub config_path: Option<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
}

impl Context {
    /// Load the config file named on the command line, or the default one.
    pub fn load_config(&self) -> Result<RollcallConfig> {
        Ok(RollcallConfig::load_or_default(self.config_path.as_deref())?)
    }
}
