//! Configuration management for flowctl.
//!
//! Handles loading and saving configuration from TOML files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::workflow::{Phase, StateStore};

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Workflow behaviour
    pub workflow: WorkflowConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Path of the workflow state file (`~` is expanded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<String>,
}

/// Workflow settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Phase new sessions start in
    pub default_phase: Phase,

    /// Try to advance the phase after each task status update
    pub auto_advance: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self { default_phase: Phase::Brainstorming, auto_advance: true }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.flowctl.toml` in current directory
    /// 2. `~/.config/flowctl/config.toml`
    /// 3. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        // Try local config first
        let local_config = PathBuf::from(".flowctl.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        // Try global config
        if let Some(global_config) = Self::config_path() {
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("flowctl"))
    }

    /// Get the global config file path.
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    /// Resolve the state file location.
    ///
    /// An explicit override wins, then `general.state_file`, then the
    /// platform data directory.
    pub fn state_file(&self, override_path: Option<&Path>) -> anyhow::Result<PathBuf> {
        if let Some(path) = override_path {
            return Ok(path.to_path_buf());
        }

        if let Some(configured) = &self.general.state_file {
            let expanded = shellexpand::full(configured)
                .map_err(|e| anyhow::anyhow!("Invalid state_file '{configured}': {e}"))?;
            return Ok(PathBuf::from(expanded.as_ref()));
        }

        StateStore::default_path()
    }
}
