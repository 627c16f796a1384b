use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use xchain_control_plane::config::ControlPlaneConfig;

use crate::constants::{DEFAULT_MAINTENANCE_INTERVAL, DEFAULT_THREAD_COUNT};

/// The configuration values that dictate the behavior of the operator.
///
/// Every key is optional; missing keys take their documented defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    /// How often heartbeats are checked and expired transfers swept.
    pub maintenance_interval: Duration,

    /// The number of runtime worker threads.
    pub num_threads: usize,

    /// Settings for each control plane manager.
    pub control_plane: ControlPlaneConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL,
            num_threads: DEFAULT_THREAD_COUNT,
            control_plane: ControlPlaneConfig::default(),
        }
    }
}

impl Config {
    /// Reads and parses the TOML file at `path`.
    pub(crate) fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        anyhow::ensure!(
            !config.maintenance_interval.is_zero(),
            "maintenance_interval must be greater than zero"
        );
        anyhow::ensure!(config.num_threads > 0, "num_threads must be greater than zero");
        config
            .control_plane
            .validate()
            .context("invalid control plane config")?;
        Ok(config)
    }
}
