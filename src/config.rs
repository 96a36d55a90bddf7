//! Configuration management for procwatch
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to layer built-in defaults, an optional TOML file, `PROCWATCH_`
//! environment variables and finally command-line arguments.

use crate::cli::Cli;
use crate::core::MetricGroup;
use crate::parsers::{DEFAULT_DISK_DEVICE_PREFIX, DEFAULT_NETWORK_INTERFACE_PREFIX};
use crate::sampler::Selectors;
use crate::sources::DEFAULT_PROC_ROOT;
use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// How often and what to sample.
    pub sampling: SamplingConfig,
    /// Row selectors for the multi-row sources.
    pub selectors: SelectorConfig,
    /// Where the kernel sources live.
    pub sources: SourceConfig,
    /// Configuration for the scrape endpoint.
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SamplingConfig {
    /// Seconds between two sampling cycles.
    pub interval_seconds: u64,
    /// Groups to sample. Process counters are sampled regardless.
    pub enabled: Vec<MetricGroup>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 1,
            enabled: MetricGroup::OPTIONAL.to_vec(),
        }
    }
}

impl SamplingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SelectorConfig {
    /// First `/proc/diskstats` device whose name starts with this is reported.
    pub disk_device_prefix: String,
    /// First `/proc/net/dev` interface whose name starts with this is reported.
    pub network_interface_prefix: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            disk_device_prefix: DEFAULT_DISK_DEVICE_PREFIX.to_string(),
            network_interface_prefix: DEFAULT_NETWORK_INTERFACE_PREFIX.to_string(),
        }
    }
}

impl From<&SelectorConfig> for Selectors {
    fn from(config: &SelectorConfig) -> Self {
        Selectors {
            disk_device_prefix: config.disk_device_prefix.clone(),
            network_interface_prefix: config.network_interface_prefix.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    /// Mount point of procfs, e.g. `/host/proc` inside a container.
    pub proc_root: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Address the scrape endpoint binds to.
    pub listen_address: SocketAddr,
    /// HTTP path serving the exposition text.
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from(([0, 0, 0, 0], 8000)),
            path: "/metrics".to_string(),
        }
    }
}

impl Config {
    /// Loads the application configuration by layering sources.
    ///
    /// Precedence, lowest first: built-in defaults, the TOML file given with
    /// `--config`, `PROCWATCH_*` environment variables (nested keys separated
    /// by `__`, e.g. `PROCWATCH_SAMPLING__INTERVAL_SECONDS=5`), command-line
    /// arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(config_path) = &cli.config {
            if !config_path.exists() {
                bail!("configuration file {} does not exist", config_path.display());
            }
            figment = figment.merge(Toml::file(config_path));
        }

        let config: Config = figment
            .merge(Env::prefixed("PROCWATCH_").split("__"))
            .merge(cli.clone())
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would make the sampler or the server misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.sampling.interval_seconds == 0 {
            bail!("sampling.interval_seconds must be at least 1");
        }
        if self.selectors.disk_device_prefix.is_empty() {
            bail!("selectors.disk_device_prefix must not be empty");
        }
        if self.selectors.network_interface_prefix.is_empty() {
            bail!("selectors.network_interface_prefix must not be empty");
        }
        if !self.metrics.path.starts_with('/') {
            bail!(
                "metrics.path must start with '/', got {:?}",
                self.metrics.path
            );
        }
        Ok(())
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            sampling: SamplingConfig::default(),
            selectors: SelectorConfig::default(),
            sources: SourceConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}
