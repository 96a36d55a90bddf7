//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged, with
//! the highest precedence, over the configuration file and environment
//! variables. Malformed arguments make clap exit before anything is sampled.

use crate::core::MetricGroup;
use clap::Parser;
use figment::{
    value::{Dict, Map, Tag, Value},
    Error, Metadata, Profile, Provider,
};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Samples kernel resource counters from /proc and serves them for Prometheus.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Seconds between sampling cycles.
    #[arg(short, long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// Comma-separated groups to sample. Process counters are always sampled.
    #[arg(short, long, value_name = "GROUPS", value_delimiter = ',')]
    pub metrics: Option<Vec<MetricGroup>>,

    /// Address the scrape endpoint listens on.
    #[arg(long, value_name = "ADDR")]
    pub listen_address: Option<SocketAddr>,

    /// HTTP path of the scrape endpoint.
    #[arg(long, value_name = "PATH")]
    pub metrics_path: Option<String>,

    /// Device-name prefix selecting the /proc/diskstats row.
    #[arg(long, value_name = "PREFIX")]
    pub disk_device: Option<String>,

    /// Interface-name prefix selecting the /proc/net/dev row.
    #[arg(long, value_name = "PREFIX")]
    pub net_interface: Option<String>,

    /// Mount point of procfs.
    #[arg(long, value_name = "DIR")]
    pub proc_root: Option<PathBuf>,

    /// Log level or filter directive (overridden by RUST_LOG).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Sample once, print the exposition text and exit.
    #[arg(long)]
    pub once: bool,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut sampling = Dict::new();
        let mut metrics = Dict::new();
        let mut selectors = Dict::new();
        let mut sources = Dict::new();

        if let Some(interval) = self.interval {
            sampling.insert("interval_seconds".into(), Value::from(interval));
        }

        if let Some(groups) = &self.metrics {
            let groups = groups
                .iter()
                .map(|group| Value::from(group.as_str()))
                .collect();
            sampling.insert("enabled".into(), Value::Array(Tag::Default, groups));
        }

        if let Some(addr) = self.listen_address {
            metrics.insert("listen_address".into(), Value::from(addr.to_string()));
        }

        if let Some(path) = &self.metrics_path {
            metrics.insert("path".into(), Value::from(path.clone()));
        }

        if let Some(prefix) = &self.disk_device {
            selectors.insert("disk_device_prefix".into(), Value::from(prefix.clone()));
        }

        if let Some(prefix) = &self.net_interface {
            selectors.insert("network_interface_prefix".into(), Value::from(prefix.clone()));
        }

        if let Some(root) = &self.proc_root {
            sources.insert(
                "proc_root".into(),
                Value::from(root.to_string_lossy().into_owned()),
            );
        }

        let mut dict = Dict::new();
        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        // Sections are nested dictionaries; empty ones are left out so they
        // do not shadow lower layers.
        for (name, section) in [
            ("sampling", sampling),
            ("metrics", metrics),
            ("selectors", selectors),
            ("sources", sources),
        ] {
            if !section.is_empty() {
                dict.insert(name.into(), Value::Dict(Tag::Default, section));
            }
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
