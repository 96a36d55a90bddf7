//! procwatch - samples /proc and serves the counters to Prometheus.

use anyhow::Result;
use clap::Parser;
use procwatch::{
    app::{self, App},
    cli::Cli,
    config::Config,
    gauges::GaugeStore,
    sources::{ProcSource, RealFs},
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load configuration: {:#}", err);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    // Logs go to stderr so `--once` output on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("procwatch starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Sampling Interval: {}s", config.sampling.interval_seconds);
    let groups: Vec<&str> = config.sampling.enabled.iter().map(|g| g.as_str()).collect();
    info!("Enabled Groups: {} (+ processes)", groups.join(", "));
    info!("Disk Device Prefix: {}", config.selectors.disk_device_prefix);
    info!(
        "Network Interface Prefix: {}",
        config.selectors.network_interface_prefix
    );
    info!("Proc Root: {}", config.sources.proc_root.display());
    info!(
        "Metrics Endpoint: http://{}{}",
        config.metrics.listen_address, config.metrics.path
    );
    info!("-------------------------------------------------------");

    if cli.once {
        return sample_and_print(&config).await;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = match App::builder(config).build(shutdown_rx).await {
        Ok(app) => app,
        Err(err) => {
            error!("Failed to start: {:#}", err);
            std::process::exit(1);
        }
    };

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
        info!("Shutdown signal received. Shutting down gracefully...");
        let _ = shutdown_tx.send(true);
    });

    app.run().await
}

/// Takes two samples one interval apart so CPU usage is populated, then
/// prints the exposition text.
async fn sample_and_print(config: &Config) -> Result<()> {
    let store = Arc::new(GaugeStore::new());
    let source = ProcSource::new(Arc::new(RealFs::new()), config.sources.proc_root.clone());
    let mut sampler = app::build_sampler(config, source, store.clone());

    sampler.sample_once();
    tokio::time::sleep(sampler.interval()).await;
    let report = sampler.sample_once();
    if !report.failed().is_empty() {
        error!(failed = ?report.failed(), "Some groups could not be sampled.");
    }

    print!("{}", store.render());
    Ok(())
}
