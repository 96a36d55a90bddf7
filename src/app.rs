//! The main application logic, decoupled from the entry point.

use crate::{
    config::Config,
    core::FileSystem,
    exposition,
    gauges::GaugeStore,
    sampler::{Sampler, Selectors},
    sources::{ProcSource, RealFs},
    task_manager::TaskManager,
};
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument};

/// A handle to the running application, containing all its task handles.
pub struct App {
    task_manager: TaskManager,
    metrics_addr: SocketAddr,
    store: Arc<GaugeStore>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address the scrape endpoint is bound to.
    pub fn metrics_addr(&self) -> SocketAddr {
        self.metrics_addr
    }

    pub fn gauge_store(&self) -> Arc<GaugeStore> {
        self.store.clone()
    }

    /// Waits for the shutdown signal and then gracefully shuts down all tasks.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.task_manager.get_shutdown_rx();
        if !*shutdown_rx.borrow() {
            shutdown_rx.changed().await.ok();
        }
        info!("Shutdown signal received. Waiting for tasks to complete...");

        self.task_manager.shutdown().await;

        info!("All tasks shut down.");
        Ok(())
    }
}

/// Builder for the main application.
///
/// Separates constructing the components from running them, and lets tests
/// swap the filesystem the sources are read from.
pub struct AppBuilder {
    config: Config,
    filesystem_override: Option<Arc<dyn FileSystem>>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            filesystem_override: None,
        }
    }

    /// Overrides the filesystem `/proc` is read from, for testing.
    pub fn filesystem_override(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.filesystem_override = Some(fs);
        self
    }

    /// Builds every component, spawns the sampler and the scrape server, and
    /// returns a runnable `App`.
    ///
    /// # Errors
    ///
    /// Fails when the scrape endpoint cannot be bound.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        let task_manager = TaskManager::new(shutdown_rx);
        let store = Arc::new(GaugeStore::new());

        // Bind first so an unusable address fails startup before any sampling.
        let (server, metrics_addr) =
            exposition::bind(&config.metrics, store.clone(), task_manager.get_shutdown_rx())
                .await?;

        let fs = self
            .filesystem_override
            .unwrap_or_else(|| Arc::new(RealFs::new()));
        let source = ProcSource::new(fs, config.sources.proc_root.clone());
        debug!(proc_root = %config.sources.proc_root.display(), "Initializing sampler");
        let sampler = build_sampler(&config, source, store.clone());

        task_manager.spawn("Sampler", sampler.run(task_manager.get_shutdown_rx()));
        task_manager.spawn("MetricsServer", server.run());

        info!("procwatch initialized successfully.");
        Ok(App {
            task_manager,
            metrics_addr,
            store,
        })
    }
}

/// Configures a [`Sampler`] from the loaded configuration.
pub fn build_sampler(config: &Config, source: ProcSource, store: Arc<GaugeStore>) -> Sampler {
    Sampler::new(source, store)
        .with_selectors(Selectors::from(&config.selectors))
        .with_enabled_groups(config.sampling.enabled.iter().copied())
        .with_interval(config.sampling.interval())
}
