#![allow(dead_code)]
//! Test helpers for running the full application against an in-memory `/proc`.

use anyhow::Result;
use procwatch::{
    app::App, config::Config, gauges::GaugeStore, sources::test_utils::MockFs,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle, time::timeout};

/// A running application instance.
pub struct TestApp {
    pub fs: MockFs,
    pub store: Arc<GaugeStore>,
    shutdown_tx: watch::Sender<bool>,
    app_handle: JoinHandle<Result<()>>,
    metrics_addr: SocketAddr,
}

impl TestApp {
    pub fn metrics_addr(&self) -> SocketAddr {
        self.metrics_addr
    }

    pub fn metrics_url(&self, path: &str) -> String {
        format!("http://{}{}", self.metrics_addr, path)
    }

    /// Shuts down the application and waits for it to terminate.
    /// Fails if the application does not shut down within the specified timeout.
    pub async fn shutdown(self, timeout_duration: Duration) -> Result<()> {
        self.shutdown_tx
            .send(true)
            .expect("Failed to send shutdown signal");

        match timeout(timeout_duration, self.app_handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(anyhow::anyhow!("App failed to shut down within the timeout")),
        }
    }
}

/// Config bound to an ephemeral loopback port, sampling every second.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.metrics.listen_address = "127.0.0.1:0".parse().unwrap();
    config
}

/// Builds and spawns the application, reading from `fs`.
pub async fn spawn_app(config: Config, fs: MockFs) -> TestApp {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::builder(config)
        .filesystem_override(Arc::new(fs.clone()))
        .build(shutdown_rx)
        .await
        .expect("Failed to build app");

    let metrics_addr = app.metrics_addr();
    let store = app.gauge_store();
    let app_handle = tokio::spawn(app.run());

    TestApp {
        fs,
        store,
        shutdown_tx,
        app_handle,
        metrics_addr,
    }
}

/// Polls `condition` until it holds or `limit` elapses.
pub async fn wait_until<F>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
