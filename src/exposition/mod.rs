//! # Exposition
//!
//! Binds the scrape endpoint and hands back a [`MetricsServer`] ready to be
//! spawned, along with the address it actually bound (useful when the port
//! is `0`).

use crate::config::MetricsConfig;
use crate::gauges::GaugeStore;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

pub mod server;

pub use server::MetricsServer;

/// Binds the configured listen address and builds the server.
///
/// # Errors
///
/// Fails when the address cannot be bound, e.g. because it is already in use.
pub async fn bind(
    config: &MetricsConfig,
    store: Arc<GaugeStore>,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<(MetricsServer, SocketAddr)> {
    let listener = TcpListener::bind(config.listen_address)
        .await
        .with_context(|| {
            format!(
                "failed to bind metrics server to {}",
                config.listen_address
            )
        })?;
    let addr = listener
        .local_addr()
        .context("failed to get local address for metrics server")?;

    info!(%addr, path = %config.path, "Metrics server listening.");
    let server = MetricsServer::new(listener, store, config.path.clone(), shutdown_rx);
    Ok((server, addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> MetricsConfig {
        MetricsConfig {
            listen_address: "127.0.0.1:0".parse().unwrap(),
            path: "/metrics".to_string(),
        }
    }

    #[tokio::test]
    async fn test_bind_reports_ephemeral_port() {
        let (_tx, rx) = watch::channel(false);
        let (_server, addr) = bind(&local_config(), Arc::new(GaugeStore::new()), rx)
            .await
            .unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_bind_fails_when_address_in_use() {
        let (_tx, rx) = watch::channel(false);
        let store = Arc::new(GaugeStore::new());
        let (_server, addr) = bind(&local_config(), store.clone(), rx.clone())
            .await
            .unwrap();

        let taken = MetricsConfig {
            listen_address: addr,
            ..local_config()
        };
        assert!(bind(&taken, store, rx).await.is_err());
    }
}
