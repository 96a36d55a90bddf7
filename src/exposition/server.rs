//! # Scrape Server
//!
//! An `axum` server exposing the [`GaugeStore`] in the Prometheus text format
//! on a single configurable path. Each request renders the store afresh; the
//! handler never touches `/proc`.

use crate::gauges::GaugeStore;
use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, trace};

const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Serves the gauge store to a Prometheus scraper.
pub struct MetricsServer {
    listener: TcpListener,
    store: Arc<GaugeStore>,
    path: String,
    shutdown_rx: watch::Receiver<bool>,
}

impl MetricsServer {
    /// Creates a new `MetricsServer` but does not spawn it.
    ///
    /// # Arguments
    ///
    /// * `listener` - A `TcpListener` that has already been bound to an address.
    /// * `store` - The store rendered on every scrape.
    /// * `path` - The HTTP path the exposition text is served on.
    /// * `shutdown_rx` - A watch channel receiver for graceful shutdown.
    pub fn new(
        listener: TcpListener,
        store: Arc<GaugeStore>,
        path: impl Into<String>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            listener,
            store,
            path: path.into(),
            shutdown_rx,
        }
    }

    /// The router serving the exposition text. Any other path is a 404.
    pub fn router(store: Arc<GaugeStore>, path: &str) -> Router {
        Router::new()
            .route(path, get(render_metrics))
            .with_state(store)
    }

    /// Returns a future that runs the server until a shutdown signal is received.
    pub fn run(self) -> impl Future<Output = ()> {
        let Self {
            listener,
            store,
            path,
            mut shutdown_rx,
        } = self;
        let app = Self::router(store, &path);

        async move {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    trace!("Metrics server received shutdown signal via select.");
                }
                result = axum::serve(listener, app.into_make_service()) => {
                    if let Err(e) = result {
                        error!("Metrics server error: {}", e);
                    }
                }
            }
            trace!("Metrics server task finished.");
        }
    }
}

async fn render_metrics(State(store): State<Arc<GaugeStore>>) -> impl IntoResponse {
    trace!("Scrape received.");
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], store.render())
}
