//! Prometheus recorder and exporter endpoint.
//!
//! The recorder is installed once per process. `init_global` also serves the
//! rendered metrics over HTTP; `init_test` only installs the recorder so unit
//! tests can inspect rendered output.

use axum::{Extension, Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use snafu::prelude::*;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::{AlreadyInitializedSnafu, MetricsError, NotInitializedSnafu, PrometheusInitSnafu};

/// Default metrics address.
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:9090";

/// Histogram buckets for flush, catalog and storage durations (in seconds).
const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

static CONTROLLER: OnceLock<MetricsController> = OnceLock::new();

/// Handle on the installed Prometheus recorder.
pub struct MetricsController {
    handle: PrometheusHandle,
}

/// Install the recorder and serve `/metrics` and `/health` on `addr`.
///
/// # Errors
///
/// Fails if a recorder is already installed or the builder rejects its
/// bucket configuration.
pub fn init_global(addr: SocketAddr) -> Result<(), MetricsError> {
    let handle = install()?;

    tokio::spawn(run_server(addr, handle));

    info!(%addr, "Metrics server started");
    Ok(())
}

/// Install the recorder without an HTTP endpoint.
///
/// Safe to call from any number of test threads.
pub fn init_test() {
    if install().is_err() {
        // Another thread won the race; wait until it has published the controller
        while CONTROLLER.get().is_none() {
            std::hint::spin_loop();
        }
    }
}

fn install() -> Result<PrometheusHandle, MetricsError> {
    let handle = PrometheusBuilder::new()
        .set_buckets(DURATION_BUCKETS)
        .context(PrometheusInitSnafu)?
        .install_recorder()
        .context(PrometheusInitSnafu)?;

    CONTROLLER
        .set(MetricsController {
            handle: handle.clone(),
        })
        .map_err(|_| AlreadyInitializedSnafu.build())?;

    Ok(handle)
}

impl MetricsController {
    /// Get the global controller.
    pub fn get() -> Result<&'static Self, MetricsError> {
        CONTROLLER.get().context(NotInitializedSnafu)
    }

    /// Render metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

async fn run_server(addr: SocketAddr, handle: PrometheusHandle) {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(Extension(handle));

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind metrics server to {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!("Metrics server error: {}", e);
    }
}

async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> String {
    handle.render()
}

async fn health_handler() -> &'static str {
    "ok\n"
}
