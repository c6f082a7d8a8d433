//! Service wiring: collaborators, engine, HTTP server and shutdown.

use snafu::prelude::*;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use snowdrift_core::signal::cancel_on_signal;
use snowdrift_core::storage::StorageProvider;

use crate::api::{AppState, build_router};
use crate::cache::{CacheOptions, DeltaCache};
use crate::catalog::{CatalogRef, MemoryCatalog, SparqlCatalog};
use crate::config::Config;
use crate::error::{
    AppError, BindSnafu, ConfigSnafu, EngineSnafu, InvalidAddressSnafu, MetricsSnafu, ServeSnafu,
    SparqlSnafu, StorageSnafu,
};
use crate::error_sink::{ErrorSinkRef, MemoryErrorSink, SparqlErrorSink};
use crate::flusher::FlushOutcome;
use crate::session::{MemorySessionStore, SessionStoreRef, SparqlSessionStore};
use crate::sparql::SparqlClient;
use crate::writer::{FileWriter, WriterOptions};

/// Load the configuration from `path`, or the built-in one when absent.
pub fn load_config(path: Option<&Path>) -> Result<Config, AppError> {
    match path {
        Some(path) => {
            info!("Loading config from {}", path.display());
            Config::from_file(path)
        }
        None => {
            info!("Loading built-in config");
            Config::from_env()
        }
    }
    .context(ConfigSnafu)
}

/// The external stores the engine and API talk to.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: CatalogRef,
    pub errors: ErrorSinkRef,
    pub sessions: SessionStoreRef,
}

impl Collaborators {
    /// Collaborators backed by the configured SPARQL endpoint.
    pub fn sparql(config: &Config) -> Result<Self, AppError> {
        let client = SparqlClient::new(&config.sparql).context(SparqlSnafu)?;
        Ok(Self {
            catalog: Arc::new(SparqlCatalog::new(client.clone(), config.catalog.clone())),
            errors: Arc::new(SparqlErrorSink::new(client.clone(), config.errors.clone())),
            sessions: Arc::new(SparqlSessionStore::new(client, &config.login)),
        })
    }

    /// Collaborators kept in process memory.
    pub fn in_memory(config: &Config) -> Self {
        Self {
            catalog: Arc::new(MemoryCatalog::new(config.catalog.file_base_uri.clone())),
            errors: Arc::new(MemoryErrorSink::new()),
            sessions: Arc::new(MemorySessionStore::new()),
        }
    }
}

/// Build the engine writing under the configured share folder.
pub async fn build_cache(
    config: &Config,
    collaborators: &Collaborators,
) -> Result<Arc<DeltaCache>, AppError> {
    let storage = StorageProvider::local(&config.output.share_folder)
        .await
        .context(StorageSnafu)?;

    let writer = FileWriter::new(
        Arc::new(storage),
        WriterOptions {
            relative_path: config.output.relative_path.clone(),
            prefix: config.output.file_prefix.clone(),
            pretty: config.output.pretty_print,
        },
    );

    Ok(Arc::new(DeltaCache::new(
        writer,
        collaborators.catalog.clone(),
        collaborators.errors.clone(),
        CacheOptions {
            interval: config.flush.interval(),
            shutdown_timeout: config.flush.shutdown_timeout(),
        },
    )))
}

/// Run the service until a shutdown signal arrives.
pub async fn run(config: Config) -> Result<(), AppError> {
    let metrics_addr: SocketAddr =
        config
            .metrics
            .address
            .parse()
            .context(InvalidAddressSnafu {
                address: config.metrics.address.clone(),
            })?;
    snowdrift_core::init_metrics(metrics_addr).context(MetricsSnafu)?;

    let collaborators = Collaborators::sparql(&config)?;

    let listener = TcpListener::bind(&config.server.address)
        .await
        .context(BindSnafu {
            address: config.server.address.clone(),
        })?;

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    serve_on(listener, &config, collaborators, shutdown).await
}

/// Serve the API on `listener` until `shutdown` is cancelled, then flush.
///
/// The engine is flushed even when the server stopped with an error.
pub async fn serve_on(
    listener: TcpListener,
    config: &Config,
    collaborators: Collaborators,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let cache = build_cache(config, &collaborators).await?;

    let state = AppState {
        cache: cache.clone(),
        sessions: collaborators.sessions.clone(),
        login_key: config.login.key().map(Arc::from),
        log_incoming_delta: config.server.log_incoming_delta,
    };
    let router = build_router(state, config.server.max_body_bytes);

    if let Ok(addr) = listener.local_addr() {
        info!(%addr, interval_ms = config.flush.interval_ms, "Delta publisher listening");
    }

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await;
    if let Err(e) = &served {
        error!(error = %e, "HTTP server stopped with an error");
    }

    let flushed = cache.shutdown().await;
    match &flushed {
        Ok(FlushOutcome::Written { file, .. }) => {
            info!(path = %file.path, records = file.records, "Delta cache flushed on shutdown")
        }
        Ok(FlushOutcome::Empty) => info!("Delta cache was empty on shutdown"),
        Ok(FlushOutcome::Failed { message, .. }) => {
            error!(error = %message, "Shutdown flush failed")
        }
        Err(e) => error!(error = %e, "Shutdown flush did not complete"),
    }

    served.context(ServeSnafu)?;
    flushed.context(EngineSnafu)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "flush:\n  interval_ms: 250").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.flush.interval_ms, 250);
    }

    #[test]
    fn test_load_config_errors_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("missing.yaml"))).unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "flush:\n  interval_ms: 0").unwrap();
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
        assert!(err.to_string().starts_with("Configuration error"));
    }
}
