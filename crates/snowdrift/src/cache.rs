//! The delta cache engine: buffering, scheduled flushes and file listing.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info};

use snowdrift_core::emit;
use snowdrift_core::metrics::events::{CatalogQueried, RequestStatus};

use crate::buffer::DeltaRecord;
use crate::catalog::{CatalogRef, FileDescriptor};
use crate::error::{CatalogError, EngineError};
use crate::error_sink::ErrorSinkRef;
use crate::flusher::{BatchFlusher, FlushOutcome};
use crate::scheduler::{FlushScheduler, Phase};
use crate::writer::FileWriter;

/// Timing for the engine.
#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
    pub interval: Duration,
    pub shutdown_timeout: Duration,
}

/// Owns the buffer, its flush schedule and the catalog used for listing.
///
/// Independent instances share nothing.
pub struct DeltaCache {
    scheduler: FlushScheduler,
    catalog: CatalogRef,
}

impl DeltaCache {
    pub fn new(
        writer: FileWriter,
        catalog: CatalogRef,
        errors: ErrorSinkRef,
        options: CacheOptions,
    ) -> Self {
        let flusher = BatchFlusher::new(writer, catalog.clone(), errors);
        Self {
            scheduler: FlushScheduler::new(flusher, options.interval, options.shutdown_timeout),
            catalog,
        }
    }

    /// Buffer records for the next flush.
    pub fn push(&self, records: Vec<DeltaRecord>) -> Result<usize, EngineError> {
        self.scheduler.push(records)
    }

    /// Flush what is buffered and stop accepting records.
    pub async fn shutdown(&self) -> Result<FlushOutcome, EngineError> {
        self.scheduler.shutdown().await
    }

    /// Files published after `since`, oldest first.
    pub async fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<FileDescriptor>, CatalogError> {
        info!(since = %since, "Retrieving delta files");

        let start = Instant::now();
        let result = self.catalog.list_since(since).await;
        emit!(CatalogQueried {
            status: RequestStatus::from_result(&result),
            duration: start.elapsed(),
        });

        if let Ok(files) = &result {
            debug!(count = files.len(), "Delta files retrieved");
        }
        result
    }

    /// Counter incremented after every completed flush.
    pub fn flushes(&self) -> watch::Receiver<u64> {
        self.scheduler.flushes()
    }

    pub fn phase(&self) -> Phase {
        self.scheduler.phase()
    }

    pub fn buffered(&self) -> usize {
        self.scheduler.buffered()
    }
}
