//! One flush cycle: write the batch, then register the file.
//!
//! Failures are reported to the error sink and swallowed. A failed batch is
//! not re-enqueued.

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{error, info};

use snowdrift_core::emit;
use snowdrift_core::metrics::events::{
    BatchFlushed, EmptyFlush, FlushCompleted, FlushFailed, FlushStage,
};

use crate::buffer::Batch;
use crate::catalog::{CatalogEntry, CatalogRef};
use crate::error_sink::ErrorSinkRef;
use crate::writer::{DeltaFile, FileWriter};

/// Result of one flush cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was buffered; no file was written.
    Empty,
    /// The file was written and registered.
    Written {
        file: DeltaFile,
        entry: CatalogEntry,
    },
    /// The batch was dropped after a failure at `stage`.
    Failed {
        stage: FlushStage,
        records: usize,
        message: String,
    },
}

impl FlushOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, FlushOutcome::Written { .. })
    }
}

/// Writes batches and registers them in the catalog.
#[derive(Clone)]
pub struct BatchFlusher {
    writer: FileWriter,
    catalog: CatalogRef,
    errors: ErrorSinkRef,
    last_timestamp: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl BatchFlusher {
    pub fn new(writer: FileWriter, catalog: CatalogRef, errors: ErrorSinkRef) -> Self {
        Self {
            writer,
            catalog,
            errors,
            last_timestamp: Arc::new(Mutex::new(None)),
        }
    }

    /// Flush a batch stamped with the current time.
    ///
    /// Timestamps are strictly increasing at millisecond precision, so two
    /// flushes within the same millisecond still get distinct filenames.
    pub async fn flush(&self, batch: Batch) -> FlushOutcome {
        if batch.is_empty() {
            return self.flush_at(batch, Utc::now()).await;
        }
        let timestamp = self.next_timestamp(Utc::now());
        self.flush_at(batch, timestamp).await
    }

    /// Flush a batch stamped with `timestamp`.
    pub async fn flush_at(&self, batch: Batch, timestamp: DateTime<Utc>) -> FlushOutcome {
        if batch.is_empty() {
            info!("Empty cache. Nothing to save on disk");
            emit!(EmptyFlush);
            return FlushOutcome::Empty;
        }

        let start = Instant::now();
        let records = batch.len();
        let outcome = self.write_and_register(batch, timestamp).await;
        emit!(FlushCompleted {
            duration: start.elapsed(),
        });

        match outcome {
            Ok((file, entry)) => {
                emit!(BatchFlushed {
                    records: file.records as u64,
                    bytes: file.bytes as u64,
                });
                FlushOutcome::Written { file, entry }
            }
            Err((stage, message)) => {
                error!(stage = stage.as_str(), records, error = %message, "Flush failed, batch dropped");
                emit!(FlushFailed {
                    stage,
                    records: records as u64,
                });
                self.errors.report(&message).await;
                FlushOutcome::Failed {
                    stage,
                    records,
                    message,
                }
            }
        }
    }

    /// Sink that flush failures are reported to.
    pub fn errors(&self) -> &ErrorSinkRef {
        &self.errors
    }

    fn next_timestamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let mut last = self
            .last_timestamp
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut timestamp = now.trunc_subsecs(3);
        if let Some(previous) = *last
            && timestamp <= previous
        {
            timestamp = previous + TimeDelta::milliseconds(1);
        }
        *last = Some(timestamp);
        timestamp
    }

    async fn write_and_register(
        &self,
        batch: Batch,
        timestamp: DateTime<Utc>,
    ) -> Result<(DeltaFile, CatalogEntry), (FlushStage, String)> {
        let file = self
            .writer
            .write(&batch, timestamp)
            .await
            .map_err(|e| (FlushStage::Write, e.to_string()))?;

        info!(
            path = %file.path,
            records = file.records,
            "Delta cache has been written to file"
        );

        let entry = self
            .catalog
            .register(&file)
            .await
            .map_err(|e| (FlushStage::Register, e.to_string()))?;

        info!(
            id = %entry.logical_id,
            name = %entry.name,
            "File is persisted in store and can be consumed now"
        );

        Ok((file, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, FileDescriptor, MemoryCatalog};
    use crate::error::{CatalogError, SparqlError};
    use crate::error_sink::MemoryErrorSink;
    use crate::writer::WriterOptions;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;
    use snowdrift_core::storage::StorageProvider;
    use std::sync::Arc;

    struct RejectingCatalog;

    #[async_trait]
    impl Catalog for RejectingCatalog {
        async fn register(&self, file: &DeltaFile) -> Result<CatalogEntry, CatalogError> {
            Err(CatalogError::Registration {
                name: file.filename.clone(),
                source: SparqlError::Status {
                    status: 503,
                    body: "store unavailable".to_string(),
                },
            })
        }

        async fn list_since(&self, _since: DateTime<Utc>) -> Result<Vec<FileDescriptor>, CatalogError> {
            Ok(Vec::new())
        }
    }

    struct Fixture {
        flusher: BatchFlusher,
        storage: Arc<StorageProvider>,
        catalog: Arc<MemoryCatalog>,
        errors: Arc<MemoryErrorSink>,
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(StorageProvider::in_memory());
        let catalog = Arc::new(MemoryCatalog::new("http://data.lblod.info/files/"));
        let errors = Arc::new(MemoryErrorSink::new());
        let writer = FileWriter::new(
            storage.clone(),
            WriterOptions {
                relative_path: "deltas".to_string(),
                prefix: "delta".to_string(),
                pretty: false,
            },
        );
        Fixture {
            flusher: BatchFlusher::new(writer, catalog.clone(), errors.clone()),
            storage,
            catalog,
            errors,
        }
    }

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 23, 59, 59).unwrap() + chrono::Duration::milliseconds(900)
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let f = fixture();
        let now = ts();

        let first = f.flusher.next_timestamp(now);
        let second = f.flusher.next_timestamp(now);
        let third = f.flusher.next_timestamp(now - chrono::Duration::seconds(5));

        assert_eq!(first, now);
        assert_eq!(second, now + chrono::Duration::milliseconds(1));
        assert_eq!(third, now + chrono::Duration::milliseconds(2));
    }

    #[test]
    fn test_timestamps_truncate_to_millis() {
        let f = fixture();
        let now = ts() + chrono::Duration::microseconds(750);
        assert_eq!(f.flusher.next_timestamp(now), ts());
    }

    #[tokio::test]
    async fn test_consecutive_flushes_get_distinct_files() {
        let f = fixture();
        for n in 0..5 {
            let outcome = f.flusher.flush(Batch::new(vec![json!(n)])).await;
            assert!(outcome.is_written(), "flush {n} failed: {outcome:?}");
        }
        assert_eq!(f.catalog.len().await, 5);
    }

    #[tokio::test]
    async fn test_empty_batch_writes_nothing() {
        let f = fixture();
        let outcome = f.flusher.flush(Batch::default()).await;

        assert_eq!(outcome, FlushOutcome::Empty);
        assert!(f.catalog.is_empty().await);
        assert!(f.errors.messages().await.is_empty());
    }

    #[tokio::test]
    async fn test_flush_writes_then_registers() {
        let f = fixture();
        let outcome = f
            .flusher
            .flush_at(Batch::new(vec![json!({"a": 1}), json!({"b": 2})]), ts())
            .await;

        let FlushOutcome::Written { file, entry } = outcome else {
            panic!("expected a written file, got {outcome:?}");
        };
        assert_eq!(file.path, "deltas/2024-03-05/delta-2024-03-05T23:59:59.900Z.json");
        assert_eq!(entry.name, file.filename);
        assert_eq!(entry.physical_uri, file.physical_uri);
        assert_eq!(entry.created, ts());

        let bytes = f.storage.get(file.path.as_str()).await.unwrap();
        assert_eq!(&bytes[..], br#"[{"a":1},{"b":2}]"#);
        assert_eq!(f.catalog.len().await, 1);
    }

    #[tokio::test]
    async fn test_write_failure_is_reported_not_registered() {
        let f = fixture();
        f.flusher.flush_at(Batch::new(vec![json!(1)]), ts()).await;

        // Same timestamp: the file already exists
        let outcome = f.flusher.flush_at(Batch::new(vec![json!(2)]), ts()).await;

        match outcome {
            FlushOutcome::Failed { stage, records, .. } => {
                assert_eq!(stage, FlushStage::Write);
                assert_eq!(records, 1);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(f.catalog.len().await, 1);
        let messages = f.errors.messages().await;
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("overwrite"));
    }

    #[tokio::test]
    async fn test_registration_failure_is_reported() {
        let f = fixture();
        let errors = Arc::new(MemoryErrorSink::new());
        let writer = FileWriter::new(
            f.storage.clone(),
            WriterOptions {
                relative_path: "deltas".to_string(),
                prefix: "delta".to_string(),
                pretty: false,
            },
        );
        let flusher = BatchFlusher::new(writer, Arc::new(RejectingCatalog), errors.clone());

        let outcome = flusher.flush_at(Batch::new(vec![json!(1)]), ts()).await;

        assert!(matches!(
            outcome,
            FlushOutcome::Failed {
                stage: FlushStage::Register,
                ..
            }
        ));
        let messages = errors.messages().await;
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("store unavailable"));
    }
}
