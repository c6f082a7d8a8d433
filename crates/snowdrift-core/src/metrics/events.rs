//! Internal events for snowdrift metrics emission.
//!
//! Each event struct represents a measurable occurrence in the ingest and
//! flush path. Events implement the `InternalEvent` trait which emits the
//! corresponding Prometheus metric.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when delta records are accepted by the ingestion endpoint.
pub struct DeltasReceived {
    pub count: u64,
}

impl InternalEvent for DeltasReceived {
    fn emit(self) {
        trace!(count = self.count, "Deltas received");
        counter!("snowdrift_deltas_received_total").increment(self.count);
    }
}

/// Gauge of records currently held in memory waiting for a flush.
pub struct BufferedDeltas {
    pub count: usize,
}

impl InternalEvent for BufferedDeltas {
    fn emit(self) {
        trace!(count = self.count, "Buffered deltas");
        gauge!("snowdrift_buffered_deltas").set(self.count as f64);
    }
}

/// Event emitted when a batch has been written and registered.
pub struct BatchFlushed {
    pub records: u64,
    pub bytes: u64,
}

impl InternalEvent for BatchFlushed {
    fn emit(self) {
        trace!(records = self.records, bytes = self.bytes, "Batch flushed");
        counter!("snowdrift_batches_flushed_total").increment(1);
        counter!("snowdrift_records_written_total").increment(self.records);
        counter!("snowdrift_bytes_written_total").increment(self.bytes);
    }
}

/// Event emitted when a flush found nothing to write.
pub struct EmptyFlush;

impl InternalEvent for EmptyFlush {
    fn emit(self) {
        trace!("Empty flush");
        counter!("snowdrift_empty_flushes_total").increment(1);
    }
}

/// Stage of the flush path at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushStage {
    /// Serializing or writing the delta file.
    Write,
    /// Registering the written file in the catalog.
    Register,
}

impl FlushStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushStage::Write => "write",
            FlushStage::Register => "register",
        }
    }
}

/// Event emitted when a flush fails and its batch is dropped.
pub struct FlushFailed {
    pub stage: FlushStage,
    pub records: u64,
}

impl InternalEvent for FlushFailed {
    fn emit(self) {
        trace!(stage = self.stage.as_str(), records = self.records, "Flush failed");
        counter!("snowdrift_flush_failures_total", "stage" => self.stage.as_str()).increment(1);
        counter!("snowdrift_records_dropped_total").increment(self.records);
    }
}

/// Event emitted when a flush cycle completes, successful or not.
pub struct FlushCompleted {
    pub duration: Duration,
}

impl InternalEvent for FlushCompleted {
    fn emit(self) {
        trace!(duration_ms = self.duration.as_millis(), "Flush completed");
        histogram!("snowdrift_flush_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Outcome of a request against an external store.
#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }

    pub fn from_result<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            RequestStatus::Success
        } else {
            RequestStatus::Error
        }
    }
}

/// Event emitted when the file catalog is queried.
pub struct CatalogQueried {
    pub status: RequestStatus,
    pub duration: Duration,
}

impl InternalEvent for CatalogQueried {
    fn emit(self) {
        trace!(status = self.status.as_str(), duration_ms = self.duration.as_millis(), "Catalog queried");
        counter!("snowdrift_catalog_queries_total", "status" => self.status.as_str()).increment(1);
        histogram!("snowdrift_catalog_query_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when an error is handed to the error sink.
pub struct ErrorReported {
    pub status: RequestStatus,
}

impl InternalEvent for ErrorReported {
    fn emit(self) {
        trace!(status = self.status.as_str(), "Error reported");
        counter!("snowdrift_errors_reported_total", "status" => self.status.as_str()).increment(1);
    }
}

/// Storage operation type for metrics labeling.
#[derive(Debug, Clone, Copy)]
pub enum StorageOperation {
    Get,
    Put,
}

impl StorageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Get => "get",
            StorageOperation::Put => "put",
        }
    }
}

/// Event emitted for each storage request.
pub struct StorageRequest {
    pub operation: StorageOperation,
    pub status: RequestStatus,
    pub duration: Duration,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            duration_ms = self.duration.as_millis(),
            "Storage request"
        );
        counter!(
            "snowdrift_storage_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
        histogram!(
            "snowdrift_storage_request_duration_seconds",
            "operation" => self.operation.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_stage_serde() {
        let json = serde_json::to_string(&FlushStage::Register).unwrap();
        assert_eq!(json, "\"register\"");
        let parsed: FlushStage = serde_json::from_str("\"write\"").unwrap();
        assert_eq!(parsed, FlushStage::Write);
    }

    #[test]
    fn test_request_status_from_result() {
        let ok: Result<(), ()> = Ok(());
        let err: Result<(), ()> = Err(());
        assert_eq!(RequestStatus::from_result(&ok).as_str(), "success");
        assert_eq!(RequestStatus::from_result(&err).as_str(), "error");
    }

    #[test]
    fn test_emit_without_recorder_is_noop() {
        // Emitting must not panic whether or not a recorder is installed
        crate::emit!(DeltasReceived { count: 5 });
        crate::emit!(FlushFailed {
            stage: FlushStage::Write,
            records: 5,
        });
    }
}
