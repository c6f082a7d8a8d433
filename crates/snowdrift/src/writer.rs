//! Serializes batches into date-partitioned JSON files.
//!
//! Layout under the storage root:
//!
//! ```text
//! {relative_path}/{YYYY-MM-DD}/{prefix}-{YYYY-MM-DDTHH:MM:SS.mmmZ}.json
//! ```
//!
//! The day is the UTC day of the flush timestamp. Files are created once and
//! never overwritten.

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use snafu::prelude::*;
use tracing::debug;

use snowdrift_core::storage::StorageProviderRef;

use crate::buffer::Batch;
use crate::error::{PersistSnafu, SerializeSnafu, WriteError};

/// MIME type recorded for every delta file.
pub const DELTA_FORMAT: &str = "application/json";

/// File extension recorded for every delta file.
pub const DELTA_EXTENSION: &str = "json";

/// URI scheme for files living in the shared volume.
const SHARE_SCHEME: &str = "share://";

/// Output layout for delta files.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Directory below the storage root.
    pub relative_path: String,
    /// Filename prefix before the timestamp.
    pub prefix: String,
    /// Indent the JSON output with two spaces.
    pub pretty: bool,
}

/// A delta file that has been durably written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaFile {
    /// Bare filename, e.g. `delta-2024-03-05T10:00:00.000Z.json`.
    pub filename: String,
    /// Location relative to the storage root.
    pub path: String,
    /// `share://` URI of the stored file.
    pub physical_uri: String,
    /// The flush timestamp the name and partition were derived from.
    pub created: DateTime<Utc>,
    pub records: usize,
    pub bytes: usize,
}

/// Writes batches to storage.
#[derive(Debug, Clone)]
pub struct FileWriter {
    storage: StorageProviderRef,
    options: WriterOptions,
}

impl FileWriter {
    pub fn new(storage: StorageProviderRef, options: WriterOptions) -> Self {
        Self { storage, options }
    }

    /// Day partition for a timestamp.
    pub fn partition(timestamp: &DateTime<Utc>) -> String {
        timestamp.format("%Y-%m-%d").to_string()
    }

    /// Filename for a timestamp, with millisecond precision.
    pub fn filename(&self, timestamp: &DateTime<Utc>) -> String {
        format!(
            "{}-{}.{}",
            self.options.prefix,
            timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            DELTA_EXTENSION
        )
    }

    /// Location relative to the storage root.
    pub fn location(&self, timestamp: &DateTime<Utc>) -> String {
        let relative = self.options.relative_path.trim_matches('/');
        let day = Self::partition(timestamp);
        let filename = self.filename(timestamp);
        if relative.is_empty() {
            format!("{day}/{filename}")
        } else {
            format!("{relative}/{day}/{filename}")
        }
    }

    /// Serialize `batch` and write it to the path derived from `timestamp`.
    pub async fn write(&self, batch: &Batch, timestamp: DateTime<Utc>) -> Result<DeltaFile, WriteError> {
        let payload = if self.options.pretty {
            serde_json::to_vec_pretty(batch)
        } else {
            serde_json::to_vec(batch)
        }
        .context(SerializeSnafu)?;

        let path = self.location(&timestamp);
        let size = payload.len();

        self.storage
            .put_new(path.as_str(), Bytes::from(payload))
            .await
            .context(PersistSnafu { path: path.clone() })?;

        debug!(path = %path, records = batch.len(), bytes = size, "Delta file written");

        Ok(DeltaFile {
            filename: self.filename(&timestamp),
            physical_uri: format!("{SHARE_SCHEME}{path}"),
            path,
            created: timestamp,
            records: batch.len(),
            bytes: size,
        })
    }
}
