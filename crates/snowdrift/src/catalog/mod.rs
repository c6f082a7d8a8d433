//! File catalog: registration of written delta files and lookup by time.
//!
//! Each written file is recorded twice: a *logical* file that consumers
//! address by uuid, and the *physical* `share://` file linked to it through
//! `nie:dataSource`. Listing only ever returns logical files.

mod memory;
mod sparql;

pub use memory::MemoryCatalog;
pub use sparql::SparqlCatalog;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::error::CatalogError;
use crate::writer::DeltaFile;

/// A reference-counted catalog.
pub type CatalogRef = Arc<dyn Catalog>;

/// The linked records created for one delta file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub logical_id: String,
    pub logical_uri: String,
    pub physical_id: String,
    pub physical_uri: String,
    pub name: String,
    pub created: DateTime<Utc>,
}

/// What consumers see when listing files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDescriptor {
    pub id: String,
    pub name: String,
    pub created: DateTime<Utc>,
}

impl From<&CatalogEntry> for FileDescriptor {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            id: entry.logical_id.clone(),
            name: entry.name.clone(),
            created: entry.created,
        }
    }
}

/// Store of delta file metadata.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Record a durably written file. Only called after the write succeeded.
    async fn register(&self, file: &DeltaFile) -> Result<CatalogEntry, CatalogError>;

    /// Logical files created strictly after `since`, oldest first.
    async fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<FileDescriptor>, CatalogError>;
}
