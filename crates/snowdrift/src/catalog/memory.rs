use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Catalog, CatalogEntry, FileDescriptor};
use crate::error::CatalogError;
use crate::writer::DeltaFile;

/// Catalog kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    base_uri: String,
    entries: Mutex<Vec<CatalogEntry>>,
}

impl MemoryCatalog {
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of every registered entry in registration order.
    pub async fn entries(&self) -> Vec<CatalogEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn register(&self, file: &DeltaFile) -> Result<CatalogEntry, CatalogError> {
        let logical_id = Uuid::new_v4().to_string();
        let entry = CatalogEntry {
            logical_uri: format!("{}{}", self.base_uri, logical_id),
            logical_id,
            physical_id: Uuid::new_v4().to_string(),
            physical_uri: file.physical_uri.clone(),
            name: file.filename.clone(),
            created: file.created,
        };

        self.entries.lock().await.push(entry.clone());
        Ok(entry)
    }

    async fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<FileDescriptor>, CatalogError> {
        let entries = self.entries.lock().await;
        let mut files: Vec<FileDescriptor> = entries
            .iter()
            .filter(|entry| entry.created > since)
            .map(FileDescriptor::from)
            .collect();
        files.sort_by_key(|file| file.created);
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn file(name: &str, created: DateTime<Utc>) -> DeltaFile {
        DeltaFile {
            filename: name.to_string(),
            path: format!("deltas/{name}"),
            physical_uri: format!("share://deltas/{name}"),
            created,
            records: 1,
            bytes: 3,
        }
    }

    fn t(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, secs).unwrap()
    }

    #[tokio::test]
    async fn test_register_links_logical_and_physical() {
        let catalog = MemoryCatalog::new("http://data.lblod.info/files/");
        let entry = catalog.register(&file("a.json", t(0))).await.unwrap();

        assert_eq!(
            entry.logical_uri,
            format!("http://data.lblod.info/files/{}", entry.logical_id)
        );
        assert_eq!(entry.physical_uri, "share://deltas/a.json");
        assert_ne!(entry.logical_id, entry.physical_id);
        assert_eq!(catalog.len().await, 1);
    }

    #[tokio::test]
    async fn test_list_since_is_strict_and_ordered() {
        let catalog = MemoryCatalog::new("http://x/");
        // Registered out of order on purpose
        catalog.register(&file("t3.json", t(3))).await.unwrap();
        catalog.register(&file("t1.json", t(1))).await.unwrap();
        catalog.register(&file("t2.json", t(2))).await.unwrap();

        let names: Vec<String> = catalog
            .list_since(t(1))
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["t2.json", "t3.json"]);

        assert!(catalog.list_since(t(3)).await.unwrap().is_empty());
        assert_eq!(catalog.list_since(t(0)).await.unwrap().len(), 3);
    }
}
