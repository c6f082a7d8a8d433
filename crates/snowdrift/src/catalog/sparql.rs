use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use snafu::prelude::*;
use uuid::Uuid;

use super::{Catalog, CatalogEntry, FileDescriptor};
use crate::config::CatalogConfig;
use crate::error::{
    CatalogError, InvalidTimestampSnafu, MissingBindingSnafu, QuerySnafu, RegistrationSnafu,
};
use crate::sparql::{PREFIXES, Row, SparqlClient, binding, escape_datetime, escape_string, escape_uri};
use crate::writer::{DELTA_EXTENSION, DELTA_FORMAT, DeltaFile};

/// Catalog stored in a triplestore.
#[derive(Debug, Clone)]
pub struct SparqlCatalog {
    client: SparqlClient,
    config: CatalogConfig,
}

impl SparqlCatalog {
    pub fn new(client: SparqlClient, config: CatalogConfig) -> Self {
        Self { client, config }
    }

    fn insert_query(&self, entry: &CatalogEntry) -> String {
        let created = escape_datetime(&entry.created);
        let name = escape_string(&entry.name);
        let format = escape_string(DELTA_FORMAT);
        let extension = escape_string(DELTA_EXTENSION);

        format!(
            "{PREFIXES}
INSERT DATA {{
  GRAPH {graph} {{
    {logical} a nfo:FileDataObject ;
      mu:uuid {logical_id} ;
      nfo:fileName {name} ;
      dct:format {format} ;
      dbpedia:fileExtension {extension} ;
      dct:created {created} ;
      dct:modified {created} ;
      dct:publisher {publisher} .
    {physical} a nfo:FileDataObject ;
      mu:uuid {physical_id} ;
      nie:dataSource {logical} ;
      nfo:fileName {name} ;
      dct:format {format} ;
      dbpedia:fileExtension {extension} ;
      dct:created {created} ;
      dct:modified {created} .
  }}
}}",
            graph = escape_uri(&self.config.files_graph),
            logical = escape_uri(&entry.logical_uri),
            logical_id = escape_string(&entry.logical_id),
            physical = escape_uri(&entry.physical_uri),
            physical_id = escape_string(&entry.physical_id),
            publisher = escape_uri(&self.config.publisher_uri),
        )
    }

    fn select_query(&self, since: &DateTime<Utc>) -> String {
        format!(
            "{PREFIXES}
SELECT ?uuid ?filename ?created WHERE {{
  GRAPH {graph} {{
    ?s a nfo:FileDataObject ;
      mu:uuid ?uuid ;
      nfo:fileName ?filename ;
      dct:publisher {publisher} ;
      dct:created ?created .
    ?file nie:dataSource ?s .
  }}
  FILTER (?created > {since})
}} ORDER BY ?created",
            graph = escape_uri(&self.config.files_graph),
            publisher = escape_uri(&self.config.publisher_uri),
            since = escape_datetime(since),
        )
    }
}

#[async_trait]
impl Catalog for SparqlCatalog {
    async fn register(&self, file: &DeltaFile) -> Result<CatalogEntry, CatalogError> {
        let logical_id = Uuid::new_v4().to_string();
        let entry = CatalogEntry {
            logical_uri: format!("{}{}", self.config.file_base_uri, logical_id),
            logical_id,
            physical_id: Uuid::new_v4().to_string(),
            physical_uri: file.physical_uri.clone(),
            name: file.filename.clone(),
            created: file.created,
        };

        self.client
            .update(&self.insert_query(&entry))
            .await
            .context(RegistrationSnafu {
                name: entry.name.clone(),
            })?;

        Ok(entry)
    }

    async fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<FileDescriptor>, CatalogError> {
        let rows = self
            .client
            .select(&self.select_query(&since))
            .await
            .context(QuerySnafu)?;

        rows.iter().map(descriptor).collect()
    }
}

fn descriptor(row: &Row) -> Result<FileDescriptor, CatalogError> {
    let required = |name: &str| {
        binding(row, name)
            .map(str::to_string)
            .context(MissingBindingSnafu { name })
    };

    let created = required("created")?;
    Ok(FileDescriptor {
        id: required("uuid")?,
        name: required("filename")?,
        created: parse_created(&created)?,
    })
}

/// Parse an `xsd:dateTime` value. Values without an offset are taken as UTC.
fn parse_created(value: &str) -> Result<DateTime<Utc>, CatalogError> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(_) => NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .context(InvalidTimestampSnafu { value }),
    }
}
