//! snowdrift: buffers pushed delta records and publishes them as
//! date-partitioned JSON files.
//!
//! Deltas posted to `/delta` are held in memory and flushed a fixed interval
//! after the first push of each burst. Every flush writes one JSON file under
//! `<share>/<relative>/<YYYY-MM-DD>/` and registers it in a file catalog that
//! consumers query through `/files?since=`.

pub mod api;
pub mod app;
pub mod buffer;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod error_sink;
pub mod flusher;
pub mod scheduler;
pub mod session;
pub mod sparql;
pub mod writer;

pub use app::{Collaborators, build_cache, load_config, run, serve_on};
pub use buffer::{Batch, DeltaBuffer, DeltaRecord};
pub use cache::{CacheOptions, DeltaCache};
pub use catalog::{Catalog, CatalogEntry, CatalogRef, FileDescriptor, MemoryCatalog, SparqlCatalog};
pub use config::Config;
pub use error::{AppError, CatalogError, EngineError, WriteError};
pub use flusher::{BatchFlusher, FlushOutcome};
pub use scheduler::{FlushScheduler, Phase};
pub use snowdrift_core::{CliArgs, init_tracing};
pub use writer::{DeltaFile, FileWriter, WriterOptions};
