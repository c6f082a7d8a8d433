//! snowdrift-core: Shared infrastructure for the snowdrift delta publisher.
//!
//! - `storage/` - Object-store backed file storage (local share folder, in-memory)
//! - `metrics/` - Prometheus metrics infrastructure
//! - `config/` - YAML loading and environment variable interpolation
//! - `signal` - Signal handling for graceful shutdown
//! - `error` - Common error types

pub mod config;
pub mod error;
pub mod metrics;
pub mod signal;
pub mod storage;
pub mod tracing;

// Re-export commonly used items
pub use config::{CliArgs, KB, MB, MetricsConfig};
pub use error::{ConfigError, MetricsError, StorageError};
pub use crate::metrics::{
    DEFAULT_METRICS_ADDR, MetricsController, init_global as init_metrics,
    init_test as init_metrics_test,
};
pub use signal::{cancel_on_signal, shutdown_signal};
pub use storage::{StorageProvider, StorageProviderRef};
pub use crate::tracing::init_tracing;
