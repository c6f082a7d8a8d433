//! Error types for the snowdrift service.

use snafu::prelude::*;
use std::time::Duration;

// Re-export common errors
pub use snowdrift_core::error::{ConfigError, MetricsError, StorageError};

/// Errors that can occur while writing a delta file.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WriteError {
    /// Failed to serialize the batch to JSON.
    #[snafu(display("Failed to serialize batch: {source}"))]
    Serialize { source: serde_json::Error },

    /// Failed to persist the file (directory creation, write, or an existing file).
    #[snafu(display("Failed to write delta file {path}: {source}"))]
    Persist { path: String, source: StorageError },
}

/// Errors from the SPARQL endpoint.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SparqlError {
    /// Failed to build the HTTP client.
    #[snafu(display("Failed to build SPARQL client: {source}"))]
    ClientBuild { source: reqwest::Error },

    /// The request could not be sent or timed out.
    #[snafu(display("SPARQL request to {endpoint} failed: {source}"))]
    Request {
        endpoint: String,
        source: reqwest::Error,
    },

    /// The endpoint answered with a non-success status.
    #[snafu(display("SPARQL endpoint returned {status}: {body}"))]
    Status { status: u16, body: String },

    /// The response body was not valid SPARQL results JSON.
    #[snafu(display("Failed to decode SPARQL response: {source}"))]
    Decode { source: reqwest::Error },
}

/// Errors from the file catalog.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CatalogError {
    /// Registering a written file failed.
    #[snafu(display("Failed to register file {name}: {source}"))]
    Registration { name: String, source: SparqlError },

    /// Listing files failed.
    #[snafu(display("Failed to query file catalog: {source}"))]
    Query { source: SparqlError },

    /// A result row lacked a required binding.
    #[snafu(display("Catalog result is missing binding '{name}'"))]
    MissingBinding { name: String },

    /// A `created` binding was not a valid timestamp.
    #[snafu(display("Invalid creation timestamp '{value}' in catalog: {source}"))]
    InvalidTimestamp {
        value: String,
        source: chrono::ParseError,
    },
}

/// Errors from the session store.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SessionError {
    /// Storing the session grant failed.
    #[snafu(display("Failed to grant session {session}: {source}"))]
    Grant {
        session: String,
        source: SparqlError,
    },
}

/// Errors surfaced by the delta cache engine.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum EngineError {
    /// The engine has been shut down and accepts no more deltas.
    #[snafu(display("Delta cache is closed"))]
    Closed,

    /// The shutdown flush did not finish in time.
    #[snafu(display("Shutdown flush did not complete within {timeout:?}"))]
    ShutdownTimeout { timeout: Duration },
}

/// Top-level application errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AppError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Storage error.
    #[snafu(display("Storage error: {source}"))]
    Storage { source: StorageError },

    /// Metrics initialization error.
    #[snafu(display("Metrics error: {source}"))]
    Metrics { source: MetricsError },

    /// SPARQL client setup error.
    #[snafu(display("SPARQL error: {source}"))]
    Sparql { source: SparqlError },

    /// A configured socket address is invalid.
    #[snafu(display("Invalid address '{address}': {source}"))]
    InvalidAddress {
        address: String,
        source: std::net::AddrParseError,
    },

    /// Failed to bind the HTTP listener.
    #[snafu(display("Failed to bind {address}: {source}"))]
    Bind {
        address: String,
        source: std::io::Error,
    },

    /// The HTTP server stopped with an error.
    #[snafu(display("HTTP server error: {source}"))]
    Serve { source: std::io::Error },

    /// The engine failed to shut down cleanly.
    #[snafu(display("Engine error: {source}"))]
    Engine { source: EngineError },
}
