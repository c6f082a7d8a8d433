//! Durable record of flush failures.
//!
//! Reporting never fails towards the caller: if the sink itself cannot
//! store the error, that is logged and the flush path carries on.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, warn};
use uuid::Uuid;

use snowdrift_core::emit;
use snowdrift_core::metrics::events::{ErrorReported, RequestStatus};

use crate::config::ErrorsConfig;
use crate::sparql::{PREFIXES, SparqlClient, escape_string, escape_uri};

/// A reference-counted error sink.
pub type ErrorSinkRef = Arc<dyn ErrorSink>;

/// Destination for errors the engine swallows.
#[async_trait]
pub trait ErrorSink: Send + Sync {
    async fn report(&self, message: &str);
}

/// Stores each error as a resource in the error graph.
#[derive(Debug, Clone)]
pub struct SparqlErrorSink {
    client: SparqlClient,
    config: ErrorsConfig,
}

impl SparqlErrorSink {
    pub fn new(client: SparqlClient, config: ErrorsConfig) -> Self {
        Self { client, config }
    }

    fn insert_query(&self, id: &str, message: &str) -> String {
        let types = self
            .config
            .types
            .iter()
            .map(|t| escape_uri(t))
            .collect::<Vec<_>>()
            .join(", ");
        let uri = escape_uri(&format!("{}{}", self.config.base_uri, id));

        format!(
            "{PREFIXES}
INSERT DATA {{
  GRAPH {graph} {{
    {uri} a {types} ;
      mu:uuid {id} ;
      oslc:message {message} .
  }}
}}",
            graph = escape_uri(&self.config.graph),
            id = escape_string(id),
            message = escape_string(message),
        )
    }
}

#[async_trait]
impl ErrorSink for SparqlErrorSink {
    async fn report(&self, message: &str) {
        let id = Uuid::new_v4().to_string();
        let result = self.client.update(&self.insert_query(&id, message)).await;

        emit!(ErrorReported {
            status: RequestStatus::from_result(&result),
        });

        if let Err(e) = result {
            error!(error = %e, original = message, "Failed to store error");
        }
    }
}

/// Keeps reported errors in memory.
#[derive(Debug, Default)]
pub struct MemoryErrorSink {
    messages: Mutex<Vec<String>>,
}

impl MemoryErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self) -> Vec<String> {
        self.messages.lock().await.clone()
    }
}

#[async_trait]
impl ErrorSink for MemoryErrorSink {
    async fn report(&self, message: &str) {
        warn!(message, "Error reported");
        emit!(ErrorReported {
            status: RequestStatus::Success,
        });
        self.messages.lock().await.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SparqlConfig;

    #[test]
    fn test_insert_query_shape() {
        let client = SparqlClient::new(&SparqlConfig::default()).unwrap();
        let sink = SparqlErrorSink::new(client, ErrorsConfig::default());
        let query = sink.insert_query("e1", "disk \"full\"");

        assert!(query.contains("GRAPH <http://mu.semte.ch/graphs/system/errors>"));
        assert!(query.contains("<http://redpencil.data.gift/id/jobs/error/e1> a <http://open-services.net/ns/core#Error>, <http://redpencil.data.gift/vocabularies/deltas/Error>"));
        assert!(query.contains("mu:uuid \"\"\"e1\"\"\""));
        assert!(query.contains("oslc:message \"\"\"disk \\\"full\\\"\"\"\""));
    }

    #[tokio::test]
    async fn test_memory_sink_collects_messages() {
        let sink = MemoryErrorSink::new();
        sink.report("first").await;
        sink.report("second").await;
        assert_eq!(sink.messages().await, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_sparql_sink_swallows_transport_errors() {
        let config = SparqlConfig {
            // Nothing listens on port 9 of localhost
            endpoint: "http://127.0.0.1:9/sparql".to_string(),
            sudo: true,
            timeout_secs: 2,
        };
        let sink = SparqlErrorSink::new(SparqlClient::new(&config).unwrap(), ErrorsConfig::default());
        sink.report("unreachable").await;
    }
}
