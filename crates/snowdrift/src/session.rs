//! Consumer session grants for the login endpoint.

use async_trait::async_trait;
use snafu::prelude::*;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::LoginConfig;
use crate::error::{GrantSnafu, SessionError};
use crate::sparql::{PREFIXES, SparqlClient, escape_uri};

/// A reference-counted session store.
pub type SessionStoreRef = Arc<dyn SessionStore>;

/// Links sessions to the consumer account.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn grant(&self, session_uri: &str) -> Result<(), SessionError>;
}

/// Writes grants to the login graph.
#[derive(Debug, Clone)]
pub struct SparqlSessionStore {
    client: SparqlClient,
    graph: String,
    account_uri: String,
}

impl SparqlSessionStore {
    pub fn new(client: SparqlClient, config: &LoginConfig) -> Self {
        Self {
            client,
            graph: config.graph.clone(),
            account_uri: config.account_uri.clone(),
        }
    }

    fn insert_query(&self, session_uri: &str) -> String {
        format!(
            "{PREFIXES}
INSERT DATA {{
  GRAPH {graph} {{
    {session} muAccount:account {account} .
  }}
}}",
            graph = escape_uri(&self.graph),
            session = escape_uri(session_uri),
            account = escape_uri(&self.account_uri),
        )
    }
}

#[async_trait]
impl SessionStore for SparqlSessionStore {
    async fn grant(&self, session_uri: &str) -> Result<(), SessionError> {
        self.client
            .update(&self.insert_query(session_uri))
            .await
            .context(GrantSnafu {
                session: session_uri,
            })
    }
}

/// Records granted sessions in memory.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<Vec<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sessions(&self) -> Vec<String> {
        self.sessions.lock().await.clone()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn grant(&self, session_uri: &str) -> Result<(), SessionError> {
        self.sessions.lock().await.push(session_uri.to_string());
        Ok(())
    }
}
