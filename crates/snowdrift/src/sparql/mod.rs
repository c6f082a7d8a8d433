//! Minimal SPARQL 1.1 protocol client.
//!
//! Queries and updates are POSTed as `application/x-www-form-urlencoded`
//! with the statement in the `query` parameter, which is what the mu-stack
//! authorization proxy accepts for both.

pub mod escape;

use serde::Deserialize;
use snafu::prelude::*;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::config::SparqlConfig;
use crate::error::{ClientBuildSnafu, DecodeSnafu, RequestSnafu, SparqlError, StatusSnafu};

pub use escape::{PREFIXES, escape_datetime, escape_string, escape_uri};

const RESULTS_JSON: &str = "application/sparql-results+json";

/// One RDF term in a result row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Term {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    #[serde(default)]
    pub datatype: Option<String>,
}

/// A solution: variable name to bound term.
pub type Row = HashMap<String, Term>;

#[derive(Debug, Deserialize)]
struct SelectResponse {
    results: Bindings,
}

#[derive(Debug, Deserialize)]
struct Bindings {
    bindings: Vec<Row>,
}

/// HTTP client for a SPARQL endpoint.
#[derive(Clone)]
pub struct SparqlClient {
    client: reqwest::Client,
    endpoint: String,
    sudo: bool,
}

impl std::fmt::Debug for SparqlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparqlClient")
            .field("endpoint", &self.endpoint)
            .field("sudo", &self.sudo)
            .finish()
    }
}

impl SparqlClient {
    pub fn new(config: &SparqlConfig) -> Result<Self, SparqlError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            sudo: config.sudo,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run a SELECT and return its solutions.
    pub async fn select(&self, query: &str) -> Result<Vec<Row>, SparqlError> {
        let response = self.send(query).await?;
        let body: SelectResponse = response.json().await.context(DecodeSnafu)?;
        Ok(body.results.bindings)
    }

    /// Run an update (INSERT DATA, DELETE, ...).
    pub async fn update(&self, update: &str) -> Result<(), SparqlError> {
        self.send(update).await?;
        Ok(())
    }

    async fn send(&self, statement: &str) -> Result<reqwest::Response, SparqlError> {
        debug!(endpoint = %self.endpoint, statement, "SPARQL request");

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, RESULTS_JSON)
            .form(&[("query", statement)]);
        if self.sudo {
            request = request.header("mu-auth-sudo", "true");
        }

        let response = request.send().await.context(RequestSnafu {
            endpoint: self.endpoint.clone(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return StatusSnafu {
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        Ok(response)
    }
}

/// Value of a required binding.
pub fn binding<'a>(row: &'a Row, name: &str) -> Option<&'a str> {
    row.get(name).map(|term| term.value.as_str())
}
