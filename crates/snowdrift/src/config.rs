//! Configuration for the snowdrift service.
//!
//! The service ships with a built-in YAML configuration whose values are
//! environment placeholders (`${DELTA_INTERVAL_MS:-1000}`, ...), so a
//! deployment can be configured with environment variables alone. A file
//! passed with `--config` replaces the built-in one; omitted sections fall
//! back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
pub use snowdrift_core::config::MetricsConfig;
use snowdrift_core::config::{load_yaml_file, parse_yaml};
pub use snowdrift_core::{KB, MB};

/// Built-in configuration, interpolated against the process environment.
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.yaml");

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ServerConfig {
    /// Listen address for the API.
    pub address: String,
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
    /// Log every incoming delta payload at info level.
    pub log_incoming_delta: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:80".to_string(),
            max_body_bytes: 500 * MB,
            log_incoming_delta: false,
        }
    }
}

/// Debounce and shutdown timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FlushConfig {
    /// Delay between the first push of a burst and its flush.
    pub interval_ms: u64,
    /// Upper bound on the shutdown flush.
    pub shutdown_timeout_secs: u64,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            shutdown_timeout_secs: 30,
        }
    }
}

impl FlushConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Where and how delta files are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct OutputConfig {
    /// Root of the shared volume; `share://` URIs are relative to it.
    pub share_folder: String,
    /// Directory below the share folder holding the day partitions.
    pub relative_path: String,
    /// Filename prefix.
    pub file_prefix: String,
    /// Indent JSON output.
    pub pretty_print: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            share_folder: "/share".to_string(),
            relative_path: "deltas".to_string(),
            file_prefix: "delta".to_string(),
            pretty_print: false,
        }
    }
}

/// SPARQL endpoint used by the catalog, error sink and session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SparqlConfig {
    pub endpoint: String,
    /// Send `mu-auth-sudo: true` with every request.
    pub sudo: bool,
    pub timeout_secs: u64,
}

impl Default for SparqlConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://database:8890/sparql".to_string(),
            sudo: true,
            timeout_secs: 60,
        }
    }
}

/// File catalog identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CatalogConfig {
    /// Graph holding the file records.
    pub files_graph: String,
    /// Publisher recorded on, and used to filter, logical files.
    pub publisher_uri: String,
    /// Base for logical file URIs; the uuid is appended.
    pub file_base_uri: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            files_graph: "http://mu.semte.ch/graphs/delta-files".to_string(),
            publisher_uri:
                "http://data.lblod.info/services/delta-producer-json-diff-file-publisher"
                    .to_string(),
            file_base_uri: "http://data.lblod.info/files/".to_string(),
        }
    }
}

/// Where flush failures are recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ErrorsConfig {
    pub graph: String,
    /// Base for error resource URIs; the uuid is appended.
    pub base_uri: String,
    /// RDF types asserted on each error resource.
    pub types: Vec<String>,
}

impl Default for ErrorsConfig {
    fn default() -> Self {
        Self {
            graph: "http://mu.semte.ch/graphs/system/errors".to_string(),
            base_uri: "http://redpencil.data.gift/id/jobs/error/".to_string(),
            types: vec![
                "http://open-services.net/ns/core#Error".to_string(),
                "http://redpencil.data.gift/vocabularies/deltas/Error".to_string(),
            ],
        }
    }
}

/// Consumer login bootstrap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoginConfig {
    /// Shared secret expected in the `key` header. Empty disables login.
    pub key: String,
    /// Graph the session grant is written to.
    pub graph: String,
    /// Account every authenticated session is linked to.
    pub account_uri: String,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            graph: "http://mu.semte.ch/graphs/diff-producer/login".to_string(),
            account_uri: "http://services.lblod.info/diff-consumer/account".to_string(),
        }
    }
}

impl LoginConfig {
    /// The configured key, if any.
    pub fn key(&self) -> Option<&str> {
        if self.key.is_empty() {
            None
        } else {
            Some(&self.key)
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub server: ServerConfig,
    pub flush: FlushConfig,
    pub output: OutputConfig,
    pub sparql: SparqlConfig,
    pub catalog: CatalogConfig,
    pub errors: ErrorsConfig,
    pub login: LoginConfig,
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load the built-in configuration against the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::parse(DEFAULT_CONFIG)
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = load_yaml_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = parse_yaml(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges. All problems are reported together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.flush.interval_ms == 0 {
            errors.push("flush.interval_ms must be greater than zero".to_string());
        }
        if self.server.max_body_bytes == 0 {
            errors.push("server.max_body_bytes must be greater than zero".to_string());
        }
        if self.output.relative_path.trim_matches('/').is_empty() {
            errors.push("output.relative_path must not be empty".to_string());
        }
        if self.output.file_prefix.is_empty() || self.output.file_prefix.contains('/') {
            errors.push("output.file_prefix must be a non-empty name without '/'".to_string());
        }
        if self.catalog.publisher_uri.is_empty() {
            errors.push("catalog.publisher_uri must not be empty".to_string());
        }
        if self.catalog.files_graph.is_empty() {
            errors.push("catalog.files_graph must not be empty".to_string());
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(ConfigError::InvalidValue {
                field: "config".to_string(),
                message: errors.remove(0),
            }),
            _ => Err(ConfigError::MultipleErrors { errors }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snowdrift_core::config::interpolate_with;

    /// Parse the built-in config with a fixed environment.
    fn parse_builtin(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let result = interpolate_with(DEFAULT_CONFIG, |name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        });
        assert!(result.is_ok(), "interpolation failed: {:?}", result.errors);
        let config: Config = serde_yaml::from_str(&result.text).unwrap();
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_builtin_defaults() {
        let config = parse_builtin(&[]).unwrap();

        assert_eq!(config.server.address, "0.0.0.0:80");
        assert_eq!(config.server.max_body_bytes, 500 * MB);
        assert!(!config.server.log_incoming_delta);
        assert_eq!(config.flush.interval(), Duration::from_millis(1000));
        assert_eq!(config.output.share_folder, "/share");
        assert_eq!(config.output.relative_path, "deltas");
        assert_eq!(config.output.file_prefix, "delta");
        assert!(!config.output.pretty_print);
        assert_eq!(
            config.catalog.publisher_uri,
            "http://data.lblod.info/services/delta-producer-json-diff-file-publisher"
        );
        assert_eq!(config.catalog.files_graph, "http://mu.semte.ch/graphs/delta-files");
        assert_eq!(config.errors.graph, "http://mu.semte.ch/graphs/system/errors");
        assert_eq!(config.errors.types.len(), 2);
        assert_eq!(config.login.key(), None);
        assert_eq!(config.metrics.address, "0.0.0.0:9090");
    }

    #[test]
    fn test_builtin_matches_struct_defaults() {
        let builtin = parse_builtin(&[]).unwrap();
        let defaults = Config::default();

        assert_eq!(builtin.server.address, defaults.server.address);
        assert_eq!(builtin.server.max_body_bytes, defaults.server.max_body_bytes);
        assert_eq!(builtin.flush.interval_ms, defaults.flush.interval_ms);
        assert_eq!(builtin.sparql.endpoint, defaults.sparql.endpoint);
        assert_eq!(builtin.catalog.file_base_uri, defaults.catalog.file_base_uri);
        assert_eq!(builtin.errors.base_uri, defaults.errors.base_uri);
        assert_eq!(builtin.login.graph, defaults.login.graph);
        assert_eq!(builtin.login.account_uri, defaults.login.account_uri);
    }

    #[test]
    fn test_builtin_environment_overrides() {
        let config = parse_builtin(&[
            ("DELTA_INTERVAL_MS", "250"),
            ("RELATIVE_FILE_PATH", "diffs"),
            ("PRETTY_PRINT_DIFF_JSON", "true"),
            ("LOG_INCOMING_DELTA", "true"),
            ("KEY", "s3cret"),
            ("PORT", "8080"),
            ("MU_SPARQL_ENDPOINT", "http://triplestore:8890/sparql"),
        ])
        .unwrap();

        assert_eq!(config.flush.interval_ms, 250);
        assert_eq!(config.output.relative_path, "diffs");
        assert!(config.output.pretty_print);
        assert!(config.server.log_incoming_delta);
        assert_eq!(config.login.key(), Some("s3cret"));
        assert_eq!(config.server.address, "0.0.0.0:8080");
        assert_eq!(config.sparql.endpoint, "http://triplestore:8890/sparql");
    }

    #[test]
    fn test_builtin_keeps_special_characters_verbatim() {
        for key in [r#"a"b"#, r"c:\dir", r"x\ty", r"\c", "it's #1", "tab\there"] {
            let config = parse_builtin(&[("KEY", key), ("FILE_PREFIX", r#"delta"v2"#)]).unwrap();
            assert_eq!(config.login.key(), Some(key));
            assert_eq!(config.output.file_prefix, r#"delta"v2"#);
        }
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = Config::parse("flush:\n  interval_ms: 50\n").unwrap();
        assert_eq!(config.flush.interval_ms, 50);
        assert_eq!(config.flush.shutdown_timeout_secs, 30);
        assert_eq!(config.output.relative_path, "deltas");
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let err = Config::parse("flush:\n  interval: 50\n").unwrap_err();
        assert!(matches!(err, ConfigError::YamlParse { .. }));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let err = Config::parse("flush:\n  interval_ms: 0\n").unwrap_err();
        match err {
            ConfigError::InvalidValue { message, .. } => assert!(message.contains("interval_ms")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_reports_all_invalid_values() {
        let err = Config::parse(
            "output:\n  relative_path: \"/\"\n  file_prefix: \"\"\ncatalog:\n  publisher_uri: \"\"\n",
        )
        .unwrap_err();
        match err {
            ConfigError::MultipleErrors { errors } => assert_eq!(errors.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }
}
