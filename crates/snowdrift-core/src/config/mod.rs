//! Configuration plumbing shared by snowdrift binaries.
//!
//! Config files are YAML with environment variable interpolation applied
//! before parsing (see [`vars`]).

mod cli;
mod vars;

pub use cli::CliArgs;
pub use vars::{InterpolationResult, interpolate, interpolate_with};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::path::Path;

use crate::error::{ConfigError, EnvInterpolationSnafu, ReadFileSnafu, YamlParseSnafu};

/// Byte size constants (binary/IEC units).
pub const KB: usize = 1024;
pub const MB: usize = 1024 * KB;

/// Metrics configuration for the Prometheus endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Address to bind the metrics HTTP server (default: "0.0.0.0:9090").
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_address() -> String {
    crate::metrics::DEFAULT_METRICS_ADDR.to_string()
}

/// Interpolate environment variables into `contents` and parse the result as YAML.
pub fn parse_yaml<T: DeserializeOwned>(contents: &str) -> Result<T, ConfigError> {
    let result = interpolate(contents);
    if !result.is_ok() {
        return EnvInterpolationSnafu {
            message: result.errors.join("\n"),
        }
        .fail();
    }

    serde_yaml::from_str(&result.text).context(YamlParseSnafu)
}

/// Read a YAML config file, interpolate it and parse it.
pub fn load_yaml_file<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
    parse_yaml(&contents)
}
