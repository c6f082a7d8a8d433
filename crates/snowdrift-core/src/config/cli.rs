//! Command line arguments.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about = "Publishes pushed delta records as date-partitioned JSON files")]
pub struct CliArgs {
    /// Path to a YAML configuration file. Without it the built-in
    /// configuration is used, driven entirely by environment variables.
    #[arg(short, long, env = "SNOWDRIFT_CONFIG")]
    pub config: Option<PathBuf>,
}
