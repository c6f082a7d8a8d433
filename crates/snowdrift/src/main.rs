//! snowdrift CLI: delta file publisher.

use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use snowdrift::{CliArgs, init_tracing, load_config, run};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = CliArgs::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Starting snowdrift: flushing to {}/{} every {}ms",
        config.output.share_folder, config.output.relative_path, config.flush.interval_ms
    );

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("snowdrift failed: {e}");
            ExitCode::FAILURE
        }
    }
}
