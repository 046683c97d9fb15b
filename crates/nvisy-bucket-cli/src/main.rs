#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod commands;
mod config;
mod signal;
mod telemetry;

use std::process;

use anyhow::Context;
use nvisy_bucket::CancellationToken;

use crate::config::Cli;

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "nvisy_bucket_cli::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "nvisy_bucket_cli::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "nvisy_bucket_cli::config";
pub const TRACING_TARGET_COMMAND: &str = "nvisy_bucket_cli::command";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::debug!(
            target: TRACING_TARGET_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %format!("{error:#}"),
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    telemetry::init_tracing(cli.log_json)?;
    cli.log();

    let bucket_config = cli
        .bucket_config()
        .context("failed to load bucket configuration")?;
    bucket_config
        .validate()
        .context("invalid bucket configuration")?;

    let connector = cli
        .connect(bucket_config)
        .await
        .context("failed to open bucket connector")?;

    let cancel = CancellationToken::new();
    let signal = tokio::spawn(signal::cancel_on_signal(cancel.clone()));

    let command = cli.command;
    let result = connector
        .scoped(|connector| command.execute(connector, cancel.clone()))
        .await;

    signal.abort();
    result
}
