//! TC gateway service binary.
//!
//! Receives TC telemetry from the line controllers over TCP, persists every record to Postgres
//! and an in-process cache, and forwards selected record types to downstream consumers.

use std::process::ExitCode;

use clap::Parser;
use tc_bridge::metrics::register_metrics;
use tc_config::shared::GatewayConfig;
use tc_telemetry::metrics::init_metrics;
use tc_telemetry::tracing::init_tracing;
use tracing::error;

use crate::cli::{Cli, Command};
use crate::config::load_gateway_config;
use crate::core::{run_query_command, start_gateway_with_config};
use crate::error::{GatewayError, GatewayResult};

mod cli;
mod config;
mod core;
mod error;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

/// Loads configuration, initializes telemetry and runs the selected command on a
/// multi-threaded runtime.
fn run() -> GatewayResult<()> {
    let cli = Cli::parse();
    let gateway_config = load_gateway_config()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME")).map_err(GatewayError::config)?;

    let command = cli.resolved_command();
    if command == Command::Serve {
        init_metrics(gateway_config.telemetry.metrics_port).map_err(GatewayError::config)?;
        register_metrics();
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(gateway_config, command))
}

async fn async_main(gateway_config: GatewayConfig, command: Command) -> GatewayResult<()> {
    let result = match command {
        Command::Serve => start_gateway_with_config(gateway_config).await,
        Command::Query(query) => run_query_command(gateway_config, query).await,
    };

    if let Err(err) = &result {
        error!("{err}");
    }

    result
}
