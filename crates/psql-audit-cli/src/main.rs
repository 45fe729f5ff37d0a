mod cli;
mod logging;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use psql_audit_core::LoggingConfig;
use psql_audit_proxy::AuditProxy;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging_config = match LoggingConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid logging configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&logging_config);

    match run(cli, &logging_config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(err = %format!("{e:#}"), "unexpected error");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, logging_config: &LoggingConfig) -> anyhow::Result<()> {
    let proxy = AuditProxy::new(cli.proxy_config(), logging::audit_logger(logging_config));
    let listener = proxy.bind().await?;

    tokio::select! {
        result = proxy.serve(listener) => result.context("accept loop failed"),
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
