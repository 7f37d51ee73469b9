//! lightify CLI entry point.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use lightify_core::{TracingConfig, init_tracing};

use lightify_client::cli::{Cli, Command, ConfigAction};
use lightify_client::commands;
use lightify_client::config::ClientConfig;
use lightify_client::error::ClientResult;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing = if cli.debug {
        TracingConfig::cli_debug()
    } else if matches!(cli.command, Command::Watch { .. }) {
        TracingConfig::watcher()
    } else {
        TracingConfig::default()
    };
    if let Err(e) = init_tracing(tracing) {
        eprintln!("warning: failed to initialize logging: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);
    let mut config = match cli.config {
        Some(ref path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load()?,
    };

    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Path => commands::config::path(&config_path),
        };
    }

    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    let mut gateway = config.gateway.to_gateway_config(cli.host.as_deref())?;
    if let Some(secs) = cli.timeout {
        gateway = gateway.with_request_timeout(Duration::from_secs(secs));
    }

    match cli.command {
        Command::Watch { interval } => {
            commands::watch::run(gateway, interval.map(Duration::from_secs), cli.json).await
        }
        ref command => commands::gateway::run(command, gateway, cli.json).await,
    }
}
