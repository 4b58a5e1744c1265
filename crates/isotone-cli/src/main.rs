use anyhow::Result;
use clap::Parser;
use isotone_daemon::DaemonRunner;
use isotone_types::Operation;
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, Commands};

mod commands;
mod config;
mod logger;

const LOG_ENV: &str = "ISOTONE_LOG";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = isotone_config::load_or_default(cli.config.as_deref())?;
    if let Some(socket_dir) = cli.socket_dir {
        config.socket_dir = socket_dir;
    }
    let daemon_runner = DaemonRunner::new(config, cli.config);

    match cli.command {
        Commands::Daemon => commands::daemon_start(&daemon_runner).await,
        Commands::Shutdown => commands::daemon_stop(&daemon_runner).await,
        Commands::Status { json } => commands::status(&daemon_runner, json).await,
        Commands::Watch => commands::watch(&daemon_runner).await,
        Commands::Start { target } => {
            commands::service(&daemon_runner, Operation::Start, &target).await
        }
        Commands::Stop { target } => {
            commands::service(&daemon_runner, Operation::Stop, &target).await
        }
        Commands::Restart { target } => {
            commands::service(&daemon_runner, Operation::Restart, &target).await
        }
        Commands::Install { target } => {
            commands::service(&daemon_runner, Operation::Install, &target).await
        }
        Commands::Uninstall { target } => {
            commands::service(&daemon_runner, Operation::Uninstall, &target).await
        }
    }
}
