use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CLI for isotone
#[derive(Parser, Debug)]
#[command(name = "isotone", version, about = "Local service stack orchestrator")]
pub struct Cli {
    /// File path to the configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the daemon socket
    #[arg(long, global = true)]
    pub socket_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the daemon in the foreground
    Daemon,
    /// Stop the running daemon
    Shutdown,
    /// Start a service, or `all`
    Start { target: String },
    /// Stop a service, or `all`
    Stop { target: String },
    /// Restart a service, or `all`
    Restart { target: String },
    /// Install a service, or `all`
    Install { target: String },
    /// Uninstall a service, or `all`
    Uninstall { target: String },
    /// Show the state of every service
    Status {
        /// Print the status report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Follow state changes as they happen
    Watch,
}
