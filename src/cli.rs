//! Command-line interface for the tunnel controller

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the settings file (TOML, JSON or YAML)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub settings: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the engine directives for a WireGuard config file
    Translate {
        /// WireGuard config file
        #[arg(value_name = "FILE")]
        config: PathBuf,

        /// Print private keys instead of masking them
        #[arg(long)]
        show_secrets: bool,

        /// Print as a JSON array of key/value objects
        #[arg(long)]
        json: bool,
    },
    /// Bring up a tunnel session and keep it running until Ctrl-C
    Up {
        /// WireGuard config file
        #[arg(value_name = "FILE")]
        config: PathBuf,

        /// Act as an exit node
        #[arg(long)]
        exit_node: bool,
    },
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}
