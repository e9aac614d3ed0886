use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::Level;

use nook_relay::cli;
use nook_relay::config::RelayConfig;

#[derive(Parser)]
#[command(name = "nook-relay", version, about = "Relay hook events to the Nook companion app")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Forward an event record read from stdin.
    Send {
        /// Wait for a permission decision even if the event does not require one.
        #[arg(long)]
        wait: bool,
    },
    /// Show the effective connection settings.
    Config {
        /// Also resolve the TCP endpoint (may run discovery).
        #[arg(long)]
        resolve: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = RelayConfig::load();
    let debug = loaded.as_ref().map(|c| c.debug).unwrap_or(false);
    init_tracing(debug);

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            // A broken config must never block the assistant.
            tracing::warn!("nook-relay: {}", e);
            return match cli.command {
                Command::Send { .. } => ExitCode::SUCCESS,
                Command::Config { .. } => ExitCode::FAILURE,
            };
        }
    };

    let result = match cli.command {
        Command::Send { wait } => cli::run_send(config, wait).await,
        Command::Config { resolve } => cli::run_config(config, resolve).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("nook-relay: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}
