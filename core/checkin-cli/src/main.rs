//! checkin: command-line front end for event check-in.
//!
//! ## Subcommands
//!
//! - `resolve`: Show how a QR payload is read (format, token, event id)
//! - `session`: Show the caller identity found in the session store
//! - `redeem`: Redeem one payload against the backend
//! - `watch`: Redeem payloads read from stdin, one per line, until EOF
//!
//! Machine-readable output goes to stdout as JSON; logs go to stderr.

mod commands;
mod logging;
mod stdin_device;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "checkin")]
#[command(about = "Event check-in over QR codes")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $CHECKIN_CONFIG or ~/.checkin/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides shared by every command that talks to the backend.
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// JSON object file holding the session store
    #[arg(long, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Backend base URL
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a QR payload without redeeming it
    Resolve {
        #[arg(value_name = "PAYLOAD")]
        payload: String,
    },

    /// Print the resolved session identity
    Session {
        /// JSON object file holding the session store
        #[arg(long, value_name = "PATH")]
        store: Option<PathBuf>,
    },

    /// Redeem a single QR payload
    Redeem {
        #[arg(value_name = "PAYLOAD")]
        payload: String,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Redeem payloads from stdin as they arrive
    Watch {
        #[command(flatten)]
        overrides: Overrides,
    },
}

#[tokio::main]
async fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Resolve { payload } => commands::resolve(&payload),
        Commands::Session { store } => commands::session(cli.config, store),
        Commands::Redeem { payload, overrides } => {
            commands::redeem(cli.config, overrides, &payload).await
        }
        Commands::Watch { overrides } => commands::watch(cli.config, overrides).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "checkin failed");
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
