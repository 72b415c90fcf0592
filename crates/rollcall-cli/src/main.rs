//! Rollcall - a command-line client for the course and student catalog.
//!
//! Every command goes through the sync layer, so listings keep working
//! from the local store when the backend cannot be reached.

mod commands;
mod output;

use std::io;
use std::sync::Arc;

use anyhow::Result;
use rollcall_core::sync::Action;
use rollcall_core::{Config, Repository};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{parse_args, Invocation, USAGE};

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match parse_args(&args) {
        Ok(Some(invocation)) => invocation,
        Ok(None) => {
            println!("{}", USAGE);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let Invocation { offline, command } = invocation;

    let mut config = Config::load()?;
    if offline {
        config.offline_mode = true;
    }
    info!(url = %config.api_base_url, offline = config.offline_mode, "Rollcall starting");

    let repo = Arc::new(Repository::from_config(&config)?);

    // One task per command so Ctrl-C can abort it mid-flight
    let mut action = Action::spawn({
        let repo = Arc::clone(&repo);
        async move { commands::execute(&repo, command).await }
    });

    tokio::select! {
        outcome = &mut action => match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
            Err(cancelled) => {
                eprintln!("{}", cancelled);
                std::process::exit(130);
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling");
            action.cancel();
            eprintln!("Cancelled");
            std::process::exit(130);
        }
    }
}
