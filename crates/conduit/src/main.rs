//! conduit - Message Flow Runner
//!
//! Wires extensions into a flow described in TOML and runs messages through it.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod builtin;
mod cli;
mod commands;
mod config;
mod error;
mod flow;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::Config::load()?;

    // Initialize tracing; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Execute command
    match cli.command {
        Commands::Run(cmd) => commands::run::execute(cmd, &config).await,
        Commands::Extensions { json } => commands::extensions::execute(json, &config).await,
        Commands::Convert { value, to, from } => {
            commands::convert::execute(&value, &to, from.as_deref(), &config)
        }
        Commands::Version => {
            println!("conduit {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
