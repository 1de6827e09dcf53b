//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Conduit flow runner
///
/// Wires extension operations into a flow and runs messages through it.
#[derive(Parser, Debug)]
#[command(name = "conduit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one message through a flow
    Run(RunCommand),

    /// List available extensions with their configurations and operations
    Extensions {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Convert a value to another data type
    Convert {
        /// Value to convert (JSON, or plain text)
        value: String,

        /// Target data type (object, string, number, integer, boolean, array, map)
        #[arg(short, long)]
        to: String,

        /// Source data type (derived from the value when omitted)
        #[arg(short, long)]
        from: Option<String>,
    },

    /// Show version information
    Version,
}

#[derive(Args, Debug)]
pub struct RunCommand {
    /// Flow definition file (defaults to the configured flow)
    pub flow: Option<PathBuf>,

    /// Message payload (JSON, or plain text)
    #[arg(short, long)]
    pub payload: Option<String>,

    /// Flow variable as name=value (repeatable)
    #[arg(short, long = "var", value_name = "NAME=VALUE")]
    pub vars: Vec<String>,

    /// Print the resulting message as JSON
    #[arg(short, long)]
    pub json: bool,
}
