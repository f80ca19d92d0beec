//! CLI module for the admin key panel

pub mod serve;

use clap::{Parser, Subcommand};

/// Admin panel for issuing, validating and revoking API keys
#[derive(Parser)]
#[command(name = "admin-key-panel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve,
}
