use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "recordstore")]
#[command(author, version, about = "SQLite record store demo tool")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (includes executed SQL)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create missing tables and columns of the demo schema
    Migrate,

    /// Fill an empty database with demo users, wallets and products
    Seed {
        /// Number of users to create
        #[arg(short, long, default_value = "3")]
        users: usize,
    },

    /// Show row counts and wallet balance aggregates
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List users with their wallet and addresses
    Users {
        /// Maximum number of users to list
        #[arg(short, long, default_value = "20")]
        limit: i64,

        /// Only users whose wallet balance is at least this much
        #[arg(long)]
        min_balance: Option<i64>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
