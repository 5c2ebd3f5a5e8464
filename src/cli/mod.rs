pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sluice")]
#[command(about = "Social feed ingestion and day backfill", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/sluice/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch items newer than the last run
    Fetch,
    /// Fetch every configured account for one UTC day
    Backfill {
        /// Day to backfill (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,
    },
    /// Keep polling on an interval
    Poll {
        /// Poll interval (e.g., "30m", "1h", "1d")
        #[arg(short, long, default_value = "30m")]
        interval: String,

        /// Skip the poll on start
        #[arg(long)]
        no_initial: bool,
    },
    /// Cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Delete expired cache entries
    Purge,
}
