use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sluice::app::AppContext;
use sluice::cli::{commands, CacheAction, Cli, Commands};
use sluice::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the JSON lines
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Fetch => {
            commands::fetch(&ctx).await?;
        }
        Commands::Backfill { date } => {
            commands::backfill(&ctx, &date).await?;
        }
        Commands::Poll {
            interval,
            no_initial,
        } => {
            commands::poll(&ctx, &interval, no_initial).await?;
        }
        Commands::Cache {
            action: CacheAction::Purge,
        } => {
            commands::purge_cache(&ctx)?;
        }
    }

    Ok(())
}
