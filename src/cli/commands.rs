use std::io::{self, Write};

use crate::app::{AppContext, Result, SluiceError};
use crate::daemon::{Daemon, DaemonConfig};
use crate::domain::ContentItem;
use crate::source::ContentSource;

pub async fn fetch(ctx: &AppContext) -> Result<()> {
    let items = ctx.source.fetch_items().await?;
    write_items(&mut io::stdout().lock(), &items)?;
    eprintln!("Fetched {} new items", items.len());
    Ok(())
}

pub async fn backfill(ctx: &AppContext, date: &str) -> Result<()> {
    if ctx.source.accounts().is_empty() {
        eprintln!("No accounts configured");
        return Ok(());
    }

    let items = ctx.source.fetch_historical(date).await?;
    write_items(&mut io::stdout().lock(), &items)?;
    eprintln!(
        "{} items for {} across {} accounts",
        items.len(),
        date,
        ctx.source.accounts().len()
    );
    Ok(())
}

pub async fn poll(ctx: &AppContext, interval: &str, no_initial: bool) -> Result<()> {
    let poll_interval_secs = DaemonConfig::parse_interval(interval).map_err(SluiceError::Config)?;
    let config = DaemonConfig {
        poll_interval_secs,
        poll_on_start: !no_initial,
    };

    let daemon = Daemon::new(&ctx.source, config);
    daemon
        .run(|item| {
            if let Err(e) = write_items(&mut io::stdout().lock(), std::slice::from_ref(item)) {
                tracing::warn!(cid = %item.cid, error = %e, "could not write item");
            }
        })
        .await
}

pub fn purge_cache(ctx: &AppContext) -> Result<()> {
    let removed = ctx.cache.purge_expired()?;
    println!("Removed {} expired cache entries", removed);
    Ok(())
}

/// One JSON object per line.
pub fn write_items<W: Write>(out: &mut W, items: &[ContentItem]) -> Result<()> {
    for item in items {
        serde_json::to_writer(&mut *out, item)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
