use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::app::{Result, SluiceError};
use crate::cache::CacheStoreExt;
use crate::domain::{ContentItem, FetchWindow};
use crate::source::Pipeline;

pub const DEFAULT_BUCKET_TTL: Duration = Duration::from_secs(300);

/// Items of one account grouped by UTC day.
type DayBuckets = BTreeMap<String, Vec<ContentItem>>;

/// Per-account, per-day backfill. Each account's day is served from cache
/// when possible; otherwise it is fetched, normalized, bucketed by the
/// actual day of every item, and the buckets are written back.
pub struct BackfillOrchestrator {
    pipeline: Arc<Pipeline>,
    bucket_ttl: Duration,
    cache_adjacent_days: bool,
}

impl BackfillOrchestrator {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            bucket_ttl: DEFAULT_BUCKET_TTL,
            cache_adjacent_days: true,
        }
    }

    pub fn with_bucket_ttl(mut self, ttl: Duration) -> Self {
        self.bucket_ttl = ttl;
        self
    }

    pub fn with_adjacent_days(mut self, enabled: bool) -> Self {
        self.cache_adjacent_days = enabled;
        self
    }

    /// Items of `date` for every account, in account order.
    ///
    /// Only an invalid date or a failed login aborts the call. Any other
    /// failure is confined to its account: whatever was normalized before it
    /// is kept and nothing is cached, so the next call fetches again.
    pub async fn backfill(&self, accounts: &[String], date: &str) -> Result<Vec<ContentItem>> {
        let window = FetchWindow::for_date(date)?;
        let day = window.start_day();
        let mut items = Vec::new();

        for account in accounts {
            let key = self.pipeline.account_key(account);
            if let Some(cached) = self.pipeline.cache.get_as::<Vec<ContentItem>>(&key, &day) {
                debug!(account = %account, day = %day, count = cached.len(), "backfill cache hit");
                items.extend(cached);
                continue;
            }

            self.pipeline.sessions.ensure_authenticated().await?;

            let (mut buckets, failure) = self.fetch_account(account, &window).await;
            let requested = buckets.remove(&day).unwrap_or_default();

            match failure {
                None => {
                    info!(
                        account = %account,
                        day = %day,
                        strategy = self.pipeline.strategy.name(),
                        count = requested.len(),
                        "backfilled"
                    );
                    self.store_buckets(&key, &day, &requested, buckets);
                }
                Some(e) => {
                    warn!(
                        account = %account,
                        day = %day,
                        kept = requested.len(),
                        error = %e,
                        "backfill incomplete, not caching"
                    );
                }
            }
            items.extend(requested);
        }

        Ok(items)
    }

    /// Fetch and normalize one account. Returns every bucket built before
    /// the stream ended, plus the error that ended it, if any.
    async fn fetch_account(
        &self,
        account: &str,
        window: &FetchWindow,
    ) -> (DayBuckets, Option<SluiceError>) {
        let pipeline = &self.pipeline;
        let mut buckets = DayBuckets::new();
        let mut pages = pipeline.strategy.fetch(account, *window, pipeline.budget);

        while let Some(page) = pages.next().await {
            let page = match page {
                Ok(page) => page,
                Err(e) => return (buckets, Some(e)),
            };

            let in_window = pipeline.normalizer.normalize(&page.records).await;
            let spillover = pipeline.normalizer.normalize(&page.spillover).await;
            for item in in_window.into_iter().chain(spillover) {
                buckets
                    .entry(FetchWindow::day_key(item.date))
                    .or_default()
                    .push(item);
            }
        }

        (buckets, None)
    }

    /// The requested day replaces its entry. Other days were only partly
    /// scanned, so they are merged into what is already cached.
    fn store_buckets(&self, key: &str, day: &str, requested: &[ContentItem], others: DayBuckets) {
        let cache = &self.pipeline.cache;
        cache.set_as(key, day, &requested, Some(self.bucket_ttl));

        if !self.cache_adjacent_days {
            return;
        }
        for (other_day, fresh) in others {
            let mut merged: Vec<ContentItem> = cache.get_as(key, &other_day).unwrap_or_default();
            let mut seen: HashSet<String> = merged.iter().map(|i| i.cid.clone()).collect();
            merged.extend(fresh.into_iter().filter(|i| seen.insert(i.cid.clone())));
            debug!(key, day = %other_day, count = merged.len(), "caching adjacent day");
            cache.set_as(key, &other_day, &merged, Some(self.bucket_ttl));
        }
    }
}
