use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::app::Result;
use crate::cache::{advance_cursor, Clock, CursorState};
use crate::domain::{ContentItem, FetchWindow, RawRecord};
use crate::source::Pipeline;

pub const DEFAULT_LOOKBACK_SECS: u64 = 86_400;

/// Recent-items mode. Each account keeps a cursor at the newest record
/// handed out; a poll returns only what is newer.
pub struct ContinuousPoller {
    pipeline: Arc<Pipeline>,
    clock: Clock,
    lookback_secs: i64,
}

impl ContinuousPoller {
    pub fn new(pipeline: Arc<Pipeline>, clock: Clock) -> Self {
        Self {
            pipeline,
            clock,
            lookback_secs: DEFAULT_LOOKBACK_SECS as i64,
        }
    }

    pub fn with_lookback(mut self, secs: u64) -> Self {
        self.lookback_secs = i64::try_from(secs).unwrap_or(i64::MAX);
        self
    }

    pub async fn poll(&self, accounts: &[String]) -> Result<Vec<ContentItem>> {
        self.pipeline.sessions.ensure_authenticated().await?;

        let now = (self.clock)() / 1000;
        let mut items = Vec::new();
        for account in accounts {
            items.extend(self.poll_account(account, now).await);
        }
        Ok(items)
    }

    async fn poll_account(&self, account: &str, now: i64) -> Vec<ContentItem> {
        let pipeline = &self.pipeline;
        let key = pipeline.account_key(account);
        let cursor = pipeline.cache.get_cursor(&key);

        let start = cursor
            .as_ref()
            .map(|c| c.last_timestamp)
            .unwrap_or_else(|| now.saturating_sub(self.lookback_secs));
        let window = FetchWindow::new(start, now + 1);

        let mut records: Vec<RawRecord> = Vec::new();
        let mut failed = false;
        let mut pages = pipeline.strategy.fetch(account, window, pipeline.budget);
        while let Some(page) = pages.next().await {
            match page {
                Ok(page) => records.extend(page.records.into_iter().filter(|r| {
                    cursor
                        .as_ref()
                        .map_or(true, |c| c.is_unseen(r.id(), r.timestamp()))
                })),
                Err(e) => {
                    warn!(account, error = %e, "poll incomplete, cursor not advanced");
                    failed = true;
                    break;
                }
            }
        }

        if !failed {
            if let Some(newest) = records.iter().map(RawRecord::timestamp).max() {
                let candidate = CursorState::at(
                    newest,
                    records
                        .iter()
                        .filter(|r| r.timestamp() == newest)
                        .map(|r| r.id().to_string()),
                );
                if advance_cursor(pipeline.cache.as_ref(), &key, &candidate) {
                    debug!(account, last_timestamp = newest, "cursor advanced");
                }
            }
        }

        let items = pipeline.normalizer.normalize(&records).await;
        info!(account, strategy = pipeline.strategy.name(), count = items.len(), "polled");
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CursorStore, MemoryCache};
    use crate::config::FetchMode;
    use crate::domain::record::fixtures::wire;
    use crate::remote::mock::MockClient;
    use crate::source::testing::{config, source, DAY};
    use crate::source::ContentSource;

    fn cids(items: &[ContentItem]) -> Vec<&str> {
        items.iter().map(|i| i.cid.as_str()).collect()
    }

    #[tokio::test]
    async fn test_first_poll_uses_lookback_and_sets_cursor() {
        let now = DAY + 10_000;
        let client = Arc::new(MockClient::new().authenticated().with_timeline(
            "alice",
            vec![
                wire("3", "alice", now - 100, "new"),
                wire("2", "alice", now - 5_000, "older"),
                wire("1", "alice", now - 90_000, "past lookback"),
            ],
        ));
        let cache = Arc::new(MemoryCache::new());
        let source = source(&client, &cache, &config(&["alice"], FetchMode::Timeline), now);

        let items = source.fetch_items().await.unwrap();
        assert_eq!(cids(&items), vec!["twitter-3", "twitter-2"]);
        assert_eq!(
            cache.get_cursor("twitter:alice"),
            Some(CursorState::new("3", now - 100))
        );
    }

    #[tokio::test]
    async fn test_next_poll_only_returns_unseen() {
        let cache = Arc::new(MemoryCache::new());
        let cfg = config(&["alice"], FetchMode::Timeline);
        cache.set_cursor("twitter:alice", &CursorState::new("3", DAY + 100));

        let client = Arc::new(MockClient::new().authenticated().with_timeline(
            "alice",
            vec![
                wire("5", "alice", DAY + 300, "newest"),
                wire("4", "alice", DAY + 100, "same second"),
                wire("3", "alice", DAY + 100, "already seen"),
                wire("2", "alice", DAY + 50, "old"),
            ],
        ));
        let items = source(&client, &cache, &cfg, DAY + 1_000)
            .fetch_items()
            .await
            .unwrap();
        assert_eq!(cids(&items), vec!["twitter-5", "twitter-4"]);
        assert_eq!(
            cache.get_cursor("twitter:alice"),
            Some(CursorState::new("5", DAY + 300))
        );
    }

    #[tokio::test]
    async fn test_records_sharing_a_second_are_emitted_once() {
        let cache = Arc::new(MemoryCache::new());
        let cfg = config(&["alice"], FetchMode::Timeline);
        let client = Arc::new(MockClient::new().authenticated().with_timeline(
            "alice",
            vec![
                wire("2", "alice", DAY + 500, "first"),
                wire("1", "alice", DAY + 500, "second"),
            ],
        ));
        let source = source(&client, &cache, &cfg, DAY + 1_000);

        let first = source.fetch_items().await.unwrap();
        assert_eq!(cids(&first), vec!["twitter-2", "twitter-1"]);
        assert_eq!(
            cache.get_cursor("twitter:alice"),
            Some(CursorState::at(DAY + 500, ["1", "2"]))
        );

        assert!(source.fetch_items().await.unwrap().is_empty());
        assert!(source.fetch_items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cursor_does_not_regress() {
        let cache = Arc::new(MemoryCache::new());
        cache.set_cursor("twitter:alice", &CursorState::new("9", DAY + 900));

        let client = Arc::new(MockClient::new().authenticated().with_timeline(
            "alice",
            vec![
                wire("8", "alice", DAY + 900, "boundary"),
                wire("7", "alice", DAY + 400, "old"),
            ],
        ));
        let source = source(&client, &cache, &config(&["alice"], FetchMode::Timeline), DAY + 1_000);

        let items = source.fetch_items().await.unwrap();
        assert_eq!(cids(&items), vec!["twitter-8"]);
        assert_eq!(
            cache.get_cursor("twitter:alice"),
            Some(CursorState::at(DAY + 900, ["8", "9"]))
        );
        assert!(source.fetch_items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_account_keeps_cursor_and_others_continue() {
        let cache = Arc::new(MemoryCache::new());
        let client = Arc::new(
            MockClient::new()
                .authenticated()
                .with_timeline(
                    "alice",
                    vec![wire("a2", "alice", DAY + 500, "x"), wire("a1", "alice", DAY + 400, "y")],
                )
                .failing_after("alice", 1)
                .with_timeline("bob", vec![wire("b1", "bob", DAY + 200, "z")]),
        );
        let items = source(&client, &cache, &config(&["alice", "bob"], FetchMode::Timeline), DAY + 1_000)
            .fetch_items()
            .await
            .unwrap();

        assert_eq!(cids(&items), vec!["twitter-a2", "twitter-b1"]);
        assert!(cache.get_cursor("twitter:alice").is_none());
        assert!(cache.get_cursor("twitter:bob").is_some());
    }
}
