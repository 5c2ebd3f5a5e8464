//! Content sources.
//!
//! [`ContentSource`] is the contract every feed implements: recent items for
//! continuous polling and one UTC day of items for backfill.
//! [`TwitterSource`] wires the social platform pieces together: session,
//! fetch strategy, normalizer and cache.

pub mod backfill;
pub mod poll;

use std::sync::Arc;

use async_trait::async_trait;

use crate::app::Result;
use crate::cache::{system_clock, CacheStore, Clock};
use crate::config::{FetchMode, TwitterConfig};
use crate::domain::ContentItem;
use crate::fetch::{FetchBudget, FetchStrategy, SearchStrategy, TimelineStrategy};
use crate::normalizer::ContentNormalizer;
use crate::profile::ProfileResolver;
use crate::remote::PlatformClient;
use crate::session::{Credentials, SessionManager};

pub use backfill::BackfillOrchestrator;
pub use poll::ContinuousPoller;

pub const TWITTER_SOURCE: &str = "twitter";

#[async_trait]
pub trait ContentSource: Send + Sync {
    fn name(&self) -> &str;

    /// Items newer than what this source already handed out.
    async fn fetch_items(&self) -> Result<Vec<ContentItem>>;

    /// Items of one UTC day (`YYYY-MM-DD`) across every configured account.
    async fn fetch_historical(&self, date: &str) -> Result<Vec<ContentItem>>;
}

/// Collaborators shared by backfill and polling.
pub struct Pipeline {
    pub source: String,
    pub cache: Arc<dyn CacheStore>,
    pub sessions: SessionManager,
    pub strategy: Box<dyn FetchStrategy>,
    pub normalizer: ContentNormalizer,
    pub budget: FetchBudget,
}

impl Pipeline {
    /// Cache and cursor key of one account.
    pub fn account_key(&self, account: &str) -> String {
        format!("{}:{}", self.source, account)
    }
}

pub struct TwitterSource {
    accounts: Vec<String>,
    backfill: BackfillOrchestrator,
    poller: ContinuousPoller,
}

impl TwitterSource {
    pub fn new(
        client: Arc<dyn PlatformClient>,
        cache: Arc<dyn CacheStore>,
        config: &TwitterConfig,
    ) -> Self {
        Self::with_clock(client, cache, config, system_clock())
    }

    pub fn with_clock(
        client: Arc<dyn PlatformClient>,
        cache: Arc<dyn CacheStore>,
        config: &TwitterConfig,
        clock: Clock,
    ) -> Self {
        let source = TWITTER_SOURCE;

        let profiles = Arc::new(ProfileResolver::new(
            client.clone(),
            cache.clone(),
            source,
            config.profile_ttl(),
        ));
        let normalizer = ContentNormalizer::new(client.clone(), profiles, source)
            .with_lookup_timeout(config.lookup_timeout());
        let sessions = SessionManager::new(
            client.clone(),
            cache.clone(),
            source,
            Credentials::from_config(config),
        )
        .with_policy(config.retry_policy())
        .with_credential_ttl(config.credential_ttl());
        let strategy: Box<dyn FetchStrategy> = match config.fetch_mode {
            FetchMode::Timeline => Box::new(TimelineStrategy::new(client)),
            FetchMode::Search => {
                Box::new(SearchStrategy::new(client).with_terms(config.search_terms.clone()))
            }
        };

        let pipeline = Arc::new(Pipeline {
            source: source.to_string(),
            cache,
            sessions,
            strategy,
            normalizer,
            budget: FetchBudget::from_config(config),
        });

        Self {
            accounts: config.accounts.clone(),
            backfill: BackfillOrchestrator::new(pipeline.clone())
                .with_bucket_ttl(config.backfill_ttl())
                .with_adjacent_days(config.cache_adjacent_days),
            poller: ContinuousPoller::new(pipeline, clock).with_lookback(config.poll_lookback_secs),
        }
    }

    pub fn accounts(&self) -> &[String] {
        &self.accounts
    }
}

#[async_trait]
impl ContentSource for TwitterSource {
    fn name(&self) -> &str {
        TWITTER_SOURCE
    }

    async fn fetch_items(&self) -> Result<Vec<ContentItem>> {
        self.poller.poll(&self.accounts).await
    }

    async fn fetch_historical(&self, date: &str) -> Result<Vec<ContentItem>> {
        self.backfill.backfill(&self.accounts, date).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::remote::mock::MockClient;

    /// 2024-01-02T00:00:00Z
    pub const DAY: i64 = 1_704_153_600;

    pub fn config(accounts: &[&str], mode: FetchMode) -> TwitterConfig {
        TwitterConfig {
            accounts: accounts.iter().map(|a| a.to_string()).collect(),
            fetch_mode: mode,
            auth_max_attempts: 1,
            auth_retry_delay_secs: 0,
            ..Default::default()
        }
    }

    pub fn fixed_clock(epoch_secs: i64) -> Clock {
        Arc::new(move || epoch_secs * 1000)
    }

    pub fn source(
        client: &Arc<MockClient>,
        cache: &Arc<MemoryCache>,
        config: &TwitterConfig,
        now_secs: i64,
    ) -> TwitterSource {
        TwitterSource::with_clock(client.clone(), cache.clone(), config, fixed_clock(now_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::app::SluiceError;
    use crate::cache::MemoryCache;
    use crate::domain::record::fixtures::wire;
    use crate::remote::mock::MockClient;

    #[tokio::test]
    async fn test_source_name_and_accounts() {
        let client = Arc::new(MockClient::new().authenticated());
        let cache = Arc::new(MemoryCache::new());
        let source = source(&client, &cache, &config(&["alice"], FetchMode::Timeline), DAY);
        assert_eq!(source.name(), "twitter");
        assert_eq!(source.accounts(), &["alice".to_string()]);
    }

    #[tokio::test]
    async fn test_historical_through_trait_object() {
        let client = Arc::new(
            MockClient::new()
                .authenticated()
                .with_timeline("alice", vec![wire("1", "alice", DAY + 60, "gm")]),
        );
        let cache = Arc::new(MemoryCache::new());
        let source: Box<dyn ContentSource> = Box::new(super::testing::source(
            &client,
            &cache,
            &config(&["alice"], FetchMode::Timeline),
            DAY + 3_600,
        ));

        let items = source.fetch_historical("2024-01-02").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].cid, "twitter-1");
    }

    #[tokio::test]
    async fn test_unauthenticated_source_fails_fatally() {
        let client = Arc::new(MockClient::new());
        let cache = Arc::new(MemoryCache::new());
        let source = source(&client, &cache, &config(&["alice"], FetchMode::Timeline), DAY);

        let err = source.fetch_historical("2024-01-02").await.unwrap_err();
        assert!(matches!(err, SluiceError::Auth { .. }));
        assert_eq!(client.listing_calls(), 0);

        let err = source.fetch_items().await.unwrap_err();
        assert!(err.is_fatal());
    }
}
