//! Remote platform capabilities.
//!
//! [`PlatformClient`] is everything the engine needs from the platform:
//! authentication, profile and record lookups, search, and a lazy timeline.
//! [`HttpPlatformClient`](http::HttpPlatformClient) talks to a JSON bridge
//! over HTTP; tests use an in-process mock.

pub mod http;
#[cfg(test)]
pub(crate) mod mock;

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::app::Result;
use crate::domain::{Cookie, Profile, WireRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMode {
    Latest,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Latest => write!(f, "Latest"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchPage {
    pub items: Vec<WireRecord>,
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn is_authenticated(&self) -> Result<bool>;

    async fn login(&self, username: &str, password: &str, email: Option<&str>) -> Result<()>;

    async fn get_cookies(&self) -> Result<Option<Vec<Cookie>>>;

    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<()>;

    /// `Ok(None)` when the handle does not exist.
    async fn get_profile(&self, handle: &str) -> Result<Option<Profile>>;

    /// `Ok(None)` when the record does not exist or is not visible.
    async fn get_record_by_id(&self, id: &str) -> Result<Option<WireRecord>>;

    async fn search(
        &self,
        query: &str,
        page_size: usize,
        mode: SearchMode,
        cursor: Option<&str>,
    ) -> Result<SearchPage>;

    /// Newest-first records of `handle`, at most `max_count`. Single pass;
    /// call again for a fresh scan.
    fn timeline<'a>(&'a self, handle: &'a str, max_count: usize) -> BoxStream<'a, Result<WireRecord>>;
}
