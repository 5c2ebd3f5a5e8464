//! In-process [`PlatformClient`] for tests. Counts every remote call.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::app::{Result, SluiceError};
use crate::domain::{Cookie, Profile, WireRecord};
use crate::remote::{PlatformClient, SearchMode, SearchPage};

#[derive(Default)]
pub struct MockClient {
    authenticated: AtomicBool,
    accepted_cookie: Option<String>,
    login_succeeds: bool,
    session_cookies: Mutex<Vec<Cookie>>,

    profiles: HashMap<String, Profile>,
    profile_errors: HashSet<String>,
    records: HashMap<String, WireRecord>,
    hanging_records: HashSet<String>,
    timelines: HashMap<String, Vec<WireRecord>>,
    search_pages: HashMap<String, Vec<Vec<WireRecord>>>,
    fail_after: HashMap<String, usize>,
    rejects_cookies: bool,
    ignores_max_count: bool,

    pub is_auth_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub set_cookie_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
    pub record_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub timeline_calls: AtomicUsize,
    pub timeline_records_pulled: AtomicUsize,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authenticated(self) -> Self {
        self.authenticated.store(true, Ordering::SeqCst);
        self
    }

    /// Setting a cookie with this value authenticates the session.
    pub fn accepting_cookie(mut self, value: &str) -> Self {
        self.accepted_cookie = Some(value.to_string());
        self
    }

    /// `set_cookies` fails at the remote.
    pub fn rejecting_cookies(mut self) -> Self {
        self.rejects_cookies = true;
        self
    }

    /// `timeline` yields every scripted record regardless of `max_count`.
    pub fn ignoring_max_count(mut self) -> Self {
        self.ignores_max_count = true;
        self
    }

    pub fn accepting_login(mut self) -> Self {
        self.login_succeeds = true;
        self
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profiles.insert(profile.handle.clone(), profile);
        self
    }

    pub fn with_profile_error(mut self, handle: &str) -> Self {
        self.profile_errors.insert(handle.to_string());
        self
    }

    pub fn with_record(mut self, record: WireRecord) -> Self {
        let id = record.id.clone().unwrap_or_default();
        self.records.insert(id, record);
        self
    }

    /// Lookups of `id` never complete.
    pub fn with_hanging_record(mut self, id: &str) -> Self {
        self.hanging_records.insert(id.to_string());
        self
    }

    pub fn with_timeline(mut self, account: &str, records: Vec<WireRecord>) -> Self {
        self.timelines.insert(account.to_string(), records);
        self
    }

    pub fn with_search_pages(mut self, account: &str, pages: Vec<Vec<WireRecord>>) -> Self {
        self.search_pages.insert(account.to_string(), pages);
        self
    }

    /// Timeline and search for `account` fail once `n` records were served.
    pub fn failing_after(mut self, account: &str, n: usize) -> Self {
        self.fail_after.insert(account.to_string(), n);
        self
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// Timeline plus search calls.
    pub fn listing_calls(&self) -> usize {
        Self::calls(&self.search_calls) + Self::calls(&self.timeline_calls)
    }
}

fn account_from_query(query: &str) -> Option<&str> {
    query
        .split_whitespace()
        .find_map(|term| term.strip_prefix("from:"))
}

#[async_trait]
impl PlatformClient for MockClient {
    async fn is_authenticated(&self) -> Result<bool> {
        self.is_auth_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.authenticated.load(Ordering::SeqCst))
    }

    async fn login(&self, username: &str, _password: &str, _email: Option<&str>) -> Result<()> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if !self.login_succeeds {
            return Err(SluiceError::Remote(format!("login rejected for {}", username)));
        }
        self.authenticated.store(true, Ordering::SeqCst);
        *self.session_cookies.lock().unwrap() = vec![Cookie {
            name: "auth_token".into(),
            value: "from-login".into(),
            domain: None,
            path: None,
            expires: None,
        }];
        Ok(())
    }

    async fn get_cookies(&self) -> Result<Option<Vec<Cookie>>> {
        let cookies = self.session_cookies.lock().unwrap().clone();
        Ok(if cookies.is_empty() { None } else { Some(cookies) })
    }

    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<()> {
        self.set_cookie_calls.fetch_add(1, Ordering::SeqCst);
        if self.rejects_cookies {
            return Err(SluiceError::Remote("bridge 400 on stale cookies".into()));
        }
        if let Some(accepted) = &self.accepted_cookie {
            if cookies.iter().any(|c| &c.value == accepted) {
                self.authenticated.store(true, Ordering::SeqCst);
            }
        }
        *self.session_cookies.lock().unwrap() = cookies.to_vec();
        Ok(())
    }

    async fn get_profile(&self, handle: &str) -> Result<Option<Profile>> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if self.profile_errors.contains(handle) {
            return Err(SluiceError::Remote("profile lookup failed".into()));
        }
        Ok(self.profiles.get(handle).cloned())
    }

    async fn get_record_by_id(&self, id: &str) -> Result<Option<WireRecord>> {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        if self.hanging_records.contains(id) {
            std::future::pending::<()>().await;
        }
        Ok(self.records.get(id).cloned())
    }

    async fn search(
        &self,
        query: &str,
        _page_size: usize,
        _mode: SearchMode,
        cursor: Option<&str>,
    ) -> Result<SearchPage> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let account = account_from_query(query).unwrap_or_default();
        let index: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let pages = self.search_pages.get(account).cloned().unwrap_or_default();

        if let Some(limit) = self.fail_after.get(account) {
            let served: usize = pages.iter().take(index).map(Vec::len).sum();
            if served >= *limit {
                return Err(SluiceError::Remote(format!("search failed for {}", account)));
            }
        }

        let items = pages.get(index).cloned().unwrap_or_default();
        let next_cursor = if index + 1 < pages.len() {
            Some((index + 1).to_string())
        } else {
            None
        };
        Ok(SearchPage { items, next_cursor })
    }

    fn timeline<'a>(&'a self, handle: &'a str, max_count: usize) -> BoxStream<'a, Result<WireRecord>> {
        self.timeline_calls.fetch_add(1, Ordering::SeqCst);
        let records = self.timelines.get(handle).cloned().unwrap_or_default();
        let fail_after = self.fail_after.get(handle).copied();

        let mut items: Vec<Result<WireRecord>> = Vec::new();
        for (i, record) in records.into_iter().enumerate() {
            if fail_after == Some(i) {
                break;
            }
            items.push(Ok(record));
        }
        if let Some(n) = fail_after {
            if items.len() == n {
                items.push(Err(SluiceError::Remote(format!("timeline failed for {}", handle))));
            }
        }

        let limit = if self.ignores_max_count { usize::MAX } else { max_count };
        stream::iter(items)
            .take(limit)
            .inspect(move |_| {
                self.timeline_records_pulled.fetch_add(1, Ordering::SeqCst);
            })
            .boxed()
    }
}
