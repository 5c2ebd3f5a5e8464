use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::app::{Result, SluiceError};
use crate::config::RemoteConfig;
use crate::domain::{Cookie, Profile, WireRecord};
use crate::remote::{PlatformClient, SearchMode, SearchPage};

/// [`PlatformClient`] backed by a JSON bridge service that fronts the
/// platform's private API.
pub struct HttpPlatformClient {
    client: Client,
    base: Url,
}

#[derive(Deserialize)]
struct AuthStatus {
    authenticated: bool,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
}

impl HttpPlatformClient {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)?;
        if base.cannot_be_a_base() {
            return Err(SluiceError::Config(format!(
                "remote base_url {} cannot be used as a base",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { client, base })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        let response = self.client.get(url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        response.error_for_status_ref()?;

        let body = response.bytes().await?;
        Ok(Some(serde_json::from_slice(&body)?))
    }

    async fn send_json<B: Serialize>(&self, method: reqwest::Method, url: Url, body: &B) -> Result<()> {
        let response = self
            .client
            .request(method, url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SluiceError::Remote(format!(
                "bridge returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn timeline_page(
        &self,
        handle: &str,
        count: usize,
        cursor: Option<&str>,
    ) -> Result<SearchPage> {
        let mut url = self.endpoint(&["timeline", handle]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("count", &count.to_string());
            if let Some(cursor) = cursor {
                query.append_pair("cursor", cursor);
            }
        }
        Ok(self.get_json(url).await?.unwrap_or_default())
    }
}

struct TimelineState {
    cursor: Option<String>,
    buffer: VecDeque<WireRecord>,
    yielded: usize,
    exhausted: bool,
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    async fn is_authenticated(&self) -> Result<bool> {
        let status: Option<AuthStatus> = self.get_json(self.endpoint(&["auth", "status"])).await?;
        Ok(status.is_some_and(|s| s.authenticated))
    }

    async fn login(&self, username: &str, password: &str, email: Option<&str>) -> Result<()> {
        let request = LoginRequest {
            username,
            password,
            email,
        };
        self.send_json(reqwest::Method::POST, self.endpoint(&["auth", "login"]), &request)
            .await
    }

    async fn get_cookies(&self) -> Result<Option<Vec<Cookie>>> {
        self.get_json(self.endpoint(&["auth", "cookies"])).await
    }

    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<()> {
        self.send_json(reqwest::Method::PUT, self.endpoint(&["auth", "cookies"]), &cookies)
            .await
    }

    async fn get_profile(&self, handle: &str) -> Result<Option<Profile>> {
        self.get_json(self.endpoint(&["profiles", handle])).await
    }

    async fn get_record_by_id(&self, id: &str) -> Result<Option<WireRecord>> {
        self.get_json(self.endpoint(&["records", id])).await
    }

    async fn search(
        &self,
        query: &str,
        page_size: usize,
        mode: SearchMode,
        cursor: Option<&str>,
    ) -> Result<SearchPage> {
        let mut url = self.endpoint(&["search"]);
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("q", query)
                .append_pair("count", &page_size.to_string())
                .append_pair("mode", &mode.to_string());
            if let Some(cursor) = cursor {
                pairs.append_pair("cursor", cursor);
            }
        }
        Ok(self.get_json(url).await?.unwrap_or_default())
    }

    fn timeline<'a>(&'a self, handle: &'a str, max_count: usize) -> BoxStream<'a, Result<WireRecord>> {
        let initial = TimelineState {
            cursor: None,
            buffer: VecDeque::new(),
            yielded: 0,
            exhausted: false,
        };

        stream::unfold(initial, move |mut state| async move {
            loop {
                if state.yielded >= max_count {
                    return None;
                }
                if let Some(record) = state.buffer.pop_front() {
                    state.yielded += 1;
                    return Some((Ok(record), state));
                }
                if state.exhausted {
                    return None;
                }

                let remaining = max_count - state.yielded;
                match self
                    .timeline_page(handle, remaining, state.cursor.as_deref())
                    .await
                {
                    Ok(page) => {
                        state.exhausted = page.items.is_empty() || page.next_cursor.is_none();
                        state.cursor = page.next_cursor;
                        state.buffer.extend(page.items);
                    }
                    Err(e) => {
                        state.exhausted = true;
                        return Some((Err(e), state));
                    }
                }
            }
        })
        .boxed()
    }
}
