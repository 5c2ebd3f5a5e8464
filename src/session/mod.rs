//! Session management for the social platform.
//!
//! A session is established by the first method that works, in order:
//! configured cookies, cookies cached from an earlier session, direct login.
//! Every method is checked with `is_authenticated` and the whole sequence is
//! retried under a [`RetryPolicy`].

pub mod retry;

pub use retry::{RetryExhausted, RetryPolicy};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::app::{Result, SluiceError};
use crate::cache::{CacheStore, CacheStoreExt};
use crate::config::TwitterConfig;
use crate::domain::{Cookie, Session};
use crate::remote::PlatformClient;

const CREDENTIALS_SUBKEY: &str = "credentials";

/// Login material for one identity.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    /// Cookie JSON array as configured
    pub cookies: Option<String>,
}

impl Credentials {
    pub fn from_config(config: &TwitterConfig) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
            email: config.email.clone(),
            cookies: config.cookies.clone(),
        }
    }

    /// Name the session is cached under.
    pub fn identity(&self) -> String {
        self.username.clone().unwrap_or_else(|| "default".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    ConfiguredCookies,
    CachedCookies,
    Login,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::ConfiguredCookies => write!(f, "configured cookies"),
            AuthMethod::CachedCookies => write!(f, "cached cookies"),
            AuthMethod::Login => write!(f, "login"),
        }
    }
}

pub struct SessionManager {
    client: Arc<dyn PlatformClient>,
    cache: Arc<dyn CacheStore>,
    source: String,
    credentials: Credentials,
    policy: RetryPolicy,
    credential_ttl: Duration,
    session: Mutex<Session>,
}

impl SessionManager {
    pub fn new(
        client: Arc<dyn PlatformClient>,
        cache: Arc<dyn CacheStore>,
        source: &str,
        credentials: Credentials,
    ) -> Self {
        let session = Session::new(&credentials.identity());
        Self {
            client,
            cache,
            source: source.to_string(),
            credentials,
            policy: RetryPolicy::default(),
            credential_ttl: Duration::from_secs(86_400),
            session: Mutex::new(session),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_credential_ttl(mut self, ttl: Duration) -> Self {
        self.credential_ttl = ttl;
        self
    }

    fn cache_key(&self) -> String {
        format!("{}:{}", self.source, self.credentials.identity())
    }

    /// Make sure the remote session is usable. Returns the method that
    /// established it, or `None` when the remote session was already valid.
    pub async fn ensure_authenticated(&self) -> Result<Option<AuthMethod>> {
        let mut session = self.session.lock().await;

        match self.client.is_authenticated().await {
            Ok(true) => {
                session.authenticated = true;
                return Ok(None);
            }
            Ok(false) if session.authenticated => {
                debug!(identity = %session.identity, "session no longer valid")
            }
            Ok(false) => {}
            Err(e) => warn!(identity = %session.identity, error = %e, "session check failed"),
        }
        session.authenticated = false;

        match self.policy.run(|attempt| self.attempt_login(attempt)).await {
            Ok((method, cookies)) => {
                info!(identity = %session.identity, method = %method, "authenticated");
                session.cookies = cookies;
                session.authenticated = true;
                Ok(Some(method))
            }
            Err(RetryExhausted {
                attempts,
                last_error,
            }) => Err(SluiceError::Auth {
                identity: session.identity.clone(),
                attempts,
                reason: last_error.to_string(),
            }),
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.lock().await.authenticated
    }

    async fn attempt_login(&self, attempt: u32) -> Result<(AuthMethod, Vec<Cookie>)> {
        debug!(attempt, identity = %self.credentials.identity(), "authenticating");

        if let Some(raw) = self.credentials.cookies.as_deref() {
            match Cookie::parse_list(raw) {
                Ok(cookies) => {
                    if self.try_cookies(AuthMethod::ConfiguredCookies, &cookies).await {
                        let cookies = self.persist_cookies(cookies).await;
                        return Ok((AuthMethod::ConfiguredCookies, cookies));
                    }
                }
                Err(e) => warn!(error = %e, "ignoring configured cookies"),
            }
        }

        let key = self.cache_key();
        if let Some(value) = self.cache.get(&key, CREDENTIALS_SUBKEY) {
            match Cookie::from_value(value) {
                Ok(cookies) => {
                    if self.try_cookies(AuthMethod::CachedCookies, &cookies).await {
                        let cookies = self.persist_cookies(cookies).await;
                        return Ok((AuthMethod::CachedCookies, cookies));
                    }
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "dropping malformed cached cookies");
                    self.cache.del(&key, CREDENTIALS_SUBKEY);
                }
            }
        }

        if let (Some(username), Some(password)) = (
            self.credentials.username.as_deref(),
            self.credentials.password.as_deref(),
        ) {
            self.client
                .login(username, password, self.credentials.email.as_deref())
                .await?;
            if self.client.is_authenticated().await? {
                let cookies = self.persist_cookies(Vec::new()).await;
                return Ok((AuthMethod::Login, cookies));
            }
            return Err(SluiceError::Remote(
                "login completed but session is not authenticated".into(),
            ));
        }

        Err(SluiceError::Remote("no authentication method succeeded".into()))
    }

    /// A remote error counts as a miss so the next method still runs.
    async fn try_cookies(&self, method: AuthMethod, cookies: &[Cookie]) -> bool {
        let result = match self.client.set_cookies(cookies).await {
            Ok(()) => self.client.is_authenticated().await,
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| {
            warn!(method = %method, error = %e, "cookie authentication failed");
            false
        })
    }

    /// Cache the live cookies, falling back to `used` when the client has
    /// none to report.
    async fn persist_cookies(&self, used: Vec<Cookie>) -> Vec<Cookie> {
        let cookies = match self.client.get_cookies().await {
            Ok(Some(live)) if !live.is_empty() => live,
            Ok(_) => used,
            Err(e) => {
                warn!(error = %e, "could not read session cookies");
                used
            }
        };
        if !cookies.is_empty() {
            self.cache.set_as(
                &self.cache_key(),
                CREDENTIALS_SUBKEY,
                &cookies,
                Some(self.credential_ttl),
            );
        }
        cookies
    }
}
