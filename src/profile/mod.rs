use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::{CacheStore, CacheStoreExt};
use crate::domain::Profile;
use crate::remote::PlatformClient;

const PROFILE_SUBKEY: &str = "profile";

/// Cache-first profile lookup. Only profiles that were actually found are
/// cached; a missing handle or a failed call is asked again next time.
pub struct ProfileResolver {
    client: Arc<dyn PlatformClient>,
    cache: Arc<dyn CacheStore>,
    source: String,
    ttl: Duration,
}

impl ProfileResolver {
    pub fn new(
        client: Arc<dyn PlatformClient>,
        cache: Arc<dyn CacheStore>,
        source: &str,
        ttl: Duration,
    ) -> Self {
        Self {
            client,
            cache,
            source: source.to_string(),
            ttl,
        }
    }

    pub async fn resolve(&self, handle: &str) -> Option<Profile> {
        let key = format!("{}:{}", self.source, handle);
        if let Some(profile) = self.cache.get_as::<Profile>(&key, PROFILE_SUBKEY) {
            return Some(profile);
        }

        match self.client.get_profile(handle).await {
            Ok(Some(profile)) => {
                self.cache
                    .set_as(&key, PROFILE_SUBKEY, &profile, Some(self.ttl));
                Some(profile)
            }
            Ok(None) => {
                debug!(handle, "profile not found");
                None
            }
            Err(e) => {
                warn!(handle, error = %e, "profile lookup failed");
                None
            }
        }
    }

    pub async fn avatar(&self, handle: &str) -> Option<String> {
        self.resolve(handle)
            .await
            .and_then(|p| p.avatar_url().map(str::to_string))
    }
}
