use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{Result, SluiceError};
use crate::cache::SqliteCache;
use crate::config::Config;
use crate::remote::http::HttpPlatformClient;
use crate::remote::PlatformClient;
use crate::source::TwitterSource;

pub struct AppContext {
    pub config: Config,
    pub cache: Arc<SqliteCache>,
    pub source: TwitterSource,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let db_path = match &config.store.path {
            Some(p) => p.clone(),
            None => Self::default_db_path()?,
        };
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let cache = Arc::new(SqliteCache::new(&db_path)?);
        Self::with_cache(config, cache)
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let cache = Arc::new(SqliteCache::in_memory()?);
        Self::with_cache(config, cache)
    }

    fn with_cache(config: Config, cache: Arc<SqliteCache>) -> Result<Self> {
        let client: Arc<dyn PlatformClient> = Arc::new(HttpPlatformClient::new(&config.remote)?);
        let source = TwitterSource::new(client, cache.clone(), &config.twitter);

        Ok(Self {
            config,
            cache,
            source,
        })
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| SluiceError::Config("Could not find data directory".into()))?;
        Ok(data_dir.join("sluice").join("cache.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ContentSource;

    #[test]
    fn test_in_memory_context() {
        let ctx = AppContext::in_memory(Config::default()).unwrap();
        assert_eq!(ctx.source.name(), "twitter");
        assert_eq!(ctx.cache.purge_expired().unwrap(), 0);
    }

    #[test]
    fn test_store_path_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.store.path = Some(dir.path().join("nested").join("cache.db"));

        AppContext::new(config).unwrap();
        assert!(dir.path().join("nested").join("cache.db").exists());
    }

    #[test]
    fn test_bad_remote_url_is_rejected() {
        let mut config = Config::default();
        config.remote.base_url = "not a url".into();
        assert!(matches!(
            AppContext::in_memory(config),
            Err(SluiceError::InvalidUrl(_))
        ));
    }
}
