use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use thiserror::Error;

pub mod cache;
pub mod config_file;
pub mod engine;
pub mod model;
pub mod query;
pub mod rate_limit;
pub mod remote;
pub mod store;
pub mod sweeper;

// Re-export for convenience
pub use cache::{CacheStats, MovieCache};
pub use engine::{DEFAULT_REMOTE_TIMEOUT, LookupEngine};
pub use model::{DEFAULT_TTL, InternalId, MovieRecord, MovieView, Rating, SearchResult};
pub use query::{MovieFilter, SearchQuery, SortDirection, SortField, SortSpec};
pub use remote::{GenreTable, RemoteCatalog, RemoteError, TmdbCatalog};
pub use store::{MemoryStore, RecordStore, SqliteStore, StoreError};
pub use sweeper::{DEFAULT_SWEEP_INTERVAL, spawn_sweeper};

/// Which identifier a lookup used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovieRef {
    External(i64),
    Internal(InternalId),
}

impl fmt::Display for MovieRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovieRef::External(id) => write!(f, "movie with TMDB id {id}"),
            MovieRef::Internal(id) => write!(f, "movie with id {id}"),
        }
    }
}

/// Errors surfaced by the lookup operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(MovieRef),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("remote catalog unavailable: {0}")]
    RemoteUnavailable(RemoteError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub const DEFAULT_TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/w500";
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// Runtime configuration shared by the binaries.
#[derive(Clone)]
pub struct Config {
    pub tmdb_api_key: Option<String>,
    pub tmdb_base_url: String,
    /// Prefix for poster and backdrop paths.
    pub image_base_url: String,
    /// Bound on each remote call.
    pub remote_timeout: Duration,
    pub requests_per_second: u32,
    /// SQLite file for the record store. `None` keeps records in memory.
    pub cache_path: Option<PathBuf>,
    pub cache_ttl: TimeDelta,
    pub sweep_interval: Duration,
    pub bind: String,
    pub cors_origin: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("tmdb_api_key", &self.tmdb_api_key.as_ref().map(|_| "***"))
            .field("tmdb_base_url", &self.tmdb_base_url)
            .field("image_base_url", &self.image_base_url)
            .field("remote_timeout", &self.remote_timeout)
            .field("requests_per_second", &self.requests_per_second)
            .field("cache_path", &self.cache_path)
            .field("cache_ttl", &self.cache_ttl)
            .field("sweep_interval", &self.sweep_interval)
            .field("bind", &self.bind)
            .field("cors_origin", &self.cors_origin)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            tmdb_base_url: DEFAULT_TMDB_BASE_URL.to_string(),
            image_base_url: DEFAULT_IMAGE_BASE_URL.to_string(),
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            requests_per_second: 20,
            cache_path: None,
            cache_ttl: DEFAULT_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            bind: DEFAULT_BIND.to_string(),
            cors_origin: DEFAULT_CORS_ORIGIN.to_string(),
        }
    }
}

impl Config {
    /// Defaults, then the config files, then the process environment.
    pub fn load() -> Self {
        let mut config = Self::default();
        config_file::load_config().apply(&mut config);
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Override fields from `TMDB_API_KEY`, `TMDB_BASE_URL`,
    /// `MOVIEFLIX_CACHE_PATH` and `MOVIEFLIX_BIND` as returned by `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = var("TMDB_API_KEY") {
            self.tmdb_api_key = Some(key);
        }
        if let Some(url) = var("TMDB_BASE_URL") {
            self.tmdb_base_url = url;
        }
        if let Some(path) = var("MOVIEFLIX_CACHE_PATH") {
            self.cache_path = Some(PathBuf::from(path));
        }
        if let Some(bind) = var("MOVIEFLIX_BIND") {
            self.bind = bind;
        }
    }
}

/// Build a [`RecordStore`] from configuration.
///
/// If `cache_path` is set, opens a persistent SQLite-backed store.
/// Otherwise, or if the file cannot be opened, returns an in-memory store.
pub fn build_record_store(cache_path: Option<&Path>) -> Arc<dyn RecordStore> {
    if let Some(path) = cache_path {
        match SqliteStore::open(path) {
            Ok(store) => {
                tracing::info!(path = %path.display(), "opened persistent movie store");
                return Arc::new(store);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to open movie store, falling back to in-memory");
            }
        }
    }
    Arc::new(MemoryStore::new())
}

/// Wire store, cache and TMDB client into a [`LookupEngine`].
pub async fn build_engine(config: &Config) -> Result<LookupEngine, CoreError> {
    if config.tmdb_api_key.is_none() {
        tracing::warn!("TMDB_API_KEY is not set; remote lookups will fail");
    }
    let store = build_record_store(config.cache_path.as_deref());
    let cache = Arc::new(MovieCache::with_ttl(store, config.cache_ttl));
    let remote = TmdbCatalog::connect(config)
        .await
        .map_err(CoreError::RemoteUnavailable)?;
    Ok(LookupEngine::new(cache, Arc::new(remote)).with_remote_timeout(config.remote_timeout))
}

#[cfg(test)]
mod config_tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn debug_hides_api_key() {
        let config = Config {
            tmdb_api_key: Some("abc123".into()),
            ..Config::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("abc123"));
        assert!(dbg.contains("***"));
    }

    #[test]
    fn env_overrides_and_ignores_blank_values() {
        let env: HashMap<&str, &str> = [
            ("TMDB_API_KEY", "from-env"),
            ("MOVIEFLIX_CACHE_PATH", "/var/lib/movieflix/movies.db"),
            ("MOVIEFLIX_BIND", "  "),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.tmdb_api_key.as_deref(), Some("from-env"));
        assert_eq!(
            config.cache_path.as_deref(),
            Some(Path::new("/var/lib/movieflix/movies.db"))
        );
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.tmdb_base_url, DEFAULT_TMDB_BASE_URL);
    }

    #[test]
    fn not_found_message_names_the_id() {
        let err = CoreError::NotFound(MovieRef::External(603));
        assert_eq!(err.to_string(), "movie with TMDB id 603 not found");
    }
}

#[cfg(test)]
mod build_store_tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn temp_path() -> PathBuf {
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir()
            .join(format!(
                "movieflix_build_store_test_{}_{}",
                std::process::id(),
                id,
            ))
            .join("movies.db")
    }

    #[test]
    fn none_path_returns_in_memory() {
        let store = build_record_store(None);
        assert_eq!(store.name(), "memory");
    }

    #[test]
    fn valid_path_creates_parent_and_persists() {
        let path = temp_path();
        if let Some(parent) = path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }

        let store = build_record_store(Some(&path));
        assert_eq!(store.name(), "sqlite");
        store.upsert(&MovieRecord::new(1, "Persisted")).unwrap();
        drop(store);

        let reopened = build_record_store(Some(&path));
        assert_eq!(reopened.count().unwrap(), 1);
    }

    #[test]
    fn unusable_path_falls_back_to_memory() {
        // A directory cannot be opened as a database file.
        let dir = temp_path().parent().map(Path::to_path_buf).unwrap();
        std::fs::create_dir_all(&dir).unwrap();
        let store = build_record_store(Some(&dir));
        assert_eq!(store.name(), "memory");
    }
}
