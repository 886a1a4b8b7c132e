use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::Config;

/// Longest accepted `ttl_hours`: one hundred years.
pub const MAX_TTL_HOURS: i64 = 24 * 365 * 100;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub tmdb: Option<TmdbSection>,
    pub cache: Option<CacheSection>,
    pub server: Option<ServerSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TmdbSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub image_base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub requests_per_second: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSection {
    /// SQLite file. Absent means the in-memory store.
    pub path: Option<String>,
    pub ttl_hours: Option<i64>,
    pub sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    pub bind: Option<String>,
    pub cors_origin: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to write config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Platform config directory path: `<config_dir>/movieflix/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("movieflix").join("config.toml"))
}

/// Load config by cascading CWD `.movieflix.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".movieflix.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config file");
            None
        }
    }
}

fn pick<S, T: Clone>(overlay: &Option<S>, base: &Option<S>, field: impl Fn(&S) -> Option<T>) -> Option<T> {
    overlay
        .as_ref()
        .and_then(&field)
        .or_else(|| base.as_ref().and_then(&field))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        tmdb: Some(TmdbSection {
            api_key: pick(&overlay.tmdb, &base.tmdb, |t| t.api_key.clone()),
            base_url: pick(&overlay.tmdb, &base.tmdb, |t| t.base_url.clone()),
            image_base_url: pick(&overlay.tmdb, &base.tmdb, |t| t.image_base_url.clone()),
            timeout_secs: pick(&overlay.tmdb, &base.tmdb, |t| t.timeout_secs),
            requests_per_second: pick(&overlay.tmdb, &base.tmdb, |t| t.requests_per_second),
        }),
        cache: Some(CacheSection {
            path: pick(&overlay.cache, &base.cache, |c| c.path.clone()),
            ttl_hours: pick(&overlay.cache, &base.cache, |c| c.ttl_hours),
            sweep_interval_secs: pick(&overlay.cache, &base.cache, |c| c.sweep_interval_secs),
        }),
        server: Some(ServerSection {
            bind: pick(&overlay.server, &base.server, |s| s.bind.clone()),
            cors_origin: pick(&overlay.server, &base.server, |s| s.cors_origin.clone()),
        }),
    }
}

impl ConfigFile {
    /// Copy every value present in the file onto `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(tmdb) = &self.tmdb {
            if let Some(key) = &tmdb.api_key {
                config.tmdb_api_key = Some(key.clone());
            }
            if let Some(url) = &tmdb.base_url {
                config.tmdb_base_url = url.clone();
            }
            if let Some(url) = &tmdb.image_base_url {
                config.image_base_url = url.clone();
            }
            if let Some(secs) = tmdb.timeout_secs {
                config.remote_timeout = Duration::from_secs(secs.max(1));
            }
            if let Some(rps) = tmdb.requests_per_second {
                config.requests_per_second = rps.max(1);
            }
        }
        if let Some(cache) = &self.cache {
            if let Some(path) = &cache.path {
                config.cache_path = Some(PathBuf::from(path));
            }
            if let Some(hours) = cache.ttl_hours {
                if hours > MAX_TTL_HOURS {
                    tracing::warn!(ttl_hours = hours, max = MAX_TTL_HOURS, "cache ttl too large, clamping");
                }
                config.cache_ttl = TimeDelta::hours(hours.clamp(1, MAX_TTL_HOURS));
            }
            if let Some(secs) = cache.sweep_interval_secs {
                config.sweep_interval = Duration::from_secs(secs.max(1));
            }
        }
        if let Some(server) = &self.server {
            if let Some(bind) = &server.bind {
                config.bind = bind.clone();
            }
            if let Some(origin) = &server.cors_origin {
                config.cors_origin = origin.clone();
            }
        }
    }
}

/// Save the current config to the platform config directory.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf, ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content)?;
    Ok(path)
}
