use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::RipError;

pub const DEFAULT_CONFIG_FILE: &str = "accu-rip.json";
pub const DEFAULT_CATALOG_URL: &str = "https://www.accuradio.com/indie-rock/";
pub const DEFAULT_PLAYLIST_URL: &str = "https://www.accuradio.com/playlist/json/";
pub const DEFAULT_SQLITE_PATH: &str = "tracks.sqlite";
pub const DEFAULT_DOWNLOADS_ROOT: &str = "downloads";
pub const DEFAULT_WORKERS: usize = 16;
pub const DEFAULT_STALL_LIMIT: usize = 100;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub catalog_url: Option<String>,
    #[serde(default)]
    pub playlist_url: Option<String>,
    #[serde(default)]
    pub downloads_root: Option<String>,
    #[serde(default)]
    pub store: Option<StoreEntry>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub stall_limit: Option<usize>,
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
    #[serde(default)]
    pub media_timeout_secs: Option<u64>,
    #[serde(default)]
    pub fetch_retry_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreEntry {
    Sqlite { path: String },
    Redis { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Sqlite { path: Utf8PathBuf },
    Redis { url: String },
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub catalog_url: String,
    pub playlist_url: String,
    pub downloads_root: Utf8PathBuf,
    pub store: StoreConfig,
    pub workers: usize,
    pub stall_limit: usize,
    pub http_timeout: Duration,
    pub media_timeout: Option<Duration>,
    pub fetch_retry_delay: Duration,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or the default config file when it exists. Without either,
    /// every setting takes its default.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, RipError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| RipError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| RipError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, RipError> {
        let schema_version = config.schema_version.unwrap_or(SCHEMA_VERSION);
        if schema_version != SCHEMA_VERSION {
            return Err(RipError::InvalidConfig(format!(
                "unsupported schema_version {schema_version}, expected {SCHEMA_VERSION}"
            )));
        }

        let workers = config.workers.unwrap_or(DEFAULT_WORKERS);
        if workers == 0 {
            return Err(RipError::InvalidConfig(
                "workers must be at least 1".to_string(),
            ));
        }
        let stall_limit = config.stall_limit.unwrap_or(DEFAULT_STALL_LIMIT);
        if stall_limit == 0 {
            return Err(RipError::InvalidConfig(
                "stall_limit must be at least 1".to_string(),
            ));
        }

        let store = match config.store {
            None => StoreConfig::Sqlite {
                path: Utf8PathBuf::from(DEFAULT_SQLITE_PATH),
            },
            Some(StoreEntry::Sqlite { path }) => StoreConfig::Sqlite {
                path: Utf8PathBuf::from(path),
            },
            Some(StoreEntry::Redis { url }) => {
                if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                    return Err(RipError::InvalidConfig(format!("not a redis url: {url}")));
                }
                StoreConfig::Redis { url }
            }
        };

        Ok(ResolvedConfig {
            schema_version,
            catalog_url: config
                .catalog_url
                .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string()),
            playlist_url: normalize_base_url(
                config
                    .playlist_url
                    .unwrap_or_else(|| DEFAULT_PLAYLIST_URL.to_string()),
            ),
            downloads_root: Utf8PathBuf::from(
                config
                    .downloads_root
                    .unwrap_or_else(|| DEFAULT_DOWNLOADS_ROOT.to_string()),
            ),
            store,
            workers,
            stall_limit,
            http_timeout: Duration::from_secs(
                config.http_timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            ),
            media_timeout: config.media_timeout_secs.map(Duration::from_secs),
            fetch_retry_delay: Duration::from_millis(config.fetch_retry_delay_ms.unwrap_or(0)),
        })
    }
}

/// Playlist urls are joined with a channel id, so they must end in a slash.
fn normalize_base_url(url: String) -> String {
    if url.ends_with('/') {
        url
    } else {
        format!("{url}/")
    }
}
