//! Config file parsing for `~/.config/book-listing/config.toml`.
//!
//! Every field has a default, so a missing or partial file is fine. Use
//! `http_options_from_config` to build the fetcher options from a loaded config.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::fetch::HttpOptions;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/books/v1/volumes";
pub const DEFAULT_MAX_RESULTS: u32 = 20;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_max_results() -> u32 {
    DEFAULT_MAX_RESULTS
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpConfig {
    pub connect_timeout_ms: Option<u64>,
    pub read_timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
}

/// Load config from the default path. Falls back to defaults when the file
/// is missing or unreadable.
pub fn load_config() -> AppConfig {
    let Some(path) = config_path() else {
        return AppConfig::default();
    };
    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(_) => return AppConfig::default(),
    };
    match parse_config(&content) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config file");
            AppConfig::default()
        }
    }
}

pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    Ok(toml::from_str::<AppConfig>(content)?)
}

/// Return the default config file path (for init and show).
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut p| {
        p.push("book-listing");
        p.push("config.toml");
        p
    })
}

/// Write `cfg` to `path`, creating parent directories.
pub fn save_config(cfg: &AppConfig, path: &std::path::Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

/// Build fetcher options from config. Uses defaults for any unset values.
pub fn http_options_from_config(c: &HttpConfig) -> HttpOptions {
    let mut opts = HttpOptions::default();
    if let Some(ms) = c.connect_timeout_ms {
        opts.connect_timeout_ms = ms;
    }
    if let Some(ms) = c.read_timeout_ms {
        opts.read_timeout_ms = ms;
    }
    if let Some(ua) = &c.user_agent {
        opts.user_agent = ua.clone();
    }
    opts
}

/// Set a dot-separated key such as `api.base_url` or `http.read_timeout_ms`.
pub fn set_config_key(cfg: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    };
    let parts: Vec<&str> = key.splitn(2, '.').collect();
    match parts.as_slice() {
        ["api", sub] => match *sub {
            "base_url" => {
                reqwest::Url::parse(value).map_err(|_| invalid())?;
                cfg.api.base_url = value.to_string();
            }
            "max_results" => {
                let n: u32 = value.parse().map_err(|_| invalid())?;
                if n == 0 {
                    return Err(invalid());
                }
                cfg.api.max_results = n;
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        },
        ["http", sub] => match *sub {
            "connect_timeout_ms" => cfg.http.connect_timeout_ms = Some(value.parse().map_err(|_| invalid())?),
            "read_timeout_ms" => cfg.http.read_timeout_ms = Some(value.parse().map_err(|_| invalid())?),
            "user_agent" => cfg.http.user_agent = Some(value.to_string()),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        },
        _ => return Err(ConfigError::UnknownKey(key.to_string())),
    }
    Ok(())
}
