// Process configuration: flags with environment fallbacks

use crate::cache::CacheConfig;
use crate::client::ClientConfig;
use crate::feed::FeedSettings;
use clap::Parser;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid locations file: {0}")]
    Locations(String),

    #[error("Invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "weather-feed",
    about = "Serves per-location weather forecasts as Atom feeds",
    version
)]
pub struct Cli {
    /// Print the resolved configuration and exit
    #[arg(long)]
    pub env: bool,

    /// Path to the feeds.yml location list
    #[arg(long = "feeds", env = "FEEDS_PATH", default_value = "feeds.yml")]
    pub feeds_path: PathBuf,

    /// Public URL the feeds are served under, used for self links
    #[arg(long, env = "SERVER_URL", default_value = "http://localhost:8090")]
    pub server_url: String,

    /// Listen address
    #[arg(long, env = "ADDR", default_value = "0.0.0.0:8090")]
    pub addr: String,

    #[arg(
        long,
        env = "YANDEX_WEATHER_API_KEY",
        default_value = "change_me",
        hide_env_values = true
    )]
    pub yandex_weather_api_key: String,

    #[arg(
        long,
        env = "YANDEX_WEATHER_BASE_URL",
        default_value = "https://api.weather.yandex.ru"
    )]
    pub yandex_weather_base_url: String,

    /// How long a rendered feed is served from memory
    #[arg(long, env = "CACHE_TTL_SECS", default_value_t = 86_400)]
    pub cache_ttl_secs: u64,

    /// Cache size bound in megabytes, 0 for unbounded
    #[arg(long, env = "CACHE_MAX_SIZE_MB", default_value_t = 0)]
    pub cache_max_size_mb: usize,

    /// Upper bound on a single provider request
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = 10_000)]
    pub request_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "JSON_LOGS")]
    pub json_logs: bool,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub addr: SocketAddr,
    pub feeds_path: PathBuf,
    pub client: ClientConfig,
    pub feed: FeedSettings,
    pub cache: CacheConfig,
}

fn http_url(name: &'static str, raw: &str) -> Result<String, ConfigError> {
    let parsed = Url::parse(raw).map_err(|e| ConfigError::Invalid {
        name,
        reason: format!("{}: {}", raw, e),
    })?;

    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(raw.to_string()),
        _ => Err(ConfigError::Invalid {
            name,
            reason: format!("{} is not an http(s) url", raw),
        }),
    }
}

impl Cli {
    pub fn into_settings(self) -> Result<Settings, ConfigError> {
        let addr = self.addr.parse().map_err(|e| ConfigError::Invalid {
            name: "ADDR",
            reason: format!("{}: {}", self.addr, e),
        })?;
        let server_url = http_url("SERVER_URL", &self.server_url)?;
        let base_url = http_url("YANDEX_WEATHER_BASE_URL", &self.yandex_weather_base_url)?;

        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "CACHE_TTL_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                name: "REQUEST_TIMEOUT_MS",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Settings {
            addr,
            feeds_path: self.feeds_path,
            client: ClientConfig {
                base_url,
                api_key: self.yandex_weather_api_key,
                timeout_ms: self.request_timeout_ms,
            },
            feed: FeedSettings {
                server_url,
                ..FeedSettings::default()
            },
            cache: CacheConfig {
                ttl: Duration::from_secs(self.cache_ttl_secs),
                max_size_mb: self.cache_max_size_mb,
                ..CacheConfig::default()
            },
        })
    }
}

fn mask(api_key: &str) -> &'static str {
    if api_key.is_empty() {
        "<empty>"
    } else {
        "********"
    }
}

// Used by --env; never prints the API key
impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ADDR={}", self.addr)?;
        writeln!(f, "SERVER_URL={}", self.feed.server_url)?;
        writeln!(f, "FEEDS_PATH={}", self.feeds_path.display())?;
        writeln!(f, "YANDEX_WEATHER_BASE_URL={}", self.client.base_url)?;
        writeln!(f, "YANDEX_WEATHER_API_KEY={}", mask(&self.client.api_key))?;
        writeln!(f, "REQUEST_TIMEOUT_MS={}", self.client.timeout_ms)?;
        writeln!(f, "CACHE_TTL_SECS={}", self.cache.ttl.as_secs())?;
        write!(f, "CACHE_MAX_SIZE_MB={}", self.cache.max_size_mb)
    }
}

// Raw values as given, for --env when they fail validation
impl fmt::Display for Cli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ADDR={}", self.addr)?;
        writeln!(f, "SERVER_URL={}", self.server_url)?;
        writeln!(f, "FEEDS_PATH={}", self.feeds_path.display())?;
        writeln!(f, "YANDEX_WEATHER_BASE_URL={}", self.yandex_weather_base_url)?;
        writeln!(f, "YANDEX_WEATHER_API_KEY={}", mask(&self.yandex_weather_api_key))?;
        writeln!(f, "REQUEST_TIMEOUT_MS={}", self.request_timeout_ms)?;
        writeln!(f, "CACHE_TTL_SECS={}", self.cache_ttl_secs)?;
        write!(f, "CACHE_MAX_SIZE_MB={}", self.cache_max_size_mb)
    }
}
