//! Server configuration.

use std::time::Duration;

use ratediff_fx::{FeedConfig, RedisStoreConfig};

/// Which rate store backs the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Redis,
    Memory,
}

impl CacheBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "redis" => Some(CacheBackend::Redis),
            "memory" => Some(CacheBackend::Memory),
            _ => None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Main server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// Path to the currency metadata document.
    pub currency_document: String,
    /// Upstream feed configuration.
    pub feed: FeedConfig,
    /// Rate store backend.
    pub cache_backend: CacheBackend,
    /// Redis store configuration.
    pub redis: RedisStoreConfig,
    /// Origins allowed by CORS. Empty allows any origin.
    pub cors_allowed_origins: Vec<String>,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 8080,
            currency_document: "data/currencies.xml".to_string(),
            feed: FeedConfig::default(),
            cache_backend: CacheBackend::Redis,
            redis: RedisStoreConfig::default(),
            cors_allowed_origins: Vec::new(),
            log_format: LogFormat::Text,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut config = Self::default();

        if let Some(addr) = lookup("LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Some(port) = lookup("LISTEN_PORT") {
            config.listen_port = port
                .parse()
                .map_err(|_| format!("LISTEN_PORT is not a port: {}", port))?;
        }

        if let Some(path) = lookup("CURRENCY_DOCUMENT") {
            config.currency_document = path;
        }

        if let Some(url) = lookup("FEED_BASE_URL") {
            config.feed.base_url = url;
        }

        if let Some(ms) = lookup("FEED_TIMEOUT_MS") {
            config.feed.request_timeout = parse_millis("FEED_TIMEOUT_MS", &ms)?;
        }

        if let Some(backend) = lookup("CACHE_BACKEND") {
            config.cache_backend = CacheBackend::parse(&backend)
                .ok_or_else(|| format!("CACHE_BACKEND must be redis or memory: {}", backend))?;
        }

        if let Some(url) = lookup("REDIS_URL") {
            config.redis.url = url;
        }

        if let Some(prefix) = lookup("CACHE_KEY_PREFIX") {
            config.redis.key_prefix = prefix;
        }

        if let Some(ms) = lookup("CACHE_TIMEOUT_MS") {
            config.redis.timeout = parse_millis("CACHE_TIMEOUT_MS", &ms)?;
        }

        if let Some(origins) = lookup("CORS_ALLOWED_ORIGINS") {
            config.cors_allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(format) = lookup("LOG_FORMAT") {
            config.log_format = match format.trim().to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Text,
            };
        }

        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_port == 0 {
            return Err("Listen port cannot be 0".to_string());
        }

        if self.currency_document.is_empty() {
            return Err("Currency document path cannot be empty".to_string());
        }

        if self.feed.base_url.is_empty() {
            return Err("Feed base URL cannot be empty".to_string());
        }

        if self.feed.request_timeout.is_zero() {
            return Err("Feed timeout cannot be zero".to_string());
        }

        if self.cache_backend == CacheBackend::Redis {
            if self.redis.url.is_empty() {
                return Err("Redis URL cannot be empty".to_string());
            }

            if self.redis.timeout.is_zero() {
                return Err("Cache timeout cannot be zero".to_string());
            }
        }

        Ok(())
    }

    /// Socket address string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }
}

fn parse_millis(name: &str, value: &str) -> Result<Duration, String> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| format!("{} must be a number of milliseconds: {}", name, value))
}
