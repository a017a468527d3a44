//! Persistent rate cache keyed by upstream id and feed date.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{FxError, FxResult};

/// Cache of raw rates: one record per upstream id, mapping feed date to rate.
///
/// Entries never expire; published historical rates do not change.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Get the store name.
    fn name(&self) -> &str;

    /// Fetch the rates cached for `dates`. Dates with no entry are absent from
    /// the returned map.
    async fn get_many(
        &self,
        upstream_id: &str,
        dates: &[String],
    ) -> FxResult<HashMap<String, String>>;

    /// Store `(date, rate)` pairs, overwriting existing entries.
    async fn put_many(&self, upstream_id: &str, rates: &[(String, String)]) -> FxResult<()>;
}

/// Rate store held in process memory.
#[derive(Debug, Default)]
pub struct MemoryRateStore {
    records: DashMap<String, HashMap<String, String>>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of upstream ids with at least one cached rate.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get a single cached rate.
    pub fn get(&self, upstream_id: &str, date: &str) -> Option<String> {
        self.records
            .get(upstream_id)
            .and_then(|record| record.get(date).cloned())
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_many(
        &self,
        upstream_id: &str,
        dates: &[String],
    ) -> FxResult<HashMap<String, String>> {
        let Some(record) = self.records.get(upstream_id) else {
            return Ok(HashMap::new());
        };

        Ok(dates
            .iter()
            .filter_map(|date| record.get(date).map(|rate| (date.clone(), rate.clone())))
            .collect())
    }

    async fn put_many(&self, upstream_id: &str, rates: &[(String, String)]) -> FxResult<()> {
        let mut record = self.records.entry(upstream_id.to_string()).or_default();
        for (date, rate) in rates {
            record.insert(date.clone(), rate.clone());
        }
        Ok(())
    }
}

/// Configuration for the Redis-backed store.
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis connection URL.
    pub url: String,
    /// Prepended to the upstream id to form the hash key.
    pub key_prefix: String,
    /// Upper bound for connecting and for each command.
    pub timeout: Duration,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: String::new(),
            timeout: Duration::from_secs(2),
        }
    }
}

/// Rate store backed by one Redis hash per upstream id.
///
/// The connection is established on first use and then shared; the connection
/// manager multiplexes concurrent commands and reconnects after failures.
pub struct RedisRateStore {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    config: RedisStoreConfig,
}

impl RedisRateStore {
    /// Create a store. No connection is made until the first command.
    pub fn new(config: RedisStoreConfig) -> FxResult<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| FxError::CacheUnavailable(format!("invalid redis url: {}", e)))?;

        Ok(Self {
            client,
            connection: OnceCell::new(),
            config,
        })
    }

    fn key(&self, upstream_id: &str) -> String {
        format!("{}{}", self.config.key_prefix, upstream_id)
    }

    async fn connection(&self) -> FxResult<ConnectionManager> {
        let connection = self
            .connection
            .get_or_try_init(|| async {
                let manager = self
                    .bounded(ConnectionManager::new(self.client.clone()))
                    .await?;
                info!(url = %self.config.url, "Connected to rate cache");
                Ok::<_, FxError>(manager)
            })
            .await?;
        Ok(connection.clone())
    }

    async fn bounded<T>(
        &self,
        operation: impl Future<Output = redis::RedisResult<T>>,
    ) -> FxResult<T> {
        match tokio::time::timeout(self.config.timeout, operation).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(FxError::CacheUnavailable(e.to_string())),
            Err(_) => Err(FxError::CacheUnavailable(format!(
                "timed out after {:?}",
                self.config.timeout
            ))),
        }
    }
}

#[async_trait]
impl RateStore for RedisRateStore {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get_many(
        &self,
        upstream_id: &str,
        dates: &[String],
    ) -> FxResult<HashMap<String, String>> {
        if dates.is_empty() {
            return Ok(HashMap::new());
        }

        let mut connection = self.connection().await?;
        let key = self.key(upstream_id);
        let values: Vec<Option<String>> = self
            .bounded(
                redis::cmd("HMGET")
                    .arg(&key)
                    .arg(dates)
                    .query_async(&mut connection),
            )
            .await?;

        debug!(key = %key, requested = dates.len(), "HMGET");

        Ok(dates
            .iter()
            .zip(values)
            .filter_map(|(date, value)| value.map(|rate| (date.clone(), rate)))
            .collect())
    }

    async fn put_many(&self, upstream_id: &str, rates: &[(String, String)]) -> FxResult<()> {
        if rates.is_empty() {
            return Ok(());
        }

        let mut connection = self.connection().await?;
        let key = self.key(upstream_id);
        self.bounded(connection.hset_multiple::<_, _, _, ()>(&key, rates))
            .await?;

        debug!(key = %key, written = rates.len(), "HSET");
        Ok(())
    }
}
