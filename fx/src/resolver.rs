//! Rate resolution: directory lookup, cache-aside and feed fallback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ratediff_common::{parse_rate, CurrencyEntry, ExchangeQuery, ExchangeResult, FeedDate};
use tracing::{debug, info, instrument, warn};

use crate::directory::CurrencyDirectory;
use crate::error::{FxError, FxResult};
use crate::feed::FeedClient;
use crate::parser::parse_range;
use crate::store::RateStore;

/// Resolves the rates of one currency on two dates.
pub struct RateResolver {
    directory: Arc<CurrencyDirectory>,
    store: Arc<dyn RateStore>,
    feed: Arc<dyn FeedClient>,
    stats: ResolverStats,
}

/// A rate for one date in both raw and numeric form.
#[derive(Debug, Clone)]
struct ResolvedRate {
    date: FeedDate,
    raw: String,
    value: f64,
}

impl RateResolver {
    /// Create a new resolver.
    pub fn new(
        directory: Arc<CurrencyDirectory>,
        store: Arc<dyn RateStore>,
        feed: Arc<dyn FeedClient>,
    ) -> Self {
        Self {
            directory,
            store,
            feed,
            stats: ResolverStats::default(),
        }
    }

    /// All currencies as `(symbol, display name)` pairs.
    pub fn currency_list(&self) -> Vec<(String, String)> {
        self.directory.list()
    }

    /// Resolve both dates of a query and compute their difference.
    #[instrument(skip(self, query), fields(symbol = %query.symbol, date1 = %query.date1, date2 = %query.date2))]
    pub async fn resolve(&self, query: &ExchangeQuery) -> FxResult<ExchangeResult> {
        self.stats.queries.fetch_add(1, Ordering::Relaxed);

        let entry = self
            .directory
            .lookup(&query.symbol)
            .ok_or_else(|| FxError::UnknownCurrency(query.symbol.to_string()))?;

        let date1 = FeedDate::parse_iso(&query.date1)
            .map_err(|e| FxError::InvalidDateFormat(e.to_string()))?;
        let date2 = FeedDate::parse_iso(&query.date2)
            .map_err(|e| FxError::InvalidDateFormat(e.to_string()))?;

        let (first, second) = match self.cached_pair(entry, date1, date2).await {
            Some(pair) => {
                self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                debug!("Using cached rates");
                pair
            }
            None => {
                self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
                let pair = self.fetch_pair(entry, date1, date2).await?;
                self.persist(entry, &pair).await;
                pair
            }
        };

        Ok(ExchangeResult::new(
            entry.display_name.clone(),
            first.value,
            second.value,
        ))
    }

    /// Both rates from the store, or `None` if either is missing or unusable.
    async fn cached_pair(
        &self,
        entry: &CurrencyEntry,
        date1: FeedDate,
        date2: FeedDate,
    ) -> Option<(ResolvedRate, ResolvedRate)> {
        let mut keys = vec![date1.to_feed_string()];
        if date2 != date1 {
            keys.push(date2.to_feed_string());
        }

        let cached = match self.store.get_many(&entry.upstream_id, &keys).await {
            Ok(cached) => cached,
            Err(e) => {
                self.stats.cache_errors.fetch_add(1, Ordering::Relaxed);
                warn!(store = self.store.name(), code = e.error_code(), error = %e, "Rate cache lookup failed, falling back to feed");
                return None;
            }
        };

        let first = cached_rate(&cached, date1)?;
        let second = cached_rate(&cached, date2)?;
        Some((first, second))
    }

    /// One feed request covering both dates.
    async fn fetch_pair(
        &self,
        entry: &CurrencyEntry,
        date1: FeedDate,
        date2: FeedDate,
    ) -> FxResult<(ResolvedRate, ResolvedRate)> {
        let swapped = date2 < date1;
        let (from, to) = if swapped { (date2, date1) } else { (date1, date2) };

        self.stats.feed_fetches.fetch_add(1, Ordering::Relaxed);
        let range = self
            .feed
            .fetch(&entry.upstream_id, &from, &to)
            .await
            .and_then(|body| parse_range(&body))
            .map_err(|e| {
                self.stats.feed_failures.fetch_add(1, Ordering::Relaxed);
                warn!(feed = self.feed.name(), upstream_id = %entry.upstream_id, code = e.error_code(), error = %e, "Feed fetch failed");
                e
            })?;

        if from != to && range.observations < 2 {
            self.stats.feed_failures.fetch_add(1, Ordering::Relaxed);
            return Err(FxError::MalformedFeedDocument(format!(
                "{} observation(s) for {}..{}",
                range.observations, from, to
            )));
        }

        let earlier = fetched_rate(from, range.first)?;
        let later = fetched_rate(to, range.last)?;

        info!(
            upstream_id = %entry.upstream_id,
            from = %from,
            to = %to,
            first = %earlier.raw,
            last = %later.raw,
            "Fetched rates from feed"
        );

        Ok(if swapped { (later, earlier) } else { (earlier, later) })
    }

    /// Write fetched rates back to the store. Failures are logged only.
    async fn persist(&self, entry: &CurrencyEntry, pair: &(ResolvedRate, ResolvedRate)) {
        let (first, second) = pair;
        let rates = vec![
            (first.date.to_feed_string(), first.raw.clone()),
            (second.date.to_feed_string(), second.raw.clone()),
        ];

        if let Err(e) = self.store.put_many(&entry.upstream_id, &rates).await {
            self.stats.cache_errors.fetch_add(1, Ordering::Relaxed);
            warn!(store = self.store.name(), code = e.error_code(), error = %e, "Failed to write rates to cache");
        }
    }

    /// Get resolver statistics.
    pub fn stats(&self) -> ResolverStatsSnapshot {
        self.stats.snapshot()
    }
}

fn cached_rate(cached: &HashMap<String, String>, date: FeedDate) -> Option<ResolvedRate> {
    let raw = cached.get(&date.to_feed_string())?;
    match parse_rate(raw) {
        Ok(value) => Some(ResolvedRate {
            date,
            raw: raw.clone(),
            value,
        }),
        Err(e) => {
            warn!(date = %date, code = e.error_code(), error = %e, "Ignoring unparsable cached rate");
            None
        }
    }
}

fn fetched_rate(date: FeedDate, raw: String) -> FxResult<ResolvedRate> {
    let value = parse_rate(&raw).map_err(|e| FxError::MalformedFeedDocument(e.to_string()))?;
    Ok(ResolvedRate { date, raw, value })
}

/// Resolver counters.
#[derive(Debug, Default)]
pub struct ResolverStats {
    queries: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_errors: AtomicU64,
    feed_fetches: AtomicU64,
    feed_failures: AtomicU64,
}

impl ResolverStats {
    fn snapshot(&self) -> ResolverStatsSnapshot {
        ResolverStatsSnapshot {
            queries: self.queries.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_errors: self.cache_errors.load(Ordering::Relaxed),
            feed_fetches: self.feed_fetches.load(Ordering::Relaxed),
            feed_failures: self.feed_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the resolver counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolverStatsSnapshot {
    pub queries: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_errors: u64,
    pub feed_fetches: u64,
    pub feed_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::MockFeedClient;
    use crate::store::MemoryRateStore;
    use async_trait::async_trait;

    const USD_ID: &str = "R01235";

    /// Store whose backend is always down.
    struct DownStore;

    #[async_trait]
    impl RateStore for DownStore {
        fn name(&self) -> &str {
            "down"
        }

        async fn get_many(
            &self,
            _upstream_id: &str,
            _dates: &[String],
        ) -> FxResult<HashMap<String, String>> {
            Err(FxError::CacheUnavailable("connection refused".to_string()))
        }

        async fn put_many(&self, _upstream_id: &str, _rates: &[(String, String)]) -> FxResult<()> {
            Err(FxError::CacheUnavailable("connection refused".to_string()))
        }
    }

    fn directory() -> Arc<CurrencyDirectory> {
        Arc::new(CurrencyDirectory::from_entries(vec![
            CurrencyEntry::new("USD", "Доллар США", USD_ID),
            CurrencyEntry::new("EUR", "Евро", "R01239"),
        ]))
    }

    fn setup() -> (RateResolver, Arc<MemoryRateStore>, Arc<MockFeedClient>) {
        let store = Arc::new(MemoryRateStore::new());
        let feed = Arc::new(MockFeedClient::new());
        let resolver = RateResolver::new(directory(), store.clone(), feed.clone());
        (resolver, store, feed)
    }

    async fn seed(store: &MemoryRateStore, rates: &[(&str, &str)]) {
        let rates: Vec<(String, String)> = rates
            .iter()
            .map(|(d, r)| (d.to_string(), r.to_string()))
            .collect();
        store.put_many(USD_ID, &rates).await.unwrap();
    }

    fn usd_query() -> ExchangeQuery {
        ExchangeQuery::new("USD", "2020-07-12", "2020-07-15")
    }

    #[tokio::test]
    async fn test_unknown_currency() {
        let (resolver, _, feed) = setup();

        let result = resolver
            .resolve(&ExchangeQuery::new("BYN", "2020-07-12", "2020-07-15"))
            .await;

        assert!(matches!(result, Err(FxError::UnknownCurrency(ref s)) if s == "BYN"));
        assert_eq!(feed.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_date_format() {
        let (resolver, _, feed) = setup();

        let result = resolver
            .resolve(&ExchangeQuery::new("USD", "12-07-2020", "2020-07-15"))
            .await;

        assert!(matches!(result, Err(FxError::InvalidDateFormat(_))));
        assert_eq!(feed.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_makes_no_feed_call() {
        let (resolver, store, feed) = setup();
        seed(&store, &[("12/07/2020", "90,0"), ("15/07/2020", "91,5")]).await;

        let result = resolver.resolve(&usd_query()).await.unwrap();

        assert_eq!(result.title, "Доллар США");
        assert_eq!(result.first_exchange_rate, 90.0);
        assert_eq!(result.second_exchange_rate, 91.5);
        assert_eq!(result.difference, 1.5);
        assert_eq!(feed.calls(), 0);
        assert_eq!(resolver.stats().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_miss_fetches_once_and_populates_cache() {
        let (resolver, store, feed) = setup();
        feed.set_document(
            USD_ID,
            MockFeedClient::document(
                USD_ID,
                &[("14.07.2020", "71,2298"), ("15.07.2020", "70,9725")],
            ),
        );

        let result = resolver.resolve(&usd_query()).await.unwrap();

        assert_eq!(result.first_exchange_rate, 71.2298);
        assert_eq!(result.second_exchange_rate, 70.9725);
        assert_eq!(result.difference, 70.9725 - 71.2298);
        assert_eq!(feed.calls(), 1);
        assert_eq!(store.get(USD_ID, "12/07/2020").as_deref(), Some("71,2298"));
        assert_eq!(store.get(USD_ID, "15/07/2020").as_deref(), Some("70,9725"));

        let again = resolver.resolve(&usd_query()).await.unwrap();

        assert_eq!(again, result);
        assert_eq!(feed.calls(), 1);
    }

    #[tokio::test]
    async fn test_cached_result_survives_feed_outage() {
        let (resolver, _, feed) = setup();
        feed.set_document(
            USD_ID,
            MockFeedClient::document(
                USD_ID,
                &[("14.07.2020", "71,2298"), ("15.07.2020", "70,9725")],
            ),
        );
        let first = resolver.resolve(&usd_query()).await.unwrap();

        feed.set_unavailable(USD_ID);
        let second = resolver.resolve(&usd_query()).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_partial_hit_refetches_and_overwrites_both() {
        let (resolver, store, feed) = setup();
        seed(&store, &[("12/07/2020", "1,0")]).await;
        feed.set_document(
            USD_ID,
            MockFeedClient::document(
                USD_ID,
                &[("14.07.2020", "71,2298"), ("15.07.2020", "70,9725")],
            ),
        );

        let result = resolver.resolve(&usd_query()).await.unwrap();

        assert_eq!(feed.calls(), 1);
        assert_eq!(result.first_exchange_rate, 71.2298);
        assert_eq!(store.get(USD_ID, "12/07/2020").as_deref(), Some("71,2298"));
    }

    #[tokio::test]
    async fn test_reversed_dates_keep_their_own_rates() {
        let (resolver, store, feed) = setup();
        feed.set_document(
            USD_ID,
            MockFeedClient::document(
                USD_ID,
                &[("14.07.2020", "71,2298"), ("15.07.2020", "70,9725")],
            ),
        );

        let result = resolver
            .resolve(&ExchangeQuery::new("USD", "2020-07-15", "2020-07-12"))
            .await
            .unwrap();

        assert_eq!(result.first_exchange_rate, 70.9725);
        assert_eq!(result.second_exchange_rate, 71.2298);
        assert_eq!(store.get(USD_ID, "15/07/2020").as_deref(), Some("70,9725"));
        assert_eq!(store.get(USD_ID, "12/07/2020").as_deref(), Some("71,2298"));
    }

    #[tokio::test]
    async fn test_same_date_single_observation() {
        let (resolver, _, feed) = setup();
        feed.set_document(
            USD_ID,
            MockFeedClient::document(USD_ID, &[("14.07.2020", "71,2298")]),
        );

        let result = resolver
            .resolve(&ExchangeQuery::new("USD", "2020-07-14", "2020-07-14"))
            .await
            .unwrap();

        assert_eq!(result.first_exchange_rate, 71.2298);
        assert_eq!(result.difference, 0.0);
    }

    #[tokio::test]
    async fn test_single_observation_for_range_is_bad_request() {
        let (resolver, store, feed) = setup();
        feed.set_document(
            USD_ID,
            MockFeedClient::document(USD_ID, &[("14.07.2020", "71,2298")]),
        );

        let result = resolver.resolve(&usd_query()).await;

        assert!(matches!(result, Err(FxError::MalformedFeedDocument(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_empty_feed_document_is_bad_request() {
        let (resolver, _, feed) = setup();
        feed.set_document(USD_ID, MockFeedClient::document(USD_ID, &[]));

        let err = resolver.resolve(&usd_query()).await.unwrap_err();

        assert!(err.is_bad_request());
        assert_eq!(resolver.stats().feed_failures, 1);
    }

    #[tokio::test]
    async fn test_truncated_feed_document_is_not_cached() {
        let (resolver, store, feed) = setup();
        feed.set_document(
            USD_ID,
            "<ValCurs><Record><Value>71,0</Value></Record><Record><Value>70,97",
        );

        let result = resolver.resolve(&usd_query()).await;

        assert!(matches!(result, Err(FxError::MalformedFeedDocument(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_upstream_parameter_error() {
        let (resolver, _, feed) = setup();
        feed.set_document(USD_ID, "Error in parameters");

        let result = resolver.resolve(&usd_query()).await;

        assert!(matches!(result, Err(FxError::UpstreamParameterError { .. })));
    }

    #[tokio::test]
    async fn test_upstream_unavailable() {
        let (resolver, _, feed) = setup();
        feed.set_unavailable(USD_ID);

        let result = resolver.resolve(&usd_query()).await;

        assert!(matches!(result, Err(FxError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn test_cache_outage_falls_back_to_feed() {
        let feed = Arc::new(MockFeedClient::new());
        feed.set_document(
            USD_ID,
            MockFeedClient::document(
                USD_ID,
                &[("14.07.2020", "71,2298"), ("15.07.2020", "70,9725")],
            ),
        );
        let resolver = RateResolver::new(directory(), Arc::new(DownStore), feed.clone());

        let result = resolver.resolve(&usd_query()).await.unwrap();

        assert_eq!(result.first_exchange_rate, 71.2298);
        assert_eq!(feed.calls(), 1);

        let stats = resolver.stats();
        assert_eq!(stats.cache_errors, 2);
        assert_eq!(stats.cache_misses, 1);
    }

    #[tokio::test]
    async fn test_unparsable_cached_rate_is_a_miss() {
        let (resolver, store, feed) = setup();
        seed(&store, &[("12/07/2020", "garbage"), ("15/07/2020", "91,5")]).await;
        feed.set_document(
            USD_ID,
            MockFeedClient::document(
                USD_ID,
                &[("14.07.2020", "71,2298"), ("15.07.2020", "70,9725")],
            ),
        );

        let result = resolver.resolve(&usd_query()).await.unwrap();

        assert_eq!(feed.calls(), 1);
        assert_eq!(result.first_exchange_rate, 71.2298);
        assert_eq!(store.get(USD_ID, "12/07/2020").as_deref(), Some("71,2298"));
    }

    #[test]
    fn test_currency_list() {
        let (resolver, _, _) = setup();

        assert_eq!(
            resolver.currency_list(),
            vec![
                ("EUR".to_string(), "Евро".to_string()),
                ("USD".to_string(), "Доллар США".to_string()),
            ]
        );
    }
}
