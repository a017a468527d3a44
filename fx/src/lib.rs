//! ratediff FX Resolution
//!
//! Resolves the exchange rate of a currency on two dates against a reference
//! currency.
//!
//! # Features
//!
//! - Currency directory loaded once from the feed's metadata document
//! - Cache-aside over a persistent store (Redis, or in-memory)
//! - One ranged feed request per cache miss, parsed from the XML time series
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ratediff_common::ExchangeQuery;
//! use ratediff_fx::{CurrencyDirectory, HttpFeedClient, MemoryRateStore, RateResolver};
//!
//! let directory = Arc::new(CurrencyDirectory::from_file("data/currencies.xml")?);
//! let resolver = RateResolver::new(
//!     directory,
//!     Arc::new(MemoryRateStore::new()),
//!     Arc::new(HttpFeedClient::new(Default::default())?),
//! );
//!
//! let result = resolver
//!     .resolve(&ExchangeQuery::new("USD", "2020-07-12", "2020-07-15"))
//!     .await?;
//! ```

pub mod directory;
pub mod error;
pub mod feed;
pub mod parser;
pub mod resolver;
pub mod store;

pub use directory::CurrencyDirectory;
pub use error::{FxError, FxResult};
pub use feed::{FeedClient, FeedConfig, HttpFeedClient};
pub use parser::{parse_range, RateRange};
pub use resolver::{RateResolver, ResolverStats, ResolverStatsSnapshot};
pub use store::{MemoryRateStore, RateStore, RedisRateStore, RedisStoreConfig};

#[cfg(any(test, feature = "test-utils"))]
pub use feed::MockFeedClient;
