//! Currency identifiers and directory entries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Alphabetic currency code as published by the feed (e.g. `USD`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Create a new currency code. Surrounding whitespace is dropped and the
    /// code is upper-cased.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_uppercase())
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A currency known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyEntry {
    /// Alphabetic code, unique within a directory.
    pub symbol: CurrencyCode,
    /// Human-readable name shown to callers.
    pub display_name: String,
    /// The feed's own identifier for this currency.
    pub upstream_id: String,
}

impl CurrencyEntry {
    /// Create a new directory entry.
    pub fn new(
        symbol: impl Into<CurrencyCode>,
        display_name: impl Into<String>,
        upstream_id: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            display_name: display_name.into(),
            upstream_id: upstream_id.into(),
        }
    }
}
