//! Raw rate parsing and the exchange query/result pair.

use serde::{Deserialize, Serialize};

use crate::currency::CurrencyCode;
use crate::error::ParseError;

/// Parse a feed rate such as `"74,52"` into a number.
///
/// The feed writes decimals with a comma separator; a dot is accepted as well.
pub fn parse_rate(raw: &str) -> Result<f64, ParseError> {
    let normalized = raw.trim().replace(',', ".");
    match normalized.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ParseError::InvalidRate(raw.to_string())),
    }
}

/// A request for the rates of one currency on two dates.
///
/// Dates stay in the caller's ISO form until the resolver validates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeQuery {
    pub symbol: CurrencyCode,
    pub date1: String,
    pub date2: String,
}

impl ExchangeQuery {
    /// Create a new query.
    pub fn new(
        symbol: impl Into<CurrencyCode>,
        date1: impl Into<String>,
        date2: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            date1: date1.into(),
            date2: date2.into(),
        }
    }
}

/// Rates of one currency on two dates and their difference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeResult {
    pub title: String,
    pub first_exchange_rate: f64,
    pub second_exchange_rate: f64,
    /// Always `second_exchange_rate - first_exchange_rate`.
    pub difference: f64,
}

impl ExchangeResult {
    /// Build a result; the difference is derived from the two rates.
    pub fn new(title: impl Into<String>, first: f64, second: f64) -> Self {
        Self {
            title: title.into(),
            first_exchange_rate: first,
            second_exchange_rate: second,
            difference: second - first,
        }
    }
}
