//! Calendar dates in caller and feed formats.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ParseError;

/// Format callers use for dates (`2020-07-12`).
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Format the upstream feed and the rate cache use for dates (`12/07/2020`).
pub const FEED_DATE_FORMAT: &str = "%d/%m/%Y";

/// A validated calendar date.
///
/// Parsed from the caller's ISO form and rendered in the feed's day/month/year
/// form for every cache key and feed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeedDate(NaiveDate);

impl FeedDate {
    /// Wrap an existing date.
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Parse a strict `YYYY-MM-DD` date.
    pub fn parse_iso(input: &str) -> Result<Self, ParseError> {
        let input = input.trim();
        // chrono accepts unpadded fields, the API does not.
        if input.len() != 10 {
            return Err(ParseError::InvalidDate(input.to_string()));
        }
        NaiveDate::parse_from_str(input, ISO_DATE_FORMAT)
            .map(Self)
            .map_err(|_| ParseError::InvalidDate(input.to_string()))
    }

    /// Render as `DD/MM/YYYY`.
    pub fn to_feed_string(&self) -> String {
        self.0.format(FEED_DATE_FORMAT).to_string()
    }

    /// Render as `YYYY-MM-DD`.
    pub fn to_iso_string(&self) -> String {
        self.0.format(ISO_DATE_FORMAT).to_string()
    }
}

impl fmt::Display for FeedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_feed_string())
    }
}
