//! ratediff Common Types
//!
//! Shared value types used across the ratediff workspace: currency entries,
//! feed dates, raw rate parsing and the exchange query/result pair.

pub mod currency;
pub mod date;
pub mod error;
pub mod rate;

pub use currency::*;
pub use date::*;
pub use error::*;
pub use rate::*;
