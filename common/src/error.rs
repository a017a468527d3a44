//! Parse errors for the shared value types.

use thiserror::Error;

/// Errors raised while turning caller or feed strings into typed values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The date is not a valid `YYYY-MM-DD` calendar date.
    #[error("Invalid date: {0:?}")]
    InvalidDate(String),

    /// The rate is not a finite decimal number.
    #[error("Invalid rate: {0:?}")]
    InvalidRate(String),
}

impl ParseError {
    /// Get error code for logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            ParseError::InvalidDate(_) => "INVALID_DATE",
            ParseError::InvalidRate(_) => "INVALID_RATE",
        }
    }
}
