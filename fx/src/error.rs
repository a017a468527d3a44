//! Rate resolution error types.

use thiserror::Error;

/// Errors that can occur while resolving exchange rates.
#[derive(Debug, Error)]
pub enum FxError {
    /// Symbol is not in the currency directory.
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    /// Caller supplied a date that is not `YYYY-MM-DD`.
    #[error("Invalid date format: {0}")]
    InvalidDateFormat(String),

    /// The feed answered with its own parameter validation error.
    #[error("Upstream rejected parameters for {upstream_id} ({from}..{to})")]
    UpstreamParameterError {
        upstream_id: String,
        from: String,
        to: String,
    },

    /// The feed document lacks the records the resolver needs.
    #[error("Malformed feed document: {0}")]
    MalformedFeedDocument(String),

    /// The rate store could not be reached or answered with an error.
    #[error("Rate cache unavailable: {0}")]
    CacheUnavailable(String),

    /// The feed could not be reached, timed out or answered with a failure status.
    #[error("Upstream feed unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The currency metadata document could not be loaded.
    #[error("Failed to load currency directory: {0}")]
    DirectoryLoad(String),
}

impl FxError {
    /// Whether the error is caused by the request's parameters rather than
    /// by the service.
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            FxError::InvalidDateFormat(_)
                | FxError::UpstreamParameterError { .. }
                | FxError::MalformedFeedDocument(_)
        )
    }

    /// Get error code for logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::UnknownCurrency(_) => "UNKNOWN_CURRENCY",
            FxError::InvalidDateFormat(_) => "INVALID_DATE_FORMAT",
            FxError::UpstreamParameterError { .. } => "UPSTREAM_PARAMETER_ERROR",
            FxError::MalformedFeedDocument(_) => "MALFORMED_FEED_DOCUMENT",
            FxError::CacheUnavailable(_) => "CACHE_UNAVAILABLE",
            FxError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            FxError::DirectoryLoad(_) => "DIRECTORY_LOAD",
        }
    }
}

/// Result type for rate resolution.
pub type FxResult<T> = Result<T, FxError>;
