//! Mapping of resolver errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ratediff_fx::FxError;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

pub const NOT_FOUND_MESSAGE: &str = "Exchange rate not found";
pub const BAD_PARAMETERS_MESSAGE: &str = "Error in parameters";
pub const UNAVAILABLE_MESSAGE: &str = "Exchange rate service unavailable";
pub const INTERNAL_MESSAGE: &str = "Internal server error";

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
}

/// Error returned by API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A required query parameter is absent.
    #[error("Missing query parameter: {0}")]
    MissingParameter(&'static str),

    /// The query string could not be decoded, e.g. a repeated parameter.
    #[error("Invalid query string: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Fx(#[from] FxError),
}

impl ApiError {
    /// Status and caller-facing message. Internal detail never leaves the server.
    pub fn status_and_message(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::MissingParameter(_) | ApiError::InvalidQuery(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, BAD_PARAMETERS_MESSAGE)
            }
            ApiError::Fx(FxError::UnknownCurrency(_)) => (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE),
            ApiError::Fx(e) if e.is_bad_request() => {
                (StatusCode::UNPROCESSABLE_ENTITY, BAD_PARAMETERS_MESSAGE)
            }
            ApiError::Fx(FxError::UpstreamUnavailable(_)) => {
                (StatusCode::BAD_GATEWAY, UNAVAILABLE_MESSAGE)
            }
            ApiError::Fx(_) => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE),
        }
    }

    /// Get error code for logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::MissingParameter(_) => "MISSING_PARAMETER",
            ApiError::InvalidQuery(_) => "INVALID_QUERY",
            ApiError::Fx(e) => e.error_code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        if status.is_server_error() {
            error!(status = %status, code = self.error_code(), error = %self, "Request failed");
        } else {
            warn!(status = %status, code = self.error_code(), error = %self, "Request rejected");
        }

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
