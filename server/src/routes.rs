//! HTTP routes.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use ratediff_common::{ExchangeQuery, ExchangeResult};
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Query string of the rate difference endpoint.
#[derive(Debug, Deserialize)]
pub struct ExchangeParams {
    pub symb: Option<String>,
    pub date_req1: Option<String>,
    pub date_req2: Option<String>,
}

/// Build the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/currency_list", get(currency_list))
        .route("/api/exchange_rate_difference", get(exchange_rate_difference))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy for the API. An empty list allows any origin.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers(Any);

    if allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(origins))
}

/// List every known currency as `[symbol, name]` pairs.
async fn currency_list(State(state): State<AppState>) -> Json<Vec<(String, String)>> {
    Json(state.resolver.currency_list())
}

/// Rates of a currency on two dates and their difference.
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
async fn exchange_rate_difference(
    State(state): State<AppState>,
    params: Result<Query<ExchangeParams>, QueryRejection>,
) -> Result<Json<ExchangeResult>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::InvalidQuery(e.body_text()))?;
    let symbol = params.symb.ok_or(ApiError::MissingParameter("symb"))?;
    let date1 = params
        .date_req1
        .ok_or(ApiError::MissingParameter("date_req1"))?;
    let date2 = params
        .date_req2
        .ok_or(ApiError::MissingParameter("date_req2"))?;

    let query = ExchangeQuery::new(symbol.as_str(), date1, date2);
    let result = state.resolver.resolve(&query).await?;

    info!(
        symbol = %query.symbol,
        first = result.first_exchange_rate,
        second = result.second_exchange_rate,
        "Rate difference served"
    );

    Ok(Json(result))
}
