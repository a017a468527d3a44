//! Shared handler state.

use std::sync::Arc;

use ratediff_fx::RateResolver;

/// State injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<RateResolver>,
}

impl AppState {
    pub fn new(resolver: Arc<RateResolver>) -> Self {
        Self { resolver }
    }
}
