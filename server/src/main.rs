//! ratediff Server Binary
//!
//! Serves currency listings and rate differences over HTTP.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ratediff_fx::{
    CurrencyDirectory, HttpFeedClient, MemoryRateStore, RateResolver, RateStore, RedisRateStore,
};
use ratediff_server::config::{CacheBackend, LogFormat};
use ratediff_server::routes::cors_layer;
use ratediff_server::{create_router, AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = ServerConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    init_logging(config.log_format);

    info!("Starting ratediff server");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let directory = CurrencyDirectory::from_file(&config.currency_document)
        .with_context(|| format!("loading {}", config.currency_document))?;

    let store: Arc<dyn RateStore> = match config.cache_backend {
        CacheBackend::Redis => Arc::new(
            RedisRateStore::new(config.redis.clone()).context("configuring rate cache")?,
        ),
        CacheBackend::Memory => Arc::new(MemoryRateStore::new()),
    };
    let feed = HttpFeedClient::new(config.feed.clone()).context("configuring feed client")?;

    info!(
        currencies = directory.len(),
        store = store.name(),
        feed_url = %config.feed.base_url,
        "Resolver ready"
    );

    let resolver = Arc::new(RateResolver::new(Arc::new(directory), store, Arc::new(feed)));
    let app = create_router(AppState::new(resolver.clone()))
        .layer(cors_layer(&config.cors_allowed_origins));

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("binding {}", config.bind_addr()))?;

    info!(addr = %config.bind_addr(), "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let stats = resolver.stats();
    info!(
        queries = stats.queries,
        cache_hits = stats.cache_hits,
        cache_misses = stats.cache_misses,
        cache_errors = stats.cache_errors,
        feed_fetches = stats.feed_fetches,
        feed_failures = stats.feed_failures,
        "Server shutdown complete"
    );
    Ok(())
}

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
