mod audit;
mod cache_validator;
mod calculator;
mod config;
mod credit;
mod db;
mod demographics;
mod engine;
mod errors;
mod extractor;
mod handlers;
mod location;
mod models;
mod narrative;
mod providers;
mod storage;

use axum::{
    routing::{get, post},
    Router,
};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::audit::AuditSink;
use crate::config::Config;
use crate::credit::VantageStore;
use crate::db::Database;
use crate::storage::QualificationStore;

/// Main entry point for the application.
///
/// Initializes logging, configuration, the SQLite pool and schema, the
/// response caches and Vantage dataset handle, then serves the axum router.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "solar_loan_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database connection pool and qualification log schema
    let db = Database::new(&config.database_url).await?;
    QualificationStore::new(db.pool.clone())
        .ensure_schema()
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    tracing::info!("Database ready");

    // Per-ZIP electricity profile cache (1 hour TTL)
    // Scraped data goes stale slowly; an hour keeps repeat lookups cheap
    let electricity_cache = Cache::builder()
        .time_to_live(Duration::from_secs(3600))
        .max_capacity(50_000)
        .build();
    tracing::info!("Electricity profile cache initialized (1h TTL)");

    // Demographics cache (24 hour TTL; ACS estimates change yearly)
    let demographics_cache = Cache::builder()
        .time_to_live(Duration::from_secs(86_400))
        .max_capacity(50_000)
        .build();
    tracing::info!("Demographics cache initialized (24h TTL)");

    // Vantage dataset handle; loads lazily on first lookup, then frozen
    let vantage = VantageStore::new(config.vantage_csv_path.clone());

    let audit = AuditSink::new(config.logs_dir.clone());

    // Build application state
    let app_state = Arc::new(crate::handlers::AppState {
        db: db.pool.clone(),
        config: config.clone(),
        audit,
        vantage,
        electricity_cache,
        demographics_cache,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        // Data endpoints
        .route("/electricity-data", get(handlers::electricity_data))
        .route("/demographic-data", get(handlers::demographic_data))
        .route("/vantage-score", get(handlers::vantage_score))
        // Qualification endpoint
        .route(
            "/api/check-qualification",
            post(handlers::check_qualification),
        )
        // Log viewer endpoints
        .route("/logs/summary", get(handlers::logs_summary))
        .route("/logs/:log_type", get(handlers::get_logs))
        .layer(
            ServiceBuilder::new()
                // Request size limit: qualification payloads are tiny
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Build final app with health check (bypasses rate limiting)
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
