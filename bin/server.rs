// Country Ledger - Web Server
// REST API with Axum

use anyhow::{Context, Result};
use country_ledger::api::{build_router, AppState};
use country_ledger::{Config, SqliteCountryStore};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    if dotenvy::dotenv().is_err() {
        // Production injects env vars directly
        eprintln!("⚠️  No .env file loaded, using environment and defaults");
    }
    init_tracing();

    let config = Config::from_env();

    let store = SqliteCountryStore::open(&config.database_path)
        .with_context(|| format!("failed to open database {}", config.database_path.display()))?;
    info!(path = %config.database_path.display(), "✓ Database opened");

    if !config.font_path.exists() {
        warn!(font = %config.font_path.display(), "summary font missing; refresh will skip the image");
    }

    let state = AppState::new(store, &config).context("failed to build application state")?;

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.addr))?;

    info!("🚀 Server running on http://{}", config.addr);
    info!("   API: http://{}/countries", config.addr);

    axum::serve(listener, app).await.context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
