// 🌐 HTTP surface - REST API with Axum
//
//   POST   /countries/refresh   run the full pipeline
//   GET    /countries           list (?region=&currency=&sort=)
//   GET    /countries/image     last rendered summary (404 until one exists)
//   GET    /countries/:name     point lookup
//   DELETE /countries/:name     delete by name
//   GET    /status              total + last refresh

use crate::config::Config;
use crate::db::{CountryStore, SqliteCountryStore};
use crate::error::{LedgerError, LedgerResult};
use crate::query::{status, CountryQuery};
use crate::refresh::{lock_store, Refresher};
use crate::report::{PngRenderer, ReportRenderer};
use crate::upstream::UpstreamClient;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::error;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    store: Arc<Mutex<SqliteCountryStore>>,
    refresher: Arc<Refresher<SqliteCountryStore>>,
}

impl AppState {
    pub fn new(store: SqliteCountryStore, config: &Config) -> LedgerResult<Self> {
        let renderer: Arc<dyn ReportRenderer> = Arc::new(PngRenderer::new(&config.font_path));
        Self::with_renderer(store, config, renderer)
    }

    pub fn with_renderer(
        store: SqliteCountryStore,
        config: &Config,
        renderer: Arc<dyn ReportRenderer>,
    ) -> LedgerResult<Self> {
        let upstream = UpstreamClient::new(&config.registry_url, &config.rates_url, config.fetch_timeout)?;
        let store = Arc::new(Mutex::new(store));
        let refresher = Refresher::new(upstream, Arc::clone(&store), renderer, &config.summary_image_path);

        Ok(AppState {
            store,
            refresher: Arc::new(refresher),
        })
    }
}

// ============================================================================
// Error Responses
// ============================================================================

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = match &self {
            LedgerError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            LedgerError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::Persistence { .. } | LedgerError::StorePoisoned | LedgerError::Render(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = match &self {
            LedgerError::UpstreamUnavailable { source_name, .. } => json!({
                "error": self.category(),
                "details": format!("Could not fetch data from {source_name}"),
            }),
            LedgerError::ValidationFailed(msg) | LedgerError::NotFound(msg) => json!({
                "error": self.category(),
                "details": msg,
            }),
            _ => {
                error!(error = %self, "internal server error");
                json!({ "error": self.category() })
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Trim the path segment and reject blank names before touching the store.
fn required_name(raw: &str) -> LedgerResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(LedgerError::ValidationFailed("country name is required".to_string()));
    }
    Ok(name.to_string())
}

// ============================================================================
// API Handlers
// ============================================================================

/// POST /countries/refresh
async fn refresh_countries(State(state): State<AppState>) -> LedgerResult<impl IntoResponse> {
    let outcome = state.refresher.refresh().await?;

    Ok(Json(json!({
        "message": "countries refreshed successfully",
        "inserted": outcome.reconciliation.inserted,
        "updated": outcome.reconciliation.updated,
        "last_refreshed_at": outcome.refreshed_at,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    region: Option<String>,
    currency: Option<String>,
    sort: Option<String>,
}

/// GET /countries
async fn list_countries(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> LedgerResult<impl IntoResponse> {
    let query = CountryQuery::from_params(
        params.region.as_deref(),
        params.currency.as_deref(),
        params.sort.as_deref(),
    );
    let result = {
        let store = lock_store(&state.store)?;
        query.run(&*store)?
    };

    Ok(Json(json!({ "data": result.countries, "total": result.total })))
}

/// GET /countries/:name
async fn get_country(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> LedgerResult<impl IntoResponse> {
    let name = required_name(&name)?;
    let found = lock_store(&state.store)?.find_by_name(&name)?;

    match found {
        Some(country) => Ok(Json(json!({ "data": country }))),
        None => Err(LedgerError::NotFound("country not found".to_string())),
    }
}

/// DELETE /countries/:name
async fn delete_country(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> LedgerResult<impl IntoResponse> {
    let name = required_name(&name)?;
    let deleted = lock_store(&state.store)?.delete_by_name(&name)?;

    if !deleted {
        return Err(LedgerError::NotFound("country does not exist".to_string()));
    }

    Ok(Json(json!({
        "message": format!("country '{name}' deleted successfully"),
    })))
}

/// GET /countries/image
async fn summary_image(State(state): State<AppState>) -> LedgerResult<Response> {
    let path = state.refresher.summary_path();
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(LedgerError::NotFound("summary image not found".to_string()))
        }
        Err(e) => {
            error!(error = %e, path = %path.display(), "summary image unreadable");
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Error accessing summary image" })),
            )
                .into_response())
        }
    }
}

/// GET /status
async fn get_status(State(state): State<AppState>) -> LedgerResult<impl IntoResponse> {
    let summary = {
        let store = lock_store(&state.store)?;
        status(&*store)?
    };

    Ok(Json(json!({
        "total_countries": summary.total_countries,
        "last_refreshed_at": summary.last_refreshed_at.to_rfc3339(),
    })))
}

// ============================================================================
// Router
// ============================================================================

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/countries", get(list_countries))
        .route("/countries/refresh", post(refresh_countries))
        .route("/countries/image", get(summary_image))
        .route("/countries/:name", get(get_country).delete(delete_country))
        .route("/status", get(get_status))
        .with_state(state)
}
