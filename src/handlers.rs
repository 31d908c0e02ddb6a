use crate::config::Config;
use crate::db_storage::CountryStorage;
use crate::errors::AppError;
use crate::models::*;
use crate::refresh::run_refresh;
use crate::services::{CountriesApiService, ExchangeRateService};
use crate::summary_image::SummaryRenderer;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Country table access.
    pub storage: CountryStorage,
    /// Country list source.
    pub countries_api: CountriesApiService,
    /// Exchange rate source.
    pub rates_api: ExchangeRateService,
    /// Summary image writer/reader.
    pub renderer: SummaryRenderer,
    /// Held for the duration of a refresh pass so passes never interleave.
    pub refresh_lock: Mutex<()>,
}

impl AppState {
    pub fn new(config: Config, db: SqlitePool) -> Result<Self, AppError> {
        Ok(Self {
            storage: CountryStorage::new(db),
            countries_api: CountriesApiService::new(&config)?,
            rates_api: ExchangeRateService::new(&config)?,
            renderer: SummaryRenderer::new(config.image_path.clone()),
            refresh_lock: Mutex::new(()),
            config,
        })
    }
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /countries/refresh
///
/// Runs a refresh pass and reports what it changed. Responds 503 when
/// either source is unreachable; the store is left untouched in that case.
pub async fn refresh_countries(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RefreshResponse>, AppError> {
    tracing::info!("POST /countries/refresh");

    let summary = run_refresh(&state).await?;

    Ok(Json(RefreshResponse {
        message: "Countries refreshed successfully".to_string(),
        summary,
    }))
}

/// GET /countries?region=&currency=&sort=
pub async fn list_countries(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CountryListParams>,
) -> Result<Json<Vec<Country>>, AppError> {
    tracing::debug!("GET /countries - params: {:?}", params);

    if let Some(sort) = params.sort.as_deref() {
        if SortOrder::parse(sort).is_none() {
            tracing::debug!("Ignoring unknown sort key '{}'", sort);
        }
    }

    let (filter, sort) = params.into_query();
    let countries = state.storage.list(&filter, sort).await?;

    Ok(Json(countries))
}

/// GET /countries/:name
pub async fn get_country(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Country>, AppError> {
    tracing::debug!("GET /countries/{}", name);

    let country = state.storage.get_by_name(&name).await?;
    Ok(Json(country))
}

/// DELETE /countries/:name
pub async fn delete_country(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    tracing::info!("DELETE /countries/{}", name);

    state.storage.delete_by_name(&name).await?;

    Ok(Json(MessageResponse {
        message: format!("Country '{}' deleted successfully", name),
    }))
}

/// GET /status
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, AppError> {
    let stats = state.storage.stats().await?;
    Ok(Json(stats))
}

/// GET /countries/image
///
/// Serves the last rendered summary with a content-hash `ETag`; a matching
/// `If-None-Match` gets `304 Not Modified`.
pub async fn get_summary_image(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let Some(bytes) = state.renderer.read().await? else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Summary image not found" })),
        )
            .into_response());
    };

    let etag = format!("\"{}\"", hex::encode(Sha256::digest(&bytes)));
    let matches = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').any(|tag| tag.trim() == etag || tag.trim() == "*"))
        .unwrap_or(false);

    if matches {
        return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
    }

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::CACHE_CONTROL, "no-cache".to_string()),
            (header::ETAG, etag),
        ],
        bytes,
    )
        .into_response())
}
