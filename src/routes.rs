use crate::handlers::{self, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Country and status endpoints, without state or middleware attached.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/countries/refresh", post(handlers::refresh_countries))
        .route("/countries", get(handlers::list_countries))
        .route("/countries/image", get(handlers::get_summary_image))
        .route(
            "/countries/:name",
            get(handlers::get_country).delete(handlers::delete_country),
        )
        .route("/status", get(handlers::get_status))
}

/// Full application router with the health check, ready to serve.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .merge(api_router())
        .with_state(state)
}
