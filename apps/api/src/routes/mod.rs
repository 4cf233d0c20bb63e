pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::branding::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/", get(handlers::handle_index))
        // Branding API
        .route("/api/v1/brand", post(handlers::handle_brand))
        .route(
            "/api/v1/brand/last-report",
            get(handlers::handle_last_report),
        )
        .route(
            "/api/v1/letterhead",
            get(handlers::handle_default_letterhead),
        )
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}
