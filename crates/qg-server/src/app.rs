use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::routes::{health, query, validate_config, validate_query, AppState};

/// Builds the HTTP surface (§6): `POST /query`, `POST /validate/query`,
/// `POST /validate/config`, `GET /health`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/query", post(query))
        .route("/validate/query", post(validate_query))
        .route("/validate/config", post(validate_config))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
