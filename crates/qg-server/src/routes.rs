use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use qg_metadata::{ExecutionContext, MetadataConfig};
use qg_pipeline::Pipeline;
use qg_query::QueryDefinition;
use qg_registry::Registry;
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub registry: Arc<Registry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: QueryDefinition,
    #[serde(default)]
    pub context: ExecutionContext,
}

/// `POST /query` (§4.7, §6): runs the full pipeline and returns whatever
/// `kind` of result the query's `executeMode` produced.
pub async fn query(State(state): State<AppState>, Json(req): Json<QueryRequest>) -> Result<impl IntoResponse, ApiError> {
    let result = state.pipeline.run(&req.query, &req.context).await?;
    Ok(Json(result))
}

/// `POST /validate/query`: runs C6 alone, without planning or execution —
/// useful for a client checking a query before sending it for real.
pub async fn validate_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.registry.current();
    qg_validate::validate_query(&req.query, &snapshot, &req.context)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /validate/config`: runs C3 alone against a posted catalogue,
/// without touching the registry's currently-loaded snapshot.
pub async fn validate_config(Json(config): Json<MetadataConfig>) -> Result<impl IntoResponse, ApiError> {
    qg_metadata::validate_config(&config)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /health` (§4.7): pings every configured executor and cache
/// provider. Responds `503` the moment any target is unreachable so a
/// load balancer can route around this instance.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.pipeline.health_check().await;
    let status = if report.healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(report))
}
