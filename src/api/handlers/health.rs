use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    pub host_kind: String,
    pub blob_mirror: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let storage_ok = state.storage.health_check().await;

    Json(HealthResponse {
        status: if storage_ok { "ok" } else { "degraded" }.to_string(),
        storage: if storage_ok { "writable" } else { "unavailable" }.to_string(),
        host_kind: state.config.host_kind.as_str().to_string(),
        blob_mirror: if state.mirror.is_enabled() {
            "enabled"
        } else {
            "disabled"
        }
        .to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
