use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

pub fn debug_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Simple health check
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
