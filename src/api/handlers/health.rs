use axum::extract::State;
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::ApiResponse;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub media_store: &'static str,
    pub status: String,
    pub version: &'static str,
}

pub async fn health(State(state): State<Arc<AppState>>) -> ApiResponse<HealthResponse> {
    ApiResponse::ok(
        HealthResponse {
            media_store: state.media.name(),
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION"),
        },
        "OK",
    )
}
