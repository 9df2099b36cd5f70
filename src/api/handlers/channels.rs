use axum::extract::{Path, State};
use axum::Extension;
use std::sync::Arc;

use super::run_blocking;
use crate::api::response::{ApiError, ApiResponse};
use crate::auth::AuthContext;
use crate::channels::{self, ChannelProfile};
use crate::AppState;

pub async fn channel_profile(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(username): Path<String>,
) -> Result<ApiResponse<ChannelProfile>, ApiError> {
    let viewer_id = ctx.account_id().to_string();
    let profile = run_blocking(move || {
        channels::channel_profile(&state.db, &username, Some(&viewer_id))
    })
    .await?;
    Ok(ApiResponse::ok(profile, "User channel fetched successfully"))
}

pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(username): Path<String>,
) -> Result<ApiResponse<ChannelProfile>, ApiError> {
    let viewer_id = ctx.account_id().to_string();
    let profile =
        run_blocking(move || channels::subscribe(&state.db, &viewer_id, &username)).await?;
    Ok(ApiResponse::ok(profile, "Subscribed successfully"))
}

pub async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(username): Path<String>,
) -> Result<ApiResponse<ChannelProfile>, ApiError> {
    let viewer_id = ctx.account_id().to_string();
    let profile =
        run_blocking(move || channels::unsubscribe(&state.db, &viewer_id, &username)).await?;
    Ok(ApiResponse::ok(profile, "Unsubscribed successfully"))
}
