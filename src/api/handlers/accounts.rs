use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Extension;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{read_multipart, run_blocking};
use crate::api::cookies::{clear_token_cookies, read_cookie, token_cookies, REFRESH_TOKEN_COOKIE};
use crate::api::response::{ApiError, ApiResponse, AppJson};
use crate::auth::session::{self, ProfileImage, RegisterForm};
use crate::auth::AuthContext;
use crate::storage::models::SanitizedAccount;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    /// Handle or email
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl LoginRequest {
    fn identifier(&self) -> Option<&str> {
        [&self.identifier, &self.username, &self.email]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .find(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: SanitizedAccount,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub old_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
}

// ============================================================================
// Session handlers
// ============================================================================

pub async fn register(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<SanitizedAccount>, ApiError> {
    let mut form = read_multipart(multipart).await?;

    let register_form = RegisterForm {
        avatar: form.take_file(&["avatar"]),
        cover_image: form.take_file(&["coverImage", "cover_image"]),
        email: form.text(&["email"]),
        full_name: form.text(&["fullName", "full_name"]),
        handle: form.text(&["username", "handle"]),
        password: form.text(&["password"]),
    };

    let account =
        session::register_with_uploads(&state.db, state.media.as_ref(), register_form).await?;

    tracing::info!(account_id = %account.id, "User registered");
    Ok(ApiResponse::created(account, "User registered successfully"))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<(HeaderMap, ApiResponse<LoginResponse>), ApiError> {
    let identifier = req.identifier().map(str::to_string);
    let password = req.password.clone();

    let blocking_state = Arc::clone(&state);
    let outcome = run_blocking(move || {
        session::login(
            &blocking_state.db,
            &blocking_state.tokens,
            identifier.as_deref(),
            password.as_deref(),
        )
    })
    .await?;

    let headers = token_cookies(&state.tokens, &outcome.tokens, state.config.cookies.secure);
    Ok((
        headers,
        ApiResponse::ok(
            LoginResponse {
                access_token: outcome.tokens.access_token,
                refresh_token: outcome.tokens.refresh_token,
                user: outcome.account,
            },
            "User logged in successfully",
        ),
    ))
}

pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<AppJson<RefreshRequest>>,
) -> Result<(HeaderMap, ApiResponse<TokenResponse>), ApiError> {
    let presented = read_cookie(&headers, REFRESH_TOKEN_COOKIE).or_else(|| {
        body.and_then(|AppJson(req)| req.refresh_token)
            .filter(|t| !t.trim().is_empty())
    });

    let blocking_state = Arc::clone(&state);
    let tokens = run_blocking(move || {
        session::refresh(
            &blocking_state.db,
            &blocking_state.tokens,
            presented.as_deref(),
        )
    })
    .await?;

    let cookies = token_cookies(&state.tokens, &tokens, state.config.cookies.secure);
    Ok((
        cookies,
        ApiResponse::ok(
            TokenResponse {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
            },
            "Access token refreshed",
        ),
    ))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<(HeaderMap, ApiResponse<serde_json::Value>), ApiError> {
    let blocking_state = Arc::clone(&state);
    let account_id = ctx.account_id().to_string();
    run_blocking(move || session::logout(&blocking_state.db, &account_id)).await?;

    Ok((
        clear_token_cookies(state.config.cookies.secure),
        ApiResponse::ok(serde_json::json!({}), "User logged out"),
    ))
}

// ============================================================================
// Account handlers
// ============================================================================

pub async fn current_user(
    Extension(ctx): Extension<AuthContext>,
) -> ApiResponse<SanitizedAccount> {
    ApiResponse::ok(ctx.account, "Current user fetched successfully")
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppJson(req): AppJson<ChangePasswordRequest>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    let account_id = ctx.account_id().to_string();
    run_blocking(move || {
        session::change_password(&state.db, &account_id, &req.old_password, &req.new_password)
    })
    .await?;

    Ok(ApiResponse::ok(
        serde_json::json!({}),
        "Password changed successfully",
    ))
}

pub async fn update_account(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppJson(req): AppJson<UpdateAccountRequest>,
) -> Result<ApiResponse<SanitizedAccount>, ApiError> {
    let account_id = ctx.account_id().to_string();
    let account = run_blocking(move || {
        session::update_details(&state.db, &account_id, &req.full_name, &req.email)
    })
    .await?;
    Ok(ApiResponse::ok(account, "Account details updated successfully"))
}

pub async fn update_avatar(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<SanitizedAccount>, ApiError> {
    let mut form = read_multipart(multipart).await?;
    let account = session::replace_profile_image(
        &state.db,
        state.media.as_ref(),
        ctx.account_id(),
        ProfileImage::Avatar,
        form.take_file(&["avatar"]),
    )
    .await?;
    Ok(ApiResponse::ok(account, "Avatar updated successfully"))
}

pub async fn update_cover_image(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<SanitizedAccount>, ApiError> {
    let mut form = read_multipart(multipart).await?;
    let account = session::replace_profile_image(
        &state.db,
        state.media.as_ref(),
        ctx.account_id(),
        ProfileImage::CoverImage,
        form.take_file(&["coverImage", "cover_image"]),
    )
    .await?;
    Ok(ApiResponse::ok(account, "Cover image updated successfully"))
}
