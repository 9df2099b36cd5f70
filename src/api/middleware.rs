//! Access guard middleware
//!
//! Resolves the request's access token into an [`AuthContext`] and stores it
//! in the request extensions. Applied only to routes that need an account.

use axum::{
    body::Body,
    extract::State,
    http::{Request, Response},
    middleware::Next,
};
use std::sync::Arc;

use super::cookies::{bearer_token, read_cookie, ACCESS_TOKEN_COOKIE};
use super::response::ApiError;
use crate::auth::{self, AuthContext};
use crate::AppState;

/// Reject the request unless it carries a valid access token.
///
/// The `accessToken` cookie is preferred; an `Authorization: Bearer` header is
/// accepted as a fallback for non-browser clients.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response<Body>, ApiError> {
    let token = read_cookie(request.headers(), ACCESS_TOKEN_COOKIE)
        .or_else(|| bearer_token(request.headers()));

    let blocking_state = Arc::clone(&state);
    let context: AuthContext = auth::run_blocking(move || {
        auth::authenticate(&blocking_state.db, &blocking_state.tokens, token.as_deref())
    })
    .await
    .map_err(|e| {
        tracing::debug!(error = %e, path = %request.uri().path(), "Access denied");
        ApiError::from(e)
    })?;

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}
