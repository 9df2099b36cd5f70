use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::middleware::require_auth;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Open routes -- no access token required
    let public_routes = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/refresh-token", post(handlers::refresh_token));

    // Guarded routes -- the middleware attaches the AuthContext
    let guarded_routes = Router::new()
        .route("/logout", post(handlers::logout))
        .route("/current-user", get(handlers::current_user))
        .route("/change-password", post(handlers::change_password))
        .route("/update-account", patch(handlers::update_account))
        .route("/avatar", patch(handlers::update_avatar))
        .route("/cover-image", patch(handlers::update_cover_image))
        .route("/c/:username", get(handlers::channel_profile))
        .route(
            "/c/:username/subscribe",
            post(handlers::subscribe).delete(handlers::unsubscribe),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_auth,
        ));

    let users = Router::new().merge(public_routes).merge(guarded_routes);

    let mut router = Router::new()
        .nest("/api/v1/users", users)
        .route("/healthcheck", get(handlers::health))
        .layer(DefaultBodyLimit::max(state.config.server.max_upload_bytes))
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors_layer(state.config.server.cors_origin.as_deref()) {
        router = router.layer(cors);
    }

    router.with_state(state)
}

/// Credentialed CORS for a single configured origin.
fn cors_layer(origin: Option<&str>) -> Option<CorsLayer> {
    let origin = origin?;
    let Ok(value) = HeaderValue::from_str(origin) else {
        tracing::warn!(origin, "Ignoring invalid CORS origin");
        return None;
    };
    Some(
        CorsLayer::new()
            .allow_origin(value)
            .allow_credentials(true)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
    )
}
