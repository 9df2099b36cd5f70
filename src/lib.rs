//! vidtube - account and channel service for a video sharing backend
//!
//! This crate provides:
//! - Registration with avatar and cover image uploads
//! - Login with an access/refresh JWT pair delivered as HttpOnly cookies
//! - Refresh token rotation with reuse detection
//! - Channel profiles and subscriptions
//! - redb embedded database (ACID, MVCC, crash-safe)
//! - REST API

pub mod api;
pub mod auth;
pub mod channels;
pub mod config;
pub mod media;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod tokens;

use std::sync::Arc;

use config::Config;
use media::MediaStore;
use storage::Database;
use tokens::TokenIssuer;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub media: Arc<dyn MediaStore>,
    pub tokens: TokenIssuer,
}

impl AppState {
    pub fn new(config: Config, db: Database, media: Arc<dyn MediaStore>) -> Self {
        let tokens = TokenIssuer::new(&config.tokens);
        Self {
            config,
            db,
            media,
            tokens,
        }
    }
}
