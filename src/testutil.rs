//! Shared test helpers, available to all `#[cfg(test)]` modules in the crate.

use std::sync::Arc;

use tempfile::TempDir;

use crate::auth::session::RegisterInput;
use crate::config::{Config, CookieConfig, MediaConfig, ServerConfig, TokenConfig};
use crate::media::{MediaUpload, MemoryStore};
use crate::storage::models::NewAccount;
use crate::storage::Database;
use crate::tokens::TokenIssuer;
use crate::AppState;

/// Open a fresh database in a temporary directory.
///
/// Returns both the `Database` and the `TempDir` guard; the caller must
/// keep the `TempDir` alive for the duration of the test.
pub fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path()).unwrap();
    (db, temp_dir)
}

/// A minimal `Config` suitable for unit tests (plain cookies, memory media).
pub fn test_config() -> Config {
    Config {
        cookies: CookieConfig { secure: false },
        media: MediaConfig::default(),
        server: ServerConfig {
            bind_address: "127.0.0.1:8000".to_string(),
            data_dir: "/tmp/test".to_string(),
            ..ServerConfig::default()
        },
        tokens: TokenConfig {
            access_secret: "test-access-secret".to_string(),
            access_ttl_seconds: 60,
            refresh_secret: "test-refresh-secret".to_string(),
            refresh_ttl_seconds: 600,
        },
    }
}

pub fn test_issuer() -> TokenIssuer {
    TokenIssuer::new(&test_config().tokens)
}

/// Build a full `Arc<AppState>` around the given database, backed by an
/// in-memory media store.
pub fn test_state(db: Database) -> Arc<AppState> {
    Arc::new(AppState::new(test_config(), db, Arc::new(MemoryStore::new())))
}

/// Store-level account fields with a placeholder password hash.
pub fn new_account(handle: &str, email: &str) -> NewAccount {
    NewAccount {
        avatar: format!("memory://media/{handle}-avatar"),
        cover_image: None,
        email: email.to_string(),
        full_name: "Full Name".to_string(),
        handle: handle.to_string(),
        password_hash: format!("hash_{handle}"),
    }
}

/// Registration input with an already-uploaded avatar.
pub fn register_input(handle: &str, email: &str, password: &str) -> RegisterInput {
    RegisterInput {
        avatar: Some(format!("memory://media/{handle}-avatar")),
        cover_image: None,
        email: email.to_string(),
        full_name: "Full Name".to_string(),
        handle: handle.to_string(),
        password: password.to_string(),
    }
}

/// A small non-empty PNG-typed upload.
pub fn upload(field: &str, file_name: &str) -> MediaUpload {
    MediaUpload {
        bytes: format!("{field}:{file_name}").into_bytes(),
        content_type: Some("image/png".to_string()),
        file_name: file_name.to_string(),
    }
}
