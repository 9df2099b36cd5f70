//! Credential lifecycle: registration, login, token refresh, logout and the
//! guard that resolves access tokens into accounts.

pub mod guard;
pub mod password;
pub mod session;

use thiserror::Error;

use crate::storage::DatabaseError;
use crate::tokens::TokenError;

pub use guard::{authenticate, AuthContext};
pub use password::{hash_password, verify_password, PasswordError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("User with email or username already exists")]
    DuplicateIdentity,
    #[error("{0}")]
    NotFound(String),
    #[error("Invalid user credentials")]
    InvalidCredentials,
    #[error("Unauthorized request")]
    Unauthorized,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Refresh token is expired or used")]
    TokenReuse,
    #[error("{0}")]
    MissingAsset(String),
    #[error("{0}")]
    Internal(String),
}

impl AuthError {
    pub fn validation(message: impl Into<String>) -> Self {
        AuthError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AuthError::NotFound(message.into())
    }

    pub fn missing_asset(message: impl Into<String>) -> Self {
        AuthError::MissingAsset(message.into())
    }
}

/// Run synchronous store or hashing work on the blocking pool.
pub async fn run_blocking<T, F>(f: F) -> Result<T, AuthError>
where
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuthError::Internal(format!("Blocking task failed: {e}")))?
}

impl From<DatabaseError> for AuthError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::DuplicateIdentity => AuthError::DuplicateIdentity,
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Invalid => AuthError::InvalidToken,
            TokenError::Signing(_) | TokenError::Lifetime(_) => {
                AuthError::Internal(e.to_string())
            }
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(e: PasswordError) -> Self {
        AuthError::Internal(e.to_string())
    }
}
