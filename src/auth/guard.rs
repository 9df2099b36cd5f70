use crate::storage::models::SanitizedAccount;
use crate::storage::Database;
use crate::tokens::{TokenIssuer, TokenKind};

use super::AuthError;

/// Identity resolved for one request. Built by the guard, read by handlers.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account: SanitizedAccount,
}

impl AuthContext {
    pub fn account_id(&self) -> &str {
        &self.account.id
    }
}

/// Resolve an access token into the account it was issued for.
///
/// Only reads the account; the stored refresh token plays no part here.
pub fn authenticate(
    db: &Database,
    issuer: &TokenIssuer,
    access_token: Option<&str>,
) -> Result<AuthContext, AuthError> {
    let token = access_token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::Unauthorized)?;

    let claims = issuer.verify(token, TokenKind::Access)?;

    let account = db
        .get_account(&claims.sub)?
        .ok_or_else(|| AuthError::not_found("Account no longer exists"))?;

    Ok(AuthContext {
        account: SanitizedAccount::from(account),
    })
}
