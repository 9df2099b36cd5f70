//! Signed access and refresh tokens.
//!
//! Both kinds are HS256 JWTs carrying the account id as `sub`. They are signed
//! with different secrets and expire on different schedules; a token of one
//! kind never verifies as the other.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::TokenConfig;

#[derive(Debug, Error)]
pub enum TokenError {
    /// Bad signature, wrong secret, malformed or expired.
    #[error("Invalid or expired token")]
    Invalid,
    #[error("Failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    /// Expiry does not fit in a JWT timestamp.
    #[error("Token lifetime of {0}s is out of range")]
    Lifetime(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub exp: i64,
    pub iat: i64,
    /// Unique per token so two tokens minted in the same second still differ
    pub jti: String,
    /// Account id
    pub sub: String,
}

/// A freshly minted access/refresh pair
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

struct SigningKeys {
    decoding: DecodingKey,
    encoding: EncodingKey,
    ttl_seconds: u64,
}

impl SigningKeys {
    fn from_secret(secret: &str, ttl_seconds: u64) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            ttl_seconds,
        }
    }
}

pub struct TokenIssuer {
    access: SigningKeys,
    refresh: SigningKeys,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(config: &TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            access: SigningKeys::from_secret(&config.access_secret, config.access_ttl_seconds),
            refresh: SigningKeys::from_secret(&config.refresh_secret, config.refresh_ttl_seconds),
            validation,
        }
    }

    pub fn issue_access_token(&self, account_id: &str) -> Result<String, TokenError> {
        self.issue(TokenKind::Access, account_id)
    }

    pub fn issue_refresh_token(&self, account_id: &str) -> Result<String, TokenError> {
        self.issue(TokenKind::Refresh, account_id)
    }

    pub fn issue_pair(&self, account_id: &str) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(account_id)?,
            refresh_token: self.issue_refresh_token(account_id)?,
        })
    }

    /// Lifetime of tokens of the given kind, in seconds.
    pub fn ttl_seconds(&self, kind: TokenKind) -> u64 {
        self.keys(kind).ttl_seconds
    }

    /// Verify the signature and expiry of `token` against the secret for `kind`.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.keys(kind).decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, ?kind, "Token verification failed");
                TokenError::Invalid
            })
    }

    fn issue(&self, kind: TokenKind, account_id: &str) -> Result<String, TokenError> {
        let ttl = self.keys(kind).ttl_seconds;
        let now = Utc::now().timestamp();
        let exp = i64::try_from(ttl)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or(TokenError::Lifetime(ttl))?;
        self.sign(kind, account_id, now, exp)
    }

    fn sign(&self, kind: TokenKind, account_id: &str, iat: i64, exp: i64) -> Result<String, TokenError> {
        let claims = Claims {
            exp,
            iat,
            jti: uuid::Uuid::new_v4().to_string(),
            sub: account_id.to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.keys(kind).encoding)
            .map_err(TokenError::Signing)
    }

    fn keys(&self, kind: TokenKind) -> &SigningKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Sign a token with explicit timestamps, for exercising expiry paths.
    #[cfg(test)]
    pub(crate) fn sign_with_times(
        &self,
        kind: TokenKind,
        account_id: &str,
        iat: i64,
        exp: i64,
    ) -> Result<String, TokenError> {
        self.sign(kind, account_id, iat, exp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_config;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&test_config().tokens)
    }

    #[test]
    fn test_access_token_round_trip() {
        let issuer = issuer();
        let token = issuer.issue_access_token("acct-1").unwrap();

        let claims = issuer.verify(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, "acct-1");
        assert_eq!(
            claims.exp - claims.iat,
            issuer.ttl_seconds(TokenKind::Access) as i64
        );
    }

    #[test]
    fn test_kinds_do_not_cross_verify() {
        let issuer = issuer();
        let access = issuer.issue_access_token("acct-1").unwrap();
        let refresh = issuer.issue_refresh_token("acct-1").unwrap();

        assert!(matches!(
            issuer.verify(&access, TokenKind::Refresh),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(
            issuer.verify(&refresh, TokenKind::Access),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let mut other_config = test_config().tokens;
        other_config.access_secret = "some-other-access-secret".to_string();
        let other = TokenIssuer::new(&other_config);

        let token = other.issue_access_token("acct-1").unwrap();
        assert!(matches!(
            issuer().verify(&token, TokenKind::Access),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = issuer();
        let now = Utc::now().timestamp();
        let token = issuer
            .sign_with_times(TokenKind::Access, "acct-1", now - 120, now - 60)
            .unwrap();

        assert!(matches!(
            issuer.verify(&token, TokenKind::Access),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_malformed_token_rejected() {
        assert!(matches!(
            issuer().verify("not.a.jwt", TokenKind::Access),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_out_of_range_lifetime_is_an_error() {
        for ttl in [u64::MAX, i64::MAX as u64] {
            let mut config = test_config().tokens;
            config.access_ttl_seconds = ttl;
            let issuer = TokenIssuer::new(&config);
            assert!(matches!(
                issuer.issue_access_token("acct-1"),
                Err(TokenError::Lifetime(t)) if t == ttl
            ));
        }
    }

    #[test]
    fn test_pairs_are_unique() {
        let issuer = issuer();
        let first = issuer.issue_pair("acct-1").unwrap();
        let second = issuer.issue_pair("acct-1").unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);
        assert_ne!(first.access_token, second.access_token);
    }
}
