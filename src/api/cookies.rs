//! Auth cookies and bearer header parsing.

use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};

use crate::tokens::{TokenIssuer, TokenKind, TokenPair};

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Build an `HttpOnly` cookie. `max_age` of zero expires it immediately.
pub fn build_cookie(name: &str, value: &str, max_age: u64, secure: bool) -> Option<HeaderValue> {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).ok()
}

/// `Set-Cookie` headers carrying both tokens of a pair.
pub fn token_cookies(issuer: &TokenIssuer, tokens: &TokenPair, secure: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let cookies = [
        (
            ACCESS_TOKEN_COOKIE,
            tokens.access_token.as_str(),
            issuer.ttl_seconds(TokenKind::Access),
        ),
        (
            REFRESH_TOKEN_COOKIE,
            tokens.refresh_token.as_str(),
            issuer.ttl_seconds(TokenKind::Refresh),
        ),
    ];
    for (name, value, ttl) in cookies {
        if let Some(cookie) = build_cookie(name, value, ttl, secure) {
            headers.append(SET_COOKIE, cookie);
        }
    }
    headers
}

/// `Set-Cookie` headers expiring both auth cookies.
pub fn clear_token_cookies(secure: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
        if let Some(cookie) = build_cookie(name, "", 0, secure) {
            headers.append(SET_COOKIE, cookie);
        }
    }
    headers
}

/// Read a cookie value from the request's `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
