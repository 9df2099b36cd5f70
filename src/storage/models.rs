use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// URL of the avatar image in the media store
    pub avatar: String,
    /// URL of the cover image, if one was uploaded
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Lower-cased, unique
    pub email: String,
    pub full_name: String,
    /// Lower-cased, unique
    pub handle: String,
    /// UUID v4
    pub id: String,
    /// Argon2 PHC string, never the plaintext
    pub password_hash: String,
    /// The single refresh token currently accepted for this account
    pub refresh_token: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to persist a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub avatar: String,
    pub cover_image: Option<String>,
    pub email: String,
    pub full_name: String,
    pub handle: String,
    pub password_hash: String,
}

/// Account projection without the password hash and refresh token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedAccount {
    pub avatar: String,
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub email: String,
    pub full_name: String,
    pub id: String,
    pub updated_at: DateTime<Utc>,
    pub username: String,
}

impl From<&Account> for SanitizedAccount {
    fn from(account: &Account) -> Self {
        Self {
            avatar: account.avatar.clone(),
            cover_image: account.cover_image.clone(),
            created_at: account.created_at,
            email: account.email.clone(),
            full_name: account.full_name.clone(),
            id: account.id.clone(),
            updated_at: account.updated_at,
            username: account.handle.clone(),
        }
    }
}

impl From<Account> for SanitizedAccount {
    fn from(account: Account) -> Self {
        Self::from(&account)
    }
}

/// Subscription counts for a channel (an account viewed as a publisher)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub is_subscribed: bool,
    pub subscribed_to_count: u64,
    pub subscriber_count: u64,
}
