//! Channel pages: an account viewed as a publisher, with subscription counts.

use serde::Serialize;

use crate::auth::AuthError;
use crate::storage::models::Account;
use crate::storage::Database;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub avatar: String,
    pub channels_subscribed_to_count: u64,
    pub cover_image: Option<String>,
    pub email: String,
    pub full_name: String,
    pub id: String,
    pub is_subscribed: bool,
    pub subscribers_count: u64,
    pub username: String,
}

fn find_channel(db: &Database, handle: &str) -> Result<Account, AuthError> {
    if handle.trim().is_empty() {
        return Err(AuthError::validation("Username is missing"));
    }
    db.find_by_handle(handle)?
        .ok_or_else(|| AuthError::not_found("Channel does not exist"))
}

/// Public profile of the channel with the given handle, as seen by `viewer_id`.
pub fn channel_profile(
    db: &Database,
    handle: &str,
    viewer_id: Option<&str>,
) -> Result<ChannelProfile, AuthError> {
    let channel = find_channel(db, handle)?;
    let stats = db.channel_stats(&channel.id, viewer_id)?;

    Ok(ChannelProfile {
        avatar: channel.avatar,
        channels_subscribed_to_count: stats.subscribed_to_count,
        cover_image: channel.cover_image,
        email: channel.email,
        full_name: channel.full_name,
        id: channel.id,
        is_subscribed: stats.is_subscribed,
        subscribers_count: stats.subscriber_count,
        username: channel.handle,
    })
}

pub fn subscribe(db: &Database, viewer_id: &str, handle: &str) -> Result<ChannelProfile, AuthError> {
    let channel = find_channel(db, handle)?;
    if channel.id == viewer_id {
        return Err(AuthError::validation("Cannot subscribe to your own channel"));
    }
    if db.subscribe(viewer_id, &channel.id)? {
        tracing::debug!(subscriber = %viewer_id, channel = %channel.id, "Subscribed");
    }
    channel_profile(db, handle, Some(viewer_id))
}

pub fn unsubscribe(
    db: &Database,
    viewer_id: &str,
    handle: &str,
) -> Result<ChannelProfile, AuthError> {
    let channel = find_channel(db, handle)?;
    if db.unsubscribe(viewer_id, &channel.id)? {
        tracing::debug!(subscriber = %viewer_id, channel = %channel.id, "Unsubscribed");
    }
    channel_profile(db, handle, Some(viewer_id))
}
