use redb::{ReadableTable, Table};

use super::db::{decode_ids, encode_ids, Database, DatabaseError};
use super::models::ChannelStats;
use super::tables::*;

impl Database {
    // ========================================================================
    // Subscription operations
    // ========================================================================

    /// Record that `subscriber_id` follows `channel_id`.
    ///
    /// Returns false if the subscription already existed.
    pub fn subscribe(&self, subscriber_id: &str, channel_id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let added = {
            let mut subscribers = write_txn.open_table(CHANNEL_SUBSCRIBERS)?;
            let added = add_to_index(&mut subscribers, channel_id, subscriber_id)?;

            let mut subscriptions = write_txn.open_table(ACCOUNT_SUBSCRIPTIONS)?;
            add_to_index(&mut subscriptions, subscriber_id, channel_id)?;
            added
        };
        write_txn.commit()?;
        Ok(added)
    }

    /// Remove a subscription. Returns false if there was none.
    pub fn unsubscribe(&self, subscriber_id: &str, channel_id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let removed = {
            let mut subscribers = write_txn.open_table(CHANNEL_SUBSCRIBERS)?;
            let removed = remove_from_index(&mut subscribers, channel_id, subscriber_id)?;

            let mut subscriptions = write_txn.open_table(ACCOUNT_SUBSCRIPTIONS)?;
            remove_from_index(&mut subscriptions, subscriber_id, channel_id)?;
            removed
        };
        write_txn.commit()?;
        Ok(removed)
    }

    /// Subscriber and subscription counts for a channel, as seen by `viewer_id`.
    pub fn channel_stats(
        &self,
        channel_id: &str,
        viewer_id: Option<&str>,
    ) -> Result<ChannelStats, DatabaseError> {
        let read_txn = self.begin_read()?;
        let subscribers_table = read_txn.open_table(CHANNEL_SUBSCRIBERS)?;
        let subscriptions_table = read_txn.open_table(ACCOUNT_SUBSCRIPTIONS)?;

        let subscribers: Vec<String> = match subscribers_table.get(channel_id)? {
            Some(data) => decode_ids(data.value())?,
            None => Vec::new(),
        };
        let subscribed_to: usize = match subscriptions_table.get(channel_id)? {
            Some(data) => decode_ids(data.value())?.len(),
            None => 0,
        };

        Ok(ChannelStats {
            is_subscribed: viewer_id.is_some_and(|v| subscribers.iter().any(|s| s == v)),
            subscribed_to_count: subscribed_to as u64,
            subscriber_count: subscribers.len() as u64,
        })
    }
}

fn add_to_index(
    table: &mut Table<'_, &'static str, &'static [u8]>,
    key: &str,
    member: &str,
) -> Result<bool, DatabaseError> {
    let mut ids: Vec<String> = match table.get(key)? {
        Some(data) => decode_ids(data.value())?,
        None => Vec::new(),
    };
    if ids.iter().any(|id| id == member) {
        return Ok(false);
    }
    ids.push(member.to_string());
    let data = encode_ids(&ids)?;
    table.insert(key, data.as_slice())?;
    Ok(true)
}

fn remove_from_index(
    table: &mut Table<'_, &'static str, &'static [u8]>,
    key: &str,
    member: &str,
) -> Result<bool, DatabaseError> {
    let mut ids: Vec<String> = match table.get(key)? {
        Some(data) => decode_ids(data.value())?,
        None => return Ok(false),
    };
    let before = ids.len();
    ids.retain(|id| id != member);
    if ids.len() == before {
        return Ok(false);
    }
    if ids.is_empty() {
        table.remove(key)?;
    } else {
        let data = encode_ids(&ids)?;
        table.insert(key, data.as_slice())?;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use crate::testutil::setup_db;

    #[test]
    fn test_subscribe_is_idempotent() {
        let (db, _temp) = setup_db();

        assert!(db.subscribe("viewer", "channel").unwrap());
        assert!(!db.subscribe("viewer", "channel").unwrap());

        let stats = db.channel_stats("channel", Some("viewer")).unwrap();
        assert_eq!(stats.subscriber_count, 1);
        assert!(stats.is_subscribed);
    }

    #[test]
    fn test_channel_stats_counts_both_directions() {
        let (db, _temp) = setup_db();

        db.subscribe("a", "channel").unwrap();
        db.subscribe("b", "channel").unwrap();
        db.subscribe("channel", "a").unwrap();

        let stats = db.channel_stats("channel", Some("c")).unwrap();
        assert_eq!(stats.subscriber_count, 2);
        assert_eq!(stats.subscribed_to_count, 1);
        assert!(!stats.is_subscribed);

        let anonymous = db.channel_stats("channel", None).unwrap();
        assert!(!anonymous.is_subscribed);
    }

    #[test]
    fn test_unsubscribe() {
        let (db, _temp) = setup_db();

        db.subscribe("a", "channel").unwrap();
        assert!(db.unsubscribe("a", "channel").unwrap());
        assert!(!db.unsubscribe("a", "channel").unwrap());

        let stats = db.channel_stats("channel", Some("a")).unwrap();
        assert_eq!(stats.subscriber_count, 0);
        assert_eq!(db.channel_stats("a", None).unwrap().subscribed_to_count, 0);
    }
}
