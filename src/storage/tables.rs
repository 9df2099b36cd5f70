use redb::TableDefinition;

/// Accounts: account_id -> Account (msgpack)
pub const ACCOUNTS: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");

/// Unique index: lower-cased handle -> account_id
pub const ACCOUNT_HANDLES: TableDefinition<&str, &str> = TableDefinition::new("account_handles");

/// Unique index: lower-cased email -> account_id
pub const ACCOUNT_EMAILS: TableDefinition<&str, &str> = TableDefinition::new("account_emails");

/// Secondary index: channel account_id -> Vec<subscriber account_id> (msgpack)
pub const CHANNEL_SUBSCRIBERS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("channel_subscribers");

/// Secondary index: subscriber account_id -> Vec<channel account_id> (msgpack)
pub const ACCOUNT_SUBSCRIPTIONS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("account_subscriptions");
