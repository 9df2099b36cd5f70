use chrono::Utc;
use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::{Account, NewAccount};
use super::tables::*;

impl Database {
    // ========================================================================
    // Account operations
    // ========================================================================

    /// Persist a new account. Fails with `DuplicateIdentity` when the handle or
    /// email is already indexed; the check and the insert share one transaction.
    pub fn create_account(&self, new: NewAccount) -> Result<Account, DatabaseError> {
        let handle = new.handle.trim().to_lowercase();
        let email = new.email.trim().to_lowercase();
        debug_assert!(!handle.is_empty(), "account handle must not be empty");
        debug_assert!(!email.is_empty(), "account email must not be empty");
        debug_assert!(!new.avatar.is_empty(), "account avatar must not be empty");

        let now = Utc::now();
        let account = Account {
            avatar: new.avatar,
            cover_image: new.cover_image.filter(|c| !c.is_empty()),
            created_at: now,
            email,
            full_name: new.full_name.trim().to_string(),
            handle,
            id: uuid::Uuid::new_v4().to_string(),
            password_hash: new.password_hash,
            refresh_token: None,
            updated_at: now,
        };

        let write_txn = self.begin_write()?;
        {
            let mut handles = write_txn.open_table(ACCOUNT_HANDLES)?;
            let mut emails = write_txn.open_table(ACCOUNT_EMAILS)?;
            if handles.get(account.handle.as_str())?.is_some()
                || emails.get(account.email.as_str())?.is_some()
            {
                return Err(DatabaseError::DuplicateIdentity);
            }
            handles.insert(account.handle.as_str(), account.id.as_str())?;
            emails.insert(account.email.as_str(), account.id.as_str())?;

            let mut table = write_txn.open_table(ACCOUNTS)?;
            let data = rmp_serde::to_vec_named(&account)?;
            table.insert(account.id.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(account)
    }

    /// Get an account by its id
    pub fn get_account(&self, id: &str) -> Result<Option<Account>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS)?;

        match table.get(id)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Get an account by its handle (case-insensitive)
    pub fn find_by_handle(&self, handle: &str) -> Result<Option<Account>, DatabaseError> {
        self.find_by_handle_or_email(Some(handle), None)
    }

    /// Find the account matching either the handle or the email. Both are
    /// compared case-insensitively; a handle match wins when both resolve.
    pub fn find_by_handle_or_email(
        &self,
        handle: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Account>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let handles = read_txn.open_table(ACCOUNT_HANDLES)?;
        let emails = read_txn.open_table(ACCOUNT_EMAILS)?;

        let mut id = None;
        if let Some(h) = normalized(handle) {
            id = handles.get(h.as_str())?.map(|v| v.value().to_string());
        }
        if id.is_none() {
            if let Some(e) = normalized(email) {
                id = emails.get(e.as_str())?.map(|v| v.value().to_string());
            }
        }

        let Some(id) = id else {
            return Ok(None);
        };

        let table = read_txn.open_table(ACCOUNTS)?;
        match table.get(id.as_str())? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Apply `f` to the stored account and write it back in one transaction.
    ///
    /// Returns the updated account together with whatever `f` returned, or
    /// `None` when the account does not exist. `updated_at` is bumped.
    pub fn update_account<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Account) -> R,
    ) -> Result<Option<(Account, R)>, DatabaseError> {
        let write_txn = self.begin_write()?;
        let result = {
            let mut table = write_txn.open_table(ACCOUNTS)?;
            let existing: Option<Account> = match table.get(id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            match existing {
                Some(mut account) => {
                    let out = f(&mut account);
                    account.updated_at = Utc::now();
                    let data = rmp_serde::to_vec_named(&account)?;
                    table.insert(id, data.as_slice())?;
                    Some((account, out))
                }
                None => None,
            }
        };
        write_txn.commit()?;
        Ok(result)
    }

    /// Unconditionally overwrite (or clear) the stored refresh token.
    ///
    /// Returns false when the account does not exist.
    pub fn set_refresh_token(&self, id: &str, token: Option<&str>) -> Result<bool, DatabaseError> {
        let updated = self.update_account(id, |account| {
            account.refresh_token = token.map(str::to_string);
        })?;
        Ok(updated.is_some())
    }

    /// Replace the stored refresh token only if it still equals `expected`.
    ///
    /// Returns false when the account is gone or holds a different token, in
    /// which case nothing is written.
    pub fn swap_refresh_token(
        &self,
        id: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let swapped = {
            let mut table = write_txn.open_table(ACCOUNTS)?;
            let existing: Option<Account> = match table.get(id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            match existing {
                Some(mut account) if account.refresh_token.as_deref() == Some(expected) => {
                    account.refresh_token = Some(new.to_string());
                    account.updated_at = Utc::now();
                    let data = rmp_serde::to_vec_named(&account)?;
                    table.insert(id, data.as_slice())?;
                    true
                }
                _ => false,
            }
        };
        write_txn.commit()?;
        Ok(swapped)
    }

    /// Store a new password hash
    pub fn update_password_hash(&self, id: &str, password_hash: &str) -> Result<bool, DatabaseError> {
        let updated = self.update_account(id, |account| {
            account.password_hash = password_hash.to_string();
        })?;
        Ok(updated.is_some())
    }

    /// Change display name and email, keeping the email index unique.
    pub fn update_details(
        &self,
        id: &str,
        full_name: &str,
        email: &str,
    ) -> Result<Option<Account>, DatabaseError> {
        let email = email.trim().to_lowercase();

        let write_txn = self.begin_write()?;
        let result = {
            let mut table = write_txn.open_table(ACCOUNTS)?;
            let existing: Option<Account> = match table.get(id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };

            match existing {
                Some(mut account) => {
                    if account.email != email {
                        let mut emails = write_txn.open_table(ACCOUNT_EMAILS)?;
                        let owner = emails.get(email.as_str())?.map(|v| v.value().to_string());
                        if owner.is_some_and(|owner| owner != account.id) {
                            return Err(DatabaseError::DuplicateIdentity);
                        }
                        emails.remove(account.email.as_str())?;
                        emails.insert(email.as_str(), account.id.as_str())?;
                        account.email = email;
                    }
                    account.full_name = full_name.trim().to_string();
                    account.updated_at = Utc::now();

                    let data = rmp_serde::to_vec_named(&account)?;
                    table.insert(id, data.as_slice())?;
                    Some(account)
                }
                None => None,
            }
        };
        write_txn.commit()?;
        Ok(result)
    }

    /// Point the avatar at a new URL, returning the updated account and the
    /// previous avatar URL.
    pub fn update_avatar(
        &self,
        id: &str,
        url: &str,
    ) -> Result<Option<(Account, String)>, DatabaseError> {
        self.update_account(id, |account| {
            std::mem::replace(&mut account.avatar, url.to_string())
        })
    }

    /// Point the cover image at a new URL, returning the updated account and
    /// the previous cover image URL, if there was one.
    pub fn update_cover_image(
        &self,
        id: &str,
        url: &str,
    ) -> Result<Option<(Account, Option<String>)>, DatabaseError> {
        self.update_account(id, |account| account.cover_image.replace(url.to_string()))
    }
}

fn normalized(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}
