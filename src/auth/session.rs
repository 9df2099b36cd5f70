//! Session service: the only writer of an account's refresh token.
//!
//! Per account the stored refresh token moves `absent -> active(T1)` on login,
//! `active(T1) -> active(T2)` on refresh and back to `absent` on logout. A
//! refresh presenting anything but the current value is rejected without a
//! state change.

use crate::media::{delete_best_effort, MediaStore, MediaUpload};
use crate::storage::models::{NewAccount, SanitizedAccount};
use crate::storage::Database;
use crate::tokens::{TokenIssuer, TokenKind, TokenPair};

use super::password::{hash_password, verify_password};
use super::{run_blocking, AuthError};

/// Registration fields as submitted by the client.
#[derive(Debug, Clone, Default)]
pub struct RegisterInput {
    /// Media store URL of the uploaded avatar
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub email: String,
    pub full_name: String,
    pub handle: String,
    pub password: String,
}

/// Registration fields plus the raw files still to be uploaded.
#[derive(Debug, Default)]
pub struct RegisterForm {
    pub avatar: Option<MediaUpload>,
    pub cover_image: Option<MediaUpload>,
    pub email: String,
    pub full_name: String,
    pub handle: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub account: SanitizedAccount,
    pub tokens: TokenPair,
}

/// Validate required fields and reject already-taken identities.
///
/// Runs before any upload so a doomed registration never touches the media store.
pub fn check_registration(
    db: &Database,
    handle: &str,
    email: &str,
    full_name: &str,
    password: &str,
) -> Result<(), AuthError> {
    if [handle, email, full_name, password]
        .iter()
        .any(|field| field.trim().is_empty())
    {
        return Err(AuthError::validation("All fields are required"));
    }

    if db
        .find_by_handle_or_email(Some(handle), Some(email))?
        .is_some()
    {
        return Err(AuthError::DuplicateIdentity);
    }
    Ok(())
}

/// Create an account. The avatar must already be resolved to a media URL.
pub fn register(db: &Database, input: RegisterInput) -> Result<SanitizedAccount, AuthError> {
    check_registration(
        db,
        &input.handle,
        &input.email,
        &input.full_name,
        &input.password,
    )?;

    let avatar = input
        .avatar
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| AuthError::missing_asset("Avatar file is required"))?;

    let password_hash = hash_password(&input.password)?;
    let account = db.create_account(NewAccount {
        avatar,
        cover_image: input.cover_image,
        email: input.email,
        full_name: input.full_name,
        handle: input.handle,
        password_hash,
    })?;

    tracing::debug!(account_id = %account.id, handle = %account.handle, "Registered account");
    Ok(SanitizedAccount::from(account))
}

/// Upload the registration media, then create the account.
///
/// Uploaded assets are removed again (best-effort) if the account cannot be
/// created. Store access runs on the blocking pool.
pub async fn register_with_uploads(
    db: &Database,
    media: &dyn MediaStore,
    form: RegisterForm,
) -> Result<SanitizedAccount, AuthError> {
    let RegisterForm {
        avatar,
        cover_image,
        email,
        full_name,
        handle,
        password,
    } = form;

    let input = RegisterInput {
        avatar: None,
        cover_image: None,
        email,
        full_name,
        handle,
        password,
    };
    let input = {
        let db = db.clone();
        run_blocking(move || {
            check_registration(
                &db,
                &input.handle,
                &input.email,
                &input.full_name,
                &input.password,
            )?;
            Ok(input)
        })
        .await?
    };

    let avatar_upload = avatar.ok_or_else(|| AuthError::missing_asset("Avatar file is required"))?;
    let avatar = media.upload(avatar_upload).await.map_err(|e| {
        tracing::warn!(error = %e, "Avatar upload failed");
        AuthError::missing_asset("Avatar is required")
    })?;
    tracing::debug!(public_id = %avatar.public_id, "Stored avatar");

    // A failed cover upload leaves the account without a cover image.
    let cover_image = match cover_image {
        Some(upload) => match media.upload(upload).await {
            Ok(stored) => {
                tracing::debug!(public_id = %stored.public_id, "Stored cover image");
                Some(stored.url)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cover image upload failed");
                None
            }
        },
        None => None,
    };

    let input = RegisterInput {
        avatar: Some(avatar.url.clone()),
        cover_image: cover_image.clone(),
        ..input
    };
    let db = db.clone();
    let result = run_blocking(move || register(&db, input)).await;

    if result.is_err() {
        delete_best_effort(media, &avatar.url).await;
        if let Some(url) = &cover_image {
            delete_best_effort(media, url).await;
        }
    }
    result
}

/// Verify credentials and start a session.
///
/// The new refresh token overwrites whatever was stored, so any previously
/// issued refresh token stops working.
pub fn login(
    db: &Database,
    issuer: &TokenIssuer,
    identifier: Option<&str>,
    password: Option<&str>,
) -> Result<LoginOutcome, AuthError> {
    let identifier = identifier.map(str::trim).filter(|s| !s.is_empty());
    let password = password.filter(|s| !s.is_empty());
    let (Some(identifier), Some(password)) = (identifier, password) else {
        return Err(AuthError::validation("Username or email and password are required"));
    };

    let account = db
        .find_by_handle_or_email(Some(identifier), Some(identifier))?
        .ok_or_else(|| AuthError::not_found("User does not exist"))?;

    if !verify_password(&account.password_hash, password) {
        return Err(AuthError::InvalidCredentials);
    }

    let tokens = issuer.issue_pair(&account.id)?;
    if !db.set_refresh_token(&account.id, Some(&tokens.refresh_token))? {
        return Err(AuthError::not_found("User does not exist"));
    }

    tracing::debug!(account_id = %account.id, "Logged in");
    Ok(LoginOutcome {
        account: SanitizedAccount::from(account),
        tokens,
    })
}

/// Clear the stored refresh token. Safe to call repeatedly.
pub fn logout(db: &Database, account_id: &str) -> Result<(), AuthError> {
    if db.set_refresh_token(account_id, None)? {
        tracing::debug!(account_id = %account_id, "Logged out");
    }
    Ok(())
}

/// Exchange the current refresh token for a new pair, rotating the stored token.
pub fn refresh(
    db: &Database,
    issuer: &TokenIssuer,
    presented: Option<&str>,
) -> Result<TokenPair, AuthError> {
    let presented = presented
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::Unauthorized)?;

    let claims = issuer.verify(presented, TokenKind::Refresh)?;

    let account = db
        .get_account(&claims.sub)?
        .ok_or_else(|| AuthError::not_found("Invalid refresh token"))?;

    match account.refresh_token.as_deref() {
        None => return Err(AuthError::not_found("No active session")),
        Some(current) if current != presented => {
            tracing::warn!(account_id = %account.id, "Superseded refresh token presented");
            return Err(AuthError::TokenReuse);
        }
        Some(_) => {}
    }

    let tokens = issuer.issue_pair(&account.id)?;
    // Lost the race against a concurrent refresh or logout.
    if !db.swap_refresh_token(&account.id, presented, &tokens.refresh_token)? {
        tracing::warn!(account_id = %account.id, "Refresh token rotated concurrently");
        return Err(AuthError::TokenReuse);
    }

    tracing::debug!(account_id = %account.id, "Rotated refresh token");
    Ok(tokens)
}

/// Replace the password after checking the old one. Issued tokens stay valid.
pub fn change_password(
    db: &Database,
    account_id: &str,
    old_password: &str,
    new_password: &str,
) -> Result<(), AuthError> {
    if old_password.is_empty() || new_password.trim().is_empty() {
        return Err(AuthError::validation("Old and new password are required"));
    }

    let account = db
        .get_account(account_id)?
        .ok_or_else(|| AuthError::not_found("User does not exist"))?;

    if !verify_password(&account.password_hash, old_password) {
        return Err(AuthError::InvalidCredentials);
    }

    let password_hash = hash_password(new_password)?;
    if !db.update_password_hash(account_id, &password_hash)? {
        return Err(AuthError::not_found("User does not exist"));
    }

    tracing::debug!(account_id = %account_id, "Password changed");
    Ok(())
}

/// Change the display name and email of an account.
pub fn update_details(
    db: &Database,
    account_id: &str,
    full_name: &str,
    email: &str,
) -> Result<SanitizedAccount, AuthError> {
    if full_name.trim().is_empty() || email.trim().is_empty() {
        return Err(AuthError::validation("Full name and email are required"));
    }

    db.update_details(account_id, full_name, email)?
        .map(SanitizedAccount::from)
        .ok_or_else(|| AuthError::not_found("User does not exist"))
}

/// Which profile image a replacement targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileImage {
    Avatar,
    /// Replacing the cover deletes the previous cover, never the current
    /// avatar.
    CoverImage,
}

/// Upload a new avatar or cover image, store its URL and then drop the
/// previous image of the same kind from the media store.
pub async fn replace_profile_image(
    db: &Database,
    media: &dyn MediaStore,
    account_id: &str,
    kind: ProfileImage,
    upload: Option<MediaUpload>,
) -> Result<SanitizedAccount, AuthError> {
    let upload = upload.ok_or_else(|| match kind {
        ProfileImage::Avatar => AuthError::missing_asset("Avatar file is missing"),
        ProfileImage::CoverImage => AuthError::missing_asset("Cover image file is missing"),
    })?;

    let stored = media.upload(upload).await.map_err(|e| {
        tracing::warn!(error = %e, ?kind, "Profile image upload failed");
        AuthError::missing_asset("Error while uploading file")
    })?;

    tracing::debug!(public_id = %stored.public_id, ?kind, "Stored profile image");

    let updated = {
        let db = db.clone();
        let account_id = account_id.to_string();
        let url = stored.url.clone();
        run_blocking(move || {
            let updated = match kind {
                ProfileImage::Avatar => db
                    .update_avatar(&account_id, &url)?
                    .map(|(account, previous)| (account, Some(previous))),
                ProfileImage::CoverImage => db.update_cover_image(&account_id, &url)?,
            };
            Ok(updated)
        })
        .await
    };

    let (account, previous) = match updated {
        Ok(Some(found)) => found,
        Ok(None) => {
            delete_best_effort(media, &stored.url).await;
            return Err(AuthError::not_found("User does not exist"));
        }
        Err(e) => {
            delete_best_effort(media, &stored.url).await;
            return Err(e);
        }
    };

    if let Some(previous) = previous.filter(|p| !p.is_empty() && *p != stored.url) {
        delete_best_effort(media, &previous).await;
    }

    tracing::debug!(account_id = %account_id, ?kind, "Replaced profile image");
    Ok(SanitizedAccount::from(account))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MemoryStore;
    use crate::testutil::{register_input, setup_db, test_issuer, upload};

    #[test]
    fn test_register_rejects_blank_fields() {
        let (db, _temp) = setup_db();

        for blank in ["handle", "email", "full_name", "password"] {
            let mut input = register_input("alice", "a@x.com", "p1");
            match blank {
                "handle" => input.handle = "   ".to_string(),
                "email" => input.email = String::new(),
                "full_name" => input.full_name = " ".to_string(),
                _ => input.password = "\t".to_string(),
            }
            let result = register(&db, input);
            assert!(matches!(result, Err(AuthError::Validation(_))), "{blank}");
        }
        assert!(db.find_by_handle("alice").unwrap().is_none());
    }

    #[test]
    fn test_register_requires_avatar() {
        let (db, _temp) = setup_db();
        let mut input = register_input("alice", "a@x.com", "p1");
        input.avatar = None;

        assert!(matches!(register(&db, input), Err(AuthError::MissingAsset(_))));
        assert!(db.find_by_handle("alice").unwrap().is_none());
    }

    #[test]
    fn test_register_hashes_password_and_lowercases_handle() {
        let (db, _temp) = setup_db();
        let account = register(&db, register_input("Alice", "a@x.com", "p1")).unwrap();
        assert_eq!(account.username, "alice");

        let stored = db.get_account(&account.id).unwrap().unwrap();
        assert_ne!(stored.password_hash, "p1");
        assert!(verify_password(&stored.password_hash, "p1"));
        assert!(stored.refresh_token.is_none());
    }

    #[test]
    fn test_register_duplicate_email_any_case() {
        let (db, _temp) = setup_db();
        register(&db, register_input("alice", "a@x.com", "p1")).unwrap();

        let result = register(&db, register_input("alice2", "A@X.COM", "p2"));
        assert!(matches!(result, Err(AuthError::DuplicateIdentity)));
        assert!(db.find_by_handle("alice2").unwrap().is_none());
    }

    #[test]
    fn test_login_validation_and_failures() {
        let (db, _temp) = setup_db();
        let issuer = test_issuer();
        register(&db, register_input("alice", "a@x.com", "p1")).unwrap();

        assert!(matches!(
            login(&db, &issuer, None, Some("p1")),
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            login(&db, &issuer, Some("alice"), None),
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            login(&db, &issuer, Some("bob"), Some("p1")),
            Err(AuthError::NotFound(_))
        ));
        assert!(matches!(
            login(&db, &issuer, Some("alice"), Some("wrong")),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_login_by_email_stores_refresh_token() {
        let (db, _temp) = setup_db();
        let issuer = test_issuer();
        register(&db, register_input("alice", "a@x.com", "p1")).unwrap();

        let outcome = login(&db, &issuer, Some("A@x.com"), Some("p1")).unwrap();
        let stored = db.get_account(&outcome.account.id).unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some(outcome.tokens.refresh_token.as_str()));
    }

    #[test]
    fn test_second_login_supersedes_first_session() {
        let (db, _temp) = setup_db();
        let issuer = test_issuer();
        register(&db, register_input("alice", "a@x.com", "p1")).unwrap();

        let first = login(&db, &issuer, Some("alice"), Some("p1")).unwrap();
        let second = login(&db, &issuer, Some("alice"), Some("p1")).unwrap();

        assert!(matches!(
            refresh(&db, &issuer, Some(&first.tokens.refresh_token)),
            Err(AuthError::TokenReuse)
        ));
        assert!(refresh(&db, &issuer, Some(&second.tokens.refresh_token)).is_ok());
    }

    #[test]
    fn test_refresh_rotates_and_rejects_superseded_token() {
        let (db, _temp) = setup_db();
        let issuer = test_issuer();
        register(&db, register_input("alice", "a@x.com", "p1")).unwrap();
        let outcome = login(&db, &issuer, Some("alice"), Some("p1")).unwrap();
        let original = outcome.tokens.refresh_token;

        let rotated = refresh(&db, &issuer, Some(&original)).unwrap();
        assert_ne!(rotated.refresh_token, original);
        let stored = db.get_account(&outcome.account.id).unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some(rotated.refresh_token.as_str()));

        assert!(matches!(
            refresh(&db, &issuer, Some(&original)),
            Err(AuthError::TokenReuse)
        ));
        // The rejected attempt did not disturb the active token
        assert!(refresh(&db, &issuer, Some(&rotated.refresh_token)).is_ok());
    }

    #[test]
    fn test_refresh_error_kinds() {
        let (db, _temp) = setup_db();
        let issuer = test_issuer();

        assert!(matches!(refresh(&db, &issuer, None), Err(AuthError::Unauthorized)));
        assert!(matches!(refresh(&db, &issuer, Some("  ")), Err(AuthError::Unauthorized)));
        assert!(matches!(
            refresh(&db, &issuer, Some("garbage")),
            Err(AuthError::InvalidToken)
        ));

        // An access token is not a refresh token
        let access = issuer.issue_access_token("acct").unwrap();
        assert!(matches!(
            refresh(&db, &issuer, Some(&access)),
            Err(AuthError::InvalidToken)
        ));

        let orphan = issuer.issue_refresh_token("no-such-account").unwrap();
        assert!(matches!(
            refresh(&db, &issuer, Some(&orphan)),
            Err(AuthError::NotFound(_))
        ));
    }

    #[test]
    fn test_logout_then_refresh_fails() {
        let (db, _temp) = setup_db();
        let issuer = test_issuer();
        register(&db, register_input("alice", "a@x.com", "p1")).unwrap();
        let outcome = login(&db, &issuer, Some("alice"), Some("p1")).unwrap();

        logout(&db, &outcome.account.id).unwrap();
        logout(&db, &outcome.account.id).unwrap();
        logout(&db, "unknown-account").unwrap();

        let stored = db.get_account(&outcome.account.id).unwrap().unwrap();
        assert!(stored.refresh_token.is_none());
        assert!(matches!(
            refresh(&db, &issuer, Some(&outcome.tokens.refresh_token)),
            Err(AuthError::NotFound(_))
        ));
    }

    #[test]
    fn test_change_password() {
        let (db, _temp) = setup_db();
        let issuer = test_issuer();
        let account = register(&db, register_input("alice", "a@x.com", "p1")).unwrap();

        assert!(matches!(
            change_password(&db, &account.id, "wrong", "p2"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            change_password(&db, &account.id, "p1", " "),
            Err(AuthError::Validation(_))
        ));
        change_password(&db, &account.id, "p1", "p2").unwrap();

        assert!(matches!(
            login(&db, &issuer, Some("alice"), Some("p1")),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(login(&db, &issuer, Some("alice"), Some("p2")).is_ok());
    }

    #[test]
    fn test_update_details() {
        let (db, _temp) = setup_db();
        let alice = register(&db, register_input("alice", "a@x.com", "p1")).unwrap();
        register(&db, register_input("bob", "b@x.com", "p1")).unwrap();

        assert!(matches!(
            update_details(&db, &alice.id, "Alice", ""),
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            update_details(&db, &alice.id, "Alice", "b@x.com"),
            Err(AuthError::DuplicateIdentity)
        ));
        let updated = update_details(&db, &alice.id, "Alice Liddell", "alice@x.com").unwrap();
        assert_eq!(updated.full_name, "Alice Liddell");
        assert_eq!(updated.email, "alice@x.com");
    }

    #[tokio::test]
    async fn test_register_with_uploads() {
        let (db, _temp) = setup_db();
        let media = MemoryStore::new();

        let form = RegisterForm {
            avatar: Some(upload("avatar", "me.png")),
            cover_image: Some(upload("coverImage", "banner.png")),
            email: "a@x.com".to_string(),
            full_name: "Alice".to_string(),
            handle: "alice".to_string(),
            password: "p1".to_string(),
        };
        let account = register_with_uploads(&db, &media, form).await.unwrap();

        assert!(media.contains(&account.avatar).await);
        assert!(media.contains(account.cover_image.as_deref().unwrap()).await);
        assert_eq!(media.len().await, 2);
    }

    #[tokio::test]
    async fn test_register_with_uploads_missing_avatar_uploads_nothing() {
        let (db, _temp) = setup_db();
        let media = MemoryStore::new();

        let form = RegisterForm {
            avatar: None,
            cover_image: Some(upload("coverImage", "banner.png")),
            email: "a@x.com".to_string(),
            full_name: "Alice".to_string(),
            handle: "alice".to_string(),
            password: "p1".to_string(),
        };
        let result = register_with_uploads(&db, &media, form).await;

        assert!(matches!(result, Err(AuthError::MissingAsset(_))));
        assert_eq!(media.len().await, 0);
        assert!(db.find_by_handle("alice").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_cover_image_deletes_previous_cover_only() {
        let (db, _temp) = setup_db();
        let media = MemoryStore::new();
        let form = RegisterForm {
            avatar: Some(upload("avatar", "me.png")),
            cover_image: Some(upload("coverImage", "banner.png")),
            email: "a@x.com".to_string(),
            full_name: "Alice".to_string(),
            handle: "alice".to_string(),
            password: "p1".to_string(),
        };
        let account = register_with_uploads(&db, &media, form).await.unwrap();
        let old_cover = account.cover_image.clone().unwrap();

        let updated = replace_profile_image(
            &db,
            &media,
            &account.id,
            ProfileImage::CoverImage,
            Some(upload("coverImage", "banner2.png")),
        )
        .await
        .unwrap();

        assert!(media.contains(&account.avatar).await);
        assert!(!media.contains(&old_cover).await);
        assert!(media.contains(updated.cover_image.as_deref().unwrap()).await);
        assert_eq!(updated.avatar, account.avatar);
    }

    #[tokio::test]
    async fn test_replace_avatar_requires_file() {
        let (db, _temp) = setup_db();
        let media = MemoryStore::new();
        let account = register(&db, register_input("alice", "a@x.com", "p1")).unwrap();

        let result =
            replace_profile_image(&db, &media, &account.id, ProfileImage::Avatar, None).await;
        assert!(matches!(result, Err(AuthError::MissingAsset(_))));
    }

    #[tokio::test]
    async fn test_replace_avatar_for_unknown_account_cleans_up_upload() {
        let (db, _temp) = setup_db();
        let media = MemoryStore::new();

        let result = replace_profile_image(
            &db,
            &media,
            "ghost",
            ProfileImage::Avatar,
            Some(upload("avatar", "me.png")),
        )
        .await;
        assert!(matches!(result, Err(AuthError::NotFound(_))));
        assert_eq!(media.len().await, 0);
    }
}
