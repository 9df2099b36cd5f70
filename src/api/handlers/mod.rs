mod accounts;
mod channels;
mod health;

use axum::extract::multipart::{Multipart, MultipartRejection};
use std::collections::HashMap;

use crate::api::response::ApiError;
use crate::auth::{self, AuthError};
use crate::media::MediaUpload;

pub use accounts::{
    change_password, current_user, login, logout, refresh_token, register, update_account,
    update_avatar, update_cover_image,
};
pub use channels::{channel_profile, subscribe, unsubscribe};
pub use health::health;

/// Text fields and file parts of a multipart request.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, MediaUpload>,
}

impl MultipartForm {
    /// First non-empty text field among `names`, or an empty string.
    pub fn text(&self, names: &[&str]) -> String {
        names
            .iter()
            .filter_map(|name| self.fields.get(*name))
            .find(|value| !value.is_empty())
            .cloned()
            .unwrap_or_default()
    }

    pub fn take_file(&mut self, names: &[&str]) -> Option<MediaUpload> {
        names.iter().find_map(|name| self.files.remove(*name))
    }
}

/// Drain a multipart body. Parts with a file name are files (empty files are
/// dropped); everything else is a text field.
async fn read_multipart(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<MultipartForm, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let mut form = MultipartForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                if bytes.is_empty() {
                    continue;
                }
                form.files.insert(
                    name,
                    MediaUpload {
                        bytes: bytes.to_vec(),
                        content_type,
                        file_name,
                    },
                );
            }
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                form.fields.insert(name, value);
            }
        }
    }

    Ok(form)
}

/// Run a synchronous service call (store access, password hashing) off the
/// async executor. Every handler that touches the store goes through here.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    auth::run_blocking(f).await.map_err(ApiError::from)
}
