//! Remote storage for profile images.
//!
//! Every call is a single attempt. Deletions of replaced assets go through
//! [`delete_best_effort`], which logs and swallows failures.

mod cloudinary;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use cloudinary::CloudinaryStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Upload is empty")]
    Empty,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Media provider rejected the request: {0}")]
    Provider(String),
    #[error("Not a media URL this store manages: {0}")]
    UnknownUrl(String),
}

/// A file received from a client, not yet stored
#[derive(Clone)]
pub struct MediaUpload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub file_name: String,
}

impl std::fmt::Debug for MediaUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaUpload")
            .field("bytes", &self.bytes.len())
            .field("content_type", &self.content_type)
            .field("file_name", &self.file_name)
            .finish()
    }
}

/// Where an upload ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub public_id: String,
    pub url: String,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store the file and return its public URL.
    async fn upload(&self, upload: MediaUpload) -> Result<StoredMedia, MediaError>;

    /// Remove a previously stored file by its public URL.
    async fn delete(&self, url: &str) -> Result<(), MediaError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Delete a stored asset, logging instead of failing.
pub async fn delete_best_effort(store: &dyn MediaStore, url: &str) {
    match store.delete(url).await {
        Ok(()) => tracing::debug!(url = %url, backend = store.name(), "Deleted media asset"),
        Err(e) => {
            tracing::warn!(error = %e, url = %url, backend = store.name(), "Failed to delete media asset")
        }
    }
}

/// Public id of an asset: the last URL path segment without its extension.
pub fn public_id_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    let segment = path.rsplit('/').next()?;
    let id = match segment.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => segment,
    };
    (!id.is_empty()).then_some(id)
}
