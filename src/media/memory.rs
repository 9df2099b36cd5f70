use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{public_id_from_url, MediaError, MediaStore, MediaUpload, StoredMedia};

const URL_PREFIX: &str = "memory://media/";

/// Process-local media store used when no cloud provider is configured.
#[derive(Default)]
pub struct MemoryStore {
    files: RwLock<HashMap<String, MediaUpload>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, url: &str) -> bool {
        match url.strip_prefix(URL_PREFIX) {
            Some(id) => self.files.read().await.contains_key(id),
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

#[async_trait]
impl MediaStore for MemoryStore {
    async fn upload(&self, upload: MediaUpload) -> Result<StoredMedia, MediaError> {
        if upload.bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        let public_id = uuid::Uuid::new_v4().simple().to_string();
        self.files.write().await.insert(public_id.clone(), upload);
        Ok(StoredMedia {
            url: format!("{URL_PREFIX}{public_id}"),
            public_id,
        })
    }

    async fn delete(&self, url: &str) -> Result<(), MediaError> {
        if !url.starts_with(URL_PREFIX) {
            return Err(MediaError::UnknownUrl(url.to_string()));
        }
        let id = public_id_from_url(url).ok_or_else(|| MediaError::UnknownUrl(url.to_string()))?;
        match self.files.write().await.remove(id) {
            Some(_) => Ok(()),
            None => Err(MediaError::UnknownUrl(url.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
