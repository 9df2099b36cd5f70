use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;

use super::{public_id_from_url, MediaError, MediaStore, MediaUpload, StoredMedia};
use crate::config::CloudinaryConfig;

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Signed uploads to Cloudinary's REST API.
pub struct CloudinaryStore {
    api_base: String,
    client: reqwest::Client,
    config: CloudinaryConfig,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            api_base: API_BASE.to_string(),
            client,
            config,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/{}", self.api_base, self.config.cloud_name, path)
    }

    /// Sign the given parameters: sorted `key=value` pairs joined with `&`,
    /// followed by the API secret, hashed with SHA-256.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted = params.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let joined = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        hasher.update(self.config.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    async fn provider_error(response: reqwest::Response) -> MediaError {
        let status = response.status();
        match response.json::<ErrorResponse>().await {
            Ok(body) => MediaError::Provider(format!("{status}: {}", body.error.message)),
            Err(_) => MediaError::Provider(status.to_string()),
        }
    }
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    async fn upload(&self, upload: MediaUpload) -> Result<StoredMedia, MediaError> {
        if upload.bytes.is_empty() {
            return Err(MediaError::Empty);
        }

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[("timestamp", timestamp.as_str())]);

        let mut part = Part::bytes(upload.bytes).file_name(upload.file_name);
        if let Some(content_type) = upload.content_type.as_deref() {
            part = part.mime_str(content_type)?;
        }
        let form = Form::new()
            .part("file", part)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let response = self
            .client
            .post(self.endpoint("auto/upload"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }

        let body: UploadResponse = response.json().await?;
        tracing::debug!(public_id = %body.public_id, "Uploaded file to Cloudinary");
        Ok(StoredMedia {
            public_id: body.public_id,
            url: body.secure_url,
        })
    }

    async fn delete(&self, url: &str) -> Result<(), MediaError> {
        let public_id =
            public_id_from_url(url).ok_or_else(|| MediaError::UnknownUrl(url.to_string()))?;

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[("public_id", public_id), ("timestamp", timestamp.as_str())]);

        let params = [
            ("api_key", self.config.api_key.as_str()),
            ("public_id", public_id),
            ("signature", signature.as_str()),
            ("signature_algorithm", "sha256"),
            ("timestamp", timestamp.as_str()),
        ];
        let response = self
            .client
            .post(self.endpoint("image/destroy"))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }

        let body: DestroyResponse = response.json().await?;
        if body.result != "ok" {
            return Err(MediaError::Provider(format!(
                "destroy {public_id}: {}",
                body.result
            )));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "cloudinary"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CloudinaryStore {
        CloudinaryStore::new(CloudinaryConfig {
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            cloud_name: "demo".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_signature_sorts_params() {
        let store = store();
        let a = store.sign(&[("timestamp", "1"), ("public_id", "abc")]);
        let b = store.sign(&[("public_id", "abc"), ("timestamp", "1")]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let mut hasher = Sha256::new();
        hasher.update(b"public_id=abc&timestamp=1secret");
        assert_eq!(a, hex::encode(hasher.finalize()));
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            store().endpoint("image/destroy"),
            "https://api.cloudinary.com/v1_1/demo/image/destroy"
        );
    }

    #[tokio::test]
    async fn test_empty_upload_rejected_locally() {
        let upload = MediaUpload {
            bytes: Vec::new(),
            content_type: None,
            file_name: "empty.png".to_string(),
        };
        assert!(matches!(store().upload(upload).await, Err(MediaError::Empty)));
    }
}
