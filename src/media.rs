use async_trait::async_trait;
use serde::Deserialize;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// Media host collaborator: raw image bytes in, durable URL out. The core
/// never stores image bytes itself.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> AppResult<String>;
}

/// Uploads to an HTTP media host via multipart form and reads the durable
/// URL out of the JSON response.
pub struct HttpMediaStore {
    client: reqwest::Client,
    upload_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

impl HttpMediaStore {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            upload_url: config.media_upload_url.clone(),
            api_key: config.media_api_key.clone(),
        })
    }
}

#[async_trait]
impl MediaStore for HttpMediaStore {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> AppResult<String> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("image", part);

        let mut request = self.client.post(&self.upload_url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| AppError::Internal(anyhow::anyhow!("media upload failed: {err}")))?;

        if !response.status().is_success() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "media host returned HTTP {}",
                response.status()
            )));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|err| AppError::Internal(anyhow::anyhow!("media upload failed: {err}")))?;

        Ok(body.url)
    }
}
