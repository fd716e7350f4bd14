use crate::metrics_helper;
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::Deserialize;

const ENDPOINT: &str = "https://www.googleapis.com/drive/v3";
const UPLOAD_ENDPOINT: &str = "https://www.googleapis.com/upload/drive/v3";

#[derive(Debug)]
pub enum StoreError {
    Http(StatusCode),
    Network(reqwest_middleware::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Http(status) => write!(f, "HTTP {status}"),
            StoreError::Network(e) => write!(f, "Network error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
}

#[derive(Debug, Deserialize)]
struct FileRef {
    id: String,
}

/// Blob store client over the Drive v3 file API. Files are addressed by
/// name; callers resolve a name to a file id before downloading or
/// updating.
pub struct DriveClient {
    client: ClientWithMiddleware,
}

impl Default for DriveClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveClient {
    pub fn new() -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(2);
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self { client }
    }

    /// Resolve a filename to a file id, if the file exists and is not
    /// trashed. Returns the first match when several files share the name.
    pub async fn find_file(
        &self,
        access_token: &str,
        name: &str,
    ) -> Result<Option<String>, StoreError> {
        let path = format!("{ENDPOINT}/files");
        let query = format!("name = '{name}' and trashed = false");

        let response = self
            .client
            .get(path)
            .header("Authorization", format!("Bearer {access_token}"))
            .query(&[("q", query.as_str()), ("spaces", "drive"), ("fields", "files(id, name)")])
            .send()
            .await
            .map_err(|e| {
                metrics_helper::increment_drive_api_failure();
                StoreError::Network(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            metrics_helper::increment_drive_api_failure();
            return Err(StoreError::Http(status));
        }

        let listing = response.json::<FileList>().await.map_err(|e| {
            metrics_helper::increment_drive_api_failure();
            StoreError::Network(reqwest_middleware::Error::Reqwest(e))
        })?;

        metrics_helper::increment_drive_api_success();
        Ok(listing.files.into_iter().next().map(|f| f.id))
    }

    /// Download a file's content by id.
    pub async fn download(
        &self,
        access_token: &str,
        file_id: &str,
    ) -> Result<Vec<u8>, StoreError> {
        let path = format!("{ENDPOINT}/files/{file_id}");

        let response = self
            .client
            .get(path)
            .header("Authorization", format!("Bearer {access_token}"))
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| {
                metrics_helper::increment_drive_api_failure();
                StoreError::Network(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            metrics_helper::increment_drive_api_failure();
            return Err(StoreError::Http(status));
        }

        let body = response.bytes().await.map_err(|e| {
            metrics_helper::increment_drive_api_failure();
            StoreError::Network(reqwest_middleware::Error::Reqwest(e))
        })?;

        metrics_helper::increment_drive_api_success();
        Ok(body.to_vec())
    }

    /// Create an empty file with the given name and return its id. Content
    /// is written with a follow-up `upload` call.
    pub async fn create_file(
        &self,
        access_token: &str,
        name: &str,
    ) -> Result<String, StoreError> {
        let path = format!("{ENDPOINT}/files");

        let response = self
            .client
            .post(path)
            .header("Authorization", format!("Bearer {access_token}"))
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .map_err(|e| {
                metrics_helper::increment_drive_api_failure();
                StoreError::Network(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            metrics_helper::increment_drive_api_failure();
            return Err(StoreError::Http(status));
        }

        let created = response.json::<FileRef>().await.map_err(|e| {
            metrics_helper::increment_drive_api_failure();
            StoreError::Network(reqwest_middleware::Error::Reqwest(e))
        })?;

        metrics_helper::increment_drive_api_success();
        Ok(created.id)
    }

    /// Overwrite a file's content by id.
    pub async fn upload(
        &self,
        access_token: &str,
        file_id: &str,
        content: Vec<u8>,
    ) -> Result<(), StoreError> {
        let path = format!("{UPLOAD_ENDPOINT}/files/{file_id}");

        let response = self
            .client
            .patch(path)
            .header("Authorization", format!("Bearer {access_token}"))
            .header("Content-Type", "application/json")
            .query(&[("uploadType", "media")])
            .body(content)
            .send()
            .await
            .map_err(|e| {
                metrics_helper::increment_drive_api_failure();
                StoreError::Network(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            metrics_helper::increment_drive_api_failure();
            return Err(StoreError::Http(status));
        }

        metrics_helper::increment_drive_api_success();
        Ok(())
    }
}
