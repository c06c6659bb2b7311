//! Getting the produced file to the user.
//!
//! Small files go straight into the chat as attachments. Files above the
//! platform limit are posted to an upload endpoint (tmpfiles.org compatible)
//! and the user gets a link instead.

use reqwest::multipart::{Form, Part};
use reqwest::{Body, StatusCode};
use serde::Deserialize;
use std::path::Path;
use tokio_util::io::ReaderStream;

use crate::core::config;
use crate::core::error::{AppError, AppResult};

/// How a file of a given size should reach the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMethod {
    Attachment,
    UploadLink,
}

pub fn choose_delivery(file_size: u64, max_attachment_bytes: u64) -> DeliveryMethod {
    if file_size > max_attachment_bytes {
        DeliveryMethod::UploadLink
    } else {
        DeliveryMethod::Attachment
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    status: String,
    data: Option<UploadData>,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    url: String,
}

/// Multipart upload endpoint.
#[derive(Debug, Clone)]
pub struct UploadSink {
    client: reqwest::Client,
    endpoint: String,
}

impl UploadSink {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn from_config() -> AppResult<Self> {
        let client = reqwest::Client::builder().timeout(config::network::timeout()).build()?;
        Ok(Self::new(client, config::UPLOAD_URL.as_str()))
    }

    fn host(&self) -> String {
        url::Url::parse(&self.endpoint)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.endpoint.clone())
    }

    /// Uploads `path` and returns the public URL.
    ///
    /// The file is streamed from disk, never buffered whole.
    pub async fn upload(&self, path: &Path) -> AppResult<String> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());
        let file = tokio::fs::File::open(path).await?;
        let length = file.metadata().await?.len();
        log::info!("Uploading {} ({} bytes) to {}", file_name, length, self.endpoint);

        let body = Body::wrap_stream(ReaderStream::new(file));
        let form = Form::new().part("file", Part::stream_with_length(body, length).file_name(file_name));
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                log::error!("Upload request to {} failed: {}", self.endpoint, e);
                AppError::UploadFailed(format!("Couldn't reach `{}`", self.host()))
            })?;

        if response.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Err(AppError::UploadTooLarge);
        }

        let status = response.status();
        let body = response.text().await?;
        let parsed: UploadResponse = serde_json::from_str(&body).map_err(|e| {
            log::warn!("Upload endpoint answered {} with unparseable body ({}): {}", status, e, body);
            AppError::UploadFailed(format!("Weird response from `{}`", self.host()))
        })?;

        match parsed {
            UploadResponse {
                status,
                data: Some(UploadData { url }),
            } if status == "success" => Ok(url),
            _ => Err(AppError::UploadFailed(format!("Couldn't upload to `{}`", self.host()))),
        }
    }
}
