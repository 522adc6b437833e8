use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::RemoteApiConfig;
use crate::error::{Result, VibeError};
use crate::video_id::VideoReference;
use super::{AcquisitionBackend, AcquisitionResult, recoverable, stream_to_file};

const NAME: &str = "remote-api";

/// Conversion API answer. Every field is optional upstream.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ConversionResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
}

/// Paid conversion service returning a direct mp3 link
pub struct RemoteApiBackend {
    config: RemoteApiConfig,
    client: Client,
}

impl RemoteApiBackend {
    pub fn new(config: RemoteApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| VibeError::acquisition(NAME, "API key not configured"))
    }

    async fn request_link(&self, api_key: &str, video_id: &str) -> Result<String> {
        let body = self
            .client
            .get(&self.config.endpoint)
            .query(&[("id", video_id)])
            .header("X-RapidAPI-Key", api_key)
            .header("X-RapidAPI-Host", &self.config.host)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        debug!("Conversion API answered {} bytes for {}", body.len(), video_id);
        parse_conversion_response(&body)
    }

    async fn try_fetch(&self, reference: &VideoReference, destination: &Path) -> Result<PathBuf> {
        let api_key = self.api_key()?;
        let link = self.request_link(api_key, reference.id()).await?;

        let response = self.client.get(&link).send().await?.error_for_status()?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        check_content_type(&content_type)?;

        let path = destination.with_extension("mp3");
        let written = stream_to_file(response, &path).await?;
        if written == 0 {
            return Err(VibeError::acquisition(NAME, "download link returned no data"));
        }

        info!("Downloaded {} bytes ({}) to {}", written, content_type, path.display());
        Ok(path)
    }
}

#[async_trait]
impl AcquisitionBackend for RemoteApiBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch(&self, reference: &VideoReference, destination: &Path) -> Result<AcquisitionResult> {
        info!("Requesting {} from the conversion API", reference.id());

        let path = self
            .try_fetch(reference, destination)
            .await
            .map_err(|e| recoverable(NAME, e))?;

        Ok(AcquisitionResult::file(NAME, path))
    }
}

/// Validate the conversion answer and return the download link
pub fn parse_conversion_response(body: &str) -> Result<String> {
    let response: ConversionResponse = serde_json::from_str(body)
        .map_err(|e| VibeError::acquisition(NAME, format!("malformed response: {}", e)))?;

    if let Some(status) = response.status.as_deref()
        && status != "ok"
    {
        let msg = response.msg.as_deref().unwrap_or("no message");
        return Err(VibeError::acquisition(
            NAME,
            format!("conversion failed ({}): {}", status, msg),
        ));
    }

    response
        .link
        .filter(|link| !link.is_empty())
        .ok_or_else(|| VibeError::acquisition(NAME, "response carried no download link"))
}

/// Only audio (or an opaque binary stream) is accepted from the link
pub fn check_content_type(content_type: &str) -> Result<()> {
    let mime = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    if mime.starts_with("audio/") || mime == "application/octet-stream" {
        Ok(())
    } else {
        Err(VibeError::acquisition(
            NAME,
            format!("unexpected content type '{}'", content_type),
        ))
    }
}
