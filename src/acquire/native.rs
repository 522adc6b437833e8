// Native extractor
//
// Resolves audio-only streams by asking the hosting site's player endpoint
// directly, posing as the Android client (whose stream URLs need no signature
// deciphering), then downloads the best match.

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue, ORIGIN, RANGE, USER_AGENT};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::NativeConfig;
use crate::error::{Result, VibeError};
use crate::video_id::VideoReference;
use super::{AcquisitionBackend, AcquisitionResult, is_verification_message, recoverable, stream_to_file};

const NAME: &str = "native";

pub const ANDROID_USER_AGENT: &str = "com.google.android.youtube/20.10.38 (Linux; U; Android 11) gzip";
pub const INNERTUBE_CLIENT_NAME: &str = "ANDROID";
pub const INNERTUBE_CLIENT_VERSION: &str = "20.10.38";

/// itag 140 is AAC 128k in an mp4 container, the most widely playable choice
const PREFERRED_ITAG: i64 = 140;

static API_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#).expect("api key pattern is valid"));
static VISITOR_DATA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""VISITOR_DATA"\s*:\s*"([^"]+)""#).expect("visitor pattern is valid"));

/// Values scraped from the watch page that the player request needs
#[derive(Debug, Clone, PartialEq)]
pub struct PageConfig {
    pub api_key: String,
    pub visitor_data: Option<String>,
}

/// One audio-only stream offered by the player response
#[derive(Debug, Clone, PartialEq)]
pub struct AudioStream {
    pub itag: i64,
    pub mime_type: String,
    pub bitrate: i64,
    pub url: String,
}

impl AudioStream {
    /// File extension matching the stream container
    pub fn extension(&self) -> &'static str {
        if self.mime_type.starts_with("audio/mp4") {
            "m4a"
        } else if self.mime_type.starts_with("audio/webm") {
            "webm"
        } else {
            "audio"
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlayerRequest<'a> {
    video_id: &'a str,
    context: PlayerContext,
    content_check_ok: bool,
    racy_check_ok: bool,
}

#[derive(Serialize)]
struct PlayerContext {
    client: ClientInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientInfo {
    client_name: &'static str,
    client_version: &'static str,
    user_agent: &'static str,
    os_name: &'static str,
    os_version: &'static str,
    hl: &'static str,
    time_zone: &'static str,
    utc_offset_minutes: i32,
}

/// Direct extractor against the hosting site
pub struct NativeBackend {
    config: NativeConfig,
    client: Client,
}

impl NativeBackend {
    pub fn new(config: NativeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    async fn fetch_page_config(&self, reference: &VideoReference) -> Result<PageConfig> {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("CONSENT=YES+cb; SOCS=CAI"));

        let html = self
            .client
            .get(reference.watch_url())
            .header(USER_AGENT, &self.config.user_agent)
            .headers(headers)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        debug!("Fetched watch page for {} ({} bytes)", reference.id(), html.len());
        extract_page_config(&html)
    }

    async fn fetch_player_response(&self, video_id: &str, page: &PageConfig) -> Result<Value> {
        let api_url = format!(
            "https://www.youtube.com/youtubei/v1/player?key={}&prettyPrint=false",
            page.api_key
        );

        let body = PlayerRequest {
            video_id,
            context: PlayerContext {
                client: ClientInfo {
                    client_name: INNERTUBE_CLIENT_NAME,
                    client_version: INNERTUBE_CLIENT_VERSION,
                    user_agent: ANDROID_USER_AGENT,
                    os_name: "Android",
                    os_version: "11",
                    hl: "en",
                    time_zone: "UTC",
                    utc_offset_minutes: 0,
                },
            },
            content_check_ok: true,
            racy_check_ok: true,
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(ANDROID_USER_AGENT));
        headers.insert("X-YouTube-Client-Name", HeaderValue::from_static("3"));
        headers.insert(
            "X-YouTube-Client-Version",
            HeaderValue::from_static(INNERTUBE_CLIENT_VERSION),
        );
        headers.insert(ORIGIN, HeaderValue::from_static("https://www.youtube.com"));
        if let Some(visitor) = page.visitor_data.as_deref()
            && let Ok(value) = HeaderValue::from_str(visitor)
        {
            headers.insert("X-Goog-Visitor-Id", value);
        }

        let response: Value = self
            .client
            .post(api_url)
            .headers(headers)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response)
    }

    async fn download(&self, stream: &AudioStream, destination: &Path) -> Result<PathBuf> {
        let path = destination.with_extension(stream.extension());

        let response = self
            .client
            .get(&stream.url)
            .header(USER_AGENT, ANDROID_USER_AGENT)
            .header(RANGE, "bytes=0-")
            .send()
            .await?
            .error_for_status()?;

        let written = stream_to_file(response, &path).await?;
        if written == 0 {
            return Err(VibeError::acquisition(NAME, "stream returned no data"));
        }

        info!("Downloaded {} bytes (itag {}) to {}", written, stream.itag, path.display());
        Ok(path)
    }

    async fn try_fetch(&self, reference: &VideoReference, destination: &Path) -> Result<PathBuf> {
        let page = self.fetch_page_config(reference).await?;
        let player = self.fetch_player_response(reference.id(), &page).await?;
        check_playability(&player)?;

        let streams = extract_audio_streams(&player);
        let stream = select_stream(&streams)
            .ok_or_else(|| VibeError::acquisition(NAME, "no audio-only streams offered"))?;
        debug!(
            "Selected itag {} ({}, {} bps) out of {} audio streams",
            stream.itag,
            stream.mime_type,
            stream.bitrate,
            streams.len()
        );

        self.download(stream, destination).await
    }
}

#[async_trait]
impl AcquisitionBackend for NativeBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch(&self, reference: &VideoReference, destination: &Path) -> Result<AcquisitionResult> {
        info!("Resolving audio streams for {} natively", reference.id());

        let path = self
            .try_fetch(reference, destination)
            .await
            .map_err(|e| recoverable(NAME, e))?;

        Ok(AcquisitionResult::file(NAME, path))
    }
}

/// Pull the player API key (and optional visitor id) out of the watch page
pub fn extract_page_config(html: &str) -> Result<PageConfig> {
    let api_key = API_KEY_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| VibeError::acquisition(NAME, "player API key not found on watch page"))?;

    let visitor_data = VISITOR_DATA_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    Ok(PageConfig {
        api_key,
        visitor_data,
    })
}

/// Reject unplayable videos, singling out bot/sign-in checks
pub fn check_playability(player: &Value) -> Result<()> {
    let Some(status) = player.get("playabilityStatus") else {
        return Ok(());
    };

    let code = status["status"].as_str().unwrap_or("");
    if code == "OK" {
        return Ok(());
    }

    let reason = status["reason"].as_str().unwrap_or("unknown reason");
    if code == "LOGIN_REQUIRED" || is_verification_message(reason) {
        return Err(VibeError::verification(NAME, format!("{}: {}", code, reason)));
    }

    Err(VibeError::acquisition(
        NAME,
        format!("video unavailable ({}): {}", code, reason),
    ))
}

/// Audio-only adaptive formats that carry a direct URL
pub fn extract_audio_streams(player: &Value) -> Vec<AudioStream> {
    player["streamingData"]["adaptiveFormats"]
        .as_array()
        .map(|formats| {
            formats
                .iter()
                .filter_map(|format| {
                    let mime_type = format["mimeType"].as_str()?;
                    if !mime_type.starts_with("audio/") {
                        return None;
                    }
                    Some(AudioStream {
                        itag: format["itag"].as_i64().unwrap_or(0),
                        mime_type: mime_type.to_string(),
                        bitrate: format["bitrate"].as_i64().unwrap_or(0),
                        url: format["url"].as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Preferred itag when offered, otherwise the highest bitrate
pub fn select_stream(streams: &[AudioStream]) -> Option<&AudioStream> {
    streams
        .iter()
        .find(|s| s.itag == PREFERRED_ITAG)
        .or_else(|| streams.iter().max_by_key(|s| s.bitrate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_page_config() {
        let html = r#"<script>ytcfg.set({"INNERTUBE_API_KEY": "AIzaTest","VISITOR_DATA":"CgtWaXNpdG9y"});</script>"#;
        let config = extract_page_config(html).unwrap();
        assert_eq!(config.api_key, "AIzaTest");
        assert_eq!(config.visitor_data.as_deref(), Some("CgtWaXNpdG9y"));

        let err = extract_page_config("<html></html>").unwrap_err();
        assert!(matches!(err, VibeError::Acquisition { .. }));
    }

    #[test]
    fn test_playability() {
        assert!(check_playability(&json!({"playabilityStatus": {"status": "OK"}})).is_ok());

        let bot = json!({"playabilityStatus": {
            "status": "LOGIN_REQUIRED",
            "reason": "Sign in to confirm you're not a bot"
        }});
        assert!(check_playability(&bot).unwrap_err().verification_required());

        let gone = json!({"playabilityStatus": {"status": "ERROR", "reason": "Video unavailable"}});
        let err = check_playability(&gone).unwrap_err();
        assert!(!err.verification_required());
        assert!(err.to_string().contains("Video unavailable"));
    }

    #[test]
    fn test_stream_selection() {
        let player = json!({"streamingData": {"adaptiveFormats": [
            {"itag": 137, "mimeType": "video/mp4", "bitrate": 4000000, "url": "https://v"},
            {"itag": 251, "mimeType": "audio/webm; codecs=\"opus\"", "bitrate": 160000, "url": "https://a251"},
            {"itag": 140, "mimeType": "audio/mp4; codecs=\"mp4a.40.2\"", "bitrate": 130000, "url": "https://a140"},
            {"itag": 250, "mimeType": "audio/webm; codecs=\"opus\"", "bitrate": 70000, "signatureCipher": "s=..."}
        ]}});

        let streams = extract_audio_streams(&player);
        assert_eq!(streams.len(), 2);

        let chosen = select_stream(&streams).unwrap();
        assert_eq!(chosen.itag, 140);
        assert_eq!(chosen.extension(), "m4a");

        let without_140: Vec<_> = streams.into_iter().filter(|s| s.itag != 140).collect();
        let chosen = select_stream(&without_140).unwrap();
        assert_eq!(chosen.itag, 251);
        assert_eq!(chosen.extension(), "webm");
    }

    #[test]
    fn test_no_streaming_data() {
        assert!(extract_audio_streams(&json!({})).is_empty());
        assert!(select_stream(&[]).is_none());
    }
}
