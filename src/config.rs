use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, VibeError};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

fn default_max_upload_mb() -> usize {
    100
}

fn default_remote_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub workspace: WorkspaceConfig,
    pub media: MediaConfig,
    pub native: NativeConfig,
    pub ytdlp: YtDlpConfig,
    pub remote: RemoteApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP service binds to
    pub host: String,
    pub port: u16,
    /// Optional directory served for non-API paths (index.html, script.js, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub www_root: Option<PathBuf>,
    /// Maximum request body size in megabytes (uploads for split/mix)
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root under which every job gets its own uniquely named directory
    pub temp_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// libmp3lame VBR quality for effect output (0 = best, 9 = worst)
    pub effect_quality: u8,
    /// Constant bitrate used by split and mix output
    pub clip_bitrate: String,
    /// Output sample rate used by split
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeConfig {
    /// User agent sent when fetching the watch page
    pub user_agent: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YtDlpConfig {
    /// Path to yt-dlp binary
    pub binary_path: String,
    /// Format selector passed with -f
    pub format: String,
    /// Container produced by the extract-audio post-processor
    pub audio_format: String,
    pub audio_quality: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteApiConfig {
    /// Conversion endpoint, queried with ?id=<video id>
    pub endpoint: String,
    /// Value of the X-RapidAPI-Host header
    pub host: String,
    /// API key. There is no built-in default; the backend refuses to run without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5000,
                www_root: None,
                max_upload_mb: default_max_upload_mb(),
            },
            workspace: WorkspaceConfig {
                temp_root: std::env::temp_dir().join("vibeshift"),
            },
            media: MediaConfig {
                binary_path: "ffmpeg".to_string(),
                effect_quality: 2,
                clip_bitrate: "192k".to_string(),
                sample_rate: 44100,
            },
            native: NativeConfig {
                user_agent: DEFAULT_USER_AGENT.to_string(),
                timeout_secs: 60,
            },
            ytdlp: YtDlpConfig {
                binary_path: "yt-dlp".to_string(),
                format: "bestaudio/best".to_string(),
                audio_format: "mp3".to_string(),
                audio_quality: "192K".to_string(),
                user_agent: DEFAULT_USER_AGENT.to_string(),
            },
            remote: RemoteApiConfig {
                endpoint: "https://youtube-mp36.p.rapidapi.com/dl".to_string(),
                host: "youtube-mp36.p.rapidapi.com".to_string(),
                api_key: None,
                timeout_secs: default_remote_timeout_secs(),
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| VibeError::Config(format!("Failed to read config file: {}", e)))?;

        Ok(toml::from_str(&content)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| VibeError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| VibeError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Apply overrides collected at process start. Components never read the
    /// environment themselves.
    pub fn with_overrides(mut self, api_key: Option<String>, port: Option<u16>) -> Self {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.remote.api_key = Some(key.trim().to_string());
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_api_key() {
        let config = Config::default();
        assert!(config.remote.api_key.is_none());
        assert_eq!(config.remote.timeout_secs, 30);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vibeshift.toml");

        let mut config = Config::default();
        config.server.port = 8080;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.server.port, 8080);
        assert!(loaded.remote.api_key.is_none());
    }

    #[test]
    fn test_malformed_file_is_a_toml_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vibeshift.toml");
        std::fs::write(&path, "[server]\nport = \"not a number\"\n").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, VibeError::Toml(_)));
        assert!(err.to_string().starts_with("TOML parsing error"));

        let err = Config::from_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, VibeError::Config(_)));
    }

    #[test]
    fn test_overrides_ignore_blank_key() {
        let config = Config::default().with_overrides(Some("   ".into()), None);
        assert!(config.remote.api_key.is_none());

        let config = Config::default().with_overrides(Some("secret".into()), Some(9000));
        assert_eq!(config.remote.api_key.as_deref(), Some("secret"));
        assert_eq!(config.server.port, 9000);
    }
}
