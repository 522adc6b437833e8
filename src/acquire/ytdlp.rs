use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::YtDlpConfig;
use crate::error::{Result, VibeError};
use crate::video_id::VideoReference;
use super::{AcquisitionBackend, AcquisitionResult, is_verification_message};

const NAME: &str = "yt-dlp";

/// Command-line extractor backed by yt-dlp
pub struct YtDlpBackend {
    config: YtDlpConfig,
}

impl YtDlpBackend {
    pub fn new(config: YtDlpConfig) -> Self {
        Self { config }
    }

    /// Arguments for one download. The output template lets yt-dlp pick the
    /// extension; the post-processor transcodes to the configured format.
    pub fn build_args(&self, reference: &VideoReference, destination: &Path) -> Vec<String> {
        let template = format!("{}.%(ext)s", destination.to_string_lossy());

        vec![
            "-f".to_string(),
            self.config.format.clone(),
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            self.config.audio_format.clone(),
            "--audio-quality".to_string(),
            self.config.audio_quality.clone(),
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--user-agent".to_string(),
            self.config.user_agent.clone(),
            "--add-header".to_string(),
            "Accept-Language:en-US,en;q=0.9".to_string(),
            "-o".to_string(),
            template,
            reference.watch_url(),
        ]
    }
}

#[async_trait]
impl AcquisitionBackend for YtDlpBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch(&self, reference: &VideoReference, destination: &Path) -> Result<AcquisitionResult> {
        info!("Downloading {} with {}", reference.id(), self.config.binary_path);

        let args = self.build_args(reference, destination);
        debug!("Executing {} {:?}", self.config.binary_path, args);

        let output = Command::new(&self.config.binary_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| VibeError::acquisition(NAME, format!("failed to run {}: {}", self.config.binary_path, e)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            warn!("{} exited with {:?} for {}", NAME, output.status.code(), reference.id());
            let reason = last_error_line(&stderr);
            if is_verification_message(&stderr) {
                return Err(VibeError::verification(NAME, reason));
            }
            return Err(VibeError::acquisition(
                NAME,
                format!("exit status {:?}: {}", output.status.code(), reason),
            ));
        }

        let path = resolve_output(destination, &self.config.audio_format).ok_or_else(|| {
            VibeError::acquisition(NAME, "download reported success but no output file was found")
        })?;

        let size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
        info!("{} wrote {} bytes to {}", NAME, size, path.display());

        Ok(AcquisitionResult::file(NAME, path))
    }
}

/// Find the file yt-dlp actually produced: the expected extension first, then
/// the bare path, then any completed sibling sharing the stem.
pub fn resolve_output(destination: &Path, audio_format: &str) -> Option<PathBuf> {
    let expected = destination.with_extension(audio_format);
    if expected.is_file() {
        return Some(expected);
    }
    if destination.is_file() {
        return Some(destination.to_path_buf());
    }

    let parent = destination.parent()?;
    let prefix = format!("{}.", destination.file_name()?.to_string_lossy());
    WalkDir::new(parent)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .find(|p| {
            let name = p.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            name.starts_with(&prefix) && !name.ends_with(".part") && !name.ends_with(".ytdl")
        })
}

/// The most useful line of yt-dlp's stderr for an error message
fn last_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .find(|l| l.starts_with("ERROR"))
        .or_else(|| stderr.lines().rev().find(|l| !l.trim().is_empty()))
        .unwrap_or("no diagnostic output")
        .trim()
        .to_string()
}
