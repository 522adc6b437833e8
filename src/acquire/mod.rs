// Audio acquisition
//
// Each backend turns a video reference into audio on local storage (or in
// memory) on its own, with no knowledge of the others:
// - native: talks to the hosting site's player API directly
// - ytdlp: shells out to yt-dlp with an extract-audio post-processor
// - remote: asks a paid conversion API for a download link
//
// The orchestrator is the only place that knows the priority order.
//
// To add a backend:
// 1. Implement AcquisitionBackend, converting every failure into
//    VibeError::Acquisition (or VerificationRequired)
// 2. Add it to BackendKind and to BackendFactory::create_backend
// 3. Decide where it belongs in BackendFactory::default_order

pub mod native;
pub mod orchestrator;
pub mod remote;
pub mod ytdlp;

use async_trait::async_trait;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub use orchestrator::AcquisitionOrchestrator;
use crate::config::Config;
use crate::error::{Result, VibeError};
use crate::video_id::VideoReference;

/// Audio produced by a backend
#[derive(Debug, Clone, PartialEq)]
pub enum AcquiredAudio {
    /// File written somewhere inside the job directory
    File(PathBuf),
    /// Bytes the backend kept in memory
    Bytes(Vec<u8>),
}

/// Successful acquisition, tagged with the backend that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionResult {
    pub backend: &'static str,
    pub audio: AcquiredAudio,
}

impl AcquisitionResult {
    pub fn file(backend: &'static str, path: PathBuf) -> Self {
        Self {
            backend,
            audio: AcquiredAudio::File(path),
        }
    }

    pub fn bytes(backend: &'static str, data: Vec<u8>) -> Self {
        Self {
            backend,
            audio: AcquiredAudio::Bytes(data),
        }
    }

    /// Make sure the audio is on local storage, writing in-memory bytes to
    /// `destination`. Returns the path holding the audio.
    pub async fn into_local_file(self, destination: &Path) -> Result<PathBuf> {
        match self.audio {
            AcquiredAudio::File(path) => Ok(path),
            AcquiredAudio::Bytes(data) => {
                tokio::fs::write(destination, &data).await?;
                Ok(destination.to_path_buf())
            }
        }
    }
}

/// One independent strategy for turning a video reference into audio
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AcquisitionBackend: Send + Sync {
    /// Short name used in logs and aggregated errors
    fn name(&self) -> &'static str;

    /// Fetch the audio track. `destination` is a path without extension inside
    /// the job directory; backends may write `destination` or
    /// `destination.<ext>`.
    async fn fetch(&self, reference: &VideoReference, destination: &Path) -> Result<AcquisitionResult>;
}

/// Convert any error raised inside a backend into the recoverable kinds the
/// orchestrator understands
pub(crate) fn recoverable(backend: &str, error: VibeError) -> VibeError {
    match error {
        VibeError::Acquisition { .. } | VibeError::VerificationRequired { .. } => error,
        other => VibeError::acquisition(backend, other.to_string()),
    }
}

/// Upstream messages that mean the host wants a human/bot check
pub(crate) fn is_verification_message(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    ["sign in to confirm", "not a bot", "not a robot", "confirm your age"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// Stream an HTTP body to `path` chunk by chunk, returning the byte count
pub(crate) async fn stream_to_file(response: reqwest::Response, path: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(written)
}

/// Backend implementation type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Native,
    YtDlp,
    RemoteApi,
}

/// Factory for creating backend instances
pub struct BackendFactory;

impl BackendFactory {
    /// Priority order used by the service
    pub fn default_order() -> [BackendKind; 3] {
        [BackendKind::Native, BackendKind::YtDlp, BackendKind::RemoteApi]
    }

    /// Create a backend based on implementation type
    pub fn create_backend(kind: BackendKind, config: &Config) -> Result<Box<dyn AcquisitionBackend>> {
        Ok(match kind {
            BackendKind::Native => Box::new(native::NativeBackend::new(config.native.clone())?),
            BackendKind::YtDlp => Box::new(ytdlp::YtDlpBackend::new(config.ytdlp.clone())),
            BackendKind::RemoteApi => Box::new(remote::RemoteApiBackend::new(config.remote.clone())?),
        })
    }

    /// Create every backend in priority order
    pub fn create_default(config: &Config) -> Result<Vec<Box<dyn AcquisitionBackend>>> {
        Self::default_order()
            .into_iter()
            .map(|kind| Self::create_backend(kind, config))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bytes_are_written_to_destination() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("source");

        let result = AcquisitionResult::bytes("test", b"ID3audio".to_vec());
        let path = result.into_local_file(&destination).await.unwrap();

        assert_eq!(path, destination);
        assert_eq!(std::fs::read(&path).unwrap(), b"ID3audio");
    }

    #[tokio::test]
    async fn test_file_result_is_passed_through() {
        let path = PathBuf::from("/tmp/job/source.mp3");
        let result = AcquisitionResult::file("test", path.clone());
        assert_eq!(result.into_local_file(Path::new("/unused")).await.unwrap(), path);
    }

    #[test]
    fn test_recoverable_wraps_foreign_errors() {
        let err = recoverable("native", VibeError::Internal("boom".into()));
        assert_eq!(err.to_string(), "native: Internal error: boom");

        let err = recoverable("native", VibeError::verification("native", "LOGIN_REQUIRED"));
        assert!(err.verification_required());
    }

    #[test]
    fn test_verification_messages() {
        assert!(is_verification_message("ERROR: Sign in to confirm you’re not a bot"));
        assert!(is_verification_message("Please confirm you're not a robot"));
        assert!(!is_verification_message("HTTP Error 403: Forbidden"));
    }

    #[test]
    fn test_default_order_and_names() {
        let backends = BackendFactory::create_default(&Config::default()).unwrap();
        let names: Vec<_> = backends.iter().map(|b| b.name()).collect();
        assert_eq!(names, vec!["native", "yt-dlp", "remote-api"]);
    }
}
