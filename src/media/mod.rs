// Media engine abstraction
//
// Everything that shells out to ffmpeg goes through here:
// - Commands: argument builders for effect, split, mix and version probes
// - Processor: the ffmpeg-backed implementation of MediaProcessorTrait

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// Main trait for media processing operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProcessorTrait: Send + Sync {
    /// Render `input_path` through a filter graph whose final stream is `[out]`
    async fn apply_filter_graph(
        &self,
        input_path: &Path,
        output_path: &Path,
        graph: &str,
    ) -> Result<()>;

    /// Extract `duration` seconds starting at `start`
    async fn split_audio(
        &self,
        input_path: &Path,
        output_path: &Path,
        start: f64,
        duration: f64,
    ) -> Result<()>;

    /// Feed every input into one filter graph and write the combined `[out]`
    async fn mix_audio(
        &self,
        input_paths: &[PathBuf],
        output_path: &Path,
        graph: &str,
    ) -> Result<()>;

    /// Check if media processor is available
    async fn check_availability(&self) -> Result<()>;

    /// Get media processor version information
    async fn get_version_info(&self) -> Result<String>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (FFmpeg-based)
    pub fn create_processor(config: MediaConfig) -> Box<dyn MediaProcessorTrait> {
        Box::new(processor::MediaProcessorImpl::new(config))
    }
}
