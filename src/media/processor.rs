use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::MediaConfig;
use crate::error::{Result, VibeError};
use super::{MediaCommandBuilder, MediaProcessorTrait};

/// Concrete implementation of media processor (FFmpeg-based)
pub struct MediaProcessorImpl {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl MediaProcessorImpl {
    /// Create a new media processor implementation
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path);

        Self {
            config,
            command_builder,
        }
    }
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    async fn apply_filter_graph(
        &self,
        input_path: &Path,
        output_path: &Path,
        graph: &str,
    ) -> Result<()> {
        info!("Rendering {} -> {}", input_path.display(), output_path.display());
        debug!("Filter graph: {}", graph);

        let command = self.command_builder.apply_filter_graph(
            input_path,
            output_path,
            graph,
            self.config.effect_quality,
        );
        let output = command.run().await?;

        // Diagnostics are only logged; success is decided by exit status and output presence
        for line in output.stderr.lines().filter(|l| !l.trim().is_empty()) {
            debug!("ffmpeg: {}", line);
        }

        if !output.success {
            warn!("ffmpeg exited with {:?} while rendering {}", output.exit_code, output_path.display());
            return Err(VibeError::Media(format!(
                "ffmpeg exited with status {:?}: {}",
                output.exit_code,
                output.stderr.trim()
            )));
        }

        if !tokio::fs::try_exists(output_path).await.unwrap_or(false) {
            return Err(VibeError::Media(format!(
                "ffmpeg reported success but {} was not created",
                output_path.display()
            )));
        }

        info!("Rendering completed");
        Ok(())
    }

    async fn split_audio(
        &self,
        input_path: &Path,
        output_path: &Path,
        start: f64,
        duration: f64,
    ) -> Result<()> {
        info!("Splitting {} ({}s from {}s)", input_path.display(), duration, start);

        let command = self.command_builder.split_audio(
            input_path,
            output_path,
            start,
            duration,
            self.config.sample_rate,
            &self.config.clip_bitrate,
        );
        command.execute().await?;

        info!("Split completed: {}", output_path.display());
        Ok(())
    }

    async fn mix_audio(
        &self,
        input_paths: &[PathBuf],
        output_path: &Path,
        graph: &str,
    ) -> Result<()> {
        info!("Mixing {} tracks into {}", input_paths.len(), output_path.display());
        debug!("Mix graph: {}", graph);

        let command = self.command_builder.mix_audio(
            input_paths,
            output_path.to_path_buf(),
            graph,
            &self.config.clip_bitrate,
        );
        command.execute().await?;

        info!("Mix completed");
        Ok(())
    }

    async fn check_availability(&self) -> Result<()> {
        let output = self.command_builder.version_check().run().await
            .map_err(|e| VibeError::Media(format!("Media processor not found: {}", e)))?;

        if output.success {
            info!("Media processor is available");
            Ok(())
        } else {
            Err(VibeError::Media("Media processor version check failed".to_string()))
        }
    }

    async fn get_version_info(&self) -> Result<String> {
        debug!("Getting media processor version information");

        let output = tokio::process::Command::new(&self.config.binary_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| VibeError::Media(format!("Failed to execute media processor: {}", e)))?;

        if output.status.success() {
            let version_info = String::from_utf8_lossy(&output.stdout);
            // Extract the first line which typically contains the version
            let first_line = version_info.lines().next().unwrap_or("Unknown version");
            Ok(first_line.to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(VibeError::Media(format!("Media processor version check failed: {}", stderr)))
        }
    }
}
