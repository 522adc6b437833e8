use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, VibeError};

/// Captured result of one media engine invocation
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stderr: String,
}

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-acodec").arg(codec)
    }

    /// Set constant audio bitrate
    pub fn audio_bitrate<S: Into<String>>(self, bitrate: S) -> Self {
        self.arg("-b:a").arg(bitrate)
    }

    /// Set VBR audio quality
    pub fn audio_quality(self, quality: u8) -> Self {
        self.arg("-q:a").arg(quality.to_string())
    }

    /// Set audio sample rate
    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    /// Seek to an offset (seconds) before the next input
    pub fn seek(self, seconds: f64) -> Self {
        self.arg("-ss").arg(format_seconds(seconds))
    }

    /// Limit the output duration (seconds)
    pub fn duration(self, seconds: f64) -> Self {
        self.arg("-t").arg(format_seconds(seconds))
    }

    /// Add a filter graph with named streams
    pub fn filter_complex<S: Into<String>>(self, graph: S) -> Self {
        self.arg("-filter_complex").arg(graph)
    }

    /// Map a labelled stream to the output
    pub fn map<S: AsRef<str>>(self, label: S) -> Self {
        self.arg("-map").arg(format!("[{}]", label.as_ref()))
    }

    /// Run the command and capture its exit status and diagnostics
    pub async fn run(&self) -> Result<CommandOutput> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| VibeError::Media(format!("Failed to execute media processor: {}", e)))?;

        Ok(CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Execute the command, failing on a non-zero exit status
    pub async fn execute(&self) -> Result<()> {
        let output = self.run().await?;

        if !output.success {
            return Err(VibeError::Media(format!(
                "{} failed: {}",
                self.description,
                output.stderr.trim()
            )));
        }

        Ok(())
    }
}

/// Seconds formatted without trailing zeros, as ffmpeg accepts them
pub fn format_seconds(seconds: f64) -> String {
    let text = format!("{:.3}", seconds);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text.is_empty() { "0".to_string() } else { text.to_string() }
}

/// Builder for the media operations this service runs
pub struct MediaCommandBuilder {
    binary_path: String,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Build the effect command: one input, a filter graph ending in `[out]`,
    /// VBR mp3 output
    pub fn apply_filter_graph<P: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: P,
        graph: &str,
        quality: u8,
    ) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Effect rendering")
            .overwrite()
            .input(input_path)
            .filter_complex(graph)
            .map("out")
            .audio_codec("libmp3lame")
            .audio_quality(quality)
            .output(output_path)
    }

    /// Build time-range extraction command
    pub fn split_audio<P: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: P,
        start: f64,
        duration: f64,
        sample_rate: u32,
        bitrate: &str,
    ) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Audio split")
            .overwrite()
            .seek(start)
            .duration(duration)
            .input(input_path)
            .audio_codec("libmp3lame")
            .audio_sample_rate(sample_rate)
            .audio_bitrate(bitrate)
            .output(output_path)
    }

    /// Build the mix command: every input in order, then the combined graph
    pub fn mix_audio<P: AsRef<Path>>(
        &self,
        input_paths: &[P],
        output_path: P,
        graph: &str,
        bitrate: &str,
    ) -> MediaCommand {
        let mut cmd = MediaCommand::new(&self.binary_path, "Audio mix").overwrite();
        for path in input_paths {
            cmd = cmd.input(path);
        }

        cmd.filter_complex(graph)
            .map("out")
            .audio_codec("libmp3lame")
            .audio_bitrate(bitrate)
            .output(output_path)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check")
            .arg("-version")
    }
}
