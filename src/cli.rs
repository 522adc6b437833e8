use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::clip::Track;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve {
        /// Address to bind (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides the config file and VIBESHIFT_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Download a video's audio and apply a mood effect
    Transform {
        /// Video URL or bare 11-character id
        #[arg(short, long)]
        url: String,

        /// Mood to apply (see `effects`)
        #[arg(short, long)]
        effect: Option<String>,

        /// Output mp3 file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Cut a time range out of an audio file
    Split {
        /// Input audio file
        #[arg(short, long)]
        input: PathBuf,

        /// Output mp3 file
        #[arg(short, long)]
        output: PathBuf,

        /// Start time in seconds
        #[arg(short, long)]
        start: f64,

        /// End time in seconds
        #[arg(short, long)]
        end: f64,
    },

    /// Mix several audio files into one
    Mix {
        /// Track as path[:volume[:start[:trim]]], volume in percent, times in seconds
        #[arg(short, long = "track", value_parser = parse_track, required = true)]
        tracks: Vec<Track>,

        /// Output mp3 file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List the available mood effects
    Effects,

    /// Write the default configuration as TOML
    InitConfig {
        /// Destination file
        #[arg(short, long, default_value = "vibeshift.toml")]
        path: PathBuf,
    },
}

/// Parse `path[:volume[:start[:trim]]]`. Empty fields keep their defaults.
pub fn parse_track(spec: &str) -> Result<Track, String> {
    let mut parts = spec.splitn(4, ':');
    let path = parts.next().filter(|p| !p.is_empty()).ok_or("track path is empty")?;
    let mut track = Track::new(path);

    let mut number = |label: &str| -> Result<Option<f64>, String> {
        match parts.next().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => text
                .parse::<f64>()
                .map(Some)
                .map_err(|_| format!("invalid {} '{}' in track '{}'", label, text, spec)),
        }
    };

    if let Some(volume) = number("volume")? {
        track.volume = volume;
    }
    if let Some(start) = number("start")? {
        track.start_time = start;
    }
    track.trim_length = number("trim")?;

    Ok(track)
}
