//! vibeshift - mood effects for online video audio
//!
//! Fetches a video's audio through a chain of fallback sources, reshapes it
//! with an ffmpeg filter graph and hands back mp3 bytes. Split and mix
//! operations on uploaded files share the same media engine.

pub mod acquire;
pub mod cli;
pub mod clip;
pub mod config;
pub mod effects;
pub mod error;
pub mod job;
pub mod media;
pub mod pipeline;
pub mod server;
pub mod video_id;
