use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::error::{Result, VibeError};
use crate::media::{MediaProcessorTrait, format_seconds};

/// Volume applied when a track does not specify one, in percent
pub const DEFAULT_VOLUME: f64 = 100.0;

/// One input to a mix
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub path: PathBuf,
    /// Percent; 100 leaves the track unchanged
    pub volume: f64,
    /// Offset into the mix, in seconds
    pub start_time: f64,
    /// Keep only the first `trim_length` seconds of the track
    pub trim_length: Option<f64>,
}

impl Track {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            volume: DEFAULT_VOLUME,
            start_time: 0.0,
            trim_length: None,
        }
    }

    pub fn validate(&self, index: usize) -> Result<()> {
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(VibeError::Validation(format!(
                "Track {}: volume must be a non-negative number",
                index
            )));
        }
        if !self.start_time.is_finite() || self.start_time < 0.0 {
            return Err(VibeError::Validation(format!(
                "Track {}: start time must be a non-negative number",
                index
            )));
        }
        if let Some(trim) = self.trim_length
            && (!trim.is_finite() || trim <= 0.0)
        {
            return Err(VibeError::Validation(format!(
                "Track {}: trim length must be greater than zero",
                index
            )));
        }
        Ok(())
    }

    /// Filter chain for this track as input `index`, ending in `[a<index>]`
    pub fn filter_chain(&self, index: usize) -> String {
        let mut chain = format!("[{}:a]volume={}", index, format_seconds(self.volume / 100.0));
        if let Some(trim) = self.trim_length {
            chain.push_str(&format!(",atrim=0:{},asetpts=PTS-STARTPTS", format_seconds(trim)));
        }
        if self.start_time > 0.0 {
            let delay_ms = (self.start_time * 1000.0).round() as u64;
            chain.push_str(&format!(",adelay={}|{}", delay_ms, delay_ms));
        }
        chain.push_str(&format!("[a{}]", index));
        chain
    }
}

/// Build the whole mix graph: one chain per track, then a single amix
/// labelled `[out]`
pub fn build_mix_graph(tracks: &[Track]) -> String {
    let mut graph: Vec<String> = tracks
        .iter()
        .enumerate()
        .map(|(i, track)| track.filter_chain(i))
        .collect();

    let labels: String = (0..tracks.len()).map(|i| format!("[a{}]", i)).collect();
    graph.push(format!(
        "{}amix=inputs={}:duration=longest:normalize=0[out]",
        labels,
        tracks.len()
    ));

    graph.join(";")
}

/// Check a split range before any process is started
pub fn validate_range(start: f64, end: f64) -> Result<()> {
    if !start.is_finite() || !end.is_finite() {
        return Err(VibeError::Validation("Start and end times must be numbers".to_string()));
    }
    if start < 0.0 {
        return Err(VibeError::Validation("Start time must not be negative".to_string()));
    }
    if end <= start {
        return Err(VibeError::Validation("End time must be greater than start time".to_string()));
    }
    Ok(())
}

/// Download name for a split result
pub fn split_filename(start: f64, end: f64) -> String {
    format!("split_{}_{}.mp3", format_seconds(start), format_seconds(end))
}

/// Split and mix on local files
pub struct ClipOperations {
    media: Arc<dyn MediaProcessorTrait>,
}

impl ClipOperations {
    pub fn new(media: Arc<dyn MediaProcessorTrait>) -> Self {
        Self { media }
    }

    /// Extract `[start, end)` seconds of `input` into `output`
    pub async fn split(&self, input: &Path, output: &Path, start: f64, end: f64) -> Result<()> {
        validate_range(start, end)?;
        info!("Splitting {} from {}s to {}s", input.display(), start, end);

        self.media.split_audio(input, output, start, end - start).await
    }

    /// Combine `tracks` into one file, each with its own volume, offset and trim
    pub async fn mix(&self, tracks: &[Track], output: &Path) -> Result<()> {
        if tracks.is_empty() {
            return Err(VibeError::Validation("At least one track is required".to_string()));
        }
        for (i, track) in tracks.iter().enumerate() {
            track.validate(i)?;
        }

        let graph = build_mix_graph(tracks);
        let inputs: Vec<PathBuf> = tracks.iter().map(|t| t.path.clone()).collect();
        info!("Mixing {} tracks into {}", tracks.len(), output.display());

        self.media.mix_audio(&inputs, output, &graph).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockMediaProcessorTrait;

    fn untouched_media() -> Arc<dyn MediaProcessorTrait> {
        let mut media = MockMediaProcessorTrait::new();
        media.expect_split_audio().times(0);
        media.expect_mix_audio().times(0);
        Arc::new(media)
    }

    #[tokio::test]
    async fn test_split_range_checked_before_ffmpeg() {
        let clips = ClipOperations::new(untouched_media());
        let (input, output) = (Path::new("in.mp3"), Path::new("out.mp3"));

        for (start, end) in [(10.0, 10.0), (10.0, 5.0), (-1.0, 5.0), (f64::NAN, 5.0), (0.0, f64::INFINITY)] {
            let err = clips.split(input, output, start, end).await.unwrap_err();
            assert!(matches!(err, VibeError::Validation(_)), "{start}..{end}");
        }
    }

    #[tokio::test]
    async fn test_split_passes_duration() {
        let mut media = MockMediaProcessorTrait::new();
        media
            .expect_split_audio()
            .withf(|_, _, start, duration| *start == 2.5 && *duration == 7.5)
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let clips = ClipOperations::new(Arc::new(media));
        clips
            .split(Path::new("in.mp3"), Path::new("out.mp3"), 2.5, 10.0)
            .await
            .unwrap();
    }

    #[test]
    fn test_split_filename() {
        assert_eq!(split_filename(0.0, 12.5), "split_0_12.5.mp3");
    }

    #[test]
    fn test_track_chain() {
        assert_eq!(Track::new("a.mp3").filter_chain(0), "[0:a]volume=1[a0]");

        let track = Track {
            path: "b.mp3".into(),
            volume: 50.0,
            start_time: 1.5,
            trim_length: Some(4.0),
        };
        assert_eq!(
            track.filter_chain(1),
            "[1:a]volume=0.5,atrim=0:4,asetpts=PTS-STARTPTS,adelay=1500|1500[a1]"
        );
    }

    #[test]
    fn test_mix_graph_shape() {
        let mut half = Track::new("b.mp3");
        half.volume = 50.0;
        half.start_time = 1.5;
        let mut quiet = Track::new("c.mp3");
        quiet.volume = 25.0;
        quiet.start_time = 3.0;
        quiet.trim_length = Some(20.0);
        let tracks = vec![Track::new("a.mp3"), half, quiet];

        let graph = build_mix_graph(&tracks);
        let chains: Vec<&str> = graph.split(';').collect();

        assert_eq!(
            chains,
            vec![
                "[0:a]volume=1[a0]",
                "[1:a]volume=0.5,adelay=1500|1500[a1]",
                "[2:a]volume=0.25,atrim=0:20,asetpts=PTS-STARTPTS,adelay=3000|3000[a2]",
                "[a0][a1][a2]amix=inputs=3:duration=longest:normalize=0[out]",
            ]
        );
    }

    #[tokio::test]
    async fn test_mix_validation() {
        let clips = ClipOperations::new(untouched_media());
        let output = Path::new("mixed.mp3");

        assert!(clips.mix(&[], output).await.is_err());

        let mut loud = Track::new("a.mp3");
        loud.volume = -10.0;
        assert!(matches!(clips.mix(&[loud], output).await, Err(VibeError::Validation(_))));

        let mut trimmed = Track::new("a.mp3");
        trimmed.trim_length = Some(0.0);
        assert!(matches!(clips.mix(&[trimmed], output).await, Err(VibeError::Validation(_))));
    }

    #[tokio::test]
    async fn test_mix_runs_once_with_all_inputs() {
        let mut media = MockMediaProcessorTrait::new();
        media
            .expect_mix_audio()
            .withf(|inputs, _, graph| inputs.len() == 2 && graph.contains("amix=inputs=2"))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let clips = ClipOperations::new(Arc::new(media));
        clips
            .mix(&[Track::new("a.mp3"), Track::new("b.mp3")], Path::new("mixed.mp3"))
            .await
            .unwrap();
    }
}
