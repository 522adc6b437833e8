// Mood effects
//
// Each mood is a fixed (speed, echo delay, echo decay) triple. The speed change
// uses the resample-rate trick: the signal is relabelled at 44100 * speed and
// resampled back to 44100, so pitch and tempo move together. That coupling is
// the audible character of the presets and must not be replaced with a
// tempo-only stretch.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::{Result, VibeError};
use crate::media::MediaProcessorTrait;

/// Sample rate the speed stage resamples back to
pub const BASE_SAMPLE_RATE: u32 = 44100;

/// Mood used when the requested name is missing or unknown
pub const DEFAULT_EFFECT: &str = "slow_reverb";

// aecho in_gain / out_gain, shared by every mood
const ECHO_IN_GAIN: f64 = 0.8;
const ECHO_OUT_GAIN: f64 = 0.88;

/// Parameters for one mood preset
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EffectSpec {
    pub name: &'static str,
    /// Playback rate multiplier (pitch and tempo together)
    pub speed: f64,
    pub echo_delay_ms: u32,
    pub echo_decay: f64,
}

const fn spec(name: &'static str, speed: f64, echo_delay_ms: u32, echo_decay: f64) -> EffectSpec {
    EffectSpec {
        name,
        speed,
        echo_delay_ms,
        echo_decay,
    }
}

/// The mood table. The first entry is the default.
pub const EFFECTS: [EffectSpec; 10] = [
    spec("slow_reverb", 0.85, 60, 0.40),
    spec("energetic", 1.25, 20, 0.20),
    spec("dark", 0.80, 100, 0.50),
    spec("cute", 1.35, 15, 0.15),
    spec("cool", 0.95, 50, 0.30),
    spec("happy", 1.15, 25, 0.25),
    spec("intense", 1.20, 40, 0.45),
    spec("melodic", 0.90, 80, 0.35),
    spec("chill", 0.88, 70, 0.35),
    spec("sleepy", 0.75, 120, 0.50),
];

impl EffectSpec {
    /// Resolve a mood by name; unknown or missing names give the default
    pub fn resolve(name: Option<&str>) -> EffectSpec {
        name.map(|n| n.trim().to_ascii_lowercase())
            .and_then(|n| EFFECTS.iter().find(|e| e.name == n).copied())
            .unwrap_or(EFFECTS[0])
    }

    /// Two-stage filter graph: resample-based speed change, then echo.
    /// The final stream is labelled `[out]`.
    pub fn filter_graph(&self) -> String {
        format!(
            "[0:a]asetrate={rate}*{speed:.2},aresample={rate}[sped];\
             [sped]aecho={in_gain}:{out_gain}:{delay}:{decay:.2}[out]",
            rate = BASE_SAMPLE_RATE,
            speed = self.speed,
            in_gain = ECHO_IN_GAIN,
            out_gain = ECHO_OUT_GAIN,
            delay = self.echo_delay_ms,
            decay = self.echo_decay,
        )
    }
}

/// Applies mood presets to local audio files through the media engine
pub struct EffectEngine {
    media: Arc<dyn MediaProcessorTrait>,
}

impl EffectEngine {
    pub fn new(media: Arc<dyn MediaProcessorTrait>) -> Self {
        Self { media }
    }

    /// Render `input_path` with the named mood into `output_path`.
    ///
    /// Success means the engine exited cleanly and the output exists; the
    /// engine's diagnostics stay in the log and the caller only sees a
    /// generic failure.
    pub async fn apply(
        &self,
        input_path: &Path,
        output_path: &Path,
        effect_name: Option<&str>,
    ) -> Result<EffectSpec> {
        let effect = EffectSpec::resolve(effect_name);
        info!(
            "Applying effect '{}' (speed {}, delay {}ms, decay {})",
            effect.name, effect.speed, effect.echo_delay_ms, effect.echo_decay
        );

        if let Err(e) = self
            .media
            .apply_filter_graph(input_path, output_path, &effect.filter_graph())
            .await
        {
            error!("Effect '{}' failed for {}: {}", effect.name, input_path.display(), e);
            return Err(VibeError::EffectProcessing(format!(
                "could not apply the '{}' effect",
                effect.name
            )));
        }

        if !tokio::fs::try_exists(output_path).await.unwrap_or(false) {
            error!("Effect '{}' produced no output at {}", effect.name, output_path.display());
            return Err(VibeError::EffectProcessing(format!(
                "the '{}' effect produced no output",
                effect.name
            )));
        }

        Ok(effect)
    }
}
