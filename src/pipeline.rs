use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::acquire::{AcquisitionOrchestrator, BackendFactory};
use crate::config::Config;
use crate::effects::{EffectEngine, EffectSpec};
use crate::error::{Result, VibeError};
use crate::job::{ProcessingJob, remove_quietly};
use crate::media::MediaProcessorTrait;
use crate::video_id::{VideoReference, extract_id};

/// Where a transform request currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Start,
    Identified,
    Acquired,
    Effected,
    Cleaned,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Identified => "identified",
            Self::Acquired => "acquired",
            Self::Effected => "effected",
            Self::Cleaned => "cleaned",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Rendered audio handed back to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedAudio {
    pub bytes: Vec<u8>,
    pub effect: EffectSpec,
    pub backend: &'static str,
    pub video_id: String,
}

impl ProcessedAudio {
    pub fn suggested_filename(&self) -> String {
        format!("{}_{}.mp3", self.effect.name, self.video_id)
    }
}

/// URL in, effected mp3 bytes out
pub struct ProcessingPipeline {
    temp_root: PathBuf,
    orchestrator: AcquisitionOrchestrator,
    effects: EffectEngine,
}

impl ProcessingPipeline {
    /// Build the pipeline with the default backend order
    pub fn new(config: &Config, media: Arc<dyn MediaProcessorTrait>) -> Result<Self> {
        let orchestrator = AcquisitionOrchestrator::new(BackendFactory::create_default(config)?);
        info!("Acquisition order: {}", orchestrator.backend_names().join(" -> "));

        Ok(Self::with_parts(
            config.workspace.temp_root.clone(),
            orchestrator,
            EffectEngine::new(media),
        ))
    }

    pub fn with_parts(temp_root: PathBuf, orchestrator: AcquisitionOrchestrator, effects: EffectEngine) -> Self {
        Self {
            temp_root,
            orchestrator,
            effects,
        }
    }

    /// Identify the video, acquire its audio, apply the mood and return the
    /// bytes. Every temporary file is gone when this returns, whatever the
    /// outcome.
    pub async fn process(&self, url: &str, effect_name: Option<&str>) -> Result<ProcessedAudio> {
        transition(PipelineStage::Start, url);

        let Some(reference) = extract_id(url) else {
            transition(PipelineStage::Failed, "no video id found");
            return Err(VibeError::Validation("Invalid YouTube URL".to_string()));
        };
        transition(PipelineStage::Identified, reference.id());

        let job = ProcessingJob::create(&self.temp_root).await?;
        let outcome = self.run(&job, &reference, effect_name).await;
        job.finish();

        match outcome {
            Ok(processed) => {
                transition(PipelineStage::Done, &processed.suggested_filename());
                Ok(processed)
            }
            Err(e) => {
                transition(PipelineStage::Failed, &e.to_string());
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        job: &ProcessingJob,
        reference: &VideoReference,
        effect_name: Option<&str>,
    ) -> Result<ProcessedAudio> {
        let acquired = self.orchestrator.acquire(reference, &job.source_path()).await?;
        let backend = acquired.backend;
        let source = acquired.into_local_file(&job.source_path()).await?;
        transition(PipelineStage::Acquired, backend);

        let output = job.output_path();
        let effected = self.effects.apply(&source, &output, effect_name).await;
        if let Ok(effect) = &effected {
            transition(PipelineStage::Effected, effect.name);
        }

        // the source goes whether or not the effect succeeded
        remove_quietly(&source).await;
        transition(PipelineStage::Cleaned, &source.display().to_string());
        let effect = effected?;

        let bytes = tokio::fs::read(&output).await.map_err(|e| {
            warn!("Could not read rendered output {}: {}", output.display(), e);
            VibeError::EffectProcessing("rendered output could not be read".to_string())
        })?;
        remove_quietly(&output).await;

        if bytes.is_empty() {
            return Err(VibeError::EffectProcessing("rendered output is empty".to_string()));
        }

        info!(
            "Job {} produced {} bytes for {} via {}",
            job.id(),
            bytes.len(),
            reference.id(),
            backend
        );

        Ok(ProcessedAudio {
            bytes,
            effect,
            backend,
            video_id: reference.id().to_string(),
        })
    }
}

fn transition(stage: PipelineStage, detail: &str) {
    debug!("pipeline -> {} ({})", stage, detail);
}
