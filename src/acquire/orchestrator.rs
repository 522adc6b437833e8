use std::path::Path;
use tracing::{info, warn};

use crate::error::{Result, VibeError};
use crate::job::remove_with_siblings;
use crate::video_id::VideoReference;
use super::{AcquisitionBackend, AcquisitionResult};

/// Runs backends in priority order until one produces audio
pub struct AcquisitionOrchestrator {
    backends: Vec<Box<dyn AcquisitionBackend>>,
}

impl AcquisitionOrchestrator {
    pub fn new(backends: Vec<Box<dyn AcquisitionBackend>>) -> Self {
        Self { backends }
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Try each backend in turn; the first success wins and later backends
    /// are never invoked. When every backend fails, the error lists each
    /// reason in priority order.
    pub async fn acquire(&self, reference: &VideoReference, destination: &Path) -> Result<AcquisitionResult> {
        let mut failures = Vec::with_capacity(self.backends.len());
        let mut verification_required = false;

        for backend in &self.backends {
            info!("Trying backend '{}' for {}", backend.name(), reference.id());

            match backend.fetch(reference, destination).await {
                Ok(result) => {
                    info!("Backend '{}' succeeded for {}", result.backend, reference.id());
                    return Ok(result);
                }
                Err(e) => {
                    warn!("Backend '{}' failed for {}: {}", backend.name(), reference.id(), e);
                    verification_required |= e.verification_required();
                    failures.push(failure_reason(backend.name(), &e));
                    remove_with_siblings(destination).await;
                }
            }
        }

        Err(VibeError::AcquisitionExhausted {
            failures,
            verification_required,
        })
    }
}

fn failure_reason(backend: &str, error: &VibeError) -> String {
    match error {
        VibeError::Acquisition { .. } | VibeError::VerificationRequired { .. } => error.to_string(),
        other => format!("{}: {}", backend, other),
    }
}
