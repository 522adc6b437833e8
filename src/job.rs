use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::{Result, VibeError};

/// Temporary resources owned by a single request.
///
/// Every file a job creates lives inside its own `job-<uuid>` directory under
/// the shared temp root, so concurrent jobs never collide and releasing the
/// directory releases everything. `finish` removes it and logs failures;
/// dropping an unfinished job removes it silently.
pub struct ProcessingJob {
    id: Uuid,
    dir: Option<TempDir>,
    work_dir: PathBuf,
}

impl ProcessingJob {
    /// Create the job directory under `temp_root`
    pub async fn create(temp_root: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(temp_root).await.map_err(|e| {
            VibeError::Internal(format!(
                "Failed to create temp root {}: {}",
                temp_root.display(),
                e
            ))
        })?;

        let id = Uuid::new_v4();
        let root = temp_root.to_path_buf();
        let dir = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(&format!("job-{}-", id))
                .tempdir_in(root)
        })
        .await
        .map_err(|e| VibeError::Internal(format!("Job directory task failed: {}", e)))?
        .map_err(|e| VibeError::Internal(format!("Failed to create job directory: {}", e)))?;
        let work_dir = dir.path().to_path_buf();
        debug!("Created job {} in {}", id, work_dir.display());

        Ok(Self {
            id,
            dir: Some(dir),
            work_dir,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Download target; backends may append their own extension
    pub fn source_path(&self) -> PathBuf {
        self.work_dir.join("source")
    }

    /// Final rendered file
    pub fn output_path(&self) -> PathBuf {
        self.work_dir.join("output.mp3")
    }

    /// Path for an uploaded or generated file inside the job directory
    pub fn file(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }

    /// Files currently inside the job directory
    fn residual_files(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.work_dir)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect()
    }

    /// Release the job directory, logging rather than failing on errors
    pub fn finish(mut self) {
        if let Some(dir) = self.dir.take() {
            let leftover = self.residual_files().len();
            if leftover > 0 {
                debug!("Job {} still holds {} file(s)", self.id, leftover);
            }
            match dir.close() {
                Ok(()) => debug!("Released job {}", self.id),
                Err(e) => warn!(
                    "Failed to remove job directory {}: {}",
                    self.work_dir.display(),
                    e
                ),
            }
        }
    }
}

/// Remove a file if it exists. Cleanup never changes a job's outcome.
pub async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Remove `path` and any sibling sharing its file stem (`source`, `source.mp3`,
/// `source.webm.part`, ...). Used after a failed download attempt.
pub async fn remove_with_siblings(path: &Path) {
    remove_quietly(path).await;

    let (Some(parent), Some(stem)) = (path.parent(), path.file_name()) else {
        return;
    };
    let prefix = format!("{}.", stem.to_string_lossy());

    for entry in WalkDir::new(parent)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.file_type().is_file()
            && entry.file_name().to_string_lossy().starts_with(&prefix)
        {
            remove_quietly(entry.path()).await;
        }
    }
}
