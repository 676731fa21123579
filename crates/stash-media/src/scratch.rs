//! Per-job scratch space.
//!
//! Every intermediate file a job writes (downloaded original, poster,
//! transcoded output) is allocated inside one private directory. The
//! directory is deleted when the [`ScratchSpace`] is dropped, whichever
//! way the job ended.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::MediaResult;

/// A uniquely named directory owned by one job invocation.
#[derive(Debug)]
pub struct ScratchSpace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchSpace {
    /// Create a fresh directory under `work_dir`, creating `work_dir` if needed.
    pub async fn create_in(work_dir: impl AsRef<Path>, label: &str) -> MediaResult<Self> {
        let work_dir = work_dir.as_ref();
        tokio::fs::create_dir_all(work_dir).await?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", label))
            .tempdir_in(work_dir)?;
        let path = dir.path().to_path_buf();
        debug!(path = %path.display(), "Created scratch directory");

        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    /// Directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path for a file named `name` inside the scratch directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Remove the directory now and report failures.
    pub fn close(mut self) -> MediaResult<()> {
        match self.dir.take() {
            Some(dir) => dir.close().map_err(Into::into),
            None => Ok(()),
        }
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!(path = %path.display(), error = %e, "Failed to remove scratch directory");
            }
        }
    }
}
