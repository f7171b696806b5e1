//! Temp-file staging with guaranteed cleanup.
//!
//! Both guards delete their path on drop, which runs on every exit path of a
//! request (success, error, panic, cancellation). A failed deletion is logged
//! and never allowed to mask the request outcome.

use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// An uploaded file persisted to the staging directory, deleted when dropped.
pub struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    /// Allocates a uniquely named file preserving the upload's extension and
    /// hands back a writer for it, so the caller can stream the body to disk
    /// chunk by chunk. The guard is live from this point: a failure mid-write
    /// still removes the partial file.
    pub async fn create(dir: &Path, extension: &str) -> std::io::Result<(Self, fs::File)> {
        fs::create_dir_all(dir).await?;
        let path = dir.join(format!("upload_{}.{}", Uuid::new_v4().simple(), extension));
        let file = fs::File::create(&path).await?;
        Ok((Self { path }, file))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        remove_quietly(&self.path, "staged upload");
    }
}

/// Tracks the path the inference process writes its artifact to, deleting
/// whatever exists there on drop. On success the guard is handed to the
/// response body stream, so deletion happens after the bytes have been sent.
pub struct ArtifactPath {
    path: PathBuf,
}

impl ArtifactPath {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ArtifactPath {
    fn drop(&mut self) {
        remove_quietly(&self.path, "generated artifact");
    }
}

fn remove_quietly(path: &Path, what: &str) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to remove {what}"
            );
        }
    }
}
