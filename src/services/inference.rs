//! The seam to the external image-to-3D pipeline.
//!
//! The pipeline is an opaque, independently-versioned executable: it takes an
//! input image path and an output path, and either produces a binary model
//! file or fails with diagnostic text on stderr. Nothing about it is
//! reimplemented here.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use crate::config::InferenceConfig;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("failed to spawn inference process: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("inference process exited with {status}: {stderr}")]
    Failed {
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("inference process timed out after {0:?}")]
    TimedOut(Duration),
}

/// Captured output of a run that exited zero.
///
/// A zero exit does not guarantee the artifact exists; the caller checks the
/// output path itself.
pub struct InferenceOutput {
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait InferenceRunner: Send + Sync {
    async fn run(
        &self,
        image_path: &Path,
        output_path: &Path,
    ) -> Result<InferenceOutput, InferenceError>;
}

/// Runs the configured inference script as a child process.
pub struct ScriptRunner {
    interpreter: String,
    script: PathBuf,
    base_dir: PathBuf,
    timeout: Option<Duration>,
}

impl ScriptRunner {
    pub fn new(config: &InferenceConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            script: config.script.clone(),
            base_dir: config.base_dir.clone(),
            timeout: (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs)),
        }
    }
}

#[async_trait]
impl InferenceRunner for ScriptRunner {
    async fn run(
        &self,
        image_path: &Path,
        output_path: &Path,
    ) -> Result<InferenceOutput, InferenceError> {
        let mut command = Command::new(&self.interpreter);
        command
            .arg(self.base_dir.join(&self.script))
            .arg("--image-input")
            .arg(image_path)
            .arg("--output-path")
            .arg(output_path)
            .current_dir(&self.base_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the handle (timeout, client disconnect) kills the child.
            .kill_on_drop(true);

        tracing::info!(
            interpreter = %self.interpreter,
            script = %self.script.display(),
            image = %image_path.display(),
            output = %output_path.display(),
            "Spawning inference process"
        );

        let child = command.spawn()?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| InferenceError::TimedOut(limit))??,
            None => child.wait_with_output().await?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(InferenceError::Failed {
                status: output.status,
                stderr,
            });
        }

        Ok(InferenceOutput { stdout, stderr })
    }
}
