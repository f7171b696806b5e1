use async_trait::async_trait;
use modelgen_service::config::{Config, InferenceConfig, StagingConfig};
use modelgen_service::services::inference::{InferenceError, InferenceOutput, InferenceRunner};
use modelgen_service::startup::Application;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

pub struct TestApp {
    pub address: String,
    pub staging_dir: PathBuf,
}

impl TestApp {
    /// Spawn the application with a stub inference script standing in for the
    /// external pipeline. The builder receives the staging directory so the
    /// stub can drop its invocation marker there.
    pub async fn spawn_with_script(build_script: impl FnOnce(&Path) -> String) -> Self {
        Self::spawn_with_script_and_timeout(build_script, 30).await
    }

    pub async fn spawn_with_script_and_timeout(
        build_script: impl FnOnce(&Path) -> String,
        timeout_secs: u64,
    ) -> Self {
        let staging_dir = PathBuf::from(format!("target/test-staging-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&staging_dir)
            .await
            .expect("Failed to create staging dir");

        let script_path = staging_dir.join("stub_inference.sh");
        tokio::fs::write(&script_path, build_script(&staging_dir))
            .await
            .expect("Failed to write stub script");

        let config = Config {
            port: 0, // Random port
            staging: StagingConfig {
                dir: staging_dir.clone(),
            },
            inference: InferenceConfig {
                interpreter: "/bin/sh".to_string(),
                script: script_path,
                base_dir: PathBuf::from("."),
                timeout_secs,
            },
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        Self::start(app, staging_dir).await
    }

    /// Spawn the application with an in-process runner substituted at the
    /// collaborator seam.
    pub async fn spawn_with_runner(runner: Arc<dyn InferenceRunner>) -> Self {
        let staging_dir = PathBuf::from(format!("target/test-staging-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&staging_dir)
            .await
            .expect("Failed to create staging dir");

        let config = Config {
            port: 0,
            staging: StagingConfig {
                dir: staging_dir.clone(),
            },
            inference: InferenceConfig::default(),
        };

        let app = Application::build_with_runner(config, runner)
            .await
            .expect("Failed to build test application");

        Self::start(app, staging_dir).await
    }

    async fn start(app: Application, staging_dir: PathBuf) -> Self {
        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to be ready by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            staging_dir,
        }
    }

    /// Whether a stub script ran (they all touch a marker file first).
    pub fn stub_invoked(&self) -> bool {
        self.staging_dir.join("stub_invoked").exists()
    }

    /// Staged input files still present in the staging directory.
    pub fn staged_uploads(&self) -> Vec<PathBuf> {
        self.files_with_prefix("upload_")
    }

    /// Generated artifacts still present in the staging directory.
    pub fn artifacts(&self) -> Vec<PathBuf> {
        self.files_with_prefix("generated_model_")
    }

    fn files_with_prefix(&self, prefix: &str) -> Vec<PathBuf> {
        std::fs::read_dir(&self.staging_dir)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.path())
                    .filter(|path| {
                        path.file_name()
                            .and_then(|name| name.to_str())
                            .is_some_and(|name| name.starts_with(prefix))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn cleanup(&self) {
        let _ = tokio::fs::remove_dir_all(&self.staging_dir).await;
    }
}

/// Stub that parses the real argument contract and writes `payload` to the
/// output path.
pub fn success_script(staging_dir: &Path, payload: &str) -> String {
    format!(
        r#"#!/bin/sh
: > "{dir}/stub_invoked"
out=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    --output-path) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
printf '%s' '{payload}' > "$out"
"#,
        dir = staging_dir.display(),
        payload = payload,
    )
}

/// Like `success_script` but holds the output back long enough for requests
/// to overlap.
pub fn slow_success_script(staging_dir: &Path, payload: &str) -> String {
    format!(
        r#"#!/bin/sh
: > "{dir}/stub_invoked"
out=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    --output-path) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
sleep 1
printf '%s' '{payload}' > "$out"
"#,
        dir = staging_dir.display(),
        payload = payload,
    )
}

/// Stub that fails with diagnostic text on stderr.
pub fn failing_script(staging_dir: &Path, message: &str) -> String {
    format!(
        r#"#!/bin/sh
: > "{dir}/stub_invoked"
echo "{message}" 1>&2
exit 3
"#,
        dir = staging_dir.display(),
        message = message,
    )
}

/// Stub that never finishes within any reasonable bound.
pub fn hanging_script(staging_dir: &Path) -> String {
    format!(
        r#"#!/bin/sh
: > "{dir}/stub_invoked"
exec sleep 60
"#,
        dir = staging_dir.display(),
    )
}

/// Stub that exits zero without writing anything to the output path.
pub fn silent_script(staging_dir: &Path) -> String {
    format!(
        r#"#!/bin/sh
: > "{dir}/stub_invoked"
exit 0
"#,
        dir = staging_dir.display(),
    )
}

/// In-process stand-in for the inference pipeline.
pub struct MockRunner {
    pub payload: Vec<u8>,
}

#[async_trait]
impl InferenceRunner for MockRunner {
    async fn run(
        &self,
        _image_path: &Path,
        output_path: &Path,
    ) -> Result<InferenceOutput, InferenceError> {
        tokio::fs::write(output_path, &self.payload).await?;
        Ok(InferenceOutput {
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}
