use crate::error::AppError;
use crate::services::staging::{ArtifactPath, StagedFile};
use crate::startup::AppState;
use axum::{
    body::{Body, Bytes},
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Suffix-only check, case-insensitive. Content is never sniffed.
fn image_extension(filename: &str) -> Option<&str> {
    let (_, extension) = filename.rsplit_once('.')?;
    ALLOWED_EXTENSIONS
        .iter()
        .any(|allowed| extension.eq_ignore_ascii_case(allowed))
        .then_some(extension)
}

pub async fn generate_model(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    // The upload is bound to the `file` field; any other fields are skipped.
    let mut field = loop {
        match multipart.next_field().await.map_err(|e| {
            AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
        })? {
            Some(field) if field.name() == Some("file") => break field,
            Some(_) => continue,
            None => return Err(AppError::BadRequest(anyhow::anyhow!("No file uploaded"))),
        }
    };

    let file_name = field.file_name().unwrap_or("").to_string();
    let Some(extension) = image_extension(&file_name) else {
        // A rejection, not a fault.
        tracing::info!(file_name = %file_name, "Rejected upload with unsupported extension");
        metrics::counter!("generate_requests_total", "outcome" => "rejected").increment(1);
        return Err(AppError::InvalidFileType);
    };
    let extension = extension.to_string();

    // Deleted on every exit path once created; the body is streamed to disk
    // rather than buffered, since uploads carry no size limit.
    let (staged, mut writer) = StagedFile::create(&state.config.staging.dir, &extension).await?;
    let mut size: u64 = 0;
    while let Some(chunk) = field.chunk().await.map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!("Failed to read file bytes: {}", e))
    })? {
        size += chunk.len() as u64;
        writer.write_all(&chunk).await?;
    }
    writer.flush().await?;
    drop(writer);

    let artifact_name = format!("generated_model_{}.glb", Uuid::new_v4().simple());
    let artifact = ArtifactPath::new(state.config.staging.dir.join(&artifact_name));

    tracing::info!(
        file_name = %file_name,
        size = size,
        image_path = %staged.path().display(),
        output_path = %artifact.path().display(),
        "Dispatching model generation"
    );

    let started = Instant::now();
    let run_result = state.runner.run(staged.path(), artifact.path()).await;
    metrics::histogram!("generate_duration_seconds").record(started.elapsed().as_secs_f64());

    let output = run_result.map_err(|e| {
        tracing::error!(file_name = %file_name, error = %e, "Inference run failed");
        metrics::counter!("generate_requests_total", "outcome" => "failed").increment(1);
        AppError::from(e)
    })?;

    if !output.stdout.is_empty() {
        tracing::debug!(stdout = %output.stdout, "Inference process stdout");
    }
    if !output.stderr.is_empty() {
        tracing::debug!(stderr = %output.stderr, "Inference process stderr");
    }

    // Exit code zero with no file at the output path is the collaborator
    // breaking its contract, not a client error.
    if !tokio::fs::try_exists(artifact.path()).await.unwrap_or(false) {
        tracing::error!(
            output_path = %artifact.path().display(),
            "Inference process exited cleanly but produced no artifact"
        );
        metrics::counter!("generate_requests_total", "outcome" => "missing_artifact").increment(1);
        return Err(AppError::OutputArtifactMissing {
            path: artifact.path().display().to_string(),
            stderr: output.stderr,
        });
    }

    let file = tokio::fs::File::open(artifact.path()).await?;

    tracing::info!(
        file_name = %file_name,
        artifact = %artifact.path().display(),
        "Model generation completed"
    );
    metrics::counter!("generate_requests_total", "outcome" => "success").increment(1);

    // The guard rides along with the stream; the artifact is removed once the
    // body has been fully sent (or the client goes away).
    let body = Body::from_stream(ArtifactStream {
        inner: ReaderStream::new(file),
        _artifact: artifact,
    });

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "model/gltf-binary".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", artifact_name),
            ),
        ],
        body,
    )
        .into_response())
}

struct ArtifactStream {
    inner: ReaderStream<tokio::fs::File>,
    _artifact: ArtifactPath,
}

impl Stream for ArtifactStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}
