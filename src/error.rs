use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::services::inference::InferenceError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid file type. Please upload a PNG or JPG image.")]
    InvalidFileType,

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Model generation failed. Error: {stderr}")]
    InferenceProcessFailed { stderr: String },

    #[error("Generated model not found at {path}. Details: {stderr}")]
    OutputArtifactMissing { path: String, stderr: String },

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("An unexpected error occurred: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<InferenceError> for AppError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::Failed { stderr, .. } => AppError::InferenceProcessFailed { stderr },
            InferenceError::TimedOut(limit) => AppError::InferenceProcessFailed {
                stderr: format!("inference timed out after {}s", limit.as_secs()),
            },
            InferenceError::Spawn(e) => AppError::InternalError(anyhow::Error::new(e)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Wire shape fixed by the HTTP contract: {"detail": "<message>"}.
        #[derive(Serialize)]
        struct ErrorResponse {
            detail: String,
        }

        let status = match self {
            AppError::InvalidFileType | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InferenceProcessFailed { .. }
            | AppError::OutputArtifactMissing { .. }
            | AppError::ConfigError(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(ErrorResponse {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}
