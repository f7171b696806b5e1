use crate::config::Config;
use crate::error::AppError;
use crate::handlers;
use crate::services::inference::{InferenceRunner, ScriptRunner};
use crate::services::metrics::get_metrics;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub runner: Arc<dyn InferenceRunner>,
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
}

impl Application {
    pub async fn build(config: Config) -> Result<Self, AppError> {
        let runner = Arc::new(ScriptRunner::new(&config.inference));
        Self::build_with_runner(config, runner).await
    }

    /// Used by tests to substitute the external collaborator.
    pub async fn build_with_runner(
        config: Config,
        runner: Arc<dyn InferenceRunner>,
    ) -> Result<Self, AppError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

        let state = AppState { config, runner };

        let app = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/metrics", get(metrics_endpoint))
            .route("/generate-3d-model", post(handlers::generate_model))
            // No upload size limit; the only input rule is the suffix check.
            .layer(DefaultBodyLimit::disable())
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                }),
            )
            .with_state(state);

        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
