//! HTTP transport.
//!
//! | Route | Behavior |
//! |---|---|
//! | `POST /image?x-oss-process=<descriptor>` | body = source image, response = encoded image or info JSON |
//! | `GET /health` | `200 success` |
//!
//! The upload is streamed into a pooled buffer, then the whole pipeline runs
//! on the backend worker pool. Failures become the JSON error body
//! `{"code","message","reason"}` with `code` as the HTTP status, or with 200
//! when `legacy_error_status` is set.

use crate::buffer_pool::{BufferPool, PoolStats, PooledBuffer};
use crate::config::{ConfigError, ServerConfig, ServiceConfig};
use crate::error::{ErrorReply, ProcessError};
use crate::imaging::RustBackend;
use crate::pipeline::{CancelFlag, ProcessOutput, Processor, ProcessorSettings};
use crate::runtime::BackendContext;
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{Instrument, error, info, info_span, warn};

/// Query parameter carrying the descriptor.
pub const PROCESS_PARAM: &str = "x-oss-process";

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    processor: Arc<Processor<RustBackend>>,
    context: Arc<BackendContext>,
    buffers: BufferPool,
    limits: ServerConfig,
}

impl AppState {
    /// Build the backend context, buffer pool, and processor from config.
    pub fn new(config: &ServiceConfig) -> Result<Self, ServerError> {
        let backend = RustBackend::with_decode_limit(config.backend.max_decode_bytes)
            .with_output_limit(config.image.max_output_pixels);
        Ok(Self {
            processor: Arc::new(Processor::new(backend, ProcessorSettings::from(config))),
            context: Arc::new(BackendContext::new(&config.backend)?),
            buffers: BufferPool::new(config.backend.buffer_pool_size),
            limits: config.server.clone(),
        })
    }

    pub fn buffer_stats(&self) -> PoolStats {
        self.buffers.stats()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/image", post(process_image))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: ServiceConfig) -> Result<(), ServerError> {
    let addr = config.server.socket_addr()?;
    let state = AppState::new(&config)?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "cannot listen for Ctrl-C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}

async fn health() -> &'static str {
    "success"
}

/// Raises the request's cancel flag when the handler future goes away.
struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

async fn read_body(body: Body, buffer: &mut PooledBuffer, limit: usize) -> Result<(), ProcessError> {
    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|e| ProcessError::Internal(format!("failed to read request body: {e}")))?;
        if buffer.len() + chunk.len() > limit {
            return Err(ProcessError::PayloadTooLarge(limit));
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(())
}

async fn run_request(
    state: &AppState,
    descriptor: String,
    body: Body,
    cancel: &CancelFlag,
) -> Result<ProcessOutput, ProcessError> {
    if descriptor.is_empty() {
        return Err(ProcessError::param(format!(
            "Missing required param: {PROCESS_PARAM}"
        )));
    }
    let mut buffer = state.buffers.checkout();
    read_body(body, &mut buffer, state.limits.max_body_bytes).await?;

    let processor = Arc::clone(&state.processor);
    let job_cancel = cancel.clone();
    let job = move || processor.process(&buffer, &descriptor, &job_cancel);

    match state.limits.timeout_secs {
        0 => state.context.run(job).await,
        secs => match tokio::time::timeout(Duration::from_secs(secs), state.context.run(job)).await
        {
            Ok(result) => result,
            Err(_) => {
                cancel.cancel();
                warn!(timeout_secs = secs, "request timed out");
                Err(ProcessError::Cancelled)
            }
        },
    }
}

/// HTTP status for an error, honoring the legacy always-200 mode.
pub fn error_status(err: &ProcessError, legacy: bool) -> StatusCode {
    if legacy {
        return StatusCode::OK;
    }
    StatusCode::from_u16(err.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn error_response(err: &ProcessError, legacy: bool) -> Response {
    (error_status(err, legacy), Json(ErrorReply::from(err))).into_response()
}

fn output_response(output: ProcessOutput) -> Response {
    match output {
        ProcessOutput::Image(encoded) => (
            [(header::CONTENT_TYPE, encoded.format.mime_type())],
            encoded.bytes,
        )
            .into_response(),
        ProcessOutput::Info(info) => Json(info).into_response(),
    }
}

async fn process_image(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    body: Body,
) -> Response {
    let descriptor = params.get(PROCESS_PARAM).cloned().unwrap_or_default();
    let span = info_span!("request", descriptor = tracing::field::Empty);
    if !descriptor.is_empty() {
        span.record("descriptor", descriptor.as_str());
    }

    async move {
        let started = Instant::now();
        let cancel = CancelOnDrop(CancelFlag::new());
        let result = run_request(&state, descriptor, body, &cancel.0).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(output) => {
                info!(elapsed_ms, "processed");
                output_response(output)
            }
            Err(err) => {
                if err.is_client_error() {
                    warn!(code = err.code(), reason = err.reason(), error = %err, elapsed_ms, "rejected");
                } else {
                    error!(code = err.code(), reason = err.reason(), error = %err, elapsed_ms, "failed");
                }
                error_response(&err, state.limits.legacy_error_status)
            }
        }
    }
    .instrument(span)
    .await
}
