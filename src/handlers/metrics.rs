//! Metrics endpoint handler for Prometheus scraping.
//!
//! Every request runs restic once per registered collector. Gathering blocks
//! on the child process, so it is moved off the async runtime.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
    TaskFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        let message = match self {
            MetricsError::EncodingFailed => "Failed to encode metrics",
            MetricsError::TaskFailed => "Metrics collection task failed",
        };
        (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, MetricsError> {
    let start = Instant::now();
    debug!("Processing /metrics request");

    let gather_state = state.clone();
    let rendered = tokio::task::spawn_blocking(move || gather_state.render_metrics())
        .await
        .map_err(|e| {
            error!("Metrics collection task failed: {}", e);
            MetricsError::TaskFailed
        })?;

    let body = rendered.map_err(|e| {
        error!("Failed to encode Prometheus metrics: {}", e);
        MetricsError::EncodingFailed
    })?;

    debug!(
        "Metrics request completed: {} bytes, {:.3}ms",
        body.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(body)
}
