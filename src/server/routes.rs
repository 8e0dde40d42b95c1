//! Route handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::AppState;
use super::error::{ApiError, ApiResult};
use crate::blob::validate_name;
use crate::phrase;
use crate::runner::Task;
use crate::telemetry::{metrics, usage};

/// Multipart field carrying the upload.
const FILE_FIELD: &str = "file";

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct PhrasePayload {
    phrase: String,
}

pub(super) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Save the `file` field, waiting at most the runner's deadline.
pub(super) async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<String> {
    let task = read_file_field(multipart).await?;
    let name = task.name.clone();

    let execution = state.runner.execute(task).await;
    usage::log_usage(&state.runner);

    execution.into_result()?;
    Ok(format!("'{name}' uploaded!"))
}

async fn read_file_field(mut multipart: Multipart) -> ApiResult<Task> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("field 'file' has no file name"))?;
        validate_name(&name)?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        return Ok(Task::new(name, bytes.to_vec()));
    }
    Err(ApiError::bad_request("missing multipart field 'file'"))
}

pub(super) async fn test_phrase(
    payload: Result<Json<PhrasePayload>, JsonRejection>,
) -> ApiResult<&'static str> {
    let Json(payload) = payload.map_err(|e| {
        warn!(error = %e, "bad phrase payload");
        ApiError::unprocessable("Invalid json provided")
    })?;
    phrase::check(&payload.phrase)?;
    Ok("YOU GOT IT!")
}

pub(super) async fn log_usage(State(state): State<Arc<AppState>>) -> &'static str {
    usage::log_usage(&state.runner);
    "logged"
}

pub(super) async fn add_visitor(State(state): State<Arc<AppState>>) -> String {
    let count = state.visitors.increment();
    metrics::visitor_operations().add(
        1,
        &[
            KeyValue::new("operation", "add"),
            KeyValue::new("result", "ok"),
        ],
    );
    info!(count, "visitor added");
    format!("Visitor Count: {count}\n")
}

pub(super) async fn subtract_visitor(State(state): State<Arc<AppState>>) -> ApiResult<String> {
    let result = state.visitors.decrement();
    metrics::visitor_operations().add(
        1,
        &[
            KeyValue::new("operation", "subtract"),
            KeyValue::new("result", if result.is_ok() { "ok" } else { "underflow" }),
        ],
    );
    let count = result?;
    info!(count, "visitor subtracted");
    Ok(format!("Visitor Count: {count}\n"))
}
