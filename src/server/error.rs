//! API error type and HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// JSON error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub msg: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "UNPROCESSABLE_ENTITY", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiErrorBody {
                code: self.code.to_string(),
                msg: self.message,
            }),
        )
            .into_response()
    }
}

impl From<Error> for ApiError {
    fn from(value: Error) -> Self {
        match value {
            Error::SaveFailed(reason) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "SAVE_FAILED",
                format!("Unable to save file: {reason}"),
            ),
            Error::TimedOut => Self::new(
                StatusCode::GATEWAY_TIMEOUT,
                "TIMED_OUT",
                "Save not confirmed before the deadline; it may still complete",
            ),
            Error::CounterUnderflow => {
                Self::new(StatusCode::CONFLICT, "COUNTER_UNDERFLOW", value.to_string())
            }
            Error::InvalidPhrase => Self::new(
                StatusCode::FORBIDDEN,
                "INVALID_PHRASE",
                "Invalid phrase",
            ),
            Error::InvalidBlobName(_) => Self::bad_request(value.to_string()),
            Error::Config(_) | Error::Io(_) | Error::Other(_) => Self::internal(value.to_string()),
        }
    }
}
