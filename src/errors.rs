use crate::services::{
    blob_store::StoreError, resolver::ResolveError, transcoder::TranscodeError,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

pub const NO_FILE_EXISTS: &str = "No file exists";
pub const NO_FILES_EXIST: &str = "No files exist";
pub const NOT_AN_IMAGE: &str = "Not an image";
pub const TICKET_TOO_LARGE: &str = "Ticket too large";

/// A lightweight wrapper for general errors that keeps the message local.
///
/// Rendered as `{"err": "<message>"}` with the carried status.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn no_file() -> Self {
        Self::not_found(NO_FILE_EXISTS)
    }

    pub fn not_an_image() -> Self {
        Self::not_found(NOT_AN_IMAGE)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("request failed: {}", self.message);
        }
        let body = Json(json!({ "err": self.message }));
        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppError::no_file(),
            other => AppError::internal(other.to_string()),
        }
    }
}

impl From<ResolveError> for AppError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound(_) => AppError::no_file(),
            ResolveError::Store(inner) => inner.into(),
        }
    }
}

impl From<TranscodeError> for AppError {
    fn from(err: TranscodeError) -> Self {
        match err {
            TranscodeError::TooLarge { .. } => {
                AppError::new(StatusCode::PAYLOAD_TOO_LARGE, TICKET_TOO_LARGE)
            }
            other => AppError::internal(other.to_string()),
        }
    }
}
