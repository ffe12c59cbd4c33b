//! Error boundary for the HTTP surface.
//!
//! Every service error is converted here into the structured JSON shape
//! `{ success: false, error, details? }` with an HTTP status: 400 for caller
//! input errors, 500 for everything else. No panic or raw error string ever
//! escapes a handler unwrapped.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::services::merge_service::MergeError;
use crate::services::signing_service::IssueError;
use crate::services::sigv4::SignError;

/// A status-coded error with a short message and optional detail text.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            details: None,
        }
    }

    /// 400 for missing or malformed caller input.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// 500 with an underlying cause preserved in `details`.
    pub fn internal(msg: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
            details: Some(details.into()),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "error": self.message,
        });
        if let Some(details) = self.details {
            body["details"] = json!(details);
        }

        (self.status, Json(body)).into_response()
    }
}

impl From<IssueError> for ApiError {
    fn from(err: IssueError) -> Self {
        match err {
            IssueError::InvalidInput(msg) => ApiError::bad_request(msg),
            IssueError::Sign(SignError::Configuration(details)) => {
                ApiError::internal("storage configuration error", details)
            }
            IssueError::Sign(SignError::Signing(details)) => {
                ApiError::internal("request signing failed", details)
            }
        }
    }
}

impl From<MergeError> for ApiError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::InvalidInput(msg) => ApiError::bad_request(msg),
            MergeError::ChunkMissing { index, source } => ApiError::internal(
                format!("chunk {} is missing or unreadable", index),
                source.to_string(),
            ),
            MergeError::Upload(source) => {
                ApiError::internal("failed to upload merged object", source.to_string())
            }
        }
    }
}
