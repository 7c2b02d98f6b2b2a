//! HTTP handlers.

pub mod documents;
pub mod query;

use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

/// Standard JSON error body.
pub(crate) fn error_response(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(json!({ "error": message.into() })))
}
