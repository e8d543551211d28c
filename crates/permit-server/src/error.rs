//! HTTP-facing error type for the Arbiter Service.
//!
//! Mirrors the `ThrottlerError`-style handler error used by the axum rate
//! limiter this crate is grounded on: one enum, one `IntoResponse` impl,
//! handlers return `Result<impl IntoResponse, ServerError>` directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

/// Errors an Arbiter Service handler can surface to its caller.
///
/// A `request_token`/`report_result` payload that fails validation is
/// rejected with a 4xx (SPEC §7, "Invalid payload"); the client treats that
/// the same way it treats an unreachable arbiter — as a fallback signal.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("store error: {0}")]
    Store(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::InvalidPayload(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::Store(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
