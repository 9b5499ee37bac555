//! Shared error plumbing.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Grepable error code attached to error responses.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// JSON body of every API error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

/// Build an error response with `status` from a typed error.
pub fn error_response<E: ErrorCode + ?Sized>(status: StatusCode, err: &E) -> Response {
    let body = ErrorBody { code: err.error_code(), message: err.to_string(), retryable: err.retryable() };
    (status, Json(body)).into_response()
}
