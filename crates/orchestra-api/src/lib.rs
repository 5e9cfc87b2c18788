//! orchestra-api — the JSON error envelope both HTTP surfaces return.
//!
//! Every failure response from the manager and the worker carries this
//! envelope with the matching HTTP status; the manager's worker client
//! decodes it back out of error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// The wire form of a failed request.
///
/// `reason` is the canonical status text for `status_code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    pub status_code: u16,
    pub message: String,
    pub reason: String,
    pub details: String,
}

impl ResponseError {
    /// Build an envelope for `status` with a human-readable message and
    /// the underlying error's text as details.
    pub fn new(status: StatusCode, message: impl Into<String>, details: impl ToString) -> Self {
        ResponseError {
            status_code: status.as_u16(),
            message: message.into(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            details: details.to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>, details: impl ToString) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, details)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, "")
    }

    pub fn internal(message: impl Into<String>, details: impl ToString) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, details)
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl std::fmt::Display for ResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.message, self.reason, self.details)
    }
}

impl IntoResponse for ResponseError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_is_the_canonical_status_text() {
        let e = ResponseError::bad_request("bad body", "missing field");
        assert_eq!(e.status_code, 400);
        assert_eq!(e.reason, "Bad Request");

        let e = ResponseError::not_found("no such task");
        assert_eq!(e.status_code, 404);
        assert_eq!(e.reason, "Not Found");
    }

    #[test]
    fn envelope_round_trips_through_json() {
        let e = ResponseError::internal("encoding failed", "boom");
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"status_code\":500"));
        assert!(json.contains("\"reason\":\"Internal Server Error\""));

        let back: ResponseError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn status_reconstructs_from_the_code() {
        let e = ResponseError::not_found("gone");
        assert_eq!(e.status(), StatusCode::NOT_FOUND);
    }
}
