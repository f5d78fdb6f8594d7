//! Mapping of `AskError` onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::error::AskError;

/// Message sent in place of 5xx details when redaction is on.
pub const REDACTED_MESSAGE: &str = "Internal server error";

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
}

/// An error ready to be sent to the client.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    /// Builds the response for `err`, hiding 5xx details when `redact` is set.
    pub fn new(err: AskError, redact: bool) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = if err.is_server_error() {
            error!("{}: {}", err.category(), err);
            if redact {
                REDACTED_MESSAGE.to_string()
            } else {
                err.to_string()
            }
        } else {
            err.to_string()
        };

        Self {
            status,
            body: ErrorBody {
                error: message,
                kind: err.category(),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AskError> for ApiError {
    fn from(err: AskError) -> Self {
        Self::new(err, false)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::SqlRejection;

    #[test]
    fn test_status_follows_error_kind() {
        assert_eq!(
            ApiError::from(AskError::invalid_input("x")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AskError::Rejected(SqlRejection::NotSelect)).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(AskError::BudgetExhausted).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::from(AskError::timeout("slow")).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_redaction_only_hides_server_errors() {
        let hidden = ApiError::new(AskError::query("no such column: emal"), true);
        assert_eq!(hidden.body.error, REDACTED_MESSAGE);
        assert_eq!(hidden.body.kind, "Query Error");

        let shown = ApiError::new(AskError::query("no such column: emal"), false);
        assert!(shown.body.error.contains("no such column"));

        let client = ApiError::new(AskError::invalid_input("No file part"), true);
        assert_eq!(client.body.error, "No file part");
    }
}
