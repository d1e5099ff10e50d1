//! API response models.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

/// Result type for handlers: a JSON body or a mapped error.
pub type HandlerResult<T> = std::result::Result<Json<T>, ErrorResponse>;

/// Wrap a value as a success response.
pub fn ok<T: Serialize>(value: T) -> HandlerResult<T> {
    Ok(Json(value))
}

/// Consistent error body: `{"error": message, "code": CODE}` with the
/// matching HTTP status.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip)]
    status: StatusCode,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "error": self.message, "code": self.code })),
        )
            .into_response()
    }
}

impl From<agroboost_core::Error> for ErrorResponse {
    fn from(err: agroboost_core::Error) -> Self {
        use agroboost_core::Error;
        match err {
            Error::Validation(msg) => Self::bad_request(msg),
            Error::NotFound(msg) => Self::not_found(msg),
            Error::ThresholdRejection(msg) => {
                Self::new(StatusCode::BAD_REQUEST, "THRESHOLD_REJECTED", msg)
            }
            Error::Storage(msg) => {
                tracing::error!(error = %msg, "storage failure surfaced to API");
                Self::internal("internal server error")
            }
            Error::Transport(msg) => {
                // Transport errors are contractually log-only; reaching here
                // means a handler awaited a publish it should not have.
                tracing::error!(error = %msg, "transport failure surfaced to API");
                Self::internal("internal server error")
            }
        }
    }
}

impl From<agroboost_storage::Error> for ErrorResponse {
    fn from(err: agroboost_storage::Error) -> Self {
        agroboost_core::Error::from(err).into()
    }
}
