use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

const GENERIC_INTERNAL_MESSAGE: &str = "An unexpected error occurred";

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorInfo,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorInfo {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

/// Caller-facing error. Internal failures never carry their cause here;
/// the cause is logged when the error is built.
#[derive(Debug)]
pub enum AppError {
    BadRequest {
        code: String,
        message: String,
        details: Option<String>,
    },
    NotFound {
        code: String,
        message: String,
    },
    Conflict {
        code: String,
        message: String,
    },
    InternalServerError {
        code: String,
        message: String,
    },
}

impl AppError {
    pub fn bad_request(code: &str, message: &str) -> Self {
        Self::BadRequest {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
        }
    }

    pub fn bad_request_with_details(
        code: &str, message: &str, details: &str,
    ) -> Self {
        Self::BadRequest {
            code: code.to_string(),
            message: message.to_string(),
            details: Some(details.to_string()),
        }
    }

    pub fn not_found(code: &str, message: &str) -> Self {
        Self::NotFound {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    pub fn conflict(code: &str, message: &str) -> Self {
        Self::Conflict {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    /// Logs `cause` and hides it from the caller.
    pub fn internal_server_error(cause: &dyn fmt::Display) -> Self {
        tracing::error!(error = %cause, "Internal error");
        Self::InternalServerError {
            code: "INTERNAL_ERROR".to_string(),
            message: GENERIC_INTERNAL_MESSAGE.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::InternalServerError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::BadRequest { code, .. }
            | Self::NotFound { code, .. }
            | Self::Conflict { code, .. }
            | Self::InternalServerError { code, .. } => code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::NotFound { message, .. }
            | Self::Conflict { message, .. }
            | Self::InternalServerError { message, .. } => message,
        }
    }

    fn to_response_data(&self) -> ApiErrorResponse {
        let details = match self {
            Self::BadRequest { details, .. } => details.clone(),
            _ => None,
        };

        ApiErrorResponse {
            error: ApiErrorInfo {
                code: self.code().to_string(),
                message: self.message().to_string(),
                details,
            },
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let response_data = self.to_response_data();
        (status, Json(response_data)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self { Self::internal_server_error(&err) }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_error_hides_cause() {
        let err = AppError::internal_server_error(&"password=hunter2 leaked");

        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), GENERIC_INTERNAL_MESSAGE);
        assert!(!err.to_string().contains("hunter2"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::not_found("X", "missing").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::conflict("X", "taken").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::bad_request("X", "bad").status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_response_body_shape() {
        let err =
            AppError::bad_request_with_details("VALIDATION", "bad", "title");
        let body = serde_json::to_value(err.to_response_data()).unwrap();

        assert_eq!(body["error"]["code"], "VALIDATION");
        assert_eq!(body["error"]["details"], "title");
    }

    #[test]
    fn test_into_response_sets_status() {
        let response = AppError::not_found("LIST_NOT_FOUND", "nope").into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
