//! Error response formatting
//!
//! Every failure leaving the API carries the same JSON structure: a
//! machine-readable code, a user-facing message, the request id, a
//! timestamp and whether the client may retry.

use crate::error::{AppError, ErrorCode};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorCode,
    pub message: String,
    pub request_id: Option<String>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl ErrorResponse {
    pub fn from_app_error(error: &AppError) -> Self {
        Self {
            error: error.error_code(),
            message: error.user_message(),
            request_id: error.request_id.clone(),
            timestamp: Utc::now().to_rfc3339(),
            retryable: Some(error.is_retryable()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(
                error = %self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "server error"
            );
        } else {
            tracing::warn!(
                error = %self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "client error"
            );
        }

        let body = ErrorResponse::from_app_error(&self);
        (status_code, Json(body)).into_response()
    }
}

pub fn get_request_id_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::OtpError;

    #[test]
    fn error_response_carries_code_and_retryability() {
        let err: AppError = OtpError::RateLimited {
            retry_after_secs: 42,
        }
        .into();
        let err = err.with_request_id("req_1");

        let body = ErrorResponse::from_app_error(&err);
        assert_eq!(body.error, ErrorCode::RateLimited);
        assert_eq!(body.request_id.as_deref(), Some("req_1"));
        assert!(body.message.contains("42"));
        assert_eq!(body.retryable, Some(false));
    }

    #[test]
    fn into_response_uses_the_mapped_status() {
        let err: AppError = OtpError::NotFound.into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
