//! Error response formatting.
//!
//! Standardized error envelope for all API failures: machine-readable
//! code, user-facing message, request id, timestamp, retryability.
//! Invariant violations log their full detail server-side and surface to
//! the client as a generic internal error.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppErrorKind, ErrorCode};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub error: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Request ID for debugging and support
    pub request_id: Option<String>,

    /// ISO 8601 timestamp of the error
    pub timestamp: String,

    /// Whether the client should retry the request
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

        match &self.kind {
            AppErrorKind::Invariant(detail) => {
                // Full detail for the operator, generic message for the client.
                tracing::error!(
                    invariant = ?detail,
                    request_id = ?self.request_id,
                    "invariant violation"
                );
            }
            _ if status_code.is_server_error() => {
                tracing::error!(
                    error = ?self,
                    request_id = ?self.request_id,
                    status = %status_code.as_u16(),
                    "server error occurred"
                );
            }
            _ => {
                tracing::warn!(
                    error = ?self,
                    request_id = ?self.request_id,
                    status = %status_code.as_u16(),
                    "client error occurred"
                );
            }
        }

        let error_response = ErrorResponse::from_app_error(&self);
        (status_code, Json(error_response)).into_response()
    }
}

/// Helper to extract the request id propagated by the request-id layer.
pub fn get_request_id_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DomainError, InvariantViolation, ValidationError};

    #[test]
    fn error_response_carries_code_and_retryability() {
        let app_error = AppError::domain(DomainError::InsufficientBalance {
            available: "50.00".to_string(),
            requested: "100.00".to_string(),
        })
        .with_request_id("req_123");

        let response = ErrorResponse::from_app_error(&app_error);
        assert_eq!(response.error, ErrorCode::InsufficientBalance);
        assert_eq!(response.request_id.as_deref(), Some("req_123"));
        assert_eq!(response.retryable, Some(false));
        assert!(response.message.contains("Insufficient balance"));
    }

    #[test]
    fn app_error_into_response_maps_status() {
        let response = AppError::validation(ValidationError::MissingField {
            field: "amount".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AppError::domain(DomainError::AlreadyPaid {
            order_number: "ORD-2026-000001".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn invariant_violations_become_opaque_500s() {
        let response = AppError::invariant(InvariantViolation::LedgerReconciliation {
            detail: "balance drifted".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
