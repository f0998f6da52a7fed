//! The API error envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use conclave_types::ErrorCode;
use serde::Serialize;
use uuid::Uuid;

/// An API failure carrying its closed-set code.
///
/// Renders as
/// `{ error: { code, message, details?, retryable }, requestId?, timestamp }`
/// with the HTTP status the code maps to.
#[derive(Debug)]
pub struct ApiError {
    /// The error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Optional structured details.
    pub details: Option<serde_json::Value>,
    /// Request the failure belongs to, when known.
    pub request_id: Option<Uuid>,
}

#[derive(Serialize)]
struct ErrorBody {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    retryable: bool,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    request_id: Option<Uuid>,
    timestamp: chrono::DateTime<Utc>,
}

impl ApiError {
    /// Creates an error with a custom message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            request_id: None,
        }
    }

    /// Attaches structured details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attaches the request id.
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// 401 with no auth header.
    pub fn authentication_required() -> Self {
        Self::new(
            ErrorCode::AuthenticationRequired,
            "Authorization header is required",
        )
    }

    /// 401 with an unrecognized scheme or empty credential.
    pub fn invalid_auth_format() -> Self {
        Self::new(
            ErrorCode::InvalidAuthFormat,
            "Authorization must be 'Bearer <token>' or 'ApiKey <key>'",
        )
    }

    /// 404 for an unknown request id.
    pub fn request_not_found(request_id: Uuid) -> Self {
        Self::new(ErrorCode::RequestNotFound, "Request not found").with_request_id(request_id)
    }

    /// 500 that hides internal detail unless exposure is allowed.
    ///
    /// Production bodies never echo internal messages; development
    /// bodies do.
    pub fn internal(detail: impl Into<String>, expose: bool) -> Self {
        let detail = detail.into();
        tracing::error!(error = %detail, "Internal error");
        let message = if expose {
            detail
        } else {
            "Internal server error".to_string()
        };
        Self::new(ErrorCode::InternalError, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        tracing::warn!(
            code = %self.code,
            status = status.as_u16(),
            message = %self.message,
            "API error"
        );

        let envelope = ErrorEnvelope {
            error: ErrorBody {
                code: self.code,
                message: self.message,
                details: self.details,
                retryable: self.code.retryable(),
            },
            request_id: self.request_id,
            timestamp: Utc::now(),
        };
        (status, Json(envelope)).into_response()
    }
}
