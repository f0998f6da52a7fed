//! The closed set of API error codes.

use serde::{Deserialize, Serialize};

/// Every error the API surface can report.
///
/// Each code carries its HTTP status and whether a client may retry the
/// same request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No auth header was presented.
    AuthenticationRequired,
    /// Unrecognized scheme or empty credential.
    InvalidAuthFormat,
    /// JWT failed verification.
    InvalidToken,
    /// API key failed lookup or is inactive/expired.
    InvalidApiKey,
    /// A field is missing or of the wrong type.
    InvalidRequest,
    /// Query is empty post-sanitization.
    EmptyQuery,
    /// Query exceeds the maximum length.
    QueryTooLong,
    /// Session id is not a UUID.
    InvalidSessionId,
    /// Streaming flag is not a boolean.
    InvalidStreamingFlag,
    /// No request with the given id.
    RequestNotFound,
    /// No retained deliberation thread for the id.
    DeliberationNotFound,
    /// Idempotency cache entry was in an impossible state.
    IdempotencyStateInvalid,
    /// Idempotency cache result could not be decoded.
    IdempotencyResultInvalid,
    /// Orchestration surfaced an exception.
    ProcessingError,
    /// Uncaught server-side path.
    InternalError,
    /// A required collaborator was missing at boot.
    ServiceUnavailable,
    /// Too many requests from this client.
    RateLimited,
}

impl ErrorCode {
    /// HTTP status the code maps to.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::AuthenticationRequired
            | Self::InvalidAuthFormat
            | Self::InvalidToken
            | Self::InvalidApiKey => 401,
            Self::InvalidRequest
            | Self::EmptyQuery
            | Self::QueryTooLong
            | Self::InvalidSessionId
            | Self::InvalidStreamingFlag => 400,
            Self::RequestNotFound | Self::DeliberationNotFound => 404,
            Self::RateLimited => 429,
            Self::ServiceUnavailable => 503,
            Self::IdempotencyStateInvalid
            | Self::IdempotencyResultInvalid
            | Self::ProcessingError
            | Self::InternalError => 500,
        }
    }

    /// Whether a client may retry the identical request.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::IdempotencyStateInvalid
                | Self::IdempotencyResultInvalid
                | Self::InternalError
                | Self::ServiceUnavailable
                | Self::RateLimited
        )
    }

    /// The wire name of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            Self::InvalidAuthFormat => "INVALID_AUTH_FORMAT",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::InvalidApiKey => "INVALID_API_KEY",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::EmptyQuery => "EMPTY_QUERY",
            Self::QueryTooLong => "QUERY_TOO_LONG",
            Self::InvalidSessionId => "INVALID_SESSION_ID",
            Self::InvalidStreamingFlag => "INVALID_STREAMING_FLAG",
            Self::RequestNotFound => "REQUEST_NOT_FOUND",
            Self::DeliberationNotFound => "DELIBERATION_NOT_FOUND",
            Self::IdempotencyStateInvalid => "IDEMPOTENCY_STATE_INVALID",
            Self::IdempotencyResultInvalid => "IDEMPOTENCY_RESULT_INVALID",
            Self::ProcessingError => "PROCESSING_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::RateLimited => "RATE_LIMITED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
