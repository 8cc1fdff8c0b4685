//! Error taxonomy and HTTP status code mapping.
//!
//! Each layer has its own error enum:
//!
//! - [`DispatchError`]: cancellation, timeout, or a closed dispatcher.
//! - [`HubError`]: broadcast capacity rejection and serialization failures.
//! - [`TransportError`]: any failure on a client connection; the session is dead.
//! - [`ServiceError`]: business outcomes produced by worker logic.
//!
//! [`GatewayError`] is the HTTP-facing union. Each variant maps to a status
//! code and a structured JSON error body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::context::ContextError;

/// Failure of the dispatch machinery itself (never a business outcome).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The caller's context was cancelled.
    #[error("context canceled")]
    Cancelled,
    /// The caller's context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
    /// The dispatcher queue is closed or the job was dropped without a result.
    #[error("dispatcher closed")]
    Closed,
}

impl From<ContextError> for DispatchError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Cancelled => Self::Cancelled,
            ContextError::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

/// Broadcast hub errors surfaced to publishers.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The broadcast queue has no free capacity.
    #[error("broadcast queue full")]
    QueueFull,
    /// The hub is shutting down and accepts no more messages.
    #[error("broadcast hub closed")]
    Closed,
    /// The event envelope could not be serialized.
    #[error("serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failure on a client transport. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed locally or by the peer.
    #[error("connection closed")]
    Closed,
    /// A read or write did not complete before its deadline.
    #[error("i/o deadline exceeded")]
    Timeout,
    /// Underlying protocol or socket error.
    #[error("transport: {0}")]
    Io(String),
}

/// Business-level outcomes returned through the normal result path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Email or password did not match a known account.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Email already has an account.
    #[error("email already registered")]
    EmailConflict,
    /// Social login provider is not supported.
    #[error("unsupported provider")]
    UnsupportedProvider,
    /// Bearer token is missing, unknown, or expired.
    #[error("unauthorized")]
    Unauthorized,
    /// No report with the given identifier or folio.
    #[error("report not found")]
    ReportNotFound,
    /// Status is not one of the allowed report statuses.
    #[error("invalid status")]
    InvalidStatus,
    /// Request payload failed validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Storage backend failure.
    #[error("persistence error: {0}")]
    Persistence(String),
    /// The call never reached business logic.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl From<ContextError> for ServiceError {
    fn from(err: ContextError) -> Self {
        Self::Dispatch(err.into())
    }
}

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "report not found",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`GatewayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// HTTP-facing error enum with status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status                    |
/// |-----------|-------------------|--------------------------------|
/// | 1000–1999 | Validation        | 400 Bad Request                |
/// | 2000–2999 | State/Not Found   | 401 / 403 / 404 / 409          |
/// | 3000–3999 | Server            | 500 / 503 / 504                |
/// | 429       | Admission         | 429 Too Many Requests          |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Business or dispatch failure from a service call.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Request validation failed before reaching a service.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Client exceeded the admission rate for this endpoint.
    #[error("rate limit exceeded")]
    RateLimited,

    /// Caller is authenticated but lacks the admin key.
    #[error("admin api key required")]
    Forbidden,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DispatchError> for GatewayError {
    fn from(err: DispatchError) -> Self {
        Self::Service(ServiceError::Dispatch(err))
    }
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Service(err) => match err {
                ServiceError::InvalidRequest(_) => 1001,
                ServiceError::InvalidStatus => 1002,
                ServiceError::UnsupportedProvider => 1003,
                ServiceError::InvalidCredentials => 2001,
                ServiceError::Unauthorized => 2002,
                ServiceError::ReportNotFound => 2003,
                ServiceError::EmailConflict => 2004,
                ServiceError::Persistence(_) => 3001,
                ServiceError::Dispatch(DispatchError::Closed) => 3002,
                ServiceError::Dispatch(_) => 3003,
            },
            Self::RateLimited => 429,
            Self::Forbidden => 2005,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Service(err) => match err {
                ServiceError::InvalidRequest(_)
                | ServiceError::InvalidStatus
                | ServiceError::UnsupportedProvider => StatusCode::BAD_REQUEST,
                ServiceError::InvalidCredentials | ServiceError::Unauthorized => {
                    StatusCode::UNAUTHORIZED
                }
                ServiceError::ReportNotFound => StatusCode::NOT_FOUND,
                ServiceError::EmailConflict => StatusCode::CONFLICT,
                ServiceError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ServiceError::Dispatch(DispatchError::Closed) => StatusCode::SERVICE_UNAVAILABLE,
                ServiceError::Dispatch(_) => StatusCode::GATEWAY_TIMEOUT,
            },
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(error = %self, status = status.as_u16(), "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
