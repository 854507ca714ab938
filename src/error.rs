/// Unified error types for the federated identity server
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the server
///
/// The first six variants are the resolution taxonomy returned to callers.
/// Their messages never carry raw transport errors.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Malformed username segment of a handle
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// Domain failed syntax or SSRF validation
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    /// Local federation mode is closed
    #[error("Federation is disabled on this instance")]
    FederationDisabled,

    /// Allow-list mode and the domain is not an active peer
    #[error("Peer not allowed: {0}")]
    PeerNotAllowed(String),

    /// Local miss, or the remote instance answered not-found
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Discovery or lookup against a remote instance failed
    #[error("Remote lookup failed for {0}")]
    RemoteLookupFailed(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Validation errors outside the handle taxonomy
    #[error("Validation error: {0}")]
    Validation(String),

    /// Conflict errors (e.g., duplicate username)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Stable machine-readable error code
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::InvalidHandle(_) => "invalid_handle",
            ServerError::InvalidDomain(_) => "invalid_domain",
            ServerError::FederationDisabled => "federation_disabled",
            ServerError::PeerNotAllowed(_) => "peer_not_allowed",
            ServerError::UserNotFound(_) => "user_not_found",
            ServerError::RemoteLookupFailed(_) => "remote_lookup_failed",
            ServerError::Validation(_) => "invalid_request",
            ServerError::Conflict(_) => "conflict",
            ServerError::Database(_)
            | ServerError::Config(_)
            | ServerError::Internal(_)
            | ServerError::Io(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidHandle(_)
            | ServerError::InvalidDomain(_)
            | ServerError::Validation(_) => StatusCode::BAD_REQUEST,
            ServerError::FederationDisabled | ServerError::PeerNotAllowed(_) => {
                StatusCode::FORBIDDEN
            }
            ServerError::UserNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::RemoteLookupFailed(_) => StatusCode::BAD_GATEWAY,
            ServerError::Database(_)
            | ServerError::Config(_)
            | ServerError::Internal(_)
            | ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert ServerError to HTTP response
impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal error while handling request: {}", self);
            "Internal server error".to_string() // Don't leak details
        } else {
            self.to_string()
        };

        let body = Json(ErrorResponse {
            error: self.kind().to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for server operations
pub type ServerResult<T> = Result<T, ServerError>;
