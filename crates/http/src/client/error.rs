//! Client error types

use thiserror::Error;

/// Notice shown when the server gave no usable detail
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// Notice shown when the network could not be reached
pub const NETWORK_FAILURE: &str = "Could not reach the server. Check your connection.";

/// Notice shown when the session could not be recovered
pub const SESSION_EXPIRED: &str = "Your session has expired. Please log in again.";

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error status
    #[error("Server error {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    ServerError { status: u16, detail: Option<String> },

    /// Authentication failed and could not be recovered by a refresh
    #[error("Authentication failed: {}", .0.as_deref().unwrap_or("unauthorized"))]
    AuthenticationFailed(Option<String>),

    /// Resource not found
    #[error("Resource not found: {}", .0.as_deref().unwrap_or("not found"))]
    NotFound(Option<String>),

    /// Bad request
    #[error("Bad request: {}", .0.as_deref().unwrap_or("rejected"))]
    BadRequest(Option<String>),

    /// The server answered with `ok: false`
    #[error("Request rejected: {}", .detail.as_deref().unwrap_or("no detail"))]
    Rejected { status: u16, detail: Option<String> },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Input refused before anything was sent
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The token store could not be read or written
    #[error("Token store error: {0}")]
    Store(String),
}

impl ClientError {
    /// Create error from HTTP status code and the server's detail message
    #[must_use]
    pub fn from_status(status: reqwest::StatusCode, detail: Option<String>) -> Self {
        match status.as_u16() {
            400 | 422 => Self::BadRequest(detail),
            401 => Self::AuthenticationFailed(detail),
            404 => Self::NotFound(detail),
            _ => Self::ServerError {
                status: status.as_u16(),
                detail,
            },
        }
    }

    /// Whether the front end should send the user back to log in
    #[must_use]
    pub const fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
    }

    /// Detail message supplied by the server, if any
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::ServerError { detail, .. } | Self::Rejected { detail, .. } => detail.as_deref(),
            Self::AuthenticationFailed(detail)
            | Self::NotFound(detail)
            | Self::BadRequest(detail) => detail.as_deref(),
            _ => None,
        }
    }

    /// Text for a dismissable notice
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Request(_) => NETWORK_FAILURE.to_string(),
            Self::AuthenticationFailed(_) => SESSION_EXPIRED.to_string(),
            Self::Validation(message) => message.clone(),
            _ => self
                .detail()
                .filter(|detail| !detail.trim().is_empty())
                .unwrap_or(GENERIC_FAILURE)
                .to_string(),
        }
    }
}

impl From<katara_core::CoreError> for ClientError {
    fn from(err: katara_core::CoreError) -> Self {
        Self::Store(err.to_string())
    }
}
