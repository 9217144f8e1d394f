//! Error types for gateway operations.
//!
//! Errors are categorized so callers can give appropriate feedback. None of
//! them are retried by this crate.

use std::fmt;

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of gateway errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The request never produced a response.
    Network,
    /// The addressed object does not exist.
    NotFound,
    /// The token was refused.
    Auth,
    /// The server rejected the request (4xx).
    Rejected,
    /// The server failed (5xx).
    Server,
    /// The response or token could not be decoded.
    Format,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::NotFound => "Remote object not found",
            Self::Auth => "Authentication failed",
            Self::Rejected => "Request rejected by the API",
            Self::Server => "API server error",
            Self::Format => "Unexpected response format",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check the base URL and your network connection",
            Self::NotFound => "Verify the project and object identifiers",
            Self::Auth => "Check that the access token is valid and not expired",
            Self::Rejected => "Check the request details in the error message",
            Self::Server => "Try again later",
            Self::Format => "The API may have changed, check the error details",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to the API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure: no response was received.
    #[error("{operation}: request failed: {message}")]
    Transport {
        /// Gateway operation that failed.
        operation: &'static str,
        /// Error message.
        message: String,
    },

    /// The API answered with an unexpected status code.
    #[error("{operation}: {message}, status code: {status}")]
    Status {
        /// Gateway operation that failed.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Shaped error message from the response body.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("{operation}: invalid API response: {message}")]
    InvalidResponse {
        /// Gateway operation that failed.
        operation: &'static str,
        /// Decoder message.
        message: String,
    },

    /// The access token could not be decoded.
    #[error("invalid access token: {0}")]
    InvalidToken(String),

    /// A webhook body template could not be processed.
    #[error("invalid webhook template: {0}")]
    Template(String),
}

impl Error {
    /// Create a transport error.
    pub fn transport(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            message: message.into(),
        }
    }

    /// Create a status error.
    pub fn status(operation: &'static str, status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            operation,
            status,
            message: message.into(),
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(operation: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            operation,
            message: message.into(),
        }
    }

    /// HTTP status code, when the API answered.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Gateway operation that failed, when a request was involved.
    #[must_use]
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Transport { operation, .. }
            | Self::Status { operation, .. }
            | Self::InvalidResponse { operation, .. } => Some(operation),
            Self::InvalidToken(_) | Self::Template(_) => None,
        }
    }

    /// Whether the API reported the object as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport { .. } => ErrorCategory::Network,
            Self::Status { status: 404, .. } => ErrorCategory::NotFound,
            Self::Status {
                status: 401 | 403, ..
            } => ErrorCategory::Auth,
            Self::Status { status, .. } if *status >= 500 => ErrorCategory::Server,
            Self::Status { status, .. } if *status >= 400 => ErrorCategory::Rejected,
            Self::Status { .. } => ErrorCategory::Other,
            Self::InvalidResponse { .. } | Self::InvalidToken(_) => ErrorCategory::Format,
            Self::Template(_) => ErrorCategory::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        let err = Error::status("get_deployment", 404, "Not found");
        assert!(err.is_not_found());
        assert_eq!(err.category(), ErrorCategory::NotFound);

        let err = Error::status("get_deployment", 500, "boom");
        assert!(!err.is_not_found());
        assert_eq!(err.operation(), Some("get_deployment"));
        assert_eq!(err.category(), ErrorCategory::Server);
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            Error::transport("create_deployment", "connection refused").category(),
            ErrorCategory::Network
        );
        assert_eq!(
            Error::status("create_credential", 401, "Unauthorized").category(),
            ErrorCategory::Auth
        );
        assert_eq!(
            Error::status("create_credential", 422, "bad").category(),
            ErrorCategory::Rejected
        );
        assert_eq!(
            Error::InvalidToken("not a jwt".into()).category(),
            ErrorCategory::Format
        );
    }

    #[test]
    fn test_status_display_includes_code() {
        let err = Error::status("create_deployment", 400, "Workflow has no trigger");
        let display = err.to_string();
        assert!(display.contains("Workflow has no trigger"));
        assert!(display.contains("status code: 400"));
    }

    #[test]
    fn test_error_category_advice() {
        assert!(!ErrorCategory::Network.advice().is_empty());
        assert!(!ErrorCategory::Auth.advice().is_empty());
        assert!(format!("{}", ErrorCategory::Server).contains("server"));
    }
}
