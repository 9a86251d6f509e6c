use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed request or response shape
    ValidationError,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    /// Unclassified failure; fallback for unmapped statuses
    InternalError,
    /// No response was obtained
    NetworkError,
    ServiceUnavailable,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::ValidationError,
        ErrorKind::Unauthorized,
        ErrorKind::Forbidden,
        ErrorKind::NotFound,
        ErrorKind::Conflict,
        ErrorKind::InternalError,
        ErrorKind::NetworkError,
        ErrorKind::ServiceUnavailable,
    ];

    /// Map an HTTP status code to its kind
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ErrorKind::ValidationError,
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            503 => ErrorKind::ServiceUnavailable,
            _ => ErrorKind::InternalError,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::InternalError => "INTERNAL_ERROR",
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
