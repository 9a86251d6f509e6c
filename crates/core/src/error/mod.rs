mod builder;
mod config;
mod context;
mod kind;

pub use builder::ErrorBuilder;
pub use config::ConfigError;
pub use context::{ErrorContext, StructuredContext};
pub use kind::ErrorKind;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One field-level problem attached to a normalized error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

/// The single error shape every failure is converted into.
///
/// Network failures, non-success HTTP statuses and response validation
/// failures all end up here, so callers match on [`ErrorKind`] instead of on
/// transport or decoder internals. Values are built once and never mutated.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind} ({status_code}): {}", .messages.join("; "))]
#[serde(rename_all = "camelCase")]
pub struct NormalizedError {
    pub kind: ErrorKind,
    pub messages: Vec<String>,
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ErrorDetail>>,
}

impl NormalizedError {
    pub fn new(kind: ErrorKind, messages: Vec<String>, status_code: u16) -> Self {
        Self {
            kind,
            messages,
            status_code,
            details: None,
        }
    }

    /// Attach field-level details
    pub fn with_details(mut self, details: Vec<ErrorDetail>) -> Self {
        self.details = Some(details);
        self
    }

    /// Build an error whose kind is derived from an HTTP status code
    pub fn from_status(status_code: u16, messages: Vec<String>) -> Self {
        Self::new(ErrorKind::from_status(status_code), messages, status_code)
    }

    /// First message, if any
    pub fn primary_message(&self) -> Option<&str> {
        self.messages.first().map(String::as_str)
    }

    /// Details as a slice; empty when none were attached
    pub fn details(&self) -> &[ErrorDetail] {
        self.details.as_deref().unwrap_or(&[])
    }

    /// Check if retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::NetworkError | ErrorKind::ServiceUnavailable
        )
    }

    /// Check if the failure was caused by the request itself
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::ValidationError
                | ErrorKind::Unauthorized
                | ErrorKind::Forbidden
                | ErrorKind::NotFound
                | ErrorKind::Conflict
        )
    }
}

/// Result type alias for every fallible request operation
pub type ApiResult<T> = std::result::Result<T, NormalizedError>;
