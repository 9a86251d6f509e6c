use super::{ErrorDetail, ErrorKind, NormalizedError};
use crate::constants::{DEFAULT_INTERNAL_STATUS, NO_RESPONSE_STATUS};
use crate::traits::ValidationIssue;

/// Builder for creating normalized errors with a fluent API
pub struct ErrorBuilder;

impl ErrorBuilder {
    /// No response was received (DNS, connect, timeout)
    pub fn network(message: impl Into<String>) -> NormalizedError {
        NormalizedError::new(
            ErrorKind::NetworkError,
            vec![message.into()],
            NO_RESPONSE_STATUS,
        )
    }

    /// A response was received but its body could not be read as JSON
    pub fn unreadable_body(status: u16) -> NormalizedError {
        NormalizedError::new(
            ErrorKind::NetworkError,
            vec!["Failed to parse response body as JSON".to_string()],
            status,
        )
    }

    /// Non-success HTTP status
    pub fn from_status(status: u16, messages: Vec<String>) -> NormalizedError {
        NormalizedError::from_status(status, messages)
    }

    /// Response body failed validation; one detail and one message per issue
    pub fn validation(status: u16, issues: &[ValidationIssue]) -> NormalizedError {
        let messages = issues.iter().map(|issue| issue.message.clone()).collect();
        let details = issues
            .iter()
            .map(|issue| ErrorDetail::new(issue.path.clone(), issue.code.clone(), issue.message.clone()))
            .collect();

        NormalizedError::new(ErrorKind::ValidationError, messages, status).with_details(details)
    }

    /// Unexpected failure
    pub fn internal(message: impl Into<String>) -> NormalizedError {
        NormalizedError::new(
            ErrorKind::InternalError,
            vec![message.into()],
            DEFAULT_INTERNAL_STATUS,
        )
    }

    pub fn unauthorized(message: impl Into<String>) -> NormalizedError {
        NormalizedError::new(ErrorKind::Unauthorized, vec![message.into()], 401)
    }

    pub fn forbidden(message: impl Into<String>) -> NormalizedError {
        NormalizedError::new(ErrorKind::Forbidden, vec![message.into()], 403)
    }

    pub fn not_found(message: impl Into<String>) -> NormalizedError {
        NormalizedError::new(ErrorKind::NotFound, vec![message.into()], 404)
    }

    pub fn conflict(message: impl Into<String>) -> NormalizedError {
        NormalizedError::new(ErrorKind::Conflict, vec![message.into()], 409)
    }

    pub fn service_unavailable(message: impl Into<String>) -> NormalizedError {
        NormalizedError::new(ErrorKind::ServiceUnavailable, vec![message.into()], 503)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_error_has_no_status() {
        let error = ErrorBuilder::network("connection refused");
        assert_eq!(error.kind, ErrorKind::NetworkError);
        assert_eq!(error.status_code, 0);
    }

    #[test]
    fn test_validation_error_has_detail_per_issue() {
        let issues = vec![
            ValidationIssue::new("name", "required", "Required"),
            ValidationIssue::new("id", "invalid_type", "Expected number, received string"),
        ];
        let error = ErrorBuilder::validation(200, &issues);

        assert_eq!(error.kind, ErrorKind::ValidationError);
        assert_eq!(error.status_code, 200);
        assert_eq!(error.messages.len(), 2);
        assert_eq!(error.details().len(), 2);
        assert_eq!(error.details()[0].field, "name");
        assert_eq!(error.details()[1].code, "invalid_type");
    }

    #[test]
    fn test_internal_defaults_to_500() {
        let error = ErrorBuilder::internal("boom");
        assert_eq!(error.kind, ErrorKind::InternalError);
        assert_eq!(error.status_code, 500);
    }

    #[test]
    fn test_kind_shortcuts_agree_with_status_mapping() {
        for error in [
            ErrorBuilder::unauthorized("x"),
            ErrorBuilder::forbidden("x"),
            ErrorBuilder::not_found("x"),
            ErrorBuilder::conflict("x"),
            ErrorBuilder::service_unavailable("x"),
        ] {
            assert_eq!(error.kind, ErrorKind::from_status(error.status_code));
        }
    }
}
