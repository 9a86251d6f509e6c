use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single rule violated by a response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted path to the offending value; empty for the root
    pub path: String,
    /// Machine-readable rule name, e.g. `required` or `invalid_type`
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Validates a parsed JSON body and turns it into a typed value.
///
/// Implementations either return the decoded value or every issue they found;
/// they never fail in any other way.
pub trait Decoder<T>: Send + Sync {
    fn decode(&self, value: Value) -> Result<T, Vec<ValidationIssue>>;
}

impl<T, F> Decoder<T> for F
where
    F: Fn(Value) -> Result<T, Vec<ValidationIssue>> + Send + Sync,
{
    fn decode(&self, value: Value) -> Result<T, Vec<ValidationIssue>> {
        self(value)
    }
}
