use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Configuration value out of range: {field} = {value} (expected {expected})")]
    OutOfRange {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Failed to read configuration file {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("Failed to write configuration file {path}: {reason}")]
    Unwritable { path: String, reason: String },

    #[error("Failed to parse configuration: {reason}")]
    ParseError { reason: String },

    #[error("Invalid value for environment variable {var_name}: {value}")]
    InvalidEnvVar { var_name: String, value: String },
}

impl ConfigError {
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn out_of_range(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::OutOfRange {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    pub fn unreadable(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unreadable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn unwritable(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unwritable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn parse_error(reason: impl Into<String>) -> Self {
        Self::ParseError {
            reason: reason.into(),
        }
    }

    pub fn invalid_env_var(var_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            var_name: var_name.into(),
            value: value.into(),
        }
    }
}
