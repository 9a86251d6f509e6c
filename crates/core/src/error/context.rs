use super::{ApiResult, ErrorBuilder};
use std::collections::BTreeMap;
use std::fmt::Display;

/// Structured context for errors
#[derive(Debug, Clone, Default)]
pub struct StructuredContext {
    fields: BTreeMap<String, String>,
}

impl StructuredContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> String {
        self.fields
            .into_iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Extension trait turning foreign failures into internal normalized errors
pub trait ErrorContext<T> {
    /// Add context to an error
    fn with_context<F>(self, f: F) -> ApiResult<T>
    where
        F: FnOnce() -> String;

    /// Add context to an error with a static string
    fn context(self, msg: &'static str) -> ApiResult<T>;

    /// Add structured context to an error
    fn with_structured_context<F>(self, f: F) -> ApiResult<T>
    where
        F: FnOnce(StructuredContext) -> StructuredContext;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Display,
{
    fn with_context<F>(self, f: F) -> ApiResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| ErrorBuilder::internal(format!("{}: {e}", f())))
    }

    fn context(self, msg: &'static str) -> ApiResult<T> {
        self.with_context(|| msg.to_string())
    }

    fn with_structured_context<F>(self, f: F) -> ApiResult<T>
    where
        F: FnOnce(StructuredContext) -> StructuredContext,
    {
        self.map_err(|e| {
            let context = f(StructuredContext::new());
            ErrorBuilder::internal(format!("{e} [{}]", context.build()))
        })
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn with_context<F>(self, f: F) -> ApiResult<T>
    where
        F: FnOnce() -> String,
    {
        self.ok_or_else(|| ErrorBuilder::internal(f()))
    }

    fn context(self, msg: &'static str) -> ApiResult<T> {
        self.with_context(|| msg.to_string())
    }

    fn with_structured_context<F>(self, f: F) -> ApiResult<T>
    where
        F: FnOnce(StructuredContext) -> StructuredContext,
    {
        self.ok_or_else(|| {
            let context = f(StructuredContext::new());
            ErrorBuilder::internal(format!("None value [{}]", context.build()))
        })
    }
}
