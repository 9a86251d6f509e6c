//! Response decoders
//!
//! [`SerdeDecoder`] relies on `serde` alone and reports the first mismatch.
//! [`SchemaDecoder`] first checks the body against a [`Schema`], collecting
//! every violated field, and only then deserializes.

use std::fmt;
use std::marker::PhantomData;

use fetchkit_core::{Decoder, ValidationIssue};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decode with `serde_json::from_value`
pub struct SerdeDecoder<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeDecoder<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SerdeDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SerdeDecoder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerdeDecoder").finish()
    }
}

impl<T: DeserializeOwned> Decoder<T> for SerdeDecoder<T> {
    fn decode(&self, value: Value) -> Result<T, Vec<ValidationIssue>> {
        serde_json::from_value(value).map_err(|error| vec![shape_issue(&error)])
    }
}

fn shape_issue(error: &serde_json::Error) -> ValidationIssue {
    ValidationIssue::new("", "invalid_shape", error.to_string())
}

/// Expected shape of a JSON value
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Any,
    Null,
    Bool,
    Number,
    Integer,
    String,
    Array(Box<Schema>),
    Object(Vec<Field>),
    Nullable(Box<Schema>),
}

/// A named member of an object schema
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
    pub required: bool,
}

impl Schema {
    /// An object with no declared fields yet; unknown fields are ignored
    pub fn object() -> Self {
        Schema::Object(Vec::new())
    }

    pub fn array(items: Schema) -> Self {
        Schema::Array(Box::new(items))
    }

    pub fn nullable(self) -> Self {
        Schema::Nullable(Box::new(self))
    }

    /// Declare a required field; no-op on non-object schemas
    pub fn field(self, name: impl Into<String>, schema: Schema) -> Self {
        self.push_field(name.into(), schema, true)
    }

    /// Declare a field that may be missing
    pub fn optional(self, name: impl Into<String>, schema: Schema) -> Self {
        self.push_field(name.into(), schema, false)
    }

    fn push_field(mut self, name: String, schema: Schema, required: bool) -> Self {
        if let Schema::Object(fields) = &mut self {
            fields.push(Field {
                name,
                schema,
                required,
            });
        }
        self
    }

    /// Every issue found in `value`, in field declaration order
    pub fn validate(&self, value: &Value) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        self.check(value, "", &mut issues);
        issues
    }

    fn check(&self, value: &Value, path: &str, issues: &mut Vec<ValidationIssue>) {
        match (self, value) {
            (Schema::Any, _) => {}
            (Schema::Nullable(_), Value::Null) => {}
            (Schema::Nullable(inner), _) => inner.check(value, path, issues),
            (Schema::Null, Value::Null)
            | (Schema::Bool, Value::Bool(_))
            | (Schema::Number, Value::Number(_))
            | (Schema::String, Value::String(_)) => {}
            (Schema::Integer, Value::Number(number)) if number.is_i64() || number.is_u64() => {}
            (Schema::Array(items), Value::Array(values)) => {
                for (index, item) in values.iter().enumerate() {
                    items.check(item, &child_path(path, &index.to_string()), issues);
                }
            }
            (Schema::Object(fields), Value::Object(map)) => {
                for field in fields {
                    let field_path = child_path(path, &field.name);
                    match map.get(&field.name) {
                        Some(member) => field.schema.check(member, &field_path, issues),
                        None if field.required => {
                            issues.push(ValidationIssue::new(field_path, "required", "Required"))
                        }
                        None => {}
                    }
                }
            }
            (expected, actual) => issues.push(ValidationIssue::new(
                path,
                "invalid_type",
                format!("Expected {}, received {}", expected.type_name(), received(actual)),
            )),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Schema::Any => "any",
            Schema::Null => "null",
            Schema::Bool => "boolean",
            Schema::Number => "number",
            Schema::Integer => "integer",
            Schema::String => "string",
            Schema::Array(_) => "array",
            Schema::Object(_) => "object",
            Schema::Nullable(inner) => inner.type_name(),
        }
    }
}

fn received(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_f64() => "float",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn child_path(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_string()
    } else {
        format!("{parent}.{segment}")
    }
}

/// Validate against a [`Schema`], then deserialize
pub struct SchemaDecoder<T> {
    schema: Schema,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SchemaDecoder<T> {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            _marker: PhantomData,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl<T> fmt::Debug for SchemaDecoder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaDecoder")
            .field("schema", &self.schema)
            .finish()
    }
}

impl<T: DeserializeOwned> Decoder<T> for SchemaDecoder<T> {
    fn decode(&self, value: Value) -> Result<T, Vec<ValidationIssue>> {
        let issues = self.schema.validate(&value);
        if !issues.is_empty() {
            return Err(issues);
        }
        serde_json::from_value(value).map_err(|error| vec![shape_issue(&error)])
    }
}
