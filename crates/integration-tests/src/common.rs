//! Common utilities for integration tests

use crate::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Config pointed at a mock server with retries off
pub fn test_config(base_url: &str) -> ClientConfig {
    ClientConfig::new()
        .with_base_url(base_url)
        .with_retry_limit(0)
        .with_timeout_ms(5_000)
}

/// Config with fast retries so backoff does not slow the suite down
pub fn retrying_config(base_url: &str, limit: u32) -> ClientConfig {
    let mut config = ClientConfig::new()
        .with_base_url(base_url)
        .with_retry_limit(limit);
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 5;
    config
}

pub fn kit_for(base_url: &str) -> FetchKit {
    FetchKit::from_config(&test_config(base_url)).expect("Failed to build FetchKit")
}

pub fn user_json(id: u32, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "email": format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
    })
}

/// Shape every user payload must have
pub fn user_schema() -> Schema {
    Schema::object()
        .field("id", Schema::Integer)
        .field("name", Schema::String)
        .optional("email", Schema::String.nullable())
}

pub fn user_decoder() -> Arc<SchemaDecoder<User>> {
    Arc::new(SchemaDecoder::new(user_schema()))
}
