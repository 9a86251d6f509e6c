//! Shared fixtures for the fetchkit integration tests

pub mod common;

pub use fetchkit_cache::{generate_key, CacheStore};
pub use fetchkit_client::{
    ClientConfig, FetchCoordinator, FetchKit, Field, Schema, SchemaDecoder, SerdeDecoder,
};
pub use fetchkit_core::{ErrorKind, MutationMethod, NormalizedError, QueryParams};
pub use serde_json::{json, Value};
pub use std::sync::Arc;
pub use std::time::Duration;
