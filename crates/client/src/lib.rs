pub mod client;
pub mod config;
pub mod coordinator;
pub mod decoder;
mod error_handling;
pub mod mutation;
pub mod query;
pub mod retry;
pub mod service;
pub mod transport;

pub use client::{ApiClient, RequestOptions};
pub use config::{CacheSettings, ClientConfig, LoggingSettings, RetrySettings};
pub use coordinator::{CoordinatorOptions, FetchCoordinator, FetchStatus};
pub use decoder::{Field, Schema, SchemaDecoder, SerdeDecoder};
pub use mutation::MutationHandle;
pub use query::{QueryHandle, QueryState};
pub use retry::{RetryConfig, RetryPolicy};
pub use service::FetchKit;
pub use transport::{HttpRequest, RawResponse, ReqwestTransport, Transport, TransportError};
