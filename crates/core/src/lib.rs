pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{
    ApiResult, ConfigError, ErrorBuilder, ErrorContext, ErrorDetail, ErrorKind, NormalizedError,
    StructuredContext,
};
pub use traits::{Decoder, ValidationIssue};
pub use types::{HttpMethod, MutationMethod, QueryParams, RequestDescriptor, UnsupportedMethod};

// Re-export the defaults most callers need
pub use constants::{DEFAULT_CACHE_CAPACITY, DEFAULT_TTL_MS};
