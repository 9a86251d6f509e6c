/// Default freshness window for cached responses (60 seconds)
pub const DEFAULT_TTL_MS: u64 = 60_000;

/// Default number of entries the response store keeps
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Default per-attempt transport timeout (30 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default number of retries after the first attempt
pub const DEFAULT_RETRY_LIMIT: u32 = 2;

/// Statuses the transport retries for eligible methods
pub const DEFAULT_RETRY_STATUS_CODES: [u16; 7] = [408, 413, 429, 500, 502, 503, 504];

/// Status code reported when no response was received
pub const NO_RESPONSE_STATUS: u16 = 0;

/// Status code reported for unexpected failures
pub const DEFAULT_INTERNAL_STATUS: u16 = 500;

/// Message used when a failed response carries no readable message
pub const HTTP_FAILURE_MESSAGE: &str = "HTTP request failed";
