use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::time::Duration;

use fetchkit_core::constants::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_RETRY_LIMIT, DEFAULT_RETRY_STATUS_CODES, DEFAULT_TIMEOUT_MS,
    DEFAULT_TTL_MS,
};
use fetchkit_core::{ConfigError, HttpMethod};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::retry::RetryConfig;

const ENV_BASE_URL: &str = "FETCHKIT_BASE_URL";
const ENV_TIMEOUT_MS: &str = "FETCHKIT_TIMEOUT_MS";
const ENV_CACHE_TTL_MS: &str = "FETCHKIT_CACHE_TTL_MS";
const ENV_CACHE_MAX_ENTRIES: &str = "FETCHKIT_CACHE_MAX_ENTRIES";
const ENV_RETRY_LIMIT: &str = "FETCHKIT_RETRY_LIMIT";
const ENV_LOG_LEVEL: &str = "FETCHKIT_LOG_LEVEL";
const ENV_LOG_FORMAT: &str = "FETCHKIT_LOG_FORMAT";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

/// Complete configuration for the API client and its response cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Prefix for relative request URLs; absolute URLs ignore it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Per-attempt transport timeout
    pub timeout_ms: u64,
    /// Headers sent with every request
    pub default_headers: BTreeMap<String, String>,
    pub retry: RetrySettings,
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub limit: u32,
    pub methods: Vec<HttpMethod>,
    pub status_codes: Vec<u16>,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub default_ttl_ms: u64,
    pub max_entries: usize,
    /// Share one request between concurrent misses for the same key
    pub dedupe_in_flight: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let mut default_headers = BTreeMap::new();
        default_headers.insert("Content-Type".to_string(), "application/json".to_string());

        Self {
            base_url: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            default_headers,
            retry: RetrySettings::default(),
            cache: CacheSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RETRY_LIMIT,
            methods: vec![HttpMethod::Get, HttpMethod::Put, HttpMethod::Delete],
            status_codes: DEFAULT_RETRY_STATUS_CODES.to_vec(),
            base_delay_ms: 100,
            max_delay_ms: 2000,
            backoff_multiplier: 2.0,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl_ms: DEFAULT_TTL_MS,
            max_entries: DEFAULT_CACHE_CAPACITY,
            dedupe_in_flight: true,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_retry_limit(mut self, limit: u32) -> Self {
        self.retry.limit = limit;
        self
    }

    pub fn with_default_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.cache.default_ttl_ms = ttl_ms;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.cache.max_entries = max_entries;
        self
    }

    pub fn with_dedupe_in_flight(mut self, enabled: bool) -> Self {
        self.cache.dedupe_in_flight = enabled;
        self
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::parse_error(e.to_string()))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::parse_error(e.to_string()))
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::unreadable(path.display().to_string(), e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = self.to_toml()?;
        std::fs::write(path, content)
            .map_err(|e| ConfigError::unwritable(path.display().to_string(), e.to_string()))
    }

    /// Defaults, then the file (if any), then `FETCHKIT_*` variables; validated
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        // Override with environment variables if present
        config.load_from_env()?;
        config.validate()?;

        Ok(config)
    }

    fn load_from_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| env::var(name).ok())
    }

    /// Apply `FETCHKIT_*` overrides from any variable source
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Client settings
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            self.base_url = Some(base_url);
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_MS) {
            self.timeout_ms = parse_var(ENV_TIMEOUT_MS, &timeout)?;
        }
        if let Some(limit) = lookup(ENV_RETRY_LIMIT) {
            self.retry.limit = parse_var(ENV_RETRY_LIMIT, &limit)?;
        }

        // Cache settings
        if let Some(ttl) = lookup(ENV_CACHE_TTL_MS) {
            self.cache.default_ttl_ms = parse_var(ENV_CACHE_TTL_MS, &ttl)?;
        }
        if let Some(max_entries) = lookup(ENV_CACHE_MAX_ENTRIES) {
            self.cache.max_entries = parse_var(ENV_CACHE_MAX_ENTRIES, &max_entries)?;
        }

        // Logging settings
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            self.logging.format = format;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate client settings
        self.parsed_base_url()?;
        if self.timeout_ms == 0 {
            return Err(ConfigError::out_of_range("timeout_ms", "0", "greater than 0"));
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::out_of_range(
                "retry.backoff_multiplier",
                self.retry.backoff_multiplier.to_string(),
                "a finite number >= 1.0",
            ));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(ConfigError::invalid_field(
                "retry.max_delay_ms",
                "must not be smaller than retry.base_delay_ms",
            ));
        }

        // Validate cache settings
        if self.cache.default_ttl_ms == 0 {
            return Err(ConfigError::out_of_range(
                "cache.default_ttl_ms",
                "0",
                "greater than 0",
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::out_of_range(
                "cache.max_entries",
                "0",
                "greater than 0",
            ));
        }

        // Validate logging settings
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::invalid_field(
                "logging.level",
                format!("unknown log level: {}", self.logging.level),
            ));
        }
        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::invalid_field(
                "logging.format",
                format!("unknown log format: {}", self.logging.format),
            ));
        }

        Ok(())
    }

    /// The base URL, parsed; `None` when requests must use absolute URLs
    pub fn parsed_base_url(&self) -> Result<Option<Url>, ConfigError> {
        match self.base_url.as_deref() {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Err(ConfigError::invalid_field(
                "base_url",
                "cannot be empty",
            )),
            Some(raw) => Url::parse(raw)
                .map(Some)
                .map_err(|e| ConfigError::invalid_field("base_url", e.to_string())),
        }
    }

    /// Transport retry configuration derived from these settings
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            limit: self.retry.limit,
            methods: self.retry.methods.clone(),
            status_codes: self.retry.status_codes.clone(),
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            backoff_multiplier: self.retry.backoff_multiplier,
            attempt_timeout: Duration::from_millis(self.timeout_ms),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.cache.default_ttl_ms)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid_env_var(name, value))
}
