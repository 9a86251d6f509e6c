use std::fmt;
use std::sync::Arc;

use fetchkit_core::{
    ApiResult, ConfigError, Decoder, ErrorBuilder, ErrorContext, HttpMethod, QueryParams,
    RequestDescriptor,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::decoder::SerdeDecoder;
use crate::error_handling::{normalize_status, normalize_transport, parse_body, resolve_url};
use crate::retry::RetryPolicy;
use crate::transport::{HttpRequest, ReqwestTransport, Transport};

/// Per-request extras on top of method, URL and decoder
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Sent as the query string for GET and DELETE, ignored otherwise
    pub params: Option<QueryParams>,
    /// Sent as the JSON payload for POST, PUT and PATCH, ignored otherwise
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Typed request pipeline: transport, status check, JSON parse, decode.
///
/// Every failure along the way comes back as a `NormalizedError`; nothing
/// panics for an unexpected response.
#[derive(Clone)]
pub struct ApiClient {
    base_url: Option<Url>,
    transport: Arc<dyn Transport>,
    default_headers: Vec<(String, String)>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("default_headers", &self.default_headers)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Client with default settings rooted at `base_url`
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Self::from_config(&ClientConfig::new().with_base_url(base_url))
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let transport = ReqwestTransport::new(RetryPolicy::with_config(config.retry_config()))
            .map_err(|e| ConfigError::invalid_field("transport", e.to_string()))?;

        let client = config.default_headers.iter().fold(
            Self::with_transport(config.parsed_base_url()?, Arc::new(transport)),
            |client, (name, value)| client.with_default_header(name, value),
        );
        Ok(client)
    }

    /// Client over any transport; sends `Content-Type: application/json`
    pub fn with_transport(base_url: Option<Url>, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url,
            transport,
            default_headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        }
    }

    /// Add or replace a header sent with every request
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        set_header(&mut self.default_headers, name.into(), value.into());
        self
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    pub fn default_headers(&self) -> &[(String, String)] {
        &self.default_headers
    }

    /// Issue one request and decode its body.
    ///
    /// `params` only reach the wire for GET and DELETE, `body` only for
    /// POST, PUT and PATCH.
    pub async fn request<T, D>(
        &self,
        method: HttpMethod,
        url: &str,
        decoder: &D,
        options: &RequestOptions,
    ) -> ApiResult<T>
    where
        D: Decoder<T> + ?Sized,
    {
        let mut descriptor = RequestDescriptor::new(method, url);
        descriptor.params = options.params.clone();
        descriptor.body = options.body.clone();

        self.send(&descriptor, &options.headers, decoder).await
    }

    /// Issue the request described by `descriptor`
    pub async fn execute<T, D>(&self, descriptor: &RequestDescriptor, decoder: &D) -> ApiResult<T>
    where
        D: Decoder<T> + ?Sized,
    {
        self.send(descriptor, &[], decoder).await
    }

    async fn send<T, D>(
        &self,
        descriptor: &RequestDescriptor,
        extra_headers: &[(String, String)],
        decoder: &D,
    ) -> ApiResult<T>
    where
        D: Decoder<T> + ?Sized,
    {
        let method = descriptor.method;
        let target = resolve_url(
            self.base_url.as_ref(),
            &descriptor.url,
            descriptor.query_params(),
        )?;

        let mut request = HttpRequest::new(method, target.as_str());
        request.headers = self.default_headers.clone();
        for (name, value) in extra_headers {
            set_header(&mut request.headers, name.clone(), value.clone());
        }
        if let Some(payload) = descriptor.payload() {
            request.body =
                Some(serde_json::to_string(payload).context("Failed to serialize request body")?);
        }

        debug!(method = %method, url = %target, "Sending request");
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| normalize_transport(&e, method, target.as_str()))?;

        if !response.is_success() {
            return Err(normalize_status(&response, method, target.as_str()));
        }

        let body = parse_body(&response, target.as_str())?;
        let value = decoder.decode(body).map_err(|issues| {
            warn!(
                method = %method,
                url = %target,
                issues = issues.len(),
                "Response failed validation"
            );
            ErrorBuilder::validation(response.status, &issues)
        })?;

        debug!(
            method = %method,
            url = %target,
            status = response.status,
            "Request succeeded"
        );
        Ok(value)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        params: Option<QueryParams>,
    ) -> ApiResult<T> {
        let options = RequestOptions {
            params,
            ..Default::default()
        };
        self.request(HttpMethod::Get, url, &SerdeDecoder::new(), &options)
            .await
    }

    pub async fn post<T, B>(&self, url: &str, body: &B) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(HttpMethod::Post, url, body).await
    }

    pub async fn put<T, B>(&self, url: &str, body: &B) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(HttpMethod::Put, url, body).await
    }

    pub async fn patch<T, B>(&self, url: &str, body: &B) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(HttpMethod::Patch, url, body).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        url: &str,
        params: Option<QueryParams>,
    ) -> ApiResult<T> {
        let options = RequestOptions {
            params,
            ..Default::default()
        };
        self.request(HttpMethod::Delete, url, &SerdeDecoder::new(), &options)
            .await
    }

    async fn send_json<T, B>(&self, method: HttpMethod, url: &str, body: &B) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body).context("Failed to serialize request body")?;
        let options = RequestOptions::new().with_body(body);
        self.request(method, url, &SerdeDecoder::new(), &options)
            .await
    }
}

/// Replace a header in place (ASCII case-insensitive) or append it
fn set_header(headers: &mut Vec<(String, String)>, name: String, value: String) {
    match headers
        .iter_mut()
        .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
    {
        Some(slot) => slot.1 = value,
        None => headers.push((name, value)),
    }
}
