use fetchkit_core::constants::HTTP_FAILURE_MESSAGE;
use fetchkit_core::{
    ApiResult, ErrorBuilder, ErrorDetail, HttpMethod, NormalizedError, QueryParams,
};
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::transport::{RawResponse, TransportError};

/// Map a failure where no response arrived onto the error taxonomy
pub(crate) fn normalize_transport(
    error: &TransportError,
    method: HttpMethod,
    url: &str,
) -> NormalizedError {
    warn!(
        method = %method,
        url = %url,
        error = %error,
        "Transport failure"
    );

    match error {
        TransportError::InvalidRequest(reason) => ErrorBuilder::internal(reason.clone()),
        TransportError::Timeout | TransportError::Connect(_) | TransportError::Request(_) => {
            ErrorBuilder::network(error.to_string())
        }
    }
}

/// Standard non-success response handling for every request
pub(crate) fn normalize_status(
    response: &RawResponse,
    method: HttpMethod,
    url: &str,
) -> NormalizedError {
    warn!(
        method = %method,
        url = %url,
        status = response.status,
        "HTTP request failed"
    );

    let body = serde_json::from_str::<Value>(&response.body).ok();
    let mut messages = body.as_ref().map(server_messages).unwrap_or_default();
    if messages.is_empty() {
        messages.push(HTTP_FAILURE_MESSAGE.to_string());
    }

    let error = NormalizedError::from_status(response.status, messages);
    match body.as_ref().and_then(server_details) {
        Some(details) => error.with_details(details),
        None => error,
    }
}

/// Messages from a JSON error body: `messages` wins over `message`
fn server_messages(body: &Value) -> Vec<String> {
    if let Some(messages) = body.get("messages").and_then(Value::as_array) {
        let messages: Vec<String> = messages
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        if !messages.is_empty() {
            return messages;
        }
    }

    body.get("message")
        .and_then(Value::as_str)
        .map(|message| vec![message.to_string()])
        .unwrap_or_default()
}

fn server_details(body: &Value) -> Option<Vec<ErrorDetail>> {
    let details = body.get("details")?.clone();
    serde_json::from_value::<Vec<ErrorDetail>>(details)
        .ok()
        .filter(|details| !details.is_empty())
}

/// Parse a response body as JSON; an empty body is `null`
pub(crate) fn parse_body(response: &RawResponse, url: &str) -> ApiResult<Value> {
    if response.body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&response.body).map_err(|error| {
        warn!(
            url = %url,
            status = response.status,
            error = %error,
            "Response body is not valid JSON"
        );
        ErrorBuilder::unreadable_body(response.status)
    })
}

/// Build the final request URL from an optional base, a path and query params.
///
/// Absolute `path` values are used as-is; relative ones are appended to the
/// base with exactly one `/` between them.
pub(crate) fn resolve_url(
    base: Option<&Url>,
    path: &str,
    params: Option<&QueryParams>,
) -> ApiResult<Url> {
    let mut url = match Url::parse(path) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = base.ok_or_else(|| {
                ErrorBuilder::internal(format!("Relative URL without a base URL: {path}"))
            })?;
            let joined = format!(
                "{}/{}",
                base.as_str().trim_end_matches('/'),
                path.trim_start_matches('/')
            );
            Url::parse(&joined)
                .map_err(|e| ErrorBuilder::internal(format!("Invalid request URL {joined}: {e}")))?
        }
        Err(e) => {
            return Err(ErrorBuilder::internal(format!(
                "Invalid request URL {path}: {e}"
            )))
        }
    };

    if let Some(params) = params.filter(|params| !params.is_empty()) {
        url.query_pairs_mut().extend_pairs(params.iter());
    }

    Ok(url)
}
