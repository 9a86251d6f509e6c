use super::{HttpMethod, QueryParams};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Logical identity of one outbound call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<QueryParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: None,
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Params that belong in the query string for this method
    pub fn query_params(&self) -> Option<&QueryParams> {
        if self.method.uses_query_params() {
            self.params.as_ref()
        } else {
            None
        }
    }

    /// Body that belongs in the payload for this method
    pub fn payload(&self) -> Option<&Value> {
        if self.method.uses_query_params() {
            None
        } else {
            self.body.as_ref()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_routes_params_to_query() {
        let request = RequestDescriptor::get("/users")
            .with_params(QueryParams::new().with("page", 1))
            .with_body(json!({"ignored": true}));

        assert_eq!(request.query_params().unwrap().get("page"), Some("1"));
        assert!(request.payload().is_none());
    }

    #[test]
    fn test_post_routes_body_to_payload() {
        let request = RequestDescriptor::new(HttpMethod::Post, "/users")
            .with_params(QueryParams::new().with("page", 1))
            .with_body(json!({"name": "Ada"}));

        assert!(request.query_params().is_none());
        assert_eq!(request.payload(), Some(&json!({"name": "Ada"})));
    }
}
