//! Cache key derivation.
//!
//! A key is the URL verbatim when there are no params, otherwise
//! `url + "?" + query` where the query lists params sorted by key and
//! form-urlencoded. Sorting makes the key independent of the order in which
//! params were supplied.

use fetchkit_core::{QueryParams, RequestDescriptor};

/// Derive the cache key for a URL and optional params
pub fn generate_key(url: &str, params: Option<&QueryParams>) -> String {
    match params {
        None => url.to_string(),
        Some(params) => format!("{url}?{}", params.to_query_string()),
    }
}

/// Cache key of a request, using only the params that reach the query string
pub fn descriptor_key(request: &RequestDescriptor) -> String {
    generate_key(&request.url, request.query_params())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fetchkit_core::HttpMethod;
    use serde_json::json;

    #[test]
    fn test_no_params_is_url_verbatim() {
        assert_eq!(generate_key("users/1", None), "users/1");
        assert_eq!(
            generate_key("https://api.example.com/a?b=1", None),
            "https://api.example.com/a?b=1"
        );
    }

    #[test]
    fn test_params_are_sorted() {
        let params = QueryParams::from_json(&json!({"b": 2, "a": 1})).unwrap();
        assert_eq!(generate_key("/users", Some(&params)), "/users?a=1&b=2");
    }

    #[test]
    fn test_order_independence() {
        let first = QueryParams::new().with("a", 1).with("b", 2);
        let second = QueryParams::new().with("b", 2).with("a", 1);
        assert_eq!(
            generate_key("/users", Some(&first)),
            generate_key("/users", Some(&second))
        );
    }

    #[test]
    fn test_empty_params_keep_separator() {
        let params = QueryParams::new();
        assert_eq!(generate_key("/users", Some(&params)), "/users?");
    }

    #[test]
    fn test_different_values_give_different_keys() {
        let page1 = QueryParams::new().with("page", 1);
        let page2 = QueryParams::new().with("page", 2);
        assert_ne!(
            generate_key("/users", Some(&page1)),
            generate_key("/users", Some(&page2))
        );
    }

    #[test]
    fn test_values_are_encoded() {
        let params = QueryParams::new().with("q", "a b&c");
        assert_eq!(generate_key("/search", Some(&params)), "/search?q=a+b%26c");
    }

    #[test]
    fn test_descriptor_key_ignores_body_params() {
        let params = QueryParams::new().with("page", 1);
        let get = RequestDescriptor::get("/users").with_params(params.clone());
        let post = RequestDescriptor::new(HttpMethod::Post, "/users").with_params(params);

        assert_eq!(descriptor_key(&get), "/users?page=1");
        assert_eq!(descriptor_key(&post), "/users");
    }
}
