use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The HTTP methods the orchestrator knows how to issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Params travel in the query string for these methods, the body otherwise
    pub fn uses_query_params(&self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Delete)
    }

    /// Everything but GET bypasses the response cache
    pub fn is_mutation(&self) -> bool {
        !matches!(self, HttpMethod::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "patch" => Ok(HttpMethod::Patch),
            "delete" => Ok(HttpMethod::Delete),
            _ => Err(UnsupportedMethod(s.to_string())),
        }
    }
}

/// Methods that change server state and never go through the response cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationMethod {
    Post,
    Put,
    Patch,
    Delete,
}

impl From<MutationMethod> for HttpMethod {
    fn from(method: MutationMethod) -> Self {
        match method {
            MutationMethod::Post => HttpMethod::Post,
            MutationMethod::Put => HttpMethod::Put,
            MutationMethod::Patch => HttpMethod::Patch,
            MutationMethod::Delete => HttpMethod::Delete,
        }
    }
}

impl TryFrom<HttpMethod> for MutationMethod {
    type Error = UnsupportedMethod;

    fn try_from(method: HttpMethod) -> Result<Self, Self::Error> {
        match method {
            HttpMethod::Post => Ok(MutationMethod::Post),
            HttpMethod::Put => Ok(MutationMethod::Put),
            HttpMethod::Patch => Ok(MutationMethod::Patch),
            HttpMethod::Delete => Ok(MutationMethod::Delete),
            HttpMethod::Get => Err(UnsupportedMethod(method.to_string())),
        }
    }
}

impl fmt::Display for MutationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        HttpMethod::from(*self).fmt(f)
    }
}

impl FromStr for MutationMethod {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<HttpMethod>()?.try_into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported HTTP method: {0}")]
pub struct UnsupportedMethod(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("PATCH".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert_eq!("Delete".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
    }

    #[test]
    fn test_unknown_methods_are_rejected() {
        let err = "trace".parse::<HttpMethod>().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported HTTP method: trace");
        assert!("head".parse::<HttpMethod>().is_err());
        assert!("".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_param_placement() {
        assert!(HttpMethod::Get.uses_query_params());
        assert!(HttpMethod::Delete.uses_query_params());
        assert!(!HttpMethod::Post.uses_query_params());
        assert!(!HttpMethod::Put.uses_query_params());
        assert!(!HttpMethod::Patch.uses_query_params());
    }

    #[test]
    fn test_mutation_methods_exclude_get() {
        assert!("get".parse::<MutationMethod>().is_err());
        assert_eq!("put".parse::<MutationMethod>().unwrap(), MutationMethod::Put);
        assert_eq!(HttpMethod::from(MutationMethod::Patch), HttpMethod::Patch);
        assert!(MutationMethod::try_from(HttpMethod::Get).is_err());
        assert_eq!(MutationMethod::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_only_get_is_cacheable() {
        for method in HttpMethod::ALL {
            assert_eq!(method.is_mutation(), method != HttpMethod::Get);
        }
    }
}
