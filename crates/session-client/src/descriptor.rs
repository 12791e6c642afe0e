//! Immutable descriptions of logical API calls.

use reqwest::Method;

/// Immutable description of one logical API call.
///
/// Constructed per call and never mutated; the client reads it to build
/// the actual HTTP request (and to rebuild it for the single
/// retry-after-refresh).
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the configured API base URL.
    pub path: String,
    /// Optional JSON body.
    pub body: Option<serde_json::Value>,
    /// Whether the call must carry a bearer token.
    pub requires_auth: bool,
}

impl RequestDescriptor {
    /// Create a descriptor. Calls require authentication unless marked
    /// [`public`](Self::public).
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            requires_auth: true,
        }
    }

    /// GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// POST request with a JSON body.
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    /// DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Mark the call as not requiring authentication.
    pub fn public(mut self) -> Self {
        self.requires_auth = false;
        self
    }
}
