//! Network transport port
//!
//! The transport issues one HTTP exchange and reports either the response
//! (whatever its status) or a transport-level failure. It knows nothing about
//! authentication, caching or error normalization.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use quire_domain::constants::CONTENT_TYPE_JSON;
use serde_json::Value;
use thiserror::Error;

use crate::cache::key::url_path;

/// HTTP headers keyed by their canonical name.
pub type Headers = BTreeMap<String, String>;

/// Bearer token header
pub const HEADER_AUTHORIZATION: &str = "Authorization";
/// Request body media type header
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
/// Accepted response media type header
pub const HEADER_ACCEPT: &str = "Accept";

/// HTTP methods used by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Uppercase method name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound HTTP request
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: HttpMethod,
    /// Absolute URL
    pub url: String,
    pub headers: Headers,
    /// Query parameters as a JSON object
    pub query: Option<Value>,
    /// JSON body
    pub body: Option<Value>,
    pub timeout: Duration,
}

impl TransportRequest {
    /// Request carrying the JSON `Content-Type` and `Accept` headers.
    pub fn json(method: HttpMethod, url: impl Into<String>, timeout: Duration) -> Self {
        let mut headers = Headers::new();
        headers.insert(HEADER_CONTENT_TYPE.to_string(), CONTENT_TYPE_JSON.to_string());
        headers.insert(HEADER_ACCEPT.to_string(), CONTENT_TYPE_JSON.to_string());
        Self { method, url: url.into(), headers, query: None, body: None, timeout }
    }

    /// Attach `Authorization: Bearer <token>`.
    #[must_use]
    pub fn with_bearer(mut self, token: &str) -> Self {
        self.headers.insert(HEADER_AUTHORIZATION.to_string(), format!("Bearer {token}"));
        self
    }

    /// Set query parameters (a JSON object).
    #[must_use]
    pub fn with_query(mut self, query: Option<Value>) -> Self {
        self.query = query;
        self
    }

    /// Set the JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    /// Header lookup, case-insensitive on the name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Token from the `Authorization: Bearer …` header, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.header(HEADER_AUTHORIZATION).and_then(|value| value.strip_prefix("Bearer "))
    }

    /// Path component of the request URL (no origin, query or fragment).
    pub fn path(&self) -> String {
        url_path(&self.url)
    }

    /// Query parameters flattened to `(name, value)` pairs.
    ///
    /// Strings are used verbatim, arrays repeat the name once per element,
    /// nulls are dropped and everything else uses its JSON text.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let Some(Value::Object(map)) = &self.query else {
            return Vec::new();
        };

        let mut pairs = Vec::with_capacity(map.len());
        for (name, value) in map {
            match value {
                Value::Null => {}
                Value::Array(items) => {
                    for item in items {
                        if let Some(text) = scalar_text(item) {
                            pairs.push((name.clone(), text));
                        }
                    }
                }
                other => {
                    if let Some(text) = scalar_text(other) {
                        pairs.push((name.clone(), text));
                    }
                }
            }
        }
        pairs
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Inbound HTTP response, any status
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Response with a raw body and no headers.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: Headers::new(), body: body.into() }
    }

    /// Response with a JSON body
    pub fn json(status: u16, body: &Value) -> Self {
        let mut response = Self::new(status, body.to_string());
        response.headers.insert(HEADER_CONTENT_TYPE.to_string(), CONTENT_TYPE_JSON.to_string());
        response
    }

    /// Check if the response indicates success (2xx status).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as JSON; `None` when empty or not JSON.
    pub fn json_body(&self) -> Option<Value> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }
}

/// Transport-level failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request was sent but nothing came back (timeout, refused, reset)
    #[error("No response received: {0}")]
    NoResponse(String),
    /// The request could not be dispatched at all (invalid URL, bad body)
    #[error("Request could not be dispatched: {0}")]
    Dispatch(String),
}

/// Trait for issuing HTTP exchanges
///
/// Implementations include the production reqwest-based transport and
/// scripted transports for tests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return the response, whatever its status.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}
