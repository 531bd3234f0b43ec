//! Cache keys and invalidation scopes

use std::fmt;

use quire_domain::InvalidationPolicy;
use serde_json::Value;
use url::Url;

/// Identity of a cached GET response: the URL plus its canonical parameters.
///
/// Keys are the URL alone when there are no parameters, otherwise
/// `url?<params>` where `<params>` is JSON with object keys sorted, so
/// logically equal parameter sets always produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for `url`; non-empty params are appended as canonical JSON.
    pub fn new(url: &str, params: Option<&Value>) -> Self {
        match params.filter(|params| !is_empty_params(params)) {
            Some(params) => Self(format!("{url}?{}", canonical_json(params))),
            None => Self(url.to_string()),
        }
    }

    /// Key as stored, without namespace
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_empty_params(params: &Value) -> bool {
    match params {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// JSON text with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (index, (name, item)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(name.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Path of a relative or absolute URL, without query, fragment or trailing slash.
pub fn url_path(url: &str) -> String {
    if let Ok(parsed) = Url::parse(url) {
        if parsed.has_host() {
            return normalize_path(parsed.path());
        }
    }
    let end = url.find(['?', '#']).unwrap_or(url.len());
    normalize_path(&url[..end])
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// First path segment of a URL: `/articles/7?x=1` gives `/articles`.
pub fn resource_prefix(url: &str) -> String {
    let path = url_path(url);
    match path.trim_start_matches('/').split('/').next() {
        Some(segment) if !segment.is_empty() => format!("/{segment}"),
        _ => "/".to_string(),
    }
}

/// Set of cache keys dropped by a successful mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationScope {
    /// Every key under the resource, on segment boundaries
    Prefix(String),
    /// Only keys for exactly this path (any parameters)
    Exact(String),
}

impl InvalidationScope {
    /// Scope removed by a successful mutation of `url` under `policy`.
    pub fn for_url(url: &str, policy: InvalidationPolicy) -> Self {
        match policy {
            InvalidationPolicy::ResourcePrefix => Self::Prefix(resource_prefix(url)),
            InvalidationPolicy::ExactKey => Self::Exact(url_path(url)),
        }
    }

    /// True when the cache key (without namespace) falls in this scope.
    pub fn matches(&self, key: &str) -> bool {
        let path = url_path(key);
        match self {
            Self::Prefix(prefix) if prefix == "/" => true,
            Self::Prefix(prefix) => {
                path == *prefix
                    || path.strip_prefix(prefix.as_str()).is_some_and(|rest| rest.starts_with('/'))
            }
            Self::Exact(exact) => path == *exact,
        }
    }
}

impl fmt::Display for InvalidationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prefix(prefix) => write!(f, "prefix {prefix}"),
            Self::Exact(path) => write!(f, "exact {path}"),
        }
    }
}
