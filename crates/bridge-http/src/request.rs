//! Per-call request configuration and URL handling.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Options for a single call, merged over the bridge defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestConfig {
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    /// Transport-level timeout for this call only.
    pub timeout: Option<Duration>,
}

impl RequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Override the transport-level timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Layer `overrides` on top of `self`. Keys in `overrides` win.
    pub fn merge(&self, overrides: Option<RequestConfig>) -> RequestConfig {
        let mut merged = self.clone();
        if let Some(overrides) = overrides {
            merged.headers.extend(overrides.headers);
            merged.query.extend(overrides.query);
            if overrides.timeout.is_some() {
                merged.timeout = overrides.timeout;
            }
        }
        merged
    }
}

/// Resolve `route` against `base`.
///
/// Absolute `http://` and `https://` routes are returned unchanged.
pub fn join_url(base: Option<&str>, route: &str) -> String {
    if route.starts_with("http://") || route.starts_with("https://") {
        return route.to_string();
    }

    match base {
        Some(base) if route.is_empty() => base.to_string(),
        Some(base) => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            route.trim_start_matches('/')
        ),
        None => route.to_string(),
    }
}

/// Serialize a request body. JSON `null` means no body.
pub fn serialize_body<B: Serialize + ?Sized>(body: &B) -> Result<Option<Value>, serde_json::Error> {
    serde_json::to_value(body).map(|value| match value {
        Value::Null => None,
        value => Some(value),
    })
}
