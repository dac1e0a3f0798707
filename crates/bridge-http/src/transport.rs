//! Transport abstraction and the reqwest-backed implementation.

use crate::config::BridgeConfig;
use crate::request::RequestConfig;
use async_trait::async_trait;
use bridge_common_async::CancellationWatcher;
use bytes::Bytes;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

/// HTTP verbs supported by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl Method {
    /// Upper-case verb name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// What was sent, kept for error reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSnapshot {
    pub method: Method,
    pub url: String,
}

impl RequestSnapshot {
    pub fn to_json(&self) -> Value {
        json!({ "method": self.method.as_str(), "url": self.url })
    }
}

/// A request handed to a [`Transport`].
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    /// Fully resolved URL.
    pub url: String,
    /// JSON body; `None` sends no body.
    pub body: Option<Value>,
    pub config: RequestConfig,
    /// Cancelled when the connection timeout elapses.
    pub signal: CancellationWatcher,
}

impl TransportRequest {
    pub fn snapshot(&self) -> RequestSnapshot {
        RequestSnapshot {
            method: self.method,
            url: self.url.clone(),
        }
    }
}

/// A settled HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A response with a serialized JSON body.
    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    /// A response without a body.
    pub fn empty(status: u16) -> Self {
        Self::new(status, Bytes::new())
    }
}

/// Transport-level failures.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed with status code {status}")]
    Status {
        status: u16,
        body: Option<Value>,
        request: RequestSnapshot,
    },

    #[error("network error: {message}")]
    Network {
        message: String,
        request: RequestSnapshot,
    },

    #[error("timeout of {}ms exceeded", after.as_millis())]
    Timeout {
        request: RequestSnapshot,
        after: Duration,
    },

    #[error("request aborted")]
    Aborted { request: RequestSnapshot },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl TransportError {
    /// Stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Status { status, .. } if *status >= 500 => "ERR_BAD_RESPONSE",
            Self::Status { .. } => "ERR_BAD_REQUEST",
            Self::Network { .. } => "ERR_NETWORK",
            Self::Timeout { .. } => "ECONNABORTED",
            Self::Aborted { .. } => "ERR_CANCELED",
            Self::InvalidRequest(_) => "ERR_INVALID_URL",
            Self::ClientBuild(_) => "ERR_BAD_OPTION",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Aborted { .. } => "CanceledError",
            _ => "TransportError",
        }
    }

    /// HTTP status, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Decoded response body, when a response was received.
    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::Status { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    /// The request, when it was dispatched.
    pub fn request(&self) -> Option<&RequestSnapshot> {
        match self {
            Self::Status { request, .. }
            | Self::Network { request, .. }
            | Self::Timeout { request, .. }
            | Self::Aborted { request } => Some(request),
            Self::InvalidRequest(_) | Self::ClientBuild(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "message": self.to_string(),
            "name": self.name(),
            "code": self.code(),
        })
    }
}

/// Sends requests on behalf of a [`Bridge`](crate::Bridge).
///
/// Implementations should stop work once `request.signal` is cancelled; the
/// bridge rejects the call at that point either way.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Build a client from the bridge configuration.
    pub fn new(config: &BridgeConfig) -> Result<Self, TransportError> {
        let client = ClientBuilder::new()
            .timeout(config.request_timeout())
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()
            .map_err(TransportError::ClientBuild)?;

        Ok(Self {
            client,
            timeout: config.request_timeout(),
        })
    }

    /// Wrap an existing client. `timeout` is only used for error reporting.
    pub fn from_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Get the inner reqwest client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    fn classify(&self, error: reqwest::Error, request: RequestSnapshot, timeout: Duration) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout {
                request,
                after: timeout,
            }
        } else if error.is_builder() {
            TransportError::InvalidRequest(error.to_string())
        } else {
            TransportError::Network {
                message: error.to_string(),
                request,
            }
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let snapshot = request.snapshot();
        let TransportRequest {
            method,
            url,
            body,
            config,
            mut signal,
        } = request;

        let mut builder = self.client.request(method.into(), &url);
        for (name, value) in &config.headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| TransportError::InvalidRequest(format!("header {name:?}: {e}")))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| TransportError::InvalidRequest(format!("header {name}: {e}")))?;
            builder = builder.header(name, value);
        }
        if !config.query.is_empty() {
            builder = builder.query(&config.query);
        }
        let timeout = config.timeout.unwrap_or(self.timeout);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        tracing::debug!("Making {} request to: {}", method, url);
        let exchange = async {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(TransportResponse { status, body })
        };

        tokio::select! {
            biased;
            result = exchange => {
                let response = result.map_err(|e| self.classify(e, snapshot, timeout))?;
                tracing::debug!("{} response: {} {}", method, response.status, url);
                Ok(response)
            }
            _ = signal.cancelled() => Err(TransportError::Aborted { request: snapshot }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> RequestSnapshot {
        RequestSnapshot {
            method: Method::Get,
            url: "http://api.test/users/1".to_string(),
        }
    }

    #[test]
    fn test_status_codes() {
        let client_side = TransportError::Status {
            status: 404,
            body: None,
            request: snapshot(),
        };
        let server_side = TransportError::Status {
            status: 503,
            body: None,
            request: snapshot(),
        };

        assert_eq!(client_side.code(), "ERR_BAD_REQUEST");
        assert_eq!(server_side.code(), "ERR_BAD_RESPONSE");
        assert_eq!(client_side.status(), Some(404));
        assert_eq!(client_side.to_string(), "request failed with status code 404");
    }

    #[test]
    fn test_codes_without_response() {
        let aborted = TransportError::Aborted { request: snapshot() };
        assert_eq!(aborted.code(), "ERR_CANCELED");
        assert_eq!(aborted.name(), "CanceledError");
        assert_eq!(aborted.status(), None);
        assert_eq!(aborted.request(), Some(&snapshot()));

        let timeout = TransportError::Timeout {
            request: snapshot(),
            after: Duration::from_millis(5000),
        };
        assert_eq!(timeout.code(), "ECONNABORTED");
        assert_eq!(timeout.to_string(), "timeout of 5000ms exceeded");

        let invalid = TransportError::InvalidRequest("relative URL without a base".into());
        assert_eq!(invalid.code(), "ERR_INVALID_URL");
        assert!(invalid.request().is_none());
    }

    #[test]
    fn test_error_to_json() {
        let error = TransportError::Network {
            message: "connection refused".into(),
            request: snapshot(),
        };
        assert_eq!(
            error.to_json(),
            json!({
                "message": "network error: connection refused",
                "name": "TransportError",
                "code": "ERR_NETWORK",
            })
        );
    }

    #[test]
    fn test_snapshot_to_json() {
        assert_eq!(
            snapshot().to_json(),
            json!({ "method": "GET", "url": "http://api.test/users/1" })
        );
    }

    #[test]
    fn test_method_conversion() {
        assert_eq!(reqwest::Method::from(Method::Patch), reqwest::Method::PATCH);
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_transport_creation() {
        let transport = ReqwestTransport::new(&BridgeConfig::default());
        assert!(transport.is_ok());
    }
}
