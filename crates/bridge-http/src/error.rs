//! Error normalization.
//!
//! Every failed call is reduced to a [`RawError`] and then turned into the
//! caller's error type by an error constructor. A constructor registered
//! with [`Bridge::set_error_constructor`](crate::Bridge::set_error_constructor)
//! is used for its error type across every bridge in the process; without
//! one, `E::from(raw)` is used.

use crate::response::ResponseError;
use crate::transport::{RequestSnapshot, TransportError};
use serde_json::{json, Map, Value};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// Builds a caller error from a [`RawError`].
pub type ErrorConstructor<E> = Arc<dyn Fn(RawError) -> E + Send + Sync>;

/// Normalized failure data handed to an error constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct RawError {
    /// Most specific description available: the response's `error` field,
    /// the response body, the request, or the error itself.
    pub detail: Value,
    pub status: Option<u16>,
    pub code: Option<String>,
}

impl RawError {
    pub fn new(detail: impl Into<Value>) -> Self {
        Self {
            detail: detail.into(),
            status: None,
            code: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Build from a transport failure.
    pub fn from_transport(error: &TransportError) -> Self {
        let body = error.body().filter(|body| !body.is_null());
        let detail = body
            .and_then(|body| body.get("error").filter(|e| !e.is_null()).cloned())
            .or_else(|| body.cloned())
            .or_else(|| error.request().map(RequestSnapshot::to_json))
            .unwrap_or_else(|| error.to_json());

        Self {
            detail,
            status: error.status(),
            code: Some(error.code().to_string()),
        }
    }

    /// Build from a failure that carries no transport structure.
    pub fn unstructured(error: &dyn std::error::Error, name: &str) -> Self {
        Self::new(json!({ "message": error.to_string(), "name": name }))
    }

    /// The first of: a string detail, `detail.message`, `detail.name`,
    /// `detail.code`, the transport code.
    ///
    /// Empty strings are skipped and numbers are rendered as text.
    pub fn message(&self) -> Option<String> {
        if let Value::String(message) = &self.detail {
            if !message.is_empty() {
                return Some(message.clone());
            }
        }
        ["message", "name", "code"]
            .iter()
            .find_map(|key| self.detail.get(key).and_then(text))
            .or_else(|| self.code.clone().filter(|code| !code.is_empty()))
    }

    /// The detail as a JSON object with `status` attached.
    pub fn to_json(&self) -> Value {
        let mut object = match &self.detail {
            Value::Object(fields) => fields.clone(),
            other => {
                let mut fields = Map::new();
                fields.insert("error".to_string(), other.clone());
                fields
            }
        };
        object.insert("status".to_string(), json!(self.status));
        Value::Object(object)
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The default caller error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BridgeError {
    pub message: String,
    pub status: Option<u16>,
}

impl BridgeError {
    /// Message used when a failure carries nothing descriptive.
    pub const UNKNOWN: &'static str = "UNKNOWN_ERROR";

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }
}

impl From<RawError> for BridgeError {
    fn from(raw: RawError) -> Self {
        Self {
            message: raw.message().unwrap_or_else(|| Self::UNKNOWN.to_string()),
            status: raw.status,
        }
    }
}

impl From<TransportError> for BridgeError {
    fn from(error: TransportError) -> Self {
        RawError::from_transport(&error).into()
    }
}

/// Failure of a single bridged call, before normalization.
#[derive(Debug, thiserror::Error)]
pub(crate) enum RequestError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to serialize request body: {0}")]
    Body(#[source] serde_json::Error),

    #[error(transparent)]
    Response(#[from] ResponseError),
}

impl RequestError {
    pub(crate) fn into_raw(self) -> RawError {
        match self {
            Self::Transport(error) => RawError::from_transport(&error),
            Self::Body(error) => RawError::unstructured(&error, "SerializationError"),
            Self::Response(error) => RawError::unstructured(&error, "ResponseError"),
        }
    }
}

type Registry = RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Default::default)
}

pub(crate) fn set_constructor<E: 'static>(constructor: ErrorConstructor<E>) {
    registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(TypeId::of::<E>(), Box::new(constructor));
}

pub(crate) fn reset_constructor<E: 'static>() {
    registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&TypeId::of::<E>());
}

/// Build an `E` with the registered constructor, or `E::from`.
pub(crate) fn construct<E: From<RawError> + 'static>(raw: RawError) -> E {
    let constructor = registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&TypeId::of::<E>())
        .and_then(|entry| entry.downcast_ref::<ErrorConstructor<E>>())
        .cloned();

    match constructor {
        Some(constructor) => constructor(raw),
        None => E::from(raw),
    }
}
