//! Response body handling.

use crate::transport::TransportResponse;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Whether a body counts as empty: no bytes, or whitespace only.
pub fn is_empty_body(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

/// Decode a body into JSON.
///
/// Non-JSON text becomes a JSON string. Empty bodies yield `None`.
pub fn body_value(body: &[u8]) -> Option<Value> {
    if is_empty_body(body) {
        return None;
    }
    match serde_json::from_slice(body) {
        Ok(value) => Some(value),
        Err(_) => Some(Value::String(String::from_utf8_lossy(body).into_owned())),
    }
}

/// Map a successful response to its data, or `None` when it carries none.
///
/// A response has no data when its status is 204, its body is empty, or
/// its body is JSON `null`.
pub fn extract_data_or_none<T: DeserializeOwned>(
    response: &TransportResponse,
) -> Result<Option<T>, ResponseError> {
    if response.status == 204 {
        return Ok(None);
    }

    match body_value(&response.body) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value).map(Some).map_err(|e| ResponseError::Parse {
            status: response.status,
            body: String::from_utf8_lossy(&response.body).to_string(),
            source: e,
        }),
    }
}

/// Response parsing errors.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("failed to parse JSON (status {status}): {source}")]
    Parse {
        status: u16,
        body: String,
        #[source]
        source: serde_json::Error,
    },
}
