//! Response interceptors.

use crate::response::body_value;
use crate::transport::{RequestSnapshot, TransportError, TransportResponse};
use tracing::warn;

/// Runs over every response before its data is extracted.
///
/// Interceptors run in registration order; the first error stops the chain
/// and fails the call.
pub trait ResponseInterceptor: Send + Sync {
    fn on_response(
        &self,
        request: &RequestSnapshot,
        response: TransportResponse,
    ) -> Result<TransportResponse, TransportError>;
}

/// Turns every response with status 400 or above into an error.
///
/// Always installed first on a [`Bridge`](crate::Bridge).
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectErrorStatus;

impl ResponseInterceptor for RejectErrorStatus {
    fn on_response(
        &self,
        request: &RequestSnapshot,
        response: TransportResponse,
    ) -> Result<TransportResponse, TransportError> {
        if response.status < 400 {
            return Ok(response);
        }

        warn!(status = response.status, method = %request.method, url = %request.url, "request rejected");
        Err(TransportError::Status {
            status: response.status,
            body: body_value(&response.body),
            request: request.clone(),
        })
    }
}
