//! HTTP request bridge.
//!
//! [`Bridge`] wraps a [`Transport`] so that every call resolves to a
//! [`BridgeResult`]: `Ok(Some(data))` when the server returned data,
//! `Ok(None)` when it returned nothing and `Err(e)` for any failure, with
//! `e` built by the error constructor registered for its type.
//!
//! ```no_run
//! use bridge_http::{Bridge, BridgeConfig, BridgeResult};
//! use serde_json::Value;
//!
//! # async fn run() -> Result<(), bridge_http::BridgeError> {
//! let bridge = Bridge::with_config(BridgeConfig::default().base_url("http://localhost:8080"))?;
//! let user: BridgeResult<Value> = bridge.get("/users/1", None).await;
//! match user {
//!     Ok(Some(user)) => println!("{user}"),
//!     Ok(None) => println!("no content"),
//!     Err(e) => eprintln!("{e}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod request;
pub mod response;
pub mod transport;

pub use client::{Bridge, BridgeBuilder};
pub use config::{BridgeConfig, ConfigError, DEFAULT_CONNECTION_TIME_OUT, DEFAULT_REQUEST_TIME_OUT};
pub use error::{BridgeError, ErrorConstructor, RawError};
pub use interceptor::{RejectErrorStatus, ResponseInterceptor};
pub use request::RequestConfig;
pub use response::{extract_data_or_none, ResponseError};
pub use transport::{
    Method, ReqwestTransport, RequestSnapshot, Transport, TransportError, TransportRequest,
    TransportResponse,
};

pub use bridge_common_async::{
    cleanable_exec, cleanable_safe_async_exec, convert_future_to_result, exec_safe_async,
    process_abort_controller, AbortTimer, CancellationToken, CancellationWatcher, CleanupHandle,
    ConverterConfig, OnClean, SafeAsyncHandlers,
};

/// `Ok(Some(data))`, `Ok(None)` for an empty response, or `Err(e)`.
pub type BridgeResult<T, E = BridgeError> = Result<Option<T>, E>;
