//! The request bridge.

use crate::config::BridgeConfig;
use crate::error::{self, BridgeError, RawError, RequestError};
use crate::interceptor::{RejectErrorStatus, ResponseInterceptor};
use crate::request::{join_url, serialize_body, RequestConfig};
use crate::response;
use crate::transport::{
    Method, ReqwestTransport, RequestSnapshot, Transport, TransportError, TransportRequest,
    TransportResponse,
};
use crate::BridgeResult;
use bridge_common_async::{convert_future_to_result, process_abort_controller, AbortTimer};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, debug_span, Instrument};

/// HTTP client whose calls resolve to [`BridgeResult`] values.
///
/// Every call is raced against the connection timeout. A call that has not
/// settled when the timeout elapses is aborted and fails with
/// `ERR_CANCELED`.
pub struct Bridge {
    transport: Arc<dyn Transport>,
    interceptors: Vec<Arc<dyn ResponseInterceptor>>,
    defaults: RequestConfig,
    base_url: Option<String>,
    connection_timeout: AtomicU64,
    log_errors: bool,
}

impl Bridge {
    /// Create a bridge with default config.
    pub fn new() -> Result<Self, BridgeError> {
        Self::builder().build()
    }

    /// Create a bridge over a reqwest transport built from `config`.
    pub fn with_config(config: BridgeConfig) -> Result<Self, BridgeError> {
        Self::builder().config(config).build()
    }

    /// Create a bridge over a custom transport.
    pub fn with_transport(transport: impl Transport + 'static, config: BridgeConfig) -> Self {
        Self::assemble(Arc::new(transport), config, Vec::new(), None)
    }

    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::default()
    }

    fn assemble(
        transport: Arc<dyn Transport>,
        config: BridgeConfig,
        extra: Vec<Arc<dyn ResponseInterceptor>>,
        log_errors: Option<bool>,
    ) -> Self {
        let mut interceptors: Vec<Arc<dyn ResponseInterceptor>> = vec![Arc::new(RejectErrorStatus)];
        interceptors.extend(extra);

        Self {
            transport,
            interceptors,
            defaults: RequestConfig {
                headers: config.headers,
                ..RequestConfig::default()
            },
            base_url: config.base_url,
            connection_timeout: AtomicU64::new(config.connection_timeout_ms),
            log_errors: log_errors.unwrap_or(config.log_errors),
        }
    }

    /// Time a request may take before it is aborted.
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout.load(Ordering::Relaxed))
    }

    /// Change the connection timeout for requests started afterwards.
    pub fn set_connection_timeout(&self, timeout: Duration) {
        self.connection_timeout.store(millis(timeout), Ordering::Relaxed);
    }

    /// Use `constructor` to build every `E` returned by any bridge.
    pub fn set_error_constructor<E: 'static>(constructor: impl Fn(RawError) -> E + Send + Sync + 'static) {
        error::set_constructor::<E>(Arc::new(constructor));
    }

    /// Go back to building `E` with `E::from`.
    pub fn reset_error_constructor<E: 'static>() {
        error::reset_constructor::<E>();
    }

    /// Make a GET request.
    pub async fn get<T, E>(&self, route: &str, config: Option<RequestConfig>) -> BridgeResult<T, E>
    where
        T: DeserializeOwned,
        E: From<RawError> + Debug + 'static,
    {
        self.process(Method::Get, route, Ok(None), config).await
    }

    /// Make a POST request with a JSON body.
    pub async fn post<T, E, B>(
        &self,
        route: &str,
        body: &B,
        config: Option<RequestConfig>,
    ) -> BridgeResult<T, E>
    where
        T: DeserializeOwned,
        E: From<RawError> + Debug + 'static,
        B: Serialize + ?Sized,
    {
        self.process(Method::Post, route, serialize_body(body), config).await
    }

    /// Make a PATCH request with a JSON body.
    pub async fn patch<T, E, B>(
        &self,
        route: &str,
        body: &B,
        config: Option<RequestConfig>,
    ) -> BridgeResult<T, E>
    where
        T: DeserializeOwned,
        E: From<RawError> + Debug + 'static,
        B: Serialize + ?Sized,
    {
        self.process(Method::Patch, route, serialize_body(body), config).await
    }

    /// Make a PUT request with a JSON body.
    pub async fn put<T, E, B>(
        &self,
        route: &str,
        body: &B,
        config: Option<RequestConfig>,
    ) -> BridgeResult<T, E>
    where
        T: DeserializeOwned,
        E: From<RawError> + Debug + 'static,
        B: Serialize + ?Sized,
    {
        self.process(Method::Put, route, serialize_body(body), config).await
    }

    /// Make a DELETE request.
    pub async fn delete<T, E>(&self, route: &str, config: Option<RequestConfig>) -> BridgeResult<T, E>
    where
        T: DeserializeOwned,
        E: From<RawError> + Debug + 'static,
    {
        self.process(Method::Delete, route, Ok(None), config).await
    }

    async fn process<T, E>(
        &self,
        method: Method,
        route: &str,
        body: Result<Option<Value>, serde_json::Error>,
        config: Option<RequestConfig>,
    ) -> BridgeResult<T, E>
    where
        T: DeserializeOwned,
        E: From<RawError> + Debug + 'static,
    {
        let timer = process_abort_controller(self.connection_timeout());
        let timer = &timer;
        let url = join_url(self.base_url.as_deref(), route);
        let config = self.defaults.merge(config);
        let span = debug_span!("bridge_request", %method, %url);
        debug!(parent: &span, timeout_ms = millis(timer.timeout()), "dispatching request");

        convert_future_to_result(|| async move {
            let body = body.map_err(RequestError::Body)?;
            let request = TransportRequest {
                method,
                url,
                body,
                config,
                signal: timer.signal(),
            };
            let snapshot = request.snapshot();
            let mut signal = timer.signal();

            let response = tokio::select! {
                biased;
                result = self.transport.send(request) => result?,
                _ = signal.cancelled() => {
                    return Err(RequestError::from(TransportError::Aborted { request: snapshot }));
                }
            };

            let response = self.intercept(&snapshot, response)?;
            debug!(status = response.status, "request settled");
            self.extract_data_or_none(timer, &response)
        })
        .on_reject(|error: RequestError| self.process_error::<E>(timer, error))
        .log_errors(self.log_errors)
        .run()
        .instrument(span)
        .await
    }

    fn intercept(
        &self,
        request: &RequestSnapshot,
        response: TransportResponse,
    ) -> Result<TransportResponse, TransportError> {
        self.interceptors
            .iter()
            .try_fold(response, |response, interceptor| interceptor.on_response(request, response))
    }

    fn extract_data_or_none<T: DeserializeOwned>(
        &self,
        timer: &AbortTimer,
        reply: &TransportResponse,
    ) -> Result<Option<T>, RequestError> {
        timer.clear();
        Ok(response::extract_data_or_none(reply)?)
    }

    fn process_error<E: From<RawError> + 'static>(&self, timer: &AbortTimer, error: RequestError) -> E {
        timer.clear();
        error::construct::<E>(error.into_raw())
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("base_url", &self.base_url)
            .field("connection_timeout", &self.connection_timeout())
            .field("interceptors", &self.interceptors.len())
            .field("log_errors", &self.log_errors)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Bridge`].
#[derive(Default)]
pub struct BridgeBuilder {
    config: BridgeConfig,
    transport: Option<Arc<dyn Transport>>,
    interceptors: Vec<Arc<dyn ResponseInterceptor>>,
    log_errors: Option<bool>,
}

impl BridgeBuilder {
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `transport` instead of building a reqwest one.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Append a response interceptor. It runs after the status check.
    pub fn interceptor(mut self, interceptor: impl ResponseInterceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Log every failure. Overrides `BridgeConfig::log_errors`.
    pub fn log_errors(mut self, log_errors: bool) -> Self {
        self.log_errors = Some(log_errors);
        self
    }

    pub fn build(self) -> Result<Bridge, BridgeError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.config)?),
        };
        Ok(Bridge::assemble(transport, self.config, self.interceptors, self.log_errors))
    }
}

impl std::fmt::Debug for BridgeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeBuilder")
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}
