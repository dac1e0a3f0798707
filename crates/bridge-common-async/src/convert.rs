//! Future-to-result conversion.
//!
//! [`convert_future_to_result`] runs a fallible operation and always hands
//! back a `Result`, optionally normalizing the error, transforming it again,
//! transforming the success value and logging failures on the way.
//!
//! ```
//! use bridge_common_async::convert_future_to_result;
//!
//! # tokio_test_block_on(async {
//! let result = convert_future_to_result(|| async { Err::<u32, _>("boom") })
//!     .error_constructor(|raw: &str| raw.to_uppercase())
//!     .on_reject(|normalized: String| format!("wrapped: {normalized}"))
//!     .run()
//!     .await;
//!
//! assert_eq!(result, Err("wrapped: BOOM".to_string()));
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

/// A single-use value transform.
///
/// Implemented for [`Identity`] and for every `FnOnce(In) -> Out`.
pub trait Transform<In> {
    /// The transformed value.
    type Output;

    /// Apply the transform.
    fn apply(self, input: In) -> Self::Output;
}

/// The transform that returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl<In> Transform<In> for Identity {
    type Output = In;

    fn apply(self, input: In) -> In {
        input
    }
}

impl<In, Out, F> Transform<In> for F
where
    F: FnOnce(In) -> Out,
{
    type Output = Out;

    fn apply(self, input: In) -> Out {
        self(input)
    }
}

/// Converter settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConverterConfig {
    /// Log every failure before returning it.
    pub log_errors: bool,
}

/// Start converting `operation` into a `Result`.
pub fn convert_future_to_result<Op, Fut, T, R>(operation: Op) -> Converter<Op, T, R>
where
    Op: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, R>>,
{
    Converter {
        operation,
        error_constructor: Identity,
        on_reject: Identity,
        on_fulfill: Identity,
        config: ConverterConfig::default(),
        _marker: PhantomData,
    }
}

/// Builder returned by [`convert_future_to_result`].
///
/// The error passes through `error_constructor` first and `on_reject`
/// second; either defaults to [`Identity`]. Set the error constructor before
/// `on_reject`, since `on_reject` receives its output.
#[must_use = "a converter does nothing until `run` is awaited"]
pub struct Converter<Op, T, R, N = Identity, J = Identity, F = Identity> {
    operation: Op,
    error_constructor: N,
    on_reject: J,
    on_fulfill: F,
    config: ConverterConfig,
    _marker: PhantomData<fn() -> (T, R)>,
}

impl<Op, T, R, N, J, F> Converter<Op, T, R, N, J, F> {
    /// Normalize the raw error before anything else sees it.
    pub fn error_constructor<N2, E>(self, error_constructor: N2) -> Converter<Op, T, R, N2, J, F>
    where
        N2: FnOnce(R) -> E,
    {
        Converter {
            operation: self.operation,
            error_constructor,
            on_reject: self.on_reject,
            on_fulfill: self.on_fulfill,
            config: self.config,
            _marker: PhantomData,
        }
    }

    /// Transform the (already normalized) error into the returned error.
    pub fn on_reject<J2, E>(self, on_reject: J2) -> Converter<Op, T, R, N, J2, F>
    where
        N: Transform<R>,
        J2: FnOnce(N::Output) -> E,
    {
        Converter {
            operation: self.operation,
            error_constructor: self.error_constructor,
            on_reject,
            on_fulfill: self.on_fulfill,
            config: self.config,
            _marker: PhantomData,
        }
    }

    /// Transform the success value before wrapping it.
    pub fn on_fulfill<F2>(self, on_fulfill: F2) -> Converter<Op, T, R, N, J, F2>
    where
        F2: FnOnce(T) -> T,
    {
        Converter {
            operation: self.operation,
            error_constructor: self.error_constructor,
            on_reject: self.on_reject,
            on_fulfill,
            config: self.config,
            _marker: PhantomData,
        }
    }

    /// Log failures with `tracing` before returning them.
    pub fn log_errors(mut self, log_errors: bool) -> Self {
        self.config.log_errors = log_errors;
        self
    }

    /// Replace the converter settings.
    pub fn config(mut self, config: ConverterConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the operation and capture its outcome.
    pub async fn run<Fut>(
        self,
    ) -> Result<T, <J as Transform<<N as Transform<R>>::Output>>::Output>
    where
        Op: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, R>>,
        N: Transform<R>,
        J: Transform<<N as Transform<R>>::Output>,
        <J as Transform<<N as Transform<R>>::Output>>::Output: fmt::Debug,
        F: Transform<T, Output = T>,
    {
        let Self {
            operation,
            error_constructor,
            on_reject,
            on_fulfill,
            config,
            ..
        } = self;

        match operation().await {
            Ok(value) => Ok(on_fulfill.apply(value)),
            Err(raw) => {
                let error = on_reject.apply(error_constructor.apply(raw));
                if config.log_errors {
                    tracing::error!(error = ?error, "operation failed");
                }
                Err(error)
            }
        }
    }
}

impl<Op, T, R, N, J, F> fmt::Debug for Converter<Op, T, R, N, J, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
