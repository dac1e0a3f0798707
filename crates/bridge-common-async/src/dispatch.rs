//! Handler-based dispatch over `Result<Option<T>, E>`.

use crate::cleanable::OnClean;
use std::future::Future;

/// Handlers for [`exec_safe_async`].
///
/// Only `on_fulfilled` is required. A missing `on_none` or `on_error` makes
/// that branch a no-op, so errors are dropped unless `on_error` is set.
pub struct SafeAsyncHandlers<'a, T, E, F = ()> {
    on_fulfilled: Box<dyn FnOnce(T) + Send + 'a>,
    on_none: Option<Box<dyn FnOnce() + Send + 'a>>,
    on_error: Option<Box<dyn FnOnce(E) + Send + 'a>>,
    finally: Option<Box<dyn FnOnce() -> F + Send + 'a>>,
    on_clean: Option<OnClean>,
}

impl<'a, T, E, F> SafeAsyncHandlers<'a, T, E, F> {
    /// Create handlers with the required success callback.
    pub fn new(on_fulfilled: impl FnOnce(T) + Send + 'a) -> Self {
        Self {
            on_fulfilled: Box::new(on_fulfilled),
            on_none: None,
            on_error: None,
            finally: None,
            on_clean: None,
        }
    }

    /// Called when the operation succeeded without a value.
    pub fn on_none(mut self, on_none: impl FnOnce() + Send + 'a) -> Self {
        self.on_none = Some(Box::new(on_none));
        self
    }

    /// Called when the operation failed.
    pub fn on_error(mut self, on_error: impl FnOnce(E) + Send + 'a) -> Self {
        self.on_error = Some(Box::new(on_error));
        self
    }

    /// Called after whichever branch ran; its value is returned.
    pub fn finally(mut self, finally: impl FnOnce() -> F + Send + 'a) -> Self {
        self.finally = Some(Box::new(finally));
        self
    }

    /// Cleanup configuration used by `cleanable_safe_async_exec`.
    pub fn on_clean(mut self, on_clean: OnClean) -> Self {
        self.on_clean = Some(on_clean);
        self
    }

    pub(crate) fn take_on_clean(&mut self) -> Option<OnClean> {
        self.on_clean.take()
    }
}

impl<T, E, F> std::fmt::Debug for SafeAsyncHandlers<'_, T, E, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeAsyncHandlers")
            .field("on_none", &self.on_none.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("finally", &self.finally.is_some())
            .field("on_clean", &self.on_clean)
            .finish_non_exhaustive()
    }
}

/// Await `operation` and route its outcome to exactly one handler.
///
/// `Ok(Some(v))` goes to `on_fulfilled`, `Ok(None)` to `on_none` and
/// `Err(e)` to `on_error`. `finally` runs afterwards and its return value is
/// returned; without it the result is `None`. Panics raised by handlers are
/// not caught.
pub async fn exec_safe_async<'a, Op, Fut, T, E, F>(
    operation: Op,
    handlers: SafeAsyncHandlers<'a, T, E, F>,
) -> Option<F>
where
    Op: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let SafeAsyncHandlers {
        on_fulfilled,
        on_none,
        on_error,
        finally,
        ..
    } = handlers;

    match operation().await {
        Ok(Some(value)) => on_fulfilled(value),
        Ok(None) => {
            if let Some(on_none) = on_none {
                on_none();
            }
        }
        Err(error) => {
            if let Some(on_error) = on_error {
                on_error(error);
            }
        }
    }

    finally.map(|finally| finally())
}
