//! Deferred execution with explicit cleanup.

use crate::cancel::CancellationToken;
use crate::dispatch::{exec_safe_async, SafeAsyncHandlers};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// What to do when a [`CleanupHandle`] is cleaned.
#[derive(Clone)]
pub struct OnClean {
    handler: Arc<dyn Fn() + Send + Sync>,
    clean_after: bool,
}

impl OnClean {
    /// Run `handler` on every clean, before the pending action is cancelled.
    pub fn new(handler: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
            clean_after: false,
        }
    }

    /// Run the handler after cancelling instead of before.
    pub fn clean_after(mut self, clean_after: bool) -> Self {
        self.clean_after = clean_after;
        self
    }
}

impl std::fmt::Debug for OnClean {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnClean")
            .field("clean_after", &self.clean_after)
            .finish_non_exhaustive()
    }
}

/// Cancels a deferred action scheduled by [`cleanable_exec`].
///
/// Dropping the handle leaves the action scheduled.
#[derive(Debug)]
pub struct CleanupHandle {
    token: CancellationToken,
    on_clean: Option<OnClean>,
}

impl CleanupHandle {
    /// Cancel the pending action and run the cleanup handler.
    ///
    /// Cancelling an action that already started or was already cancelled
    /// does nothing; the handler still runs once per call.
    pub fn clean(&self) {
        match &self.on_clean {
            Some(on_clean) if on_clean.clean_after => {
                self.token.cancel();
                (on_clean.handler)();
            }
            Some(on_clean) => {
                (on_clean.handler)();
                self.token.cancel();
            }
            None => self.token.cancel(),
        }
    }

    /// Whether `clean` has been called.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

fn schedule<Fut>(delay: Duration, action: Fut, on_clean: Option<OnClean>) -> CleanupHandle
where
    Fut: Future<Output = ()> + Send + 'static,
{
    let (token, mut watcher) = CancellationToken::new();

    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = watcher.cancelled() => {
                trace!("deferred action cancelled before it ran");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
        action.await;
    });

    CleanupHandle { token, on_clean }
}

/// Run `action` after `delay` on the current tokio runtime.
///
/// Must be called from within a tokio runtime.
pub fn cleanable_exec<A>(action: A, delay: Duration, on_clean: Option<OnClean>) -> CleanupHandle
where
    A: FnOnce() + Send + 'static,
{
    schedule(delay, async move { action() }, on_clean)
}

/// Run [`exec_safe_async`] after `delay`, cleaned up with `handlers.on_clean`.
pub fn cleanable_safe_async_exec<Op, Fut, T, E, F>(
    operation: Op,
    mut handlers: SafeAsyncHandlers<'static, T, E, F>,
    delay: Duration,
) -> CleanupHandle
where
    Op: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Option<T>, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    F: Send + 'static,
{
    let on_clean = handlers.take_on_clean();
    schedule(
        delay,
        async move {
            exec_safe_async(operation, handlers).await;
        },
        on_clean,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationWatcher;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, OnceLock};
    use tokio::time::sleep;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[tokio::test(start_paused = true)]
    async fn test_action_runs_after_delay() {
        let runs = counter();
        let _handle = cleanable_exec(
            {
                let runs = runs.clone();
                move || {
                    runs.fetch_add(1, Ordering::SeqCst);
                }
            },
            Duration::from_millis(100),
            None,
        );

        sleep(Duration::from_millis(99)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    /// Records whether the action was already cancelled when the handler ran.
    fn ordering_probe(
        clean_after: bool,
    ) -> (OnClean, Arc<OnceLock<CancellationWatcher>>, Arc<Mutex<Vec<bool>>>) {
        let slot: Arc<OnceLock<CancellationWatcher>> = Arc::new(OnceLock::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let on_clean = OnClean::new({
            let slot = slot.clone();
            let seen = seen.clone();
            move || {
                let cancelled = slot.get().map(|w| w.is_cancelled()).unwrap_or(false);
                seen.lock().unwrap().push(cancelled);
            }
        })
        .clean_after(clean_after);
        (on_clean, slot, seen)
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_after_cancels_before_handler() {
        let runs = counter();
        let (on_clean, slot, seen) = ordering_probe(true);

        let handle = cleanable_exec(
            {
                let runs = runs.clone();
                move || {
                    runs.fetch_add(1, Ordering::SeqCst);
                }
            },
            Duration::from_millis(100),
            Some(on_clean),
        );
        slot.set(handle.token.watcher()).unwrap();

        sleep(Duration::from_millis(50)).await;
        handle.clean();
        sleep(Duration::from_millis(200)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(*seen.lock().unwrap(), vec![true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_before_runs_handler_then_cancels() {
        let runs = counter();
        let (on_clean, slot, seen) = ordering_probe(false);

        let handle = cleanable_exec(
            {
                let runs = runs.clone();
                move || {
                    runs.fetch_add(1, Ordering::SeqCst);
                }
            },
            Duration::from_millis(100),
            Some(on_clean),
        );
        slot.set(handle.token.watcher()).unwrap();

        sleep(Duration::from_millis(50)).await;
        handle.clean();
        sleep(Duration::from_millis(200)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(*seen.lock().unwrap(), vec![false]);
        assert!(handle.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_runs_once_per_clean_even_after_action() {
        let runs = counter();
        let cleans = counter();

        let handle = cleanable_exec(
            {
                let runs = runs.clone();
                move || {
                    runs.fetch_add(1, Ordering::SeqCst);
                }
            },
            Duration::ZERO,
            Some(OnClean::new({
                let cleans = cleans.clone();
                move || {
                    cleans.fetch_add(1, Ordering::SeqCst);
                }
            })),
        );

        sleep(Duration::from_millis(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        handle.clean();
        handle.clean();
        assert_eq!(cleans.load(Ordering::SeqCst), 2);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_keeps_action_scheduled() {
        let runs = counter();
        drop(cleanable_exec(
            {
                let runs = runs.clone();
                move || {
                    runs.fetch_add(1, Ordering::SeqCst);
                }
            },
            Duration::from_millis(10),
            None,
        ));

        sleep(Duration::from_millis(20)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_safe_async_exec_runs_handlers_after_delay() {
        let fulfilled = counter();
        let handlers: SafeAsyncHandlers<'static, u32, String> = SafeAsyncHandlers::new({
            let fulfilled = fulfilled.clone();
            move |v| {
                fulfilled.fetch_add(v as usize, Ordering::SeqCst);
            }
        });

        let _handle = cleanable_safe_async_exec(
            || async { Ok(Some(3)) },
            handlers,
            Duration::from_millis(10),
        );

        sleep(Duration::from_millis(20)).await;
        assert_eq!(fulfilled.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_safe_async_exec_uses_handlers_on_clean() {
        let fulfilled = counter();
        let cleans = counter();
        let handlers: SafeAsyncHandlers<'static, u32, String> = SafeAsyncHandlers::new({
            let fulfilled = fulfilled.clone();
            move |_| {
                fulfilled.fetch_add(1, Ordering::SeqCst);
            }
        })
        .on_clean(OnClean::new({
            let cleans = cleans.clone();
            move || {
                cleans.fetch_add(1, Ordering::SeqCst);
            }
        }));

        let handle = cleanable_safe_async_exec(
            || async { Ok(Some(1)) },
            handlers,
            Duration::from_millis(100),
        );
        handle.clean();

        sleep(Duration::from_millis(200)).await;
        assert_eq!(fulfilled.load(Ordering::SeqCst), 0);
        assert_eq!(cleans.load(Ordering::SeqCst), 1);
    }
}
