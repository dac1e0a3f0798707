//! Cancellation signal shared between a timer and an in-flight call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Cancelling half of a signal.
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: watch::Sender<bool>,
}

impl CancellationToken {
    /// Create a new token together with its watcher.
    pub fn new() -> (Self, CancellationWatcher) {
        let (tx, rx) = watch::channel(false);
        let cancelled = Arc::new(AtomicBool::new(false));

        let token = Self {
            cancelled: cancelled.clone(),
            notify: tx,
        };

        let watcher = CancellationWatcher {
            cancelled,
            notify: rx,
        };

        (token, watcher)
    }

    /// Cancel everything observing this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.send_replace(true);
    }

    /// Check if cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Get another watcher for this token.
    pub fn watcher(&self) -> CancellationWatcher {
        CancellationWatcher {
            cancelled: self.cancelled.clone(),
            notify: self.notify.subscribe(),
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new().0
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Observing half of a signal. This is what a transport call receives.
#[derive(Clone)]
pub struct CancellationWatcher {
    cancelled: Arc<AtomicBool>,
    notify: watch::Receiver<bool>,
}

impl CancellationWatcher {
    /// Check if cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Wait for cancellation.
    ///
    /// Dropping every token without cancelling is not a cancellation: in that
    /// case this future never resolves.
    pub async fn cancelled(&mut self) {
        loop {
            if self.is_cancelled() || *self.notify.borrow_and_update() {
                return;
            }
            if self.notify.changed().await.is_err() {
                if self.is_cancelled() {
                    return;
                }
                std::future::pending::<()>().await;
            }
        }
    }
}

impl std::fmt::Debug for CancellationWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationWatcher")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, timeout, Duration};

    #[tokio::test]
    async fn test_cancellation_token() {
        let (token, watcher) = CancellationToken::new();

        assert!(!token.is_cancelled());
        assert!(!watcher.is_cancelled());

        token.cancel();

        assert!(token.is_cancelled());
        assert!(watcher.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancellation_wait() {
        let (token, mut watcher) = CancellationToken::new();

        let handle = tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        watcher.cancelled().await;
        assert!(watcher.is_cancelled());

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_already_cancelled_resolves_immediately() {
        let (token, mut watcher) = CancellationToken::new();
        token.cancel();

        timeout(Duration::from_millis(10), watcher.cancelled())
            .await
            .expect("cancelled() should resolve");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_token_is_not_cancellation() {
        let (token, mut watcher) = CancellationToken::new();
        drop(token);

        let waited = timeout(Duration::from_secs(60), watcher.cancelled()).await;
        assert!(waited.is_err());
        assert!(!watcher.is_cancelled());
    }

    #[tokio::test]
    async fn test_extra_watcher_sees_cancel() {
        let (token, _watcher) = CancellationToken::new();
        let mut second = token.watcher();

        token.cancel();
        second.cancelled().await;
        assert!(second.is_cancelled());
    }
}
