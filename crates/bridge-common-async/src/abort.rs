//! Connection abort timer.
//!
//! An [`AbortTimer`] arms a cancellation signal that fires after a timeout
//! unless it is cleared first. Exactly one of "fire" and "clear" ever takes
//! effect.

use crate::cancel::{CancellationToken, CancellationWatcher};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CLEARED: u8 = 2;

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Create a cancellation signal that is cancelled after `timeout`.
///
/// Must be called from within a tokio runtime.
pub fn process_abort_controller(timeout: Duration) -> AbortTimer {
    AbortTimer::arm(timeout)
}

/// A pending abort appointment for one in-flight call.
pub struct AbortTimer {
    state: Arc<AtomicU8>,
    signal: CancellationWatcher,
    task: JoinHandle<()>,
    timeout: Duration,
}

impl AbortTimer {
    /// Arm a timer that cancels its signal once `timeout` elapses.
    pub fn arm(timeout: Duration) -> Self {
        let (token, signal) = CancellationToken::new();
        let state = Arc::new(AtomicU8::new(PENDING));

        let task = tokio::spawn({
            let state = state.clone();
            async move {
                tokio::time::sleep(timeout).await;
                if state
                    .compare_exchange(PENDING, FIRED, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    warn!(timeout_ms = millis(timeout), "connection timeout elapsed, aborting");
                    token.cancel();
                }
            }
        });

        Self {
            state,
            signal,
            task,
            timeout,
        }
    }

    /// The signal to hand to the call being guarded.
    pub fn signal(&self) -> CancellationWatcher {
        self.signal.clone()
    }

    /// Disarm the timer.
    ///
    /// Returns `true` only for the call that actually disarmed it. Clearing a
    /// timer that already fired or was already cleared does nothing.
    pub fn clear(&self) -> bool {
        let cleared = self
            .state
            .compare_exchange(PENDING, CLEARED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();

        if cleared {
            self.task.abort();
            debug!(timeout_ms = millis(self.timeout), "abort timer cleared");
        }
        cleared
    }

    /// Whether the timeout elapsed before the timer was cleared.
    pub fn has_fired(&self) -> bool {
        self.state.load(Ordering::SeqCst) == FIRED
    }

    /// Whether the timer is still armed.
    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::SeqCst) == PENDING
    }

    /// The configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Drop for AbortTimer {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for AbortTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state.load(Ordering::SeqCst) {
            PENDING => "pending",
            FIRED => "fired",
            _ => "cleared",
        };
        f.debug_struct("AbortTimer")
            .field("timeout", &self.timeout)
            .field("state", &state)
            .finish()
    }
}
