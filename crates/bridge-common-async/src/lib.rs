//! Async result utilities.
//!
//! Helpers that run an asynchronous operation and always produce a value:
//! a `Result` from [`convert_future_to_result`], handler dispatch through
//! [`exec_safe_async`], deferred work that can be cleaned up through
//! [`cleanable_exec`], and the connection abort timer created by
//! [`process_abort_controller`].

pub mod abort;
pub mod cancel;
pub mod cleanable;
pub mod convert;
pub mod dispatch;

pub use abort::{process_abort_controller, AbortTimer};
pub use cancel::{CancellationToken, CancellationWatcher};
pub use cleanable::{cleanable_exec, cleanable_safe_async_exec, CleanupHandle, OnClean};
pub use convert::{convert_future_to_result, Converter, ConverterConfig, Identity, Transform};
pub use dispatch::{exec_safe_async, SafeAsyncHandlers};
