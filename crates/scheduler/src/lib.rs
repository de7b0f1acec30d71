//! PDF Viewer Scheduler Library
//!
//! Background execution for the viewer: a small pool of blocking-I/O worker
//! threads plus cancellation tokens that tie every submitted task to the
//! lifetime of whoever submitted it.
//!
//! # Example
//!
//! ```
//! use pdf_viewer_scheduler::{BackgroundPool, PoolConfig, TaskScope};
//!
//! let pool = BackgroundPool::new(PoolConfig::new(1)).unwrap();
//! let scope = TaskScope::new();
//!
//! let (task_id, token) = scope.register();
//! let guard = scope.finish_on_drop(task_id);
//! pool.submit(token, move |token| {
//!     let _guard = guard;
//!     if !token.is_cancelled() {
//!         // ... blocking work ...
//!     }
//! });
//!
//! // Tearing down the owner cancels everything still outstanding.
//! scope.cancel_all();
//! pool.shutdown();
//! ```

mod cancel;
mod worker;

pub use cancel::{CancellationToken, TaskGuard, TaskId, TaskScope};
pub use worker::{BackgroundPool, PoolConfig, Task};
