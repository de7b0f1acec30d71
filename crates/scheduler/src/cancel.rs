//! Cancellation tokens and lifecycle-owned task scopes
//!
//! Tokens are checked cooperatively: a background task polls
//! `is_cancelled()` between units of work and stops early. A [`TaskScope`]
//! hands out one token per task so that the owner of the scope (a view) can
//! cancel everything it started in one call.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};

/// Cancellation token for cooperative task cancellation
///
/// Multiple tokens can share the same underlying cancellation state via Arc.
///
/// # Example
///
/// ```
/// use pdf_viewer_scheduler::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_token = token.clone();
///
/// token.cancel();
/// assert!(worker_token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new token in the non-cancelled state
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel this token
    ///
    /// All clones observe the cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns `true` once `cancel()` has been called on this token or any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of a task registered in a [`TaskScope`]
pub type TaskId = u64;

/// Registry of the outstanding tasks started by one owner
///
/// Cloning a scope yields another handle to the same registry, so a task can
/// carry a clone and call [`TaskScope::finish`] when it completes.
///
/// # Example
///
/// ```
/// use pdf_viewer_scheduler::TaskScope;
///
/// let scope = TaskScope::new();
/// let (_, download) = scope.register();
/// let (render_id, render) = scope.register();
///
/// scope.finish(render_id);
/// assert_eq!(scope.cancel_all(), 1);
///
/// assert!(download.is_cancelled());
/// assert!(!render.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TaskScope {
    next_id: Arc<AtomicU64>,
    tokens: Arc<Mutex<HashMap<TaskId, CancellationToken>>>,
}

impl TaskScope {
    /// Create an empty scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new task and return its id and cancellation token
    pub fn register(&self) -> (TaskId, CancellationToken) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();
        let mut tokens = self.tokens.lock().unwrap();
        tokens.insert(id, token.clone());
        (id, token)
    }

    /// Remove a completed task from the scope without cancelling it
    ///
    /// Returns `true` if the task was still registered.
    pub fn finish(&self, id: TaskId) -> bool {
        let mut tokens = self.tokens.lock().unwrap();
        tokens.remove(&id).is_some()
    }

    /// Guard that calls [`finish`](Self::finish) for `id` when dropped
    ///
    /// Move the guard into the task so the scope is released however the
    /// task ends: normally, by panic, or by being dropped unrun.
    pub fn finish_on_drop(&self, id: TaskId) -> TaskGuard {
        TaskGuard {
            scope: self.clone(),
            id,
        }
    }

    /// Cancel a single task by id
    pub fn cancel(&self, id: TaskId) -> bool {
        let mut tokens = self.tokens.lock().unwrap();
        match tokens.remove(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel and forget every outstanding task
    ///
    /// Returns the number of tasks cancelled.
    pub fn cancel_all(&self) -> usize {
        let mut tokens = self.tokens.lock().unwrap();
        let count = tokens.len();
        for (_, token) in tokens.drain() {
            token.cancel();
        }
        if count > 0 {
            log::debug!("cancelled {} outstanding task(s)", count);
        }
        count
    }

    /// Number of outstanding tasks
    pub fn len(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }

    /// Check if the scope has no outstanding tasks
    pub fn is_empty(&self) -> bool {
        self.tokens.lock().unwrap().is_empty()
    }
}

/// Releases a task from its [`TaskScope`] on drop
#[derive(Debug)]
pub struct TaskGuard {
    scope: TaskScope,
    id: TaskId,
}

impl TaskGuard {
    pub fn id(&self) -> TaskId {
        self.id
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.scope.finish(self.id);
    }
}
