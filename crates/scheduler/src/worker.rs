//! Background worker pool for blocking I/O.
//!
//! Network reads, file writes and page rasterization all block, so they run
//! here instead of on the UI context. Workers pull boxed tasks from a shared
//! channel, skip tasks whose token was cancelled while queued, and keep
//! running if a task panics.

use crate::CancellationToken;
use flume::{Receiver, RecvTimeoutError, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A unit of background work.
///
/// The task receives its cancellation token and should poll it between
/// blocking steps.
pub type Task = Box<dyn FnOnce(&CancellationToken) + Send + 'static>;

struct QueuedTask {
    token: CancellationToken,
    task: Task,
}

/// Configuration for the background pool.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    /// Number of worker threads to spawn.
    pub num_workers: usize,

    /// Maximum time a worker waits for a task before checking shutdown.
    /// Default: 100ms.
    pub poll_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(2)
    }
}

impl PoolConfig {
    /// Create a configuration with the given number of workers.
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers: num_workers.max(1),
            poll_interval: Duration::from_millis(100),
        }
    }

    /// Set the poll interval for workers.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Pool of named worker threads executing [`Task`]s in FIFO order.
///
/// Dropping the pool signals shutdown without waiting; call
/// [`BackgroundPool::shutdown`] to wait for the workers to exit.
pub struct BackgroundPool {
    sender: Option<Sender<QueuedTask>>,
    workers: Vec<Worker>,
    shutdown: Arc<AtomicBool>,
}

impl BackgroundPool {
    /// Spawn the worker threads.
    pub fn new(config: PoolConfig) -> std::io::Result<Self> {
        let (sender, receiver) = flume::unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(config.num_workers);

        for id in 0..config.num_workers.max(1) {
            workers.push(Worker::spawn(
                id,
                receiver.clone(),
                shutdown.clone(),
                config.poll_interval,
            )?);
        }

        log::debug!("started background pool with {} worker(s)", workers.len());

        Ok(Self {
            sender: Some(sender),
            workers,
            shutdown,
        })
    }

    /// Queue a task.
    ///
    /// Returns `false` if the pool is shutting down and the task was dropped.
    pub fn submit<F>(&self, token: CancellationToken, task: F) -> bool
    where
        F: FnOnce(&CancellationToken) + Send + 'static,
    {
        if self.is_shutting_down() {
            return false;
        }
        match &self.sender {
            Some(sender) => sender
                .send(QueuedTask {
                    token,
                    task: Box::new(task),
                })
                .is_ok(),
            None => false,
        }
    }

    /// Number of tasks waiting for a worker.
    pub fn pending(&self) -> usize {
        self.sender.as_ref().map_or(0, Sender::len)
    }

    /// Number of worker threads.
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Check if the pool is shutting down.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Signal shutdown and wait for every worker to finish its current task.
    ///
    /// Tasks still queued are dropped without running.
    pub fn shutdown(mut self) {
        self.signal_shutdown();
        for worker in std::mem::take(&mut self.workers) {
            worker.join();
        }
    }

    fn signal_shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.sender = None;
    }
}

impl Drop for BackgroundPool {
    fn drop(&mut self) {
        self.signal_shutdown();
    }
}

/// A single worker thread in the pool.
struct Worker {
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(
        id: usize,
        receiver: Receiver<QueuedTask>,
        shutdown: Arc<AtomicBool>,
        poll_interval: Duration,
    ) -> std::io::Result<Self> {
        let thread = thread::Builder::new()
            .name(format!("pdf-viewer-io-{}", id))
            .spawn(move || Self::run(receiver, shutdown, poll_interval))?;

        Ok(Self {
            thread: Some(thread),
        })
    }

    /// Main worker loop.
    fn run(receiver: Receiver<QueuedTask>, shutdown: Arc<AtomicBool>, poll_interval: Duration) {
        loop {
            if shutdown.load(Ordering::Acquire) {
                break;
            }

            match receiver.recv_timeout(poll_interval) {
                Ok(QueuedTask { token, task }) => {
                    if token.is_cancelled() {
                        continue;
                    }
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(&token)));
                    if outcome.is_err() {
                        log::warn!(
                            "background task panicked on {}",
                            thread::current().name().unwrap_or("worker")
                        );
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("background worker exited abnormally");
            }
        }
    }
}
