//! Bounded, cancelable execution of blocking work.
//!
//! Each hop's listener read runs on the blocking thread pool while the engine
//! sends the probe. The engine then joins it with an upper bound so a read
//! that ignores its deadline can never stall the trace.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How a bounded task ended
#[derive(Debug)]
pub enum TaskOutcome<T> {
    /// The work finished and produced a value
    Completed(T),
    /// The work panicked
    Panicked(String),
    /// The bound elapsed first
    TimedOut,
    /// The cancellation token fired first
    Cancelled,
}

/// Blocking work started on its own worker, joined later with a bound
pub struct BoundedTask<T> {
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> BoundedTask<T> {
    /// Start `work` on the blocking thread pool
    pub fn spawn<F>(work: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self {
            handle: tokio::task::spawn_blocking(work),
        }
    }

    /// Wait for the work, at most `limit`, returning early on cancellation.
    ///
    /// Blocking work cannot be interrupted: on timeout or cancellation the
    /// worker is detached and finishes on its own.
    pub async fn join(self, limit: Duration, cancel: &CancellationToken) -> TaskOutcome<T> {
        tokio::select! {
            _ = cancel.cancelled() => TaskOutcome::Cancelled,
            joined = tokio::time::timeout(limit, self.handle) => match joined {
                Ok(Ok(value)) => TaskOutcome::Completed(value),
                Ok(Err(e)) => TaskOutcome::Panicked(e.to_string()),
                Err(_) => TaskOutcome::TimedOut,
            },
        }
    }
}
