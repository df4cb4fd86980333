use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task;

/// Failure while running a job on the [`BlockingPool`].
#[derive(Debug, Error, Diagnostic)]
pub enum PoolError {
    #[error("blocking pool is closed")]
    #[diagnostic(code(flowloom::pool::closed))]
    Closed,

    #[error("blocking task failed to complete: {0}")]
    #[diagnostic(code(flowloom::pool::join))]
    Join(#[from] task::JoinError),
}

/// Bounded offload lane for synchronous SDK calls.
///
/// External-record handlers wrap blocking client libraries; running those on
/// the async runtime would stall unrelated runs. The pool caps how many such
/// calls are in flight at once: each job acquires a semaphore permit, runs on
/// `spawn_blocking`, and releases the permit when it returns.
#[derive(Clone)]
pub struct BlockingPool {
    permits: Arc<Semaphore>,
}

impl BlockingPool {
    pub fn new(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size.max(1))),
        }
    }

    /// Run `job` on the blocking thread pool, waiting for a permit first.
    pub async fn run<T, F>(&self, job: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;
        let handle = task::spawn_blocking(move || {
            let result = job();
            drop(permit);
            result
        });
        Ok(handle.await?)
    }

    /// Permits currently free. Mostly useful in tests.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
