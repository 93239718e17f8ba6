//! Process-scoped backend context.
//!
//! Pixel work is CPU-bound, so it runs on a dedicated bounded `rayon` pool
//! rather than on the async executor. The pool is built once at startup from
//! `[backend]` config and torn down when the context is dropped. Async callers
//! hand a job over with [`BackendContext::run`] and await its result through a
//! `tokio` oneshot channel.

use crate::config::{BackendConfig, effective_threads};
use crate::error::ProcessError;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, error, info};

/// Bounded worker pool shared by every request.
pub struct BackendContext {
    pool: rayon::ThreadPool,
    threads: usize,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl BackendContext {
    /// Build the worker pool. Thread count follows [`effective_threads`].
    pub fn new(config: &BackendConfig) -> Result<Self, rayon::ThreadPoolBuildError> {
        let threads = effective_threads(config);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("image-worker-{index}"))
            .build()?;
        info!(threads, "backend worker pool started");
        Ok(Self { pool, threads })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run `job` on the pool and wait for it without blocking the executor.
    ///
    /// A panic inside `job` is caught and reported as `Internal`.
    pub async fn run<T, F>(&self, job: F) -> Result<T, ProcessError>
    where
        F: FnOnce() -> Result<T, ProcessError> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.pool.spawn(move || {
            let outcome = catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                error!(%message, "image job panicked");
                Err(ProcessError::Internal(message))
            });
            // the receiver is gone when the request was dropped
            let _ = tx.send(outcome);
        });
        rx.await
            .map_err(|_| ProcessError::Internal("image worker dropped the job".into()))?
    }

    /// Run `job` synchronously inside the pool (for the offline CLI path).
    pub fn install<T, F>(&self, job: F) -> T
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        self.pool.install(job)
    }
}

impl Drop for BackendContext {
    fn drop(&mut self) {
        debug!(threads = self.threads, "backend worker pool shutting down");
    }
}
