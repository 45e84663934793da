//! Task Pool
//!
//! Bounded fan-out for per-frame work. The pool owns a fixed number of rayon
//! workers; `workers == 0` degrades to inline execution on the calling
//! thread, which keeps single-threaded builds and deterministic tests on the
//! exact same code path.

use rayon::prelude::*;

use crate::errors::Result;

/// A bounded worker pool with a join-everything scatter primitive.
pub struct TaskPool {
    pool: Option<rayon::ThreadPool>,
    workers: usize,
}

impl TaskPool {
    /// Builds a pool with `workers` threads, or an inline executor for `0`.
    pub fn new(workers: usize) -> Result<Self> {
        let pool = if workers == 0 {
            None
        } else {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("janus-worker-{i}"))
                    .build()?,
            )
        };
        Ok(Self { pool, workers })
    }

    /// Configured worker count; `0` means inline execution.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `task` over every item and joins before returning.
    ///
    /// Output order matches input order regardless of completion order. If
    /// any task fails the whole scatter fails, after all workers have
    /// stopped; no output escapes a failed scatter.
    pub fn scatter<I, O, F>(&self, items: &[I], task: F) -> Result<Vec<O>>
    where
        I: Sync,
        O: Send,
        F: Fn(&I) -> Result<O> + Send + Sync,
    {
        match &self.pool {
            None => items.iter().map(task).collect(),
            // collect 是 join 屏障: 所有任务结束后才返回
            Some(pool) => pool.install(|| items.par_iter().map(task).collect()),
        }
    }
}
