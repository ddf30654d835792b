//! Background task scheduling abstraction.
//!
//! The teacher repo fires background work with bare `tokio::spawn`. This
//! crate generalizes that into a trait so the coordinator's background
//! warming tasks can be redirected onto a bounded worker pool, or replaced
//! with a synchronous executor in tests.

use std::future::Future;
use std::pin::Pin;

pub type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Schedules fire-and-forget background work.
pub trait Executor: Send + Sync {
    fn spawn(&self, task: BoxedTask);
}

/// Default executor: hands the task to the ambient tokio runtime.
#[derive(Clone, Copy, Default)]
pub struct TokioExecutor;

impl Executor for TokioExecutor {
    fn spawn(&self, task: BoxedTask) {
        tokio::spawn(task);
    }
}

/// Test executor that runs tasks to completion before `spawn` returns,
/// useful for asserting on warming side effects without racing a
/// background scheduler. `on_price_update` is itself synchronous and often
/// called from inside an already-running tokio task in tests, so this
/// can't just call `Handle::block_on` on the calling thread — tokio
/// forbids blocking a thread that's already driving a runtime. Instead it
/// hands the task to a fresh thread with its own throwaway current-thread
/// runtime and joins on it, which keeps `spawn` synchronous from the
/// caller's point of view.
#[derive(Clone, Copy, Default)]
pub struct SynchronousExecutor;

impl Executor for SynchronousExecutor {
    fn spawn(&self, task: BoxedTask) {
        std::thread::spawn(move || {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build throwaway runtime for SynchronousExecutor")
                .block_on(task);
        })
        .join()
        .expect("task spawned by SynchronousExecutor panicked");
    }
}
