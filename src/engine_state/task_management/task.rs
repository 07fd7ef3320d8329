//! # Task System Core Traits
//!
//! This module defines the unit of work executed by the worker pool.
//!
//! ## Task Lifecycle
//! 1. A `Task` is created and handed to `WorkerPool::submit()`
//! 2. The task's `process()` method is called once, on some worker thread
//! 3. Anything the task produces for the main thread is handed to the
//!    `MainThreadExecutor`, never returned to the pool
//! 4. An `Err` (or a panic) from `process()` is logged at the task boundary and the
//!    worker continues with the next task
//!
//! ## Thread Safety
//! - `Task` must be `Send` to be transferred to a worker
//! - Tasks must own their inputs; shared state is reached through handles whose
//!   locks are held only briefly

use crate::engine_state::error::TaskError;

/// A unit of work that runs on a worker thread.
///
/// # Implementation Guidelines
/// - Must be `Send` to be transferred between threads
/// - Should be relatively coarse-grained to amortize scheduling overhead
/// - Must never touch GPU or physics handles; route that work through the
///   `MainThreadExecutor`
pub trait Task: Send {
    /// Performs the work, consuming the task.
    fn process(self: Box<Self>) -> Result<(), TaskError>;

    /// Name used when the task is mentioned in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A `Task` built from a closure.
pub struct FnTask<F> {
    name: &'static str,
    work: F,
}

impl<F> FnTask<F>
where
    F: FnOnce() -> Result<(), TaskError> + Send,
{
    /// Wraps `work` in a task that logs under `name`.
    pub fn new(name: &'static str, work: F) -> Self {
        Self { name, work }
    }
}

impl<F> Task for FnTask<F>
where
    F: FnOnce() -> Result<(), TaskError> + Send,
{
    fn process(self: Box<Self>) -> Result<(), TaskError> {
        (self.work)()
    }

    fn name(&self) -> &str {
        self.name
    }
}
