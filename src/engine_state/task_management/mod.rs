//! # Task Management System
//!
//! This module provides the two places where control legally crosses a thread
//! boundary in the streaming engine:
//!
//! - `WorkerPool`: a fixed set of background worker threads consuming one shared
//!   task queue. Used for map bookkeeping decisions and terrain generation.
//! - `MainThreadExecutor`: a queue of cancelable callbacks that only ever run on
//!   the thread that owns the renderer, the physics world and the object registry.
//!
//! ## Task Lifecycle
//! 1. Tasks are published via `WorkerPool::submit()` (or `spawn()` for closures)
//! 2. Any idle worker picks the task up; idle workers block on the queue
//! 3. Work that must touch GPU or physics state is enqueued on the
//!    `MainThreadExecutor` together with a `CancelToken`
//! 4. The main loop calls `MainThreadExecutor::drain()` once per frame
//!
//! ## Failure Model
//! - A task returning `Err` or panicking is logged and discarded; its worker keeps
//!   running
//! - Shutting the pool down drops tasks that have not started yet
//!
//! ## Example Usage
//! ```rust
//! use voxel_streaming::engine_state::task_management::WorkerPool;
//!
//! let mut pool = WorkerPool::new(2).unwrap();
//! pool.spawn("hello", || {
//!     log::info!("running on a worker");
//!     Ok(())
//! });
//! pool.shutdown();
//! ```

pub mod main_thread_executor;
pub mod task;

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};
use parking_lot::{Condvar, Mutex};

use crate::engine_state::error::{Result, StreamingError, TaskError};
pub use main_thread_executor::{CancelToken, MainThreadExecutor};
use task::{FnTask, Task};

/// Messages carried by the shared worker queue.
enum WorkerMessage {
    Run(Box<dyn Task>),
    Stop,
}

/// Count of queued or running tasks, with a condition signalled when it drops to zero.
#[derive(Default)]
struct Outstanding {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Outstanding {
    fn increment(&self) {
        *self.count.lock() += 1;
    }

    fn decrement(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn get(&self) -> usize {
        *self.count.lock()
    }
}

/// A fixed-size pool of persistent worker threads.
///
/// All workers receive from one shared channel, so whichever worker is idle picks up
/// the next task. No ordering is guaranteed between tasks.
///
/// # Implementation Notes
/// - Idle workers block inside `recv()` and `wait_idle` blocks on a condition
///   variable; there is no polling
/// - Panic-safe: a panicking task is caught at the task boundary
/// - Drop-safe: dropping the pool shuts it down and joins every worker
pub struct WorkerPool {
    sender: Sender<WorkerMessage>,
    workers: Vec<JoinHandle<()>>,
    stopping: Arc<AtomicBool>,
    outstanding: Arc<Outstanding>,
}

impl WorkerPool {
    /// Creates a pool with `num_workers` threads named `chunk-worker-{index}`.
    ///
    /// # Errors
    /// `StreamingError::WorkerSpawn` if the OS refuses to create a thread. Workers
    /// started before the failure exit on their own once the pool is dropped.
    pub fn new(num_workers: usize) -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<WorkerMessage>();
        let stopping = Arc::new(AtomicBool::new(false));
        let outstanding = Arc::new(Outstanding::default());

        info!(
            "Starting {} chunk workers (available parallelism: {:?})",
            num_workers,
            thread::available_parallelism()
        );

        let mut workers = Vec::with_capacity(num_workers);
        for index in 0..num_workers {
            let receiver = receiver.clone();
            let stopping = stopping.clone();
            let outstanding = outstanding.clone();

            let worker = thread::Builder::new()
                .name(format!("chunk-worker-{}", index))
                .spawn(move || worker_loop(index, receiver, stopping, outstanding))
                .map_err(|source| StreamingError::WorkerSpawn { index, source })?;

            workers.push(worker);
        }

        Ok(Self {
            sender,
            workers,
            stopping,
            outstanding,
        })
    }

    /// Publishes a task for execution on any worker.
    ///
    /// # Returns
    /// - `true` if the task was queued
    /// - `false` if the pool is shutting down; the task is dropped unrun
    pub fn submit(&self, task: Box<dyn Task>) -> bool {
        if self.stopping.load(Ordering::Acquire) {
            warn!("Worker pool is stopping, dropping task '{}'", task.name());
            return false;
        }

        self.outstanding.increment();
        match self.sender.send(WorkerMessage::Run(task)) {
            Ok(()) => true,
            Err(_) => {
                self.outstanding.decrement();
                warn!("All chunk workers have exited, dropping task");
                false
            }
        }
    }

    /// Publishes a closure as a task.
    pub fn spawn<F>(&self, name: &'static str, work: F) -> bool
    where
        F: FnOnce() -> std::result::Result<(), TaskError> + Send + 'static,
    {
        self.submit(Box::new(FnTask::new(name, work)))
    }

    /// Number of worker threads still owned by the pool.
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Tasks that are queued or currently running.
    pub fn outstanding(&self) -> usize {
        self.outstanding.get()
    }

    /// Blocks the caller until no task is queued or running, or `timeout` elapses.
    ///
    /// # Returns
    /// `true` if the pool went idle in time
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = web_time::Instant::now() + timeout;
        let mut count = self.outstanding.count.lock();
        while *count > 0 {
            let remaining = deadline.saturating_duration_since(web_time::Instant::now());
            if remaining.is_zero() {
                return false;
            }
            self.outstanding.idle.wait_for(&mut count, remaining);
        }
        true
    }

    /// Stops every worker and joins it.
    ///
    /// Tasks still queued when the stop flag is raised are dropped without running.
    /// Calling this more than once is harmless.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        self.stopping.store(true, Ordering::Release);
        for _ in 0..self.workers.len() {
            // A failed send means the worker is already gone.
            let _ = self.sender.send(WorkerMessage::Stop);
        }

        let count = self.workers.len();
        for worker in self.workers.drain(..) {
            let name = worker.thread().name().unwrap_or("chunk-worker").to_string();
            if worker.join().is_err() {
                error!("Worker '{}' terminated abnormally", name);
            }
        }
        info!("Stopped {} chunk workers", count);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    index: usize,
    receiver: Receiver<WorkerMessage>,
    stopping: Arc<AtomicBool>,
    outstanding: Arc<Outstanding>,
) {
    while let Ok(message) = receiver.recv() {
        match message {
            WorkerMessage::Stop => break,
            WorkerMessage::Run(task) => {
                if stopping.load(Ordering::Acquire) {
                    debug!("Worker {} dropping '{}' during shutdown", index, task.name());
                } else {
                    run_task(index, task);
                }
                outstanding.decrement();
            }
        }
    }
    debug!("Worker {} exiting", index);
}

/// Runs one task, containing both error returns and panics.
fn run_task(index: usize, task: Box<dyn Task>) {
    let name = task.name().to_string();
    let outcome = panic::catch_unwind(AssertUnwindSafe(move || task.process()))
        .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(payload.as_ref()))));

    if let Err(err) = outcome {
        error!("Worker {}: task '{}' failed: {}", index, name, err);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn runs_every_submitted_task() {
        let pool = WorkerPool::new(3).unwrap();
        let counter = Arc::new(AtomicU32::new(0));

        for _ in 0..100 {
            let counter = counter.clone();
            assert!(pool.spawn("count", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }));
        }

        assert!(pool.wait_idle(WAIT));
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn failing_and_panicking_tasks_do_not_kill_workers() {
        let pool = WorkerPool::new(1).unwrap();
        let counter = Arc::new(AtomicU32::new(0));

        pool.spawn("fails", || Err(TaskError::Failed("expected".to_string())));
        pool.spawn("panics", || panic!("expected panic"));

        let after = counter.clone();
        pool.spawn("after", move || {
            after.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(pool.wait_idle(WAIT));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(pool.num_workers(), 1);
    }

    #[test]
    fn wait_idle_times_out_while_a_task_is_held() {
        let pool = WorkerPool::new(1).unwrap();
        let gate = Arc::new(std::sync::Barrier::new(2));
        let held = gate.clone();
        pool.spawn("held", move || {
            held.wait();
            Ok(())
        });

        assert!(!pool.wait_idle(Duration::from_millis(20)));
        assert_eq!(pool.outstanding(), 1);

        gate.wait();
        assert!(pool.wait_idle(WAIT));
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn shutdown_joins_and_rejects_new_work() {
        let mut pool = WorkerPool::new(2).unwrap();
        pool.spawn("noop", || Ok(()));
        pool.shutdown();
        assert_eq!(pool.num_workers(), 0);
        assert!(!pool.spawn("late", || Ok(())));
        pool.shutdown();
    }

    #[test]
    fn shutdown_with_queued_work_does_not_hang() {
        let mut pool = WorkerPool::new(1).unwrap();
        for _ in 0..50 {
            pool.spawn("slow", || {
                thread::sleep(Duration::from_millis(1));
                Ok(())
            });
        }
        pool.shutdown();
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn panic_payloads_are_readable() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "non-string panic payload");
    }
}
