//! # Main-Thread Executor
//!
//! A queue of callbacks that run only on the thread owning the context `C`
//! (for the engine: renderer, physics world and object registry). Any thread may
//! enqueue; only the owner drains.
//!
//! ## Cancellation
//! Callbacks are tagged with a `CancelToken`. `cancel()` removes every queued entry
//! carrying the token. An entry that was already captured by a running `drain()`
//! cannot be pulled out of that batch, so `cancel()` also invalidates it and the
//! drain skips it at the point of execution.
//!
//! ```rust
//! use voxel_streaming::engine_state::task_management::{CancelToken, MainThreadExecutor};
//!
//! let executor = MainThreadExecutor::<Vec<u32>>::new();
//! executor.enqueue(CancelToken::new(1), |log| { log.push(1); Ok(()) });
//! executor.enqueue(CancelToken::new(2), |log| { log.push(2); Ok(()) });
//! executor.cancel(CancelToken::new(1));
//!
//! let mut log = Vec::new();
//! executor.drain(&mut log).unwrap();
//! assert_eq!(log, vec![2]);
//! ```

use std::{
    collections::VecDeque,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;

use crate::engine_state::error::Result;

/// Identifies the callbacks that belong to one piece of work so they can be
/// canceled together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CancelToken(u64);

impl CancelToken {
    /// Creates a token from a unique id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The id this token was created from.
    pub const fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A callback that runs with exclusive access to the main-thread context.
pub type MainThreadCallback<C> = Box<dyn FnOnce(&mut C) -> Result<()> + Send>;

struct QueuedCallback<C> {
    token: Option<CancelToken>,
    canceled: Arc<AtomicBool>,
    callback: MainThreadCallback<C>,
}

struct ExecutorQueue<C> {
    queued: VecDeque<QueuedCallback<C>>,
    /// Tokens of the batch a `drain()` is currently executing.
    draining: Vec<(CancelToken, Arc<AtomicBool>)>,
}

/// Cancelable FIFO of callbacks executed on the owning thread.
///
/// Cloning the executor clones the handle; all clones feed the same queue.
pub struct MainThreadExecutor<C> {
    queue: Arc<Mutex<ExecutorQueue<C>>>,
}

impl<C: 'static> MainThreadExecutor<C> {
    /// Creates an empty executor.
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(ExecutorQueue {
                queued: VecDeque::new(),
                draining: Vec::new(),
            })),
        }
    }

    /// Queues `callback` under `token`. Callable from any thread.
    pub fn enqueue<F>(&self, token: CancelToken, callback: F)
    where
        F: FnOnce(&mut C) -> Result<()> + Send + 'static,
    {
        self.push(Some(token), Box::new(callback));
    }

    /// Queues a callback that no token can cancel.
    pub fn enqueue_untracked<F>(&self, callback: F)
    where
        F: FnOnce(&mut C) -> Result<()> + Send + 'static,
    {
        self.push(None, Box::new(callback));
    }

    fn push(&self, token: Option<CancelToken>, callback: MainThreadCallback<C>) {
        self.queue.lock().queued.push_back(QueuedCallback {
            token,
            canceled: Arc::new(AtomicBool::new(false)),
            callback,
        });
    }

    /// Cancels every callback carrying `token`.
    ///
    /// Queued entries are removed. Entries in a batch that is being drained right now
    /// are flagged and skipped when their turn comes. A callback that has already
    /// started runs to completion.
    ///
    /// # Returns
    /// The number of queued entries removed
    pub fn cancel(&self, token: CancelToken) -> usize {
        let mut queue = self.queue.lock();
        let before = queue.queued.len();
        queue.queued.retain(|entry| entry.token != Some(token));

        for (draining_token, canceled) in &queue.draining {
            if *draining_token == token {
                canceled.store(true, Ordering::Release);
            }
        }

        before - queue.queued.len()
    }

    /// Runs every callback queued before the call, in submission order.
    ///
    /// The queue is swapped out under the lock and the batch runs outside it, so a
    /// callback may enqueue more work; that work waits for the next `drain()`.
    ///
    /// # Errors
    /// The first callback error stops the batch. The callbacks that had not run yet
    /// are put back at the front of the queue and the error is returned.
    ///
    /// # Returns
    /// The number of callbacks executed
    pub fn drain(&self, context: &mut C) -> Result<usize> {
        let batch = {
            let mut queue = self.queue.lock();
            let batch = std::mem::take(&mut queue.queued);
            queue.draining = batch
                .iter()
                .filter_map(|entry| entry.token.map(|token| (token, entry.canceled.clone())))
                .collect();
            batch
        };

        let mut executed = 0;
        let mut remaining = batch.into_iter();
        let outcome = loop {
            let Some(entry) = remaining.next() else {
                break Ok(executed);
            };

            if entry.canceled.load(Ordering::Acquire) {
                continue;
            }

            if let Err(err) = (entry.callback)(context) {
                let mut queue = self.queue.lock();
                for unrun in remaining.rev() {
                    queue.queued.push_front(unrun);
                }
                break Err(err);
            }
            executed += 1;
        };

        self.queue.lock().draining.clear();
        outcome
    }

    /// Number of queued callbacks.
    pub fn len(&self) -> usize {
        self.queue.lock().queued.len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if a callback carrying `token` is queued.
    pub fn is_queued(&self, token: CancelToken) -> bool {
        self.queue
            .lock()
            .queued
            .iter()
            .any(|entry| entry.token == Some(token))
    }
}

impl<C: 'static> Default for MainThreadExecutor<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for MainThreadExecutor<C> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<C> fmt::Debug for MainThreadExecutor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.queue.lock();
        f.debug_struct("MainThreadExecutor")
            .field("queued", &queue.queued.len())
            .field("draining", &queue.draining.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::error::StreamingError;
    use std::thread;

    #[test]
    fn drains_in_submission_order() {
        let executor = MainThreadExecutor::<Vec<u32>>::new();
        for i in 0..5 {
            executor.enqueue(CancelToken::new(i), move |log| {
                log.push(i as u32);
                Ok(())
            });
        }

        let mut log = Vec::new();
        assert_eq!(executor.drain(&mut log).unwrap(), 5);
        assert_eq!(log, vec![0, 1, 2, 3, 4]);
        assert!(executor.is_empty());
    }

    #[test]
    fn cancel_removes_every_entry_with_the_token() {
        let executor = MainThreadExecutor::<Vec<u32>>::new();
        let token = CancelToken::new(7);
        executor.enqueue(token, |log| {
            log.push(1);
            Ok(())
        });
        executor.enqueue_untracked(|log| {
            log.push(2);
            Ok(())
        });
        executor.enqueue(token, |log| {
            log.push(3);
            Ok(())
        });

        assert!(executor.is_queued(token));
        assert_eq!(executor.cancel(token), 2);
        assert!(!executor.is_queued(token));

        let mut log = Vec::new();
        executor.drain(&mut log).unwrap();
        assert_eq!(log, vec![2]);
    }

    #[test]
    fn enqueue_during_drain_runs_on_the_next_drain() {
        let executor = MainThreadExecutor::<Vec<u32>>::new();
        let inner = executor.clone();
        executor.enqueue_untracked(move |log| {
            log.push(1);
            inner.enqueue_untracked(|log| {
                log.push(2);
                Ok(())
            });
            Ok(())
        });

        let mut log = Vec::new();
        assert_eq!(executor.drain(&mut log).unwrap(), 1);
        assert_eq!(log, vec![1]);
        assert_eq!(executor.len(), 1);

        assert_eq!(executor.drain(&mut log).unwrap(), 1);
        assert_eq!(log, vec![1, 2]);
    }

    #[test]
    fn cancel_during_drain_skips_captured_entry() {
        let executor = MainThreadExecutor::<Vec<u32>>::new();
        let doomed = CancelToken::new(2);
        let canceller = executor.clone();

        executor.enqueue(CancelToken::new(1), move |log| {
            log.push(1);
            canceller.cancel(doomed);
            Ok(())
        });
        executor.enqueue(doomed, |log| {
            log.push(2);
            Ok(())
        });
        executor.enqueue(CancelToken::new(3), |log| {
            log.push(3);
            Ok(())
        });

        let mut log = Vec::new();
        assert_eq!(executor.drain(&mut log).unwrap(), 2);
        assert_eq!(log, vec![1, 3]);
    }

    #[test]
    fn failing_callback_requeues_the_rest() {
        let executor = MainThreadExecutor::<Vec<u32>>::new();
        executor.enqueue_untracked(|log| {
            log.push(1);
            Ok(())
        });
        executor.enqueue_untracked(|_| Err(StreamingError::InvalidConfig("boom".to_string())));
        executor.enqueue_untracked(|log| {
            log.push(3);
            Ok(())
        });

        let mut log = Vec::new();
        assert!(executor.drain(&mut log).is_err());
        assert_eq!(log, vec![1]);
        assert_eq!(executor.len(), 1);

        assert_eq!(executor.drain(&mut log).unwrap(), 1);
        assert_eq!(log, vec![1, 3]);
    }

    #[test]
    fn enqueue_from_many_threads() {
        let executor = MainThreadExecutor::<Vec<u64>>::new();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let executor = executor.clone();
                thread::spawn(move || {
                    for i in 0..25 {
                        let value = t * 100 + i;
                        executor.enqueue(CancelToken::new(value), move |log| {
                            log.push(value);
                            Ok(())
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut log = Vec::new();
        assert_eq!(executor.drain(&mut log).unwrap(), 100);
        log.sort_unstable();
        log.dedup();
        assert_eq!(log.len(), 100);
    }
}
