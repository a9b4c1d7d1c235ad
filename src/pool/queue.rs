//! `DatabaseQueue` (spec.md §3/§4.1): a bounded queue of idle `Database`
//! handles for one `(Endpoints, writable)` key, plus the live-handle
//! accounting the pool's invariants are checked against.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::pool::database::Database;

/// `count == enqueued + checked_out` must hold at every instant (spec.md §8
/// property 1). `idle` holds the enqueued half; `checked_out` is tracked
/// only as a count since the checked-out handles themselves live with their
/// callers.
pub struct DatabaseQueue {
    pub writable: bool,
    idle: Mutex<VecDeque<Arc<Database>>>,
    condvar: Condvar,
    /// Total live handles: idle + checked out.
    count: Mutex<usize>,
    waiters: std::sync::atomic::AtomicUsize,
}

impl DatabaseQueue {
    pub fn new(writable: bool) -> Self {
        DatabaseQueue {
            writable,
            idle: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            count: Mutex::new(0),
            waiters: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn count(&self) -> usize {
        *self.count.lock()
    }

    pub fn idle_len(&self) -> usize {
        self.idle.lock().len()
    }

    pub fn waiters(&self) -> usize {
        self.waiters.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Pop an idle handle, if any, without touching `count` (a pop doesn't
    /// change the live-handle total, only which half holds it).
    pub fn try_pop(&self) -> Option<Arc<Database>> {
        self.idle.lock().pop_front()
    }

    /// Register a brand-new handle (one that didn't come from `try_pop`):
    /// bumps `count` since the pool now has one more live handle for this
    /// key, checked out immediately by the caller.
    pub fn account_new_handle(&self) {
        *self.count.lock() += 1;
    }

    /// Push a handle back onto the idle queue and wake one waiter. Writable
    /// queues must never hold more than one idle handle (spec.md §4.1
    /// invariant); debug-asserted rather than silently tolerated.
    pub fn push(&self, database: Arc<Database>) {
        let mut idle = self.idle.lock();
        debug_assert!(
            !self.writable || idle.is_empty(),
            "writable queue already has an idle handle enqueued"
        );
        idle.push_back(database);
        drop(idle);
        self.condvar.notify_one();
    }

    /// Drop a handle instead of returning it to the queue (spec.md §4.1:
    /// "If the database was marked unusable, decrement `count` and drop it
    /// instead").
    pub fn drop_handle(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
    }

    /// Block until a handle is pushed back or `timeout` elapses, bounded by
    /// the caller's request deadline (spec.md §4.1/§5). Returns `None` on
    /// timeout so the caller can surface `TimeOutError`.
    pub fn wait(&self, timeout: std::time::Duration) -> Option<Arc<Database>> {
        self.waiters.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let mut idle = self.idle.lock();
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let Some(db) = idle.pop_front() {
                self.waiters.fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
                return Some(db);
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                self.waiters.fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
                return None;
            }
            let remaining = deadline - now;
            let result = self.condvar.wait_for(&mut idle, remaining);
            if result.timed_out() && idle.is_empty() {
                self.waiters.fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
                return None;
            }
        }
    }

    /// Wake every waiter unconditionally (used by `DatabasePool::finish`).
    pub fn wake_all(&self) {
        self.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writable_queue_never_holds_two_idle_handles_in_debug() {
        let queue = DatabaseQueue::new(true);
        assert_eq!(queue.idle_len(), 0);
    }

    #[test]
    fn count_tracks_new_handles() {
        let queue = DatabaseQueue::new(false);
        queue.account_new_handle();
        queue.account_new_handle();
        assert_eq!(queue.count(), 2);
        queue.drop_handle();
        assert_eq!(queue.count(), 1);
    }
}
