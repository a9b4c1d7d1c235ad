//! `DatabasePool` (spec.md §3/§4.1): `Endpoints.hash → DatabaseQueue`,
//! guarded by a single lock, plus the `checkout`/`checkin`/`finish`
//! operations that give callers at-most-one live writable `Database` per
//! key and multiplex readable ones.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::endpoint::Endpoints;
use crate::pool::database::Database;
use crate::pool::queue::DatabaseQueue;

/// Combine an `Endpoints` hash with the writable bit to select a queue
/// (spec.md §4.1 "Hash `endpoints` together with `writable`").
fn queue_key(endpoints: &Endpoints, writable: bool) -> u64 {
    endpoints.hash() ^ (writable as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

pub struct DatabasePool {
    config: Config,
    queues: Mutex<HashMap<u64, Arc<DatabaseQueue>>>,
    finished: AtomicBool,
    /// Backpressure cap on waiters per pool (spec.md §5 "Backpressure"):
    /// once reached, new checkouts fail fast instead of queueing.
    max_waiters: usize,
}

impl DatabasePool {
    pub fn new(config: Config) -> Self {
        DatabasePool {
            config,
            queues: Mutex::new(HashMap::new()),
            finished: AtomicBool::new(false),
            max_waiters: 64,
        }
    }

    fn queue_for(&self, endpoints: &Endpoints, writable: bool) -> Arc<DatabaseQueue> {
        let key = queue_key(endpoints, writable);
        self.queues
            .lock()
            .entry(key)
            .or_insert_with(|| Arc::new(DatabaseQueue::new(writable)))
            .clone()
    }

    /// Check out a `Database` handle for `endpoints` (spec.md §4.1).
    ///
    /// - pool finished ⇒ `DatabaseNotAvailable` (503).
    /// - idle handle available ⇒ popped immediately.
    /// - no idle handle and (`!writable` or queue empty) ⇒ a fresh handle is
    ///   opened (outside the lock) and its count registered.
    /// - writable queue busy ⇒ block on the queue's condition, bounded by
    ///   `timeout`; exceeding it is `TimeOutError` (408).
    pub fn checkout(&self, endpoints: Endpoints, writable: bool, timeout: Duration) -> Result<Arc<Database>> {
        if self.finished.load(Ordering::Acquire) {
            return Err(Error::unavailable("database pool has been shut down"));
        }

        let key = queue_key(&endpoints, writable);
        let queue = self.queue_for(&endpoints, writable);

        if let Some(db) = queue.try_pop() {
            return Ok(db);
        }

        let queue_empty = queue.count() == 0;
        if !writable || queue_empty {
            queue.account_new_handle();
            let opened = Database::open(endpoints, writable, key, &self.config);
            return match opened {
                Ok(db) => Ok(Arc::new(db)),
                Err(err) => {
                    queue.drop_handle();
                    Err(err)
                }
            };
        }

        if queue.waiters() >= self.max_waiters {
            return Err(Error::unavailable("writable endpoint checkout queue is full"));
        }

        queue
            .wait(timeout)
            .ok_or_else(|| Error::timeout("timed out waiting for writable database handle"))
    }

    /// Return a handle to its queue (spec.md §4.1). A handle marked
    /// unusable (closed or irrecoverably incomplete) is dropped instead,
    /// decrementing `count`.
    pub fn checkin(&self, database: Arc<Database>) {
        if self.finished.load(Ordering::Acquire) || database.is_closed() || database.is_incomplete() {
            if let Some(queue) = self.queues.lock().get(&database.hash).cloned() {
                queue.drop_handle();
            }
            return;
        }
        if let Some(queue) = self.queues.lock().get(&database.hash).cloned() {
            debug_assert_eq!(queue.writable, database.writable, "handle returned to mismatched queue");
            queue.push(database);
        }
    }

    /// Shut the pool down: refuse further checkouts, wake every waiter so
    /// they observe `finished` and surface `Unavailable` (spec.md §5
    /// "Cancellation").
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Release);
        for queue in self.queues.lock().values() {
            queue.wake_all();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Snapshot of `(count, idle, waiters)` for one key, for metrics/tests.
    pub fn queue_stats(&self, endpoints: &Endpoints, writable: bool) -> Option<(usize, usize, usize)> {
        let key = queue_key(endpoints, writable);
        self.queues
            .lock()
            .get(&key)
            .map(|q| (q.count(), q.idle_len(), q.waiters()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Endpoint;
    use tempfile::TempDir;

    fn pool_in(dir: &TempDir) -> DatabasePool {
        let mut config = Config::default();
        config.storage_path = dir.path().to_path_buf();
        DatabasePool::new(config)
    }

    #[test]
    fn checkout_then_checkin_round_trips_through_idle_queue() {
        let dir = TempDir::new().unwrap();
        let pool = pool_in(&dir);
        let endpoints = Endpoints::single(Endpoint::local("twitter"));

        let db = pool.checkout(endpoints.clone(), true, Duration::from_secs(1)).unwrap();
        assert_eq!(pool.queue_stats(&endpoints, true), Some((1, 0, 0)));
        pool.checkin(db);
        assert_eq!(pool.queue_stats(&endpoints, true), Some((1, 1, 0)));
    }

    #[test]
    fn finished_pool_refuses_new_checkouts() {
        let dir = TempDir::new().unwrap();
        let pool = pool_in(&dir);
        pool.finish();
        let endpoints = Endpoints::single(Endpoint::local("twitter"));
        let err = pool.checkout(endpoints, true, Duration::from_millis(10)).unwrap_err();
        assert_eq!(err.http_status(), 503);
    }

    #[test]
    fn second_writable_checkout_blocks_until_checkin() {
        let dir = TempDir::new().unwrap();
        let pool = Arc::new(pool_in(&dir));
        let endpoints = Endpoints::single(Endpoint::local("twitter"));

        let first = pool.checkout(endpoints.clone(), true, Duration::from_secs(1)).unwrap();

        let pool2 = pool.clone();
        let endpoints2 = endpoints.clone();
        let handle = std::thread::spawn(move || {
            pool2.checkout(endpoints2, true, Duration::from_secs(2))
        });

        std::thread::sleep(Duration::from_millis(50));
        pool.checkin(first);

        let second = handle.join().unwrap().unwrap();
        assert_eq!(second.hash, queue_key(&endpoints, true));
    }

    #[test]
    fn writable_checkout_times_out_when_busy() {
        let dir = TempDir::new().unwrap();
        let pool = pool_in(&dir);
        let endpoints = Endpoints::single(Endpoint::local("twitter"));

        let _first = pool.checkout(endpoints.clone(), true, Duration::from_secs(1)).unwrap();
        let err = pool.checkout(endpoints, true, Duration::from_millis(30)).unwrap_err();
        assert_eq!(err.http_status(), 408);
    }
}
