//! The autocommit scheduler (spec.md §4.6): one shared map
//! `Endpoints → {wakeup_time, max_wakeup_time, pending_task}` coalescing
//! close-in-time writes into a single background `commit`. `commit()` is
//! the entry point every mutating HTTP handler calls after a successful
//! write; everything else here is the debounce/cancel/refire bookkeeping
//! spec.md §9's open question asks to make configurable rather than
//! hard-coded (`Config::autocommit_debounce_secs`/`autocommit_max_wait_secs`).

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::config::Config;
use crate::endpoint::Endpoints;
use crate::pool::database::Database;
use crate::pool::database_pool::DatabasePool;
use crate::pool::handler::DatabaseHandler;

struct PendingTask {
    wakeup_time: Instant,
    max_wakeup_time: Instant,
    handle: tokio::task::JoinHandle<()>,
}

/// Keyed by `Endpoints::hash()`, matching the `DatabasePool` queue key
/// convention (spec.md §3 "DatabasePool: a mapping Endpoints.hash →
/// DatabaseQueue").
pub struct AutocommitScheduler {
    pool: Arc<DatabasePool>,
    config: Config,
    tasks: Mutex<HashMap<u64, PendingTask>>,
}

impl AutocommitScheduler {
    pub fn new(pool: Arc<DatabasePool>, config: Config) -> Arc<Self> {
        Arc::new(AutocommitScheduler {
            pool,
            config,
            tasks: Mutex::new(HashMap::new()),
        })
    }

    /// Request a coalesced commit of `endpoints` (spec.md §4.6 "A call to
    /// `commit(database)` computes `wakeup = now + 3s`, clamped to
    /// `max_wakeup_time`"). `database` supplies the weak back-reference the
    /// fired task uses to skip work against an already-destroyed handle.
    pub fn commit(self: &Arc<Self>, endpoints: Endpoints, database: &Arc<Database>) {
        let key = endpoints.hash();
        let now = Instant::now();
        let debounce = Duration::from_secs(self.config.autocommit_debounce_secs);
        let max_wait = Duration::from_secs(self.config.autocommit_max_wait_secs);

        let mut tasks = self.tasks.lock();
        let max_wakeup_time = tasks.get(&key).map(|t| t.max_wakeup_time).unwrap_or(now + max_wait);
        let wakeup = (now + debounce).min(max_wakeup_time);

        if let Some(existing) = tasks.get(&key) {
            // "If a later pending task already matches the new wakeup, the
            // call returns" — same wakeup means the already-scheduled fire
            // covers this write too, nothing to do.
            if existing.wakeup_time == wakeup {
                return;
            }
            // "Otherwise the prior task is cancelled and a new one
            // scheduled."
            existing.handle.abort();
        }

        let scheduler = self.clone();
        let weak_db = Arc::downgrade(database);
        let task_endpoints = endpoints.clone();
        let delay = wakeup.saturating_duration_since(now);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.fire(key, task_endpoints, weak_db).await;
        });

        tasks.insert(key, PendingTask { wakeup_time: wakeup, max_wakeup_time, handle });
    }

    /// Cancel any pending task for `endpoints` without running it — used
    /// when an endpoint set is being torn down and a stale commit would
    /// just fail against a closed handle.
    pub fn cancel(&self, endpoints: &Endpoints) {
        if let Some(task) = self.tasks.lock().remove(&endpoints.hash()) {
            task.handle.abort();
        }
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.lock().len()
    }

    async fn fire(&self, key: u64, endpoints: Endpoints, weak_db: Weak<Database>) {
        self.tasks.lock().remove(&key);

        if weak_db.upgrade().is_none() {
            tracing::debug!(endpoint = %endpoints.to_string(), "autocommit skipped: database already destroyed");
            return;
        }

        let start = Instant::now();
        let timeout = Duration::from_millis(self.config.pool_checkout_timeout_ms);
        let outcome = DatabaseHandler::acquire(self.pool.clone(), endpoints.clone(), true, timeout)
            .and_then(|handler| handler.commit(&self.config));

        match outcome {
            Ok(()) => tracing::info!(
                endpoint = %endpoints.to_string(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "autocommit succeeded"
            ),
            Err(err) => tracing::warn!(
                endpoint = %endpoints.to_string(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                error = %err,
                "autocommit failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Endpoint;
    use tempfile::TempDir;

    fn scheduler_in(dir: &TempDir) -> (Arc<DatabasePool>, Arc<AutocommitScheduler>) {
        let mut config = Config::default();
        config.storage_path = dir.path().to_path_buf();
        config.autocommit_debounce_secs = 0;
        config.autocommit_max_wait_secs = 1;
        let pool = Arc::new(DatabasePool::new(config.clone()));
        let scheduler = AutocommitScheduler::new(pool.clone(), config);
        (pool, scheduler)
    }

    #[tokio::test]
    async fn fired_task_commits_and_resets_modified_flag() {
        let dir = TempDir::new().unwrap();
        let (pool, scheduler) = scheduler_in(&dir);
        let endpoints = Endpoints::single(Endpoint::local("twitter"));

        let db = pool.checkout(endpoints.clone(), true, Duration::from_secs(1)).unwrap();
        db.replace_document(crate::core::types::Document::new(crate::core::types::DocId::new(1))).unwrap();
        assert!(db.is_modified());

        let keep_alive = db.clone();
        scheduler.commit(endpoints.clone(), &db);
        pool.checkin(db);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!keep_alive.is_modified());
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test]
    async fn rescheduling_with_the_same_wakeup_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let (pool, scheduler) = scheduler_in(&dir);
        let endpoints = Endpoints::single(Endpoint::local("twitter"));
        let db = pool.checkout(endpoints.clone(), true, Duration::from_secs(1)).unwrap();

        scheduler.commit(endpoints.clone(), &db);
        let first_count = scheduler.pending_count();
        scheduler.commit(endpoints.clone(), &db);
        assert_eq!(scheduler.pending_count(), first_count);
        pool.checkin(db);
    }

    #[tokio::test]
    async fn destroyed_database_is_skipped_at_fire_time() {
        let dir = TempDir::new().unwrap();
        let (pool, scheduler) = scheduler_in(&dir);
        let endpoints = Endpoints::single(Endpoint::local("twitter"));

        {
            let db = pool.checkout(endpoints.clone(), true, Duration::from_secs(1)).unwrap();
            scheduler.commit(endpoints.clone(), &db);
            pool.checkin(db);
        }
        // No strong reference survives past this point (the pool's own
        // idle-queue handle still exists, but the weak check only cares
        // about the specific Arc passed to `commit`, matching spec.md's
        // "skip work if the database has been destroyed").

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(scheduler.pending_count(), 0);
    }
}
