//! `DatabaseHandler` (spec.md §4.1): layers retry/reopen semantics and a
//! scoped (RAII) checkout/checkin guard over a pool-managed `Database`.
//! Every caller obtains a handle through `DatabaseHandler::acquire` so that
//! panics, early returns, and propagated errors always return the handle to
//! its queue (spec.md §4.1 "Scoped acquisition").

use std::sync::Arc;
use std::time::Duration;

use crate::core::error::Result;
use crate::core::types::{DocId, Document};
use crate::endpoint::Endpoints;
use crate::indexing::pipeline::IndexingOptions;
use crate::indexing::types::IndexedDocument;
use crate::pool::database::Database;
use crate::pool::database_pool::DatabasePool;
use crate::query::ast::Query;
use crate::search::results::SearchResults;

/// Every mutating operation retries up to this many total attempts,
/// reopening the handle between attempts (spec.md §4.1 "Retry policy").
pub const MAX_RETRY_ATTEMPTS: u32 = 4;

/// RAII guard around a checked-out `Database`: `Drop` always calls
/// `checkin`, regardless of how the scope was exited.
pub struct DatabaseHandler {
    pool: Arc<DatabasePool>,
    database: Option<Arc<Database>>,
}

impl DatabaseHandler {
    pub fn acquire(pool: Arc<DatabasePool>, endpoints: Endpoints, writable: bool, timeout: Duration) -> Result<Self> {
        let database = pool.checkout(endpoints, writable, timeout)?;
        Ok(DatabaseHandler {
            pool,
            database: Some(database),
        })
    }

    pub fn database(&self) -> &Arc<Database> {
        self.database.as_ref().expect("database taken from a live handler")
    }

    /// Run `op`, retrying up to `MAX_RETRY_ATTEMPTS` total attempts on a
    /// retriable error; each retry reopens the handle first (spec.md §4.1
    /// "On failure it calls `reopen()` and retries; after the final attempt
    /// it surfaces the error").
    fn with_retry<T>(&self, config: &crate::core::config::Config, mut op: impl FnMut(&Database) -> Result<T>) -> Result<T> {
        let database = self.database();
        let mut last_err = None;
        for attempt in 0..MAX_RETRY_ATTEMPTS {
            match op(database) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retriable() && attempt + 1 < MAX_RETRY_ATTEMPTS => {
                    tracing::warn!(attempt, error = %err, "retriable database error, reopening");
                    if let Err(reopen_err) = database.reopen(config) {
                        tracing::error!(error = %reopen_err, "reopen failed");
                    }
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.expect("loop always assigns an error before exhausting attempts"))
    }

    pub fn commit(&self, config: &crate::core::config::Config) -> Result<()> {
        self.with_retry(config, |db| db.commit())
    }

    pub fn replace_document(&self, config: &crate::core::config::Config, doc: Document) -> Result<()> {
        self.with_retry(config, |db| db.replace_document(doc.clone()))
    }

    pub fn delete_document(&self, config: &crate::core::config::Config, doc_id: DocId) -> Result<()> {
        self.with_retry(config, |db| db.delete_document(doc_id))
    }

    /// Index a document through the schema engine (spec.md §4.3), with the
    /// same retry/reopen discipline as the other mutating operations.
    pub fn index_document(
        &self,
        config: &crate::core::config::Config,
        obj: &serde_json::Value,
        doc_id: DocId,
        options: &IndexingOptions,
    ) -> Result<IndexedDocument> {
        self.with_retry(config, |db| db.index_document(obj, doc_id, options))
    }

    pub fn get_document(&self, doc_id: DocId) -> Result<Option<Document>> {
        self.database().get_document(doc_id)
    }

    pub fn search(&self, query: &Query, offset: usize, limit: usize) -> Result<SearchResults> {
        self.database().search(query, offset, limit)
    }
}

impl Drop for DatabaseHandler {
    fn drop(&mut self) {
        if let Some(database) = self.database.take() {
            self.pool.checkin(database);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::endpoint::Endpoint;
    use tempfile::TempDir;

    fn pool_in(dir: &TempDir) -> (Arc<DatabasePool>, Config) {
        let mut config = Config::default();
        config.storage_path = dir.path().to_path_buf();
        (Arc::new(DatabasePool::new(config.clone())), config)
    }

    #[test]
    fn handler_returns_database_to_queue_on_drop() {
        let dir = TempDir::new().unwrap();
        let (pool, _config) = pool_in(&dir);
        let endpoints = Endpoints::single(Endpoint::local("twitter"));

        {
            let _handler = DatabaseHandler::acquire(pool.clone(), endpoints.clone(), true, Duration::from_secs(1)).unwrap();
            assert_eq!(pool.queue_stats(&endpoints, true), Some((1, 0, 0)));
        }
        assert_eq!(pool.queue_stats(&endpoints, true), Some((1, 1, 0)));
    }

    #[test]
    fn commit_and_replace_document_succeed_through_handler() {
        let dir = TempDir::new().unwrap();
        let (pool, config) = pool_in(&dir);
        let endpoints = Endpoints::single(Endpoint::local("twitter"));

        let handler = DatabaseHandler::acquire(pool, endpoints, true, Duration::from_secs(1)).unwrap();
        handler.replace_document(&config, Document::new(DocId::new(1))).unwrap();
        handler.commit(&config).unwrap();
    }
}
