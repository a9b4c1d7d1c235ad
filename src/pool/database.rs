//! `Database` (spec.md §3): the pool's notion of an opened shard — layered
//! on top of this crate's own from-scratch index engine
//! (`crate::core::database::Database`, which plays the role spec.md §1
//! pins as the opaque "inverted index library"). One pool `Database` may
//! own several shard engines, one per member of its `Endpoints` key.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;

use crate::core::config::Config;
use crate::core::data::{Data, Locator};
use crate::core::database::Database as Engine;
use crate::core::error::{Error, Result};
use crate::core::types::{DocId, Document};
use crate::endpoint::Endpoints;
use crate::indexing::pipeline::{self, IndexingOptions};
use crate::indexing::types::IndexedDocument;
use crate::query::ast::Query;
use crate::schema::schema::SchemaWithAnalyzer;
use crate::schema::tree::Schema;
use crate::search::results::SearchResults;

/// Number of `reopen()` attempts `Database::open` and the handler's retry
/// loop allow before surfacing the error (spec.md §4.1 "calls `reopen` up
/// to 4 times on failure").
pub const MAX_REOPEN_ATTEMPTS: u32 = 4;

pub struct Database {
    /// Matches the owning queue's key; used to detect a handle returned to
    /// the wrong key (spec.md §4.1 invariant).
    pub hash: u64,
    pub endpoints: Endpoints,
    pub writable: bool,
    shards: RwLock<Vec<Arc<Engine>>>,
    modified: AtomicBool,
    reopen_time: RwLock<SystemTime>,
    reopen_revision: AtomicU64,
    incomplete: AtomicBool,
    closed: AtomicBool,
    /// Schema engine bound to this handle (spec.md §4.1 "layers
    /// transactional semantics, WAL emission, and schema binding over a
    /// checked-out `Database`"). Shared across every shard in `endpoints`:
    /// a multi-shard write applies the same field contracts to each.
    pub schema: Arc<Schema>,
}

impl Database {
    /// Open (or create) every shard in `endpoints`, retrying transient
    /// failures via `reopen` up to `MAX_REOPEN_ATTEMPTS` times (spec.md
    /// §4.1: "construct a new `Database` (which calls `reopen` up to 4
    /// times on failure)").
    pub fn open(endpoints: Endpoints, writable: bool, hash: u64, config: &Config) -> Result<Self> {
        let mut shards = Vec::with_capacity(endpoints.len().max(1));
        for endpoint in &endpoints {
            shards.push(Arc::new(open_shard_with_retries(endpoint, config)?));
        }
        let origin = endpoints.to_string();
        Ok(Database {
            hash,
            endpoints,
            writable,
            shards: RwLock::new(shards),
            modified: AtomicBool::new(false),
            reopen_time: RwLock::new(SystemTime::now()),
            reopen_revision: AtomicU64::new(0),
            incomplete: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            schema: Arc::new(Schema::new(origin)),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn is_incomplete(&self) -> bool {
        self.incomplete.load(Ordering::Acquire)
    }

    pub fn mark_modified(&self) {
        self.modified.store(true, Ordering::Release);
    }

    pub fn is_modified(&self) -> bool {
        self.modified.load(Ordering::Acquire)
    }

    pub fn reopen_revision(&self) -> u64 {
        self.reopen_revision.load(Ordering::Acquire)
    }

    pub fn reopen_time(&self) -> SystemTime {
        *self.reopen_time.read()
    }

    pub fn shards(&self) -> Vec<Arc<Engine>> {
        self.shards.read().clone()
    }

    fn shard_count(&self) -> usize {
        self.shards.read().len()
    }

    /// Reopen every shard in place. Hard corruption marks the handle
    /// `incomplete` rather than panicking — the pool drops such handles
    /// instead of returning them to the queue (spec.md §7 "Hard corruption
    /// closes the handle").
    pub fn reopen(&self, config: &Config) -> Result<()> {
        let mut rebuilt = Vec::with_capacity(self.shard_count());
        for endpoint in &self.endpoints {
            match open_shard_with_retries(endpoint, config) {
                Ok(engine) => rebuilt.push(Arc::new(engine)),
                Err(err) => {
                    self.incomplete.store(true, Ordering::Release);
                    return Err(err);
                }
            }
        }
        *self.shards.write() = rebuilt;
        self.reopen_revision.fetch_add(1, Ordering::AcqRel);
        *self.reopen_time.write() = SystemTime::now();
        Ok(())
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn commit(&self) -> Result<()> {
        for shard in self.shards.read().iter() {
            shard.commit()?;
        }
        self.modified.store(false, Ordering::Release);
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        for shard in self.shards.read().iter() {
            shard.flush()?;
        }
        Ok(())
    }

    pub fn replace_document(&self, doc: Document) -> Result<()> {
        let shards = self.shards.read();
        if shards.is_empty() {
            return Err(Error::database("no shards opened for this endpoint set"));
        }
        // Best-effort-with-report across shards (SPEC_FULL.md §D.4): each
        // shard gets the write independently; the first shard's error
        // doesn't stop the rest, but is still surfaced to the caller so the
        // HTTP layer can report per-shard status.
        let mut first_err = None;
        for shard in shards.iter() {
            if let Err(err) = shard.add_document(doc.clone()) {
                first_err.get_or_insert(err);
            }
        }
        drop(shards);
        self.modified.store(true, Ordering::Release);
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn delete_document(&self, doc_id: DocId) -> Result<()> {
        let mut first_err = None;
        for shard in self.shards.read().iter() {
            if let Err(err) = shard.delete_document(doc_id) {
                first_err.get_or_insert(err);
            }
        }
        self.modified.store(true, Ordering::Release);
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Run the schema-governed indexing pipeline (spec.md §4.3) over `obj`,
    /// then project the result onto every shard's storage engine. Schema
    /// mutations are only published (`commit`) once every shard accepted
    /// the write, so a rejected write never leaves a half-frozen field
    /// behind; any failure rolls the staged schema change back.
    pub fn index_document(&self, obj: &serde_json::Value, doc_id: DocId, options: &IndexingOptions) -> Result<IndexedDocument> {
        // Reconstruct the prior `Data` (a single inline locator holding the
        // last-stored body) so `pipeline::index`'s merge-over-old-locators
        // rule (spec.md §4.3 "Body storage") has something to preserve
        // content types against on a partial update.
        let old_data = self.get_document(doc_id)?.and_then(|doc| match doc.fields.get("_source") {
            Some(crate::core::types::FieldValue::Text(json)) => {
                let mut data = Data::new();
                data.put(Locator::inline(options.content_type.clone(), json.clone().into_bytes()));
                Some(data)
            }
            _ => None,
        });
        let indexed = match pipeline::index(&self.schema, obj, doc_id, old_data.as_ref(), options) {
            Ok(indexed) => indexed,
            Err(err) => {
                self.schema.rollback();
                return Err(err);
            }
        };

        let flattened = pipeline::flatten_to_document(obj, doc_id);
        let shards = self.shards.read();
        if shards.is_empty() {
            self.schema.rollback();
            return Err(Error::database("no shards opened for this endpoint set"));
        }
        let mut first_err = None;
        for shard in shards.iter() {
            if let Err(err) = shard.add_document(flattened.clone()) {
                first_err.get_or_insert(err);
            }
        }
        drop(shards);
        self.modified.store(true, Ordering::Release);

        match first_err {
            Some(err) => {
                self.schema.rollback();
                Err(err)
            }
            None => {
                self.schema.commit();
                Ok(indexed)
            }
        }
    }

    /// Fan out a point lookup across every shard (spec.md §4.5 "read
    /// document"); the first shard to have the id wins, matching a
    /// document living on exactly one shard under `uuid_partition`.
    pub fn get_document(&self, doc_id: DocId) -> Result<Option<Document>> {
        for shard in self.shards.read().iter() {
            if let Some(doc) = shard.get_document(doc_id)? {
                return Ok(Some(doc));
            }
        }
        Ok(None)
    }

    /// Fan out a compiled query across every shard and merge hits by score
    /// (spec.md §4.4 "Output"). This is the best-effort merge SPEC_FULL.md
    /// §D.4 picks for multi-shard operations generally: every shard is
    /// queried independently and the response reports a combined
    /// `total_hits` across shards.
    pub fn search(&self, query: &Query, offset: usize, limit: usize) -> Result<SearchResults> {
        let shards = self.shards.read();
        let mut merged = SearchResults {
            hits: Vec::new(),
            total_hits: 0,
            max_score: 0.0,
            took_ms: 0,
        };
        for shard in shards.iter() {
            let partial = shard.search_query(query, 0, offset + limit)?;
            merged.total_hits += partial.total_hits;
            merged.max_score = merged.max_score.max(partial.max_score);
            merged.hits.extend(partial.hits);
            merged.took_ms = merged.took_ms.max(partial.took_ms);
        }
        merged.hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        if offset > 0 {
            merged.hits = merged.hits.into_iter().skip(offset).collect();
        }
        merged.hits.truncate(limit);
        Ok(merged)
    }
}

fn open_shard_with_retries(endpoint: &crate::endpoint::Endpoint, config: &Config) -> Result<Engine> {
    let mut shard_config = config.clone();
    shard_config.storage_path = shard_config.storage_path.join(&endpoint.path);

    let mut last_err = None;
    for attempt in 0..MAX_REOPEN_ATTEMPTS {
        match Engine::open_with_schema(SchemaWithAnalyzer::new(), shard_config.clone()) {
            Ok(engine) => return Ok(engine),
            Err(err) => {
                tracing::warn!(attempt, endpoint = %endpoint.to_string(), error = %err, "shard open failed, retrying");
                last_err = Some(err);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| Error::database("failed to open shard")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Endpoint;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage_path = dir.path().to_path_buf();
        config
    }

    #[test]
    fn open_creates_one_shard_per_endpoint() {
        let dir = TempDir::new().unwrap();
        let endpoints = Endpoints::single(Endpoint::local("twitter"));
        let db = Database::open(endpoints, true, 42, &config_in(&dir)).unwrap();
        assert_eq!(db.shards().len(), 1);
        assert_eq!(db.hash, 42);
        assert!(!db.is_modified());
    }

    #[test]
    fn replace_document_marks_modified() {
        let dir = TempDir::new().unwrap();
        let endpoints = Endpoints::single(Endpoint::local("twitter"));
        let db = Database::open(endpoints, true, 1, &config_in(&dir)).unwrap();
        db.replace_document(Document::new(DocId::new(1))).unwrap();
        assert!(db.is_modified());
    }
}
