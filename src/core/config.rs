use std::path::PathBuf;

/// How generated document ids are rendered back to clients, mirroring the
/// `--uuid-repr` knob of the original server: `simple` strips dashes, `guid`
/// wraps in `{}`, `urn` prefixes `urn:uuid:`, `encoded` uses the compact
/// base59 form used internally for term prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UuidRepr {
    Simple,
    Guid,
    Urn,
    Encoded,
}

impl Default for UuidRepr {
    fn default() -> Self {
        UuidRepr::Simple
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage_path: PathBuf,
    pub memory_limit: usize,
    pub cache_size: usize,

    pub writer_batch_size: usize,
    pub writer_commit_interval_secs: u64,
    pub writer_max_segment_size: usize,

    pub max_readers: usize,

    /// Cluster name used for node discovery and the `X-Cluster` header;
    /// nodes with differing names never join the same endpoint resolution.
    pub cluster_name: String,
    pub uuid_repr: UuidRepr,
    /// Whether uuid fields get their last 4 bits reserved to shard documents
    /// belonging to the same logical UUID onto the same partition.
    pub uuid_partition: bool,

    /// Cap on concurrently open `Database` handles per `DatabasePool`;
    /// checkouts beyond this block, and then fail with `Error::unavailable`
    /// once `pool_checkout_timeout` elapses.
    pub database_pool_size: usize,
    pub pool_checkout_timeout_ms: u64,

    pub binary_port: u16,
    pub http_port: u16,
    pub http_worker_threads: usize,

    /// How long a write endpoint sits idle before the autocommit scheduler
    /// flushes it (§4.6). Resets on every write.
    pub autocommit_debounce_secs: u64,
    /// Hard ceiling on debounce resets: an endpoint under constant write
    /// pressure is still force-flushed after this many seconds.
    pub autocommit_max_wait_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_path: PathBuf::from("./data"),
            cache_size: 10 * 1024 * 1024,
            memory_limit: 100 * 1024 * 1024,

            writer_batch_size: 1000,
            writer_commit_interval_secs: 60,
            writer_max_segment_size: 50 * 1024 * 1024,
            max_readers: 10,

            cluster_name: "xapiand".to_string(),
            uuid_repr: UuidRepr::default(),
            uuid_partition: true,

            database_pool_size: 16,
            pool_checkout_timeout_ms: 10_000,

            binary_port: 9999,
            http_port: 8880,
            http_worker_threads: num_cpus::get(),

            autocommit_debounce_secs: 3,
            autocommit_max_wait_secs: 9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_autocommit_matches_design_constants() {
        let config = Config::default();
        assert_eq!(config.autocommit_debounce_secs, 3);
        assert_eq!(config.autocommit_max_wait_secs, 9);
        assert!(config.autocommit_debounce_secs < config.autocommit_max_wait_secs);
    }

    #[test]
    fn default_uuid_repr_is_simple() {
        assert_eq!(Config::default().uuid_repr, UuidRepr::Simple);
    }
}
