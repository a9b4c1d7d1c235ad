//! The database pool (spec.md §4.1): concurrent checkout/checkin registry
//! of writable and readable index handles, its queueing discipline,
//! reopen/retry semantics, and per-endpoint locking.

pub mod database;
pub mod database_pool;
pub mod handler;
pub mod queue;

pub use database::Database;
pub use database_pool::DatabasePool;
pub use handler::DatabaseHandler;
pub use queue::DatabaseQueue;
