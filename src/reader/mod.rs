pub mod reader_pool;
pub mod lazy;
pub mod snapshot_reader;
