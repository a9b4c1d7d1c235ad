pub mod adaptive;
pub mod buffer_pool;
pub mod incremental;
pub mod low_memory;
pub mod pool;
pub mod swap;
