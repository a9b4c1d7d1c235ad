pub mod inverted;
pub mod posting;
pub mod index_writer;
pub mod index_reader;
pub mod lazy_index_reader;
pub mod hybrid_index_reader;
pub mod index_cache;
pub mod hybrid_index_cache;
mod skiplist;