pub mod index_writer;
pub mod data_writer;
pub mod batch;
pub mod parallel_writer;
