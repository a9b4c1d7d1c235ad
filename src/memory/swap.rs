use std::collections::HashMap;
use std::path::PathBuf;
use tempfile::TempDir;
use crate::core::error::{Error, ErrorKind, Result};

/// Swap manager for disk-based overflow
pub struct SwapManager {
    pub swap_dir: TempDir,
    pub swapped_pages: HashMap<PageId, PathBuf>,
    pub swap_threshold: usize,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct PageId(u64);

impl SwapManager {
    pub fn new() -> Self {
        SwapManager {
            swap_dir: TempDir::new().unwrap(),
            swapped_pages: HashMap::new(),
            swap_threshold: 1024 * 1024, // 1MB
        }
    }

    /// Swap page to disk
    pub fn swap_out(&mut self, page_id: PageId, data: Vec<u8>) -> Result<()> {
        let path = self.swap_dir.path().join(format!("{}.page", page_id.0));

        // Compress if beneficial
        let to_write = if data.len() > self.swap_threshold {
            lz4::block::compress(&data, None, false)?
        } else {
            data
        };

        std::fs::write(&path, to_write)?;
        self.swapped_pages.insert(page_id, path);

        Ok(())
    }

    /// Load page from disk
    pub fn swap_in(&mut self, page_id: PageId) -> Result<Vec<u8>> {
        if let Some(path) = self.swapped_pages.remove(&page_id) {
            let data = std::fs::read(&path)?;

            // Decompress if needed
            if data.len() > 4 && &data[0..4] == b"LZ4\0" {
                Ok(lz4::block::decompress(&data[4..], None)?)
            } else {
                Ok(data)
            }
        } else {
            Err(Error::new(ErrorKind::NotFound, "Page not in swap".to_string()))
        }
    }

    /// Swap cold data based on access patterns
    pub fn swap_cold_data(&mut self) -> Result<()> {
        // Implementation would identify cold pages and swap them
        Ok(())
    }
}