//! Read Configuration
//!
//! This module defines configuration for opening and scanning field files.
//!
//! ## ReadConfig
//!
//! - **chunk_size**: bytes of decompressed data per scan chunk
//!   (default: 8 MiB). Smaller chunks lower peak memory; the scanner is
//!   correct for any chunk size, including chunks smaller than one field.
//! - **compressed**: `Some(bool)` forces the compression mode; `None`
//!   (default) auto-detects from the gzip magic bytes.
//!
//! ## Usage
//!
//! ```ignore
//! use fieldhouse_storage::{FieldStore, ReadConfig};
//!
//! // Tight-memory scan of a gzipped file
//! let config = ReadConfig {
//!     chunk_size: 1024 * 1024, // 1 MiB
//!     ..Default::default()
//! };
//! let store = FieldStore::open_with("run_conc1.bin.gz", config)?;
//! ```

use serde::{Deserialize, Serialize};

/// Default chunk size for scans: 8 MiB
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadConfig {
    /// Bytes of decompressed data per scan chunk (default: 8 MiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Force compression on/off; `None` auto-detects from magic bytes
    #[serde(default)]
    pub compressed: Option<bool>,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            compressed: None,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
