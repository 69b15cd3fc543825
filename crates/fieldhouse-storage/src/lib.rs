//! Fieldhouse Storage Layer
//!
//! This crate implements scanning, indexing, and random access for
//! fieldhouse binary field files: multi-gigabyte simulation outputs
//! holding thousands of timestamped grid snapshots back-to-back, optionally
//! gzip-compressed, with no table of contents.
//!
//! ## The Problem
//!
//! Reading snapshot N of such a file naively means decoding everything
//! before it. The storage layer instead:
//!
//! 1. **Indexes** the file once, recording each field's position without
//!    materializing bodies, in O(field size) memory
//! 2. **Reads** any field (or slice/list/predicate subset) through its
//!    indexed position instead of re-scanning the file
//! 3. **Extends** the index incrementally when the simulation appends
//!    more snapshots, resuming from the last known position
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────┐
//! │  FieldStore │  façade: lazy index lifecycle + read dispatch
//! └──────┬──────┘
//!        │ positions
//!        ▼
//! ┌─────────────┐     ┌──────────────┐
//! │ FieldIndex  │◀────│ FieldScanner │  boundary state machine
//! └─────────────┘     └──────┬───────┘
//!                            │ chunks
//!                            ▼
//!                     ┌──────────────┐
//!                     │ ChunkReader  │  fixed-size (gzip-aware) blocks
//!                     └──────────────┘
//! ```
//!
//! Record encode/decode itself lives in `fieldhouse-core`; this crate only
//! ever parses the 12-byte header during a scan.
//!
//! ## Main Components
//!
//! ### ChunkReader
//! Fixed-size decompressed chunks from a plain or gzipped file, with
//! chunk-boundary positioning for resumed scans and point reads.
//!
//! ### FieldScanner
//! The cross-chunk accumulation state machine: yields one `Position` per
//! field, latching a reproducible start checkpoint even when a field spans
//! many chunks (or a chunk holds many fields).
//!
//! ### FieldIndex
//! The ordered position list; full build or incremental extension from the
//! last known position.
//!
//! ### FieldStore
//! The public façade: compression auto-detection, geometry companion
//! discovery, metadata-driven index refresh, and the typed read surface
//! (`read_field`, `read_slice`, `read_ids`, `read_where`, `iter_fields`).
//!
//! ### FieldWriter
//! The append-only write path, plus whole-collection helpers that also
//! emit the geometry companion.
//!
//! ## Usage Example
//!
//! ```ignore
//! use fieldhouse_storage::{FieldStore, FieldSlice};
//!
//! let mut store = FieldStore::open("run7_conc1.bin.gz")?;
//!
//! // Index-only: all snapshot times
//! let times = store.times()?;
//!
//! // Random access
//! let last = store.read_field(times.len() - 1)?;
//!
//! // Subsets
//! let early = store.read_slice(&FieldSlice::range(0, 10))?;
//! let late = store.read_where(|f| f.time > 0.5)?;
//! ```

pub mod chunk;
pub mod config;
pub mod error;
pub mod geometry;
pub mod index;
pub mod scanner;
pub mod store;
pub mod writer;

pub use chunk::{is_gzip, ChunkReader};
pub use config::{ReadConfig, DEFAULT_CHUNK_SIZE};
pub use error::{Error, Result};
pub use geometry::{
    discover_geometry, find_geometry, read_geometry, write_geometry, Geometry, CM_TO_UM,
};
pub use index::FieldIndex;
pub use scanner::{read_leading_header, CodecCheckpoint, FieldScanner, Position};
pub use store::{FieldIter, FieldSlice, FieldStore};
pub use writer::{append_fields, write_fields, FieldWriter};
