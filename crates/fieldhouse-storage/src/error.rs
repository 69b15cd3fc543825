//! Storage Error Types
//!
//! This module defines all error types that can occur during scanning,
//! indexing, and file access.
//!
//! ## Error Categories
//!
//! ### I/O and Decode Errors
//! - `Io`: file system or decompression failure (gzip errors surface as
//!   `std::io::Error` from the decoder)
//! - `Core`: structural record errors from `fieldhouse-core`
//!
//! ### Lookup Errors
//! - `FieldNotFound`: field id beyond the end of the index
//! - `InvalidSlice`: a slice selector with step 0
//!
//! ### Geometry Errors
//! - `GeometryNotFound`: no companion geometry file next to the data file
//! - `AmbiguousGeometry`: more than one candidate geometry file
//!
//! ### Consistency Errors
//! - `StaleIndex`: a resume offset points past the end of the file, meaning
//!   the file shrank or was replaced after the index was built
//!
//! ## Usage
//!
//! All storage operations return `Result<T>` aliased to `Result<T, Error>`,
//! so errors propagate cleanly with `?`. Nothing here is retried
//! internally; the geometry errors are the only ones the `FieldStore`
//! façade recovers from (it downgrades them to a warning and continues
//! without shape/spacing).

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] fieldhouse_core::Error),

    #[error("Field not found: {0}")]
    FieldNotFound(usize),

    #[error("Invalid slice: step must be non-zero")]
    InvalidSlice,

    #[error("Geometry file not found for {0}")]
    GeometryNotFound(PathBuf),

    #[error("Multiple geometry files found for {path}: {candidates:?}")]
    AmbiguousGeometry {
        path: PathBuf,
        candidates: Vec<PathBuf>,
    },

    #[error("Stale index: resume offset {offset} is beyond the end of the file")]
    StaleIndex { offset: u64 },
}
