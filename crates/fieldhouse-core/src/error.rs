//! Error Types for Fieldhouse Core
//!
//! This module defines all error types that can occur while encoding or
//! decoding field records.
//!
//! ## Error Categories
//!
//! ### Structural Errors
//! - `InvalidHeader`: the header's self-reported size contradicts its body length
//! - `LengthMismatch`: header and footer disagree about the body length
//! - `TruncatedField`: fewer bytes than the header promised
//!
//! ### Shape/Slicing Errors
//! - `ShapeMismatch`: the declared grid shape cannot hold the decoded body
//! - `MissingShape`: a slice was requested from a field with no grid shape
//! - `InvalidPlane`: unrecognized plane token (valid: xy, yx, xz, zx, yz, zy)
//! - `SliceOutOfRange`: slice index beyond the grid extent along that axis
//!
//! ## Usage
//! All functions in this crate return `Result<T>` which is aliased to
//! `Result<T, Error>`. This allows using the `?` operator for error
//! propagation. Structural errors are fatal for the field being decoded and
//! are never retried internally.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid header: size {size} inconsistent with body length {length}")]
    InvalidHeader { size: i32, length: i32 },

    #[error("Length mismatch: header declares {header}, footer declares {footer}")]
    LengthMismatch { header: i32, footer: i32 },

    #[error("Truncated field: needed {needed} bytes, got {got}")]
    TruncatedField { needed: usize, got: usize },

    #[error("Shape mismatch: {cells} cells cannot hold {elements} elements")]
    ShapeMismatch { elements: usize, cells: usize },

    #[error("Field has no grid shape")]
    MissingShape,

    #[error("Invalid plane: {0}")]
    InvalidPlane(String),

    #[error("Slice index {slice_id} out of range (axis extent {extent})")]
    SliceOutOfRange { slice_id: usize, extent: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
