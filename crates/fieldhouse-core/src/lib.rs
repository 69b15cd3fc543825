//! Fieldhouse Core
//!
//! Core types and wire-format primitives shared by the fieldhouse crates.
//!
//! A fieldhouse file is a sequence of field records written back-to-back,
//! each record one timestamped snapshot of a simulation grid, with no
//! table of contents. This crate owns everything about a *single* record:
//!
//! - `Header`/`Footer`: the fixed little-endian framing and its structural
//!   invariants
//! - `Field`: the decoded snapshot, including the float→int downcast and
//!   plane slicing
//! - `GridShape`/`GridSpacing`/`Plane`: geometry value types
//!
//! Scanning, indexing, and file access over whole files live in
//! `fieldhouse-storage`.

pub mod codec;
pub mod error;
pub mod field;
pub mod grid;

pub use codec::{field_size, round_time, Footer, Header, FOOTER_SIZE, HEADER_SIZE};
pub use error::{Error, Result};
pub use field::{Field, FieldData, SliceView};
pub use grid::{GridShape, GridSpacing, Plane};
