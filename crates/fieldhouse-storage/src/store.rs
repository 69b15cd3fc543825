//! Field Store - The File Façade
//!
//! This module implements `FieldStore`, the top-level entry point for
//! reading field files. It owns the lazy index lifecycle and dispatches
//! every read through the index.
//!
//! ## Index Lifecycle
//!
//! ```text
//! open()            stat on every access
//!   │                     │
//!   ▼                     ▼
//! [no index] ──build──▶ [indexed] ──creation time changed or file shrank──▶ full rebuild
//!                           │
//!                           └──mtime changed or file grew──▶ incremental extension
//! ```
//!
//! The index is built on first use and refreshed by comparing file
//! metadata against the values captured at the last build: a changed
//! creation time (or a shrunken file) means a different underlying file
//! and forces a full rescan; a newer mtime or a grown file means appended
//! snapshots and only the new tail is scanned. File length supplements
//! mtime because mtime granularity can be coarser than an append.
//!
//! ## Read Surface
//!
//! - `read_field(id)`: one field, via its indexed position
//! - `read_slice(&FieldSlice)`: list-slicing semantics (negative
//!   indices, steps, clipping)
//! - `read_ids(&[ids])`: exactly those fields, in the caller's order
//! - `read_where(predicate)`: decode everything lazily, keep matches
//! - `read_all()` / `iter_fields()`: every field in disk order
//! - `times()`: timestamps only, no body decode
//!
//! Sequential paths (`read_all`, `read_where`, `iter_fields`) stream the
//! file in one pass. Random access seeks directly in plain files; in
//! gzipped files it restores the position's codec checkpoint by replaying
//! the stream up to the field, so point reads cost O(offset) there.
//!
//! ## Geometry
//!
//! On open, the store looks for the companion geometry file. A missing or
//! ambiguous companion is downgraded to a warning; indexing and raw reads
//! work without it, only shaped reads lose shape/spacing. Spacing is
//! converted from the file's cm to µm.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use fieldhouse_core::{Field, GridShape, GridSpacing};

use crate::chunk::{is_gzip, ChunkReader};
use crate::config::ReadConfig;
use crate::error::{Error, Result};
use crate::geometry::{discover_geometry, read_geometry, Geometry, CM_TO_UM};
use crate::index::FieldIndex;
use crate::scanner::Position;

/// A start/stop/step slice selector over field ids
///
/// `None` bounds take the whole extent in the step's direction; negative
/// bounds count from the end; out-of-range bounds clip. A zero step is
/// `Error::InvalidSlice`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSlice {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: i64,
}

impl Default for FieldSlice {
    fn default() -> Self {
        Self {
            start: None,
            stop: None,
            step: 1,
        }
    }
}

impl FieldSlice {
    pub fn new(start: Option<i64>, stop: Option<i64>, step: i64) -> Self {
        Self { start, stop, step }
    }

    /// `start..stop` with step 1
    pub fn range(start: i64, stop: i64) -> Self {
        Self::new(Some(start), Some(stop), 1)
    }

    /// Resolve to concrete ids against an index of `len` fields
    pub fn resolve(&self, len: usize) -> Result<Vec<usize>> {
        if self.step == 0 {
            return Err(Error::InvalidSlice);
        }

        let len = len as i64;
        let step = self.step;

        let clamp = |value: i64| -> i64 {
            if value < 0 {
                let value = value + len;
                if value < 0 {
                    if step < 0 {
                        -1
                    } else {
                        0
                    }
                } else {
                    value
                }
            } else if value >= len {
                if step < 0 {
                    len - 1
                } else {
                    len
                }
            } else {
                value
            }
        };

        let (default_start, default_stop) = if step > 0 { (0, len) } else { (len - 1, -1) };
        let start = self.start.map(clamp).unwrap_or(default_start);
        let stop = self.stop.map(clamp).unwrap_or(default_stop);

        let mut ids = Vec::new();
        let mut i = start;
        while (step > 0 && i < stop) || (step < 0 && i > stop) {
            ids.push(i as usize);
            i += step;
        }
        Ok(ids)
    }
}

/// Reads a field file through a lazily maintained position index
pub struct FieldStore {
    path: PathBuf,
    chunk_size: usize,
    compressed: bool,
    geometry: Option<Geometry>,

    index: FieldIndex,
    indexed: bool,
    created: Option<SystemTime>,
    modified: Option<SystemTime>,
    indexed_len: u64,
}

impl FieldStore {
    /// Open a field file with default configuration
    ///
    /// Fails if the file does not exist. A missing geometry companion is
    /// only a warning.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, ReadConfig::default())
    }

    /// Open a field file with explicit configuration
    pub fn open_with(path: impl AsRef<Path>, config: ReadConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("file not found: {}", path.display()),
            )
            .into());
        }

        let compressed = match config.compressed {
            Some(compressed) => compressed,
            None => is_gzip(&path)?,
        };

        let geometry = match discover_geometry(&path) {
            Ok(geometry) => Some(Geometry {
                shape: geometry.shape,
                spacing: geometry.spacing.scaled(CM_TO_UM),
            }),
            Err(e) if matches!(e, Error::GeometryNotFound(_) | Error::AmbiguousGeometry { .. }) => {
                warn!(path = %path.display(), error = %e, "no usable geometry file; shape and spacing unavailable");
                None
            }
            Err(e) => return Err(e),
        };

        let store = Self {
            path,
            chunk_size: config.chunk_size,
            compressed,
            geometry,
            index: FieldIndex::default(),
            indexed: false,
            created: None,
            modified: None,
            indexed_len: 0,
        };
        if store.geometry.is_some() {
            store.log_geometry();
        }

        Ok(store)
    }

    /// Whether the underlying file is gzip-compressed
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ------------------------------------------------------------------
    // Geometry
    // ------------------------------------------------------------------

    /// Grid shape, if geometry is known
    pub fn shape(&self) -> Option<GridShape> {
        self.geometry.map(|g| g.shape)
    }

    /// Grid spacing in µm, if geometry is known
    pub fn spacing(&self) -> Option<GridSpacing> {
        self.geometry.map(|g| g.spacing)
    }

    /// Override the geometry (shape plus spacing in µm)
    pub fn set_geometry(&mut self, shape: GridShape, spacing: GridSpacing) {
        self.geometry = Some(Geometry { shape, spacing });
        self.log_geometry();
    }

    /// Read geometry from an explicit file instead of the discovered one
    ///
    /// Converts the file's cm spacing to µm, like discovery does.
    pub fn read_geometry_from(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let geometry = read_geometry(path.as_ref())?;
        self.set_geometry(geometry.shape, geometry.spacing.scaled(CM_TO_UM));
        Ok(())
    }

    /// Log a summary of the current geometry
    pub fn log_geometry(&self) {
        match &self.geometry {
            None => info!("geometry: none"),
            Some(geometry) => {
                let shape = geometry.shape;
                let spacing = geometry.spacing;
                info!(
                    dimensions = shape.dimensions(),
                    cells = %shape,
                    spacing_um = %spacing,
                    size_um = %GridSpacing::new(
                        shape.nx as f32 * spacing.dx,
                        shape.ny as f32 * spacing.dy,
                        shape.nz as f32 * spacing.dz,
                    ),
                    "geometry"
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // Index lifecycle
    // ------------------------------------------------------------------

    /// The current index, built or refreshed as needed
    pub fn index(&mut self) -> Result<&FieldIndex> {
        self.refresh_index()?;
        Ok(&self.index)
    }

    /// Number of complete fields in the file
    pub fn field_count(&mut self) -> Result<usize> {
        self.refresh_index()?;
        Ok(self.index.len())
    }

    /// All field times in disk order, without decoding bodies
    pub fn times(&mut self) -> Result<Vec<f32>> {
        self.refresh_index()?;
        Ok(self.index.times())
    }

    /// Bytes of a partial trailing field the scan dropped at EOF
    pub fn trailing_bytes(&mut self) -> Result<u64> {
        self.refresh_index()?;
        Ok(self.index.trailing_bytes())
    }

    fn refresh_index(&mut self) -> Result<()> {
        let meta = std::fs::metadata(&self.path)?;
        let len = meta.len();
        let modified = meta.modified().ok();
        let created = meta.created().ok();

        if !self.indexed {
            return self.build_index(len, created, modified);
        }

        let created_changed = match (self.created, created) {
            (Some(old), Some(new)) => old != new,
            _ => false,
        };

        if created_changed || len < self.indexed_len {
            debug!(path = %self.path.display(), "file replaced, rebuilding index");
            self.build_index(len, created, modified)
        } else if len > self.indexed_len || modified != self.modified {
            self.extend_index(len, created, modified)
        } else {
            Ok(())
        }
    }

    fn build_index(
        &mut self,
        len: u64,
        created: Option<SystemTime>,
        modified: Option<SystemTime>,
    ) -> Result<()> {
        self.index = FieldIndex::scan(&self.path, self.compressed, self.chunk_size)?;
        self.indexed = true;
        self.indexed_len = len;
        self.created = created;
        self.modified = modified;
        Ok(())
    }

    fn extend_index(
        &mut self,
        len: u64,
        created: Option<SystemTime>,
        modified: Option<SystemTime>,
    ) -> Result<()> {
        self.index
            .extend_from_last(&self.path, self.compressed, self.chunk_size)?;
        self.indexed_len = len;
        self.created = created;
        self.modified = modified;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Read a single field by id
    pub fn read_field(&mut self, id: usize) -> Result<Field> {
        self.refresh_index()?;
        let position = self
            .index
            .get(id)
            .cloned()
            .ok_or(Error::FieldNotFound(id))?;
        self.read_at(&position)
    }

    /// Read the field at a previously obtained position
    ///
    /// Restores the position's checkpoint: plain files seek straight to
    /// the field, gzipped files replay the stream up to it.
    pub fn read_at(&self, position: &Position) -> Result<Field> {
        let bytes = self.read_field_bytes(position)?;
        Field::from_bytes(&bytes, self.shape(), self.spacing()).map_err(Into::into)
    }

    /// Read an ordered range of fields selected by a slice
    pub fn read_slice(&mut self, slice: &FieldSlice) -> Result<Vec<Field>> {
        self.refresh_index()?;
        let ids = slice.resolve(self.index.len())?;
        self.read_resolved(&ids)
    }

    /// Read exactly the given field ids, in the order given
    pub fn read_ids(&mut self, ids: &[usize]) -> Result<Vec<Field>> {
        self.refresh_index()?;
        self.read_resolved(ids)
    }

    fn read_resolved(&self, ids: &[usize]) -> Result<Vec<Field>> {
        let mut fields = Vec::with_capacity(ids.len());
        for &id in ids {
            let position = self.index.get(id).ok_or(Error::FieldNotFound(id))?;
            fields.push(self.read_at(position)?);
        }
        Ok(fields)
    }

    /// Read every field whose decoded value satisfies the predicate
    ///
    /// Decodes the full sequence lazily in one streaming pass and keeps
    /// only the matches.
    pub fn read_where<P>(&mut self, mut predicate: P) -> Result<Vec<Field>>
    where
        P: FnMut(&Field) -> bool,
    {
        let mut matched = Vec::new();
        for field in self.iter_fields()? {
            let field = field?;
            if predicate(&field) {
                matched.push(field);
            }
        }
        Ok(matched)
    }

    /// Read all fields in disk order
    pub fn read_all(&mut self) -> Result<Vec<Field>> {
        self.iter_fields()?.collect()
    }

    /// Iterate all fields in disk order with a single streaming pass
    pub fn iter_fields(&mut self) -> Result<FieldIter> {
        self.refresh_index()?;
        FieldIter::new(
            &self.path,
            self.compressed,
            self.chunk_size,
            &self.index,
            self.shape(),
            self.spacing(),
        )
    }

    /// Accumulate one field's bytes starting at its position checkpoint
    fn read_field_bytes(&self, position: &Position) -> Result<Vec<u8>> {
        let mut chunks = ChunkReader::open_at(
            &self.path,
            self.compressed,
            position.chunk_size,
            position.chunk_id.0,
        )?;

        let mut buffer = Vec::with_capacity(position.field_size);
        let mut first = true;

        while buffer.len() < position.field_size {
            let Some(chunk) = chunks.next_chunk()? else {
                return Err(fieldhouse_core::Error::TruncatedField {
                    needed: position.field_size,
                    got: buffer.len(),
                }
                .into());
            };

            let chunk = if first {
                first = false;
                if position.chunk_offset.0 > chunk.len() {
                    return Err(Error::StaleIndex {
                        offset: position.start_offset(),
                    });
                }
                chunk.slice(position.chunk_offset.0..)
            } else {
                chunk
            };

            let take = (position.field_size - buffer.len()).min(chunk.len());
            buffer.extend_from_slice(&chunk[..take]);
        }

        Ok(buffer)
    }
}

/// Streaming iterator over every complete field in a file
///
/// Bounded by the index's field count, so a partial trailing field is
/// never decoded.
pub struct FieldIter {
    chunks: ChunkReader,
    field_size: usize,
    remaining: usize,
    current: Option<bytes::Bytes>,
    shape: Option<GridShape>,
    spacing: Option<GridSpacing>,
}

impl FieldIter {
    fn new(
        path: &Path,
        compressed: bool,
        chunk_size: usize,
        index: &FieldIndex,
        shape: Option<GridShape>,
        spacing: Option<GridSpacing>,
    ) -> Result<Self> {
        Ok(Self {
            chunks: ChunkReader::open(path, compressed, chunk_size)?,
            field_size: index.get(0).map(|p| p.field_size).unwrap_or(0),
            remaining: index.len(),
            current: None,
            shape,
            spacing,
        })
    }

    fn next_field_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(self.field_size);

        while buffer.len() < self.field_size {
            let data = match self.current.take() {
                Some(data) if !data.is_empty() => data,
                _ => match self.chunks.next_chunk()? {
                    Some(data) => data,
                    None => {
                        return Err(fieldhouse_core::Error::TruncatedField {
                            needed: self.field_size,
                            got: buffer.len(),
                        }
                        .into());
                    }
                },
            };

            let take = (self.field_size - buffer.len()).min(data.len());
            buffer.extend_from_slice(&data[..take]);
            self.current = Some(data.slice(take..));
        }

        Ok(buffer)
    }
}

impl Iterator for FieldIter {
    type Item = Result<Field>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let result = self.next_field_bytes().and_then(|bytes| {
            Field::from_bytes(&bytes, self.shape, self.spacing).map_err(Into::into)
        });

        if result.is_err() {
            self.remaining = 0;
        }
        Some(result)
    }
}
