//! Field Index - The Ordered Position Collection
//!
//! This module implements `FieldIndex`, the eagerly materialized list of
//! field positions for one file.
//!
//! ## What Does FieldIndex Do?
//!
//! 1. **Full build**: runs the scanner to completion and collects every
//!    yielded `Position` in disk order
//! 2. **Incremental extension**: resumes the scanner from the last known
//!    position when the file has grown, appending only the new tail
//! 3. **Index-only queries**: times and counts without touching bodies
//!
//! ## Ordering Guarantees
//!
//! Positions are stored in strictly increasing `id` order with
//! non-decreasing times, matching on-disk order. An extension never
//! mutates existing entries: the first M positions of an extended index
//! are byte-identical to the index before the extension.
//!
//! ## Observability
//!
//! Index builds are the one long-running operation in this crate, so they
//! emit a progress `debug!` every `PROGRESS_EVERY` fields and a summary
//! `info!` on completion.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::scanner::{FieldScanner, Position};

/// Fields between scan-progress debug events
const PROGRESS_EVERY: usize = 1_000;

/// An ordered index of field positions in one file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldIndex {
    positions: Vec<Position>,
    trailing_bytes: u64,
}

impl FieldIndex {
    /// Build a full index by scanning the file from the start
    pub fn scan(path: &Path, compressed: bool, chunk_size: usize) -> Result<Self> {
        let mut scanner = FieldScanner::new(path, compressed, chunk_size)?;
        let mut positions = Vec::new();

        for position in &mut scanner {
            let position = position?;
            if position.id % PROGRESS_EVERY == 0 && position.id > 0 {
                debug!(fields = position.id, "indexing");
            }
            positions.push(position);
        }

        let trailing_bytes = scanner.trailing_bytes();
        info!(
            path = %path.display(),
            fields = positions.len(),
            trailing_bytes,
            "index built"
        );

        Ok(Self {
            positions,
            trailing_bytes,
        })
    }

    /// Extend the index with fields appended after the last known position
    ///
    /// Falls back to a full scan when the index is empty. Returns the
    /// number of positions appended.
    pub fn extend_from_last(
        &mut self,
        path: &Path,
        compressed: bool,
        chunk_size: usize,
    ) -> Result<usize> {
        let Some(last) = self.positions.last() else {
            *self = Self::scan(path, compressed, chunk_size)?;
            return Ok(self.positions.len());
        };

        let mut scanner = FieldScanner::resume(path, compressed, last)?;
        let before = self.positions.len();

        for position in &mut scanner {
            self.positions.push(position?);
        }
        self.trailing_bytes = scanner.trailing_bytes();

        let added = self.positions.len() - before;
        info!(
            path = %path.display(),
            added,
            fields = self.positions.len(),
            "index extended"
        );
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Position> {
        self.positions.get(id)
    }

    pub fn last(&self) -> Option<&Position> {
        self.positions.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Position> {
        self.positions.iter()
    }

    /// All field times, in disk order, without touching bodies
    pub fn times(&self) -> Vec<f32> {
        self.positions.iter().map(|p| p.time).collect()
    }

    /// Byte count of a partial trailing field at EOF (0 if none)
    pub fn trailing_bytes(&self) -> u64 {
        self.trailing_bytes
    }
}

impl<'a> IntoIterator for &'a FieldIndex {
    type Item = &'a Position;
    type IntoIter = std::slice::Iter<'a, Position>;

    fn into_iter(self) -> Self::IntoIter {
        self.positions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldhouse_core::{Field, FieldData};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn make_field(time: f32, length: usize) -> Field {
        let values = (0..length).map(|i| i as f32 * 0.5 + time).collect();
        Field::new(FieldData::Float(values), time, None, None).unwrap()
    }

    fn write_fields(dir: &TempDir, name: &str, times: &[f32], length: usize) -> PathBuf {
        let path = dir.path().join(name);
        let mut bytes = Vec::new();
        for &time in times {
            bytes.extend_from_slice(&make_field(time, length).to_bytes());
        }
        std::fs::write(&path, &bytes).unwrap();
        path
    }

    #[test]
    fn test_scan_builds_complete_index() {
        let dir = TempDir::new().unwrap();
        let times: Vec<f32> = (0..12).map(|i| i as f32 * 0.1).collect();
        let path = write_fields(&dir, "data.bin", &times, 20);

        let index = FieldIndex::scan(&path, false, 256).unwrap();

        assert_eq!(index.len(), 12);
        for (i, expected) in times.iter().enumerate() {
            let position = index.get(i).unwrap();
            assert_eq!(position.id, i);
            assert_eq!(position.time, fieldhouse_core::round_time(*expected));
        }
    }

    #[test]
    fn test_times_without_decoding() {
        let dir = TempDir::new().unwrap();
        let path = write_fields(&dir, "data.bin", &[0.0, 1.0, 2.0], 8);

        let index = FieldIndex::scan(&path, false, 1024).unwrap();
        assert_eq!(index.times(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_extend_appends_without_touching_prefix() {
        let dir = TempDir::new().unwrap();
        let path = write_fields(&dir, "data.bin", &[0.0, 1.0, 2.0], 30);

        let mut index = FieldIndex::scan(&path, false, 128).unwrap();
        let before: Vec<_> = index.iter().cloned().collect();

        // Append two more fields
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.extend_from_slice(&make_field(3.0, 30).to_bytes());
        bytes.extend_from_slice(&make_field(4.0, 30).to_bytes());
        std::fs::write(&path, &bytes).unwrap();

        let added = index.extend_from_last(&path, false, 128).unwrap();

        assert_eq!(added, 2);
        assert_eq!(index.len(), 5);
        assert_eq!(&index.iter().cloned().collect::<Vec<_>>()[..3], &before[..]);
        assert_eq!(index.get(3).unwrap().time, 3.0);
        assert_eq!(index.get(4).unwrap().time, 4.0);
    }

    #[test]
    fn test_extend_matches_full_rescan() {
        let dir = TempDir::new().unwrap();
        let path = write_fields(&dir, "data.bin", &[0.0, 1.0], 25);

        let mut extended = FieldIndex::scan(&path, false, 100).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        for time in [2.0f32, 3.0, 4.0] {
            bytes.extend_from_slice(&make_field(time, 25).to_bytes());
        }
        std::fs::write(&path, &bytes).unwrap();

        extended.extend_from_last(&path, false, 100).unwrap();
        let fresh = FieldIndex::scan(&path, false, 100).unwrap();

        assert_eq!(extended, fresh);
    }

    #[test]
    fn test_extend_on_empty_index_scans_fully() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("data.bin");
        std::fs::write(&empty, b"").unwrap();

        let mut index = FieldIndex::scan(&empty, false, 128).unwrap();
        assert!(index.is_empty());

        let mut bytes = Vec::new();
        for time in [0.0f32, 1.0] {
            bytes.extend_from_slice(&make_field(time, 10).to_bytes());
        }
        std::fs::write(&empty, &bytes).unwrap();

        let added = index.extend_from_last(&empty, false, 128).unwrap();
        assert_eq!(added, 2);
        assert_eq!(index.times(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_trailing_bytes_tracked_across_extension() {
        let dir = TempDir::new().unwrap();
        let path = write_fields(&dir, "data.bin", &[0.0], 10);

        let mut index = FieldIndex::scan(&path, false, 64).unwrap();
        assert_eq!(index.trailing_bytes(), 0);

        // Append one whole field plus a partial one
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.extend_from_slice(&make_field(1.0, 10).to_bytes());
        bytes.extend_from_slice(&make_field(2.0, 10).to_bytes()[..17]);
        std::fs::write(&path, &bytes).unwrap();

        index.extend_from_last(&path, false, 64).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.trailing_bytes(), 17);
    }

    #[test]
    fn test_index_serde_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = write_fields(&dir, "data.bin", &[0.5, 1.5], 12);

        let index = FieldIndex::scan(&path, false, 64).unwrap();
        let json = serde_json::to_string(&index).unwrap();
        let parsed: FieldIndex = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, index);
    }
}
