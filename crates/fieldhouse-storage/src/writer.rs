//! Field Writer - Serializing Field Sequences
//!
//! This module implements `FieldWriter`, which streams field records into a
//! plain or gzipped file, plus the whole-collection helpers `write_fields`
//! and `append_fields`.
//!
//! ## Append Lifecycle
//!
//! The format is append-only with a single writer: a simulation keeps
//! adding snapshots to the end of the file while readers re-index the
//! grown tail. Appending to a gzipped file writes a fresh gzip member;
//! the chunk reader decodes multi-member files as one continuous stream,
//! so readers never notice the member boundary.
//!
//! ## Example Usage
//!
//! ```ignore
//! use fieldhouse_storage::FieldWriter;
//!
//! let mut writer = FieldWriter::create("run7_conc1.bin.gz", true)?;
//! for field in &fields {
//!     writer.append(field)?;
//! }
//! writer.finish()?;
//! ```

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use tracing::debug;

use fieldhouse_core::Field;

use crate::error::Result;
use crate::geometry::{geometry_path_for, write_geometry, Geometry, CM_TO_UM};

enum Sink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Sink::Plain(writer) => writer.write(buf),
            Sink::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Sink::Plain(writer) => writer.flush(),
            Sink::Gzip(encoder) => encoder.flush(),
        }
    }
}

/// Streams field records into a file
pub struct FieldWriter {
    sink: Sink,
    fields_written: usize,
}

impl FieldWriter {
    /// Create (or truncate) a file for writing
    pub fn create(path: impl AsRef<Path>, compressed: bool) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Self::from_file(file, compressed))
    }

    /// Open a file for appending, creating it if needed
    ///
    /// For a gzipped file this starts a new gzip member at the current end.
    pub fn append_to(path: impl AsRef<Path>, compressed: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path.as_ref())?;
        Ok(Self::from_file(file, compressed))
    }

    fn from_file(file: File, compressed: bool) -> Self {
        let buffered = BufWriter::new(file);
        let sink = if compressed {
            Sink::Gzip(GzEncoder::new(buffered, flate2::Compression::default()))
        } else {
            Sink::Plain(buffered)
        };

        Self {
            sink,
            fields_written: 0,
        }
    }

    /// Serialize one field record to the sink
    pub fn append(&mut self, field: &Field) -> Result<()> {
        self.sink.write_all(&field.to_bytes())?;
        self.fields_written += 1;
        Ok(())
    }

    /// Number of fields appended so far
    pub fn fields_written(&self) -> usize {
        self.fields_written
    }

    /// Flush all buffered data and close the sink
    pub fn finish(self) -> Result<()> {
        match self.sink {
            Sink::Plain(mut writer) => writer.flush()?,
            Sink::Gzip(encoder) => {
                let mut writer = encoder.finish()?;
                writer.flush()?;
            }
        }
        Ok(())
    }
}

/// Write a field collection to a file, optionally with its geometry companion
///
/// When `write_geo` is set and the first field carries shape and spacing,
/// the companion geometry file is written next to the data file. Field
/// spacing is in µm; the geometry file stores the producer's cm units.
pub fn write_fields(
    fields: &[Field],
    path: impl AsRef<Path>,
    compressed: bool,
    write_geo: bool,
) -> Result<()> {
    let path = path.as_ref();
    let mut writer = FieldWriter::create(path, compressed)?;
    for field in fields {
        writer.append(field)?;
    }
    let count = writer.fields_written();
    writer.finish()?;
    debug!(path = %path.display(), fields = count, "wrote field file");

    if write_geo {
        if let Some((shape, spacing)) = fields
            .first()
            .and_then(|f| Some((f.shape?, f.spacing?)))
        {
            let geometry = Geometry {
                shape,
                spacing: spacing.scaled(1.0 / CM_TO_UM),
            };
            let geo_path = geometry_path_for(path, compressed);
            write_geometry(&geo_path, &geometry, compressed)?;
            debug!(path = %geo_path.display(), "wrote geometry file");
        }
    }

    Ok(())
}

/// Append a field collection to an existing file
pub fn append_fields(fields: &[Field], path: impl AsRef<Path>, compressed: bool) -> Result<()> {
    let mut writer = FieldWriter::append_to(path, compressed)?;
    for field in fields {
        writer.append(field)?;
    }
    writer.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldhouse_core::{FieldData, GridShape, GridSpacing};
    use tempfile::TempDir;

    use crate::index::FieldIndex;

    fn make_field(time: f32) -> Field {
        Field::new(
            FieldData::Float(vec![time, time + 0.5, time + 1.5]),
            time,
            None,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_write_then_scan_plain() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run_conc1.bin");

        let fields: Vec<Field> = (0..5).map(|i| make_field(i as f32)).collect();
        write_fields(&fields, &path, false, false).unwrap();

        let index = FieldIndex::scan(&path, false, 64).unwrap();
        assert_eq!(index.times(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_write_then_scan_gzip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run_conc1.bin.gz");

        let fields: Vec<Field> = (0..5).map(|i| make_field(i as f32)).collect();
        write_fields(&fields, &path, true, false).unwrap();

        assert!(crate::chunk::is_gzip(&path).unwrap());
        let index = FieldIndex::scan(&path, true, 64).unwrap();
        assert_eq!(index.len(), 5);
    }

    #[test]
    fn test_append_extends_plain_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run_conc1.bin");

        write_fields(&[make_field(0.0)], &path, false, false).unwrap();
        append_fields(&[make_field(1.0), make_field(2.0)], &path, false).unwrap();

        let index = FieldIndex::scan(&path, false, 64).unwrap();
        assert_eq!(index.times(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_append_extends_gzip_file_as_new_member() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run_conc1.bin.gz");

        write_fields(&[make_field(0.0)], &path, true, false).unwrap();
        append_fields(&[make_field(1.0)], &path, true).unwrap();

        let index = FieldIndex::scan(&path, true, 64).unwrap();
        assert_eq!(index.times(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_write_geo_emits_companion() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run_conc1.bin");

        let shape = GridShape::new(3, 1, 1);
        let spacing_um = GridSpacing::new(5.0, 5.0, 5.0);
        let field = Field::new(
            FieldData::Float(vec![0.0, 1.0, 2.0]),
            0.0,
            Some(shape),
            Some(spacing_um),
        )
        .unwrap();

        write_fields(&[field], &path, false, true).unwrap();

        let geo = crate::geometry::read_geometry(&dir.path().join("run_geo.bin")).unwrap();
        assert_eq!(geo.shape, shape);
        // File units are cm: 5 µm = 0.0005 cm
        assert_eq!(geo.spacing, spacing_um.scaled(1.0 / CM_TO_UM));
    }

    #[test]
    fn test_write_geo_skipped_without_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run_conc1.bin");

        write_fields(&[make_field(0.0)], &path, false, true).unwrap();
        assert!(!dir.path().join("run_geo.bin").exists());
    }
}
