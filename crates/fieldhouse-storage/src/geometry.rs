//! Geometry Companion Files
//!
//! A field file carries no grid information of its own; shape and spacing
//! come from a small companion file discovered by filename convention.
//!
//! ## Naming Convention
//!
//! Output files are named `<case>_<kind>.bin[.gz]`, e.g. `run7_conc1.bin.gz`
//! for a concentration series of case `run7`. The geometry companion is
//! `<case>_geo.bin[.gz]` in the same directory. Discovery takes the data
//! file's stem up to its last `_` and probes both the plain and gzipped
//! candidate; zero candidates is `GeometryNotFound`, more than one is
//! `AmbiguousGeometry`.
//!
//! ## Record Layout
//!
//! A 24-byte little-endian record, optionally gzip-wrapped:
//!
//! ```text
//! [i32 nx][i32 ny][i32 nz]   grid shape (cells per axis)
//! [f32 dx][f32 dy][f32 dz]   cell spacing, in cm (source units)
//! ```
//!
//! Spacing is stored in the producer's units (cm); the `FieldStore` façade
//! converts to µm when attaching geometry to decoded fields.

use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, BytesMut};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

use fieldhouse_core::{GridShape, GridSpacing};

use crate::chunk::is_gzip;
use crate::error::{Error, Result};

/// Byte size of the geometry record
pub const GEO_RECORD_SIZE: usize = 24;

/// Conversion factor from the file's cm spacing to micrometers
pub const CM_TO_UM: f32 = 10_000.0;

/// Grid shape and spacing for one simulation case
///
/// Spacing units are the caller's concern: files hold cm, the store hands
/// out µm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub shape: GridShape,
    pub spacing: GridSpacing,
}

/// The case prefix of a data file: stem up to the last `_`
fn case_prefix(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(name);
    let stem = match name.rfind('.') {
        Some(i) => &name[..i],
        None => name,
    };
    match stem.rfind('_') {
        Some(i) => stem[..i].to_string(),
        None => stem.to_string(),
    }
}

/// The geometry path a writer should use next to `data_path`
pub fn geometry_path_for(data_path: &Path, compressed: bool) -> PathBuf {
    let dir = data_path.parent().unwrap_or_else(|| Path::new(""));
    let suffix = if compressed { "_geo.bin.gz" } else { "_geo.bin" };
    dir.join(format!("{}{}", case_prefix(data_path), suffix))
}

/// Locate the unique geometry companion of a data file
pub fn find_geometry(data_path: &Path) -> Result<PathBuf> {
    let dir = match data_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let prefix = case_prefix(data_path);

    let mut candidates = Vec::new();
    for suffix in ["_geo.bin", "_geo.bin.gz"] {
        let candidate = dir.join(format!("{prefix}{suffix}"));
        if candidate.is_file() {
            candidates.push(candidate);
        }
    }

    match candidates.len() {
        0 => Err(Error::GeometryNotFound(data_path.to_path_buf())),
        1 => Ok(candidates.remove(0)),
        _ => Err(Error::AmbiguousGeometry {
            path: data_path.to_path_buf(),
            candidates,
        }),
    }
}

/// Read a geometry record, auto-detecting compression
pub fn read_geometry(path: &Path) -> Result<Geometry> {
    let compressed = is_gzip(path)?;
    let file = File::open(path)?;

    let mut source: Box<dyn Read> = if compressed {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let mut buf = [0u8; GEO_RECORD_SIZE];
    let mut filled = 0;
    while filled < GEO_RECORD_SIZE {
        let n = source.read(&mut buf[filled..])?;
        if n == 0 {
            return Err(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("geometry record truncated at {filled} bytes"),
            )
            .into());
        }
        filled += n;
    }

    let mut cursor = &buf[..];
    let (nx, ny, nz) = (
        cursor.get_i32_le(),
        cursor.get_i32_le(),
        cursor.get_i32_le(),
    );
    let spacing = GridSpacing::new(
        cursor.get_f32_le(),
        cursor.get_f32_le(),
        cursor.get_f32_le(),
    );

    if nx < 1 || ny < 1 || nz < 1 {
        return Err(std::io::Error::new(
            ErrorKind::InvalidData,
            format!("invalid grid shape ({nx}, {ny}, {nz})"),
        )
        .into());
    }

    Ok(Geometry {
        shape: GridShape::new(nx as u32, ny as u32, nz as u32),
        spacing,
    })
}

/// Write a geometry record, optionally gzipped
pub fn write_geometry(path: &Path, geometry: &Geometry, compressed: bool) -> Result<()> {
    let mut buf = BytesMut::with_capacity(GEO_RECORD_SIZE);
    buf.put_i32_le(geometry.shape.nx as i32);
    buf.put_i32_le(geometry.shape.ny as i32);
    buf.put_i32_le(geometry.shape.nz as i32);
    buf.put_f32_le(geometry.spacing.dx);
    buf.put_f32_le(geometry.spacing.dy);
    buf.put_f32_le(geometry.spacing.dz);

    let file = File::create(path)?;
    if compressed {
        let mut encoder = GzEncoder::new(file, flate2::Compression::default());
        encoder.write_all(&buf)?;
        encoder.finish()?;
    } else {
        let mut file = file;
        file.write_all(&buf)?;
    }

    Ok(())
}

/// Find and read the geometry companion of a data file
pub fn discover_geometry(data_path: &Path) -> Result<Geometry> {
    read_geometry(&find_geometry(data_path)?)
}
