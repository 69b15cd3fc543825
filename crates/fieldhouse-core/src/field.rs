//! Field Data Structure
//!
//! This module defines the core `Field` type: one timestamped snapshot of a
//! numeric grid, the fundamental unit of data in a fieldhouse file.
//!
//! ## Structure
//! Each field contains:
//! - **time**: the simulation time of the snapshot, rounded to 7 decimals
//! - **data**: the cell values, either 32-bit floats or 32-bit integers
//! - **shape**: optional grid shape `(nx, ny, nz)` from the geometry file
//! - **spacing**: optional physical cell size, carried for consumers
//!
//! ## Float→Int Downcast
//!
//! Many simulation outputs are phase or grain IDs: integral values stored
//! as floats. After decoding, if every element is within tolerance of its
//! nearest integer the whole array is narrowed to `FieldData::Int`, which
//! preserves exact equality for such fields. Anything else stays
//! `FieldData::Float`. The check uses `|x − round(x)| ≤ atol + rtol·|round(x)|`
//! with atol = 1e-8, rtol = 1e-5, and an i32-range guard; NaN and infinity
//! never qualify.
//!
//! ## Plane Slices
//!
//! `get_slice` extracts a 2D cross-section along one of six named plane
//! orientations. The extraction rule depends on the grid dimensionality:
//! a fixed (dimensionality × plane) dispatch, with reversed plane names
//! yielding transposes.

use bytes::{Buf, BufMut, BytesMut};

use crate::codec::{field_size, round_time, Footer, Header, FOOTER_SIZE, HEADER_SIZE};
use crate::error::{Error, Result};
use crate::grid::{GridShape, GridSpacing, Plane};

/// Tolerances for the float→int downcast check
const DOWNCAST_ATOL: f64 = 1e-8;
const DOWNCAST_RTOL: f64 = 1e-5;

/// Cell values of a field, narrowed to integers when exactly representable
#[derive(Debug, Clone, PartialEq)]
pub enum FieldData {
    Float(Vec<f32>),
    Int(Vec<i32>),
}

impl FieldData {
    pub fn len(&self) -> usize {
        match self {
            FieldData::Float(values) => values.len(),
            FieldData::Int(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_int(&self) -> bool {
        matches!(self, FieldData::Int(_))
    }

    pub fn as_floats(&self) -> Option<&[f32]> {
        match self {
            FieldData::Float(values) => Some(values),
            FieldData::Int(_) => None,
        }
    }

    pub fn as_ints(&self) -> Option<&[i32]> {
        match self {
            FieldData::Int(values) => Some(values),
            FieldData::Float(_) => None,
        }
    }

    /// Widen to f32 regardless of the stored variant
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match self {
            FieldData::Float(values) => values.clone(),
            FieldData::Int(values) => values.iter().map(|&v| v as f32).collect(),
        }
    }

    /// Gather elements by flat index into a new array of the same variant
    fn gather(&self, indices: &[usize]) -> FieldData {
        match self {
            FieldData::Float(values) => {
                FieldData::Float(indices.iter().map(|&i| values[i]).collect())
            }
            FieldData::Int(values) => {
                FieldData::Int(indices.iter().map(|&i| values[i]).collect())
            }
        }
    }
}

/// A 2D cross-section extracted from a field, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct SliceView {
    pub rows: usize,
    pub cols: usize,
    pub data: FieldData,
}

/// A single timestamped grid snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Snapshot time, rounded to 7 decimals
    pub time: f32,

    /// Cell values
    pub data: FieldData,

    /// Grid shape, if geometry is known
    pub shape: Option<GridShape>,

    /// Physical cell size, if geometry is known
    pub spacing: Option<GridSpacing>,
}

impl Field {
    /// Create a field, validating that the shape can hold the data
    pub fn new(
        data: FieldData,
        time: f32,
        shape: Option<GridShape>,
        spacing: Option<GridSpacing>,
    ) -> Result<Self> {
        if let Some(shape) = shape {
            if shape.cell_count() != data.len() {
                return Err(Error::ShapeMismatch {
                    elements: data.len(),
                    cells: shape.cell_count(),
                });
            }
        }

        Ok(Self {
            time: round_time(time),
            data,
            shape,
            spacing,
        })
    }

    /// Number of cell values
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Grid dimensionality (1, 2, or 3), if the shape is known
    pub fn dimensions(&self) -> Option<u8> {
        self.shape.map(|shape| shape.dimensions())
    }

    /// Decode a field from one record's worth of bytes
    ///
    /// Validates the header size invariant and the redundant footer length,
    /// applies the float→int downcast, and attaches shape/spacing when
    /// supplied. The input may extend past the record; extra bytes are
    /// ignored.
    pub fn from_bytes(
        data: &[u8],
        shape: Option<GridShape>,
        spacing: Option<GridSpacing>,
    ) -> Result<Self> {
        let header = Header::from_bytes(data)?;
        let record_size = header.field_size();

        if data.len() < record_size {
            return Err(Error::TruncatedField {
                needed: record_size,
                got: data.len(),
            });
        }

        let length = header.body_length();
        let mut body = &data[HEADER_SIZE..HEADER_SIZE + 4 * length];
        let mut values = Vec::with_capacity(length);
        for _ in 0..length {
            values.push(body.get_f32_le());
        }

        let footer = Footer::from_bytes(&data[HEADER_SIZE + 4 * length..record_size])?;
        if footer.body_length() as i64 != length as i64 {
            return Err(Error::LengthMismatch {
                header: length as i32,
                footer: footer.body_length(),
            });
        }

        Field::new(downcast(values), header.time(), shape, spacing)
    }

    /// Encode the field as one record, byte-exact inverse of `from_bytes`
    ///
    /// Integer data is written back as f32 values, so a decode of the
    /// output downcasts to the same integers.
    pub fn to_bytes(&self) -> Vec<u8> {
        let length = self.data.len();
        let mut buf = BytesMut::with_capacity(field_size(length));

        buf.put_slice(&Header::for_body(self.time, length).to_bytes());
        match &self.data {
            FieldData::Float(values) => {
                for &value in values {
                    buf.put_f32_le(value);
                }
            }
            FieldData::Int(values) => {
                for &value in values {
                    buf.put_f32_le(value as f32);
                }
            }
        }
        buf.put_slice(&Footer::new(length).to_bytes());

        buf.to_vec()
    }

    /// Extract a 2D cross-section along a named plane
    ///
    /// `slice_id` selects the layer along the axis missing from the plane
    /// name. Requires a grid shape.
    pub fn get_slice(&self, plane: Plane, slice_id: usize) -> Result<SliceView> {
        let shape = self.shape.ok_or(Error::MissingShape)?;
        let (nx, ny, nz) = (
            shape.nx as usize,
            shape.ny as usize,
            shape.nz as usize,
        );

        match shape.dimensions() {
            1 => {
                // Data is a column along z: (nz, 1)
                match plane {
                    Plane::Xz | Plane::Yz => self.extract(nz, 1, |r, _| r),
                    Plane::Zx | Plane::Zy => self.extract(1, nz, |_, c| c),
                    Plane::Xy | Plane::Yx => {
                        check_extent(slice_id, nz)?;
                        self.extract(1, 1, |_, _| slice_id)
                    }
                }
            }
            2 => {
                // Data is an xz sheet stored z-major: (nz, nx)
                match plane {
                    Plane::Xz => self.extract(nz, nx, |r, c| r * nx + c),
                    Plane::Zx => self.extract(nx, nz, |r, c| c * nx + r),
                    Plane::Xy => {
                        check_extent(slice_id, nz)?;
                        self.extract(1, nx, |_, c| slice_id * nx + c)
                    }
                    Plane::Yx => {
                        check_extent(slice_id, nz)?;
                        self.extract(nx, 1, |r, _| slice_id * nx + r)
                    }
                    Plane::Zy => {
                        check_extent(slice_id, nx)?;
                        self.extract(1, nz, |_, c| c * nx + slice_id)
                    }
                    Plane::Yz => {
                        check_extent(slice_id, nx)?;
                        self.extract(nz, 1, |r, _| r * nx + slice_id)
                    }
                }
            }
            _ => {
                // Full 3D block in C order: flat index (i·ny + j)·nz + k
                match plane {
                    Plane::Xy => {
                        check_extent(slice_id, nx)?;
                        self.extract(ny, nz, |r, c| (slice_id * ny + r) * nz + c)
                    }
                    Plane::Yx => {
                        check_extent(slice_id, nx)?;
                        self.extract(nz, ny, |r, c| (slice_id * ny + c) * nz + r)
                    }
                    Plane::Xz => {
                        check_extent(slice_id, ny)?;
                        self.extract(nx, nz, |r, c| (r * ny + slice_id) * nz + c)
                    }
                    Plane::Zx => {
                        check_extent(slice_id, ny)?;
                        self.extract(nz, nx, |r, c| (c * ny + slice_id) * nz + r)
                    }
                    Plane::Yz => {
                        check_extent(slice_id, nz)?;
                        self.extract(nx, ny, |r, c| (r * ny + c) * nz + slice_id)
                    }
                    Plane::Zy => {
                        check_extent(slice_id, nz)?;
                        self.extract(ny, nx, |r, c| (c * ny + r) * nz + slice_id)
                    }
                }
            }
        }
    }

    /// Materialize a rows×cols view from a flat-index mapping
    fn extract(
        &self,
        rows: usize,
        cols: usize,
        index: impl Fn(usize, usize) -> usize,
    ) -> Result<SliceView> {
        let mut indices = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                indices.push(index(r, c));
            }
        }

        Ok(SliceView {
            rows,
            cols,
            data: self.data.gather(&indices),
        })
    }
}

fn check_extent(slice_id: usize, extent: usize) -> Result<()> {
    if slice_id >= extent {
        return Err(Error::SliceOutOfRange { slice_id, extent });
    }
    Ok(())
}

/// Narrow a decoded body to integers when every value is integral
fn downcast(values: Vec<f32>) -> FieldData {
    let integral = values.iter().all(|&v| {
        let v = f64::from(v);
        let rounded = v.round();
        rounded.abs() <= i32::MAX as f64
            && (v - rounded).abs() <= DOWNCAST_ATOL + DOWNCAST_RTOL * rounded.abs()
    });

    if integral {
        FieldData::Int(
            values
                .iter()
                .map(|&v| f64::from(v).round() as i32)
                .collect(),
        )
    } else {
        FieldData::Float(values)
    }
}
