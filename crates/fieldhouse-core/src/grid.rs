//! Grid Geometry Value Types
//!
//! A field body is a flat run of cell values; the grid shape turns it back
//! into a 1D, 2D, or 3D block. Shape and spacing come from a companion
//! geometry file and are carried on decoded fields for downstream
//! consumers; the indexer itself never needs them.
//!
//! ## Dimensionality Rule
//!
//! The producer collapses unused axes to extent 1, so dimensionality is
//! derived, not stored:
//!
//! - `ny == 1 && nx == 1` → 1D (a column along z)
//! - `ny == 1`            → 2D (an xz plane)
//! - otherwise            → 3D

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Cell counts along each grid axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    pub nx: u32,
    pub ny: u32,
    pub nz: u32,
}

impl GridShape {
    pub fn new(nx: u32, ny: u32, nz: u32) -> Self {
        Self { nx, ny, nz }
    }

    /// Total number of cells in the grid
    pub fn cell_count(&self) -> usize {
        self.nx as usize * self.ny as usize * self.nz as usize
    }

    /// Number of non-degenerate dimensions (1, 2, or 3)
    pub fn dimensions(&self) -> u8 {
        if self.ny == 1 {
            if self.nx == 1 {
                1
            } else {
                2
            }
        } else {
            3
        }
    }
}

impl fmt::Display for GridShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.nx, self.ny, self.nz)
    }
}

/// Physical cell size along each grid axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpacing {
    pub dx: f32,
    pub dy: f32,
    pub dz: f32,
}

impl GridSpacing {
    pub fn new(dx: f32, dy: f32, dz: f32) -> Self {
        Self { dx, dy, dz }
    }

    /// Uniformly rescale the spacing, e.g. for unit conversion
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            dx: self.dx * factor,
            dy: self.dy * factor,
            dz: self.dz * factor,
        }
    }
}

impl fmt::Display for GridSpacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.dx, self.dy, self.dz)
    }
}

/// A named cross-section orientation
///
/// The first letter is the horizontal axis of the extracted 2D slice, the
/// second the vertical; reversed pairs are transposes of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Plane {
    Xy,
    Yx,
    Xz,
    Zx,
    Yz,
    Zy,
}

impl Plane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plane::Xy => "xy",
            Plane::Yx => "yx",
            Plane::Xz => "xz",
            Plane::Zx => "zx",
            Plane::Yz => "yz",
            Plane::Zy => "zy",
        }
    }
}

impl FromStr for Plane {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "xy" => Ok(Plane::Xy),
            "yx" => Ok(Plane::Yx),
            "xz" => Ok(Plane::Xz),
            "zx" => Ok(Plane::Zx),
            "yz" => Ok(Plane::Yz),
            "zy" => Ok(Plane::Zy),
            other => Err(Error::InvalidPlane(other.to_string())),
        }
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
