//! Record layouts, encodings and grid geometry.

use std::{fmt, sync::Arc};

/// Magic of the time-series file
pub const TIME_MAGIC: [u8; 4] = *b"STGT";
/// Magic of the radial-profile file
pub const RPROF_MAGIC: [u8; 4] = *b"STGR";
/// Magic of a snapshot file
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"STGS";
/// Only layout version understood by this crate
pub const FORMAT_VERSION: u8 = 1;

/// Size of the `istep` word leading each time-series row and profile block
pub const ISTEP_WORD: u64 = 4;

const ORDER_MASK: u8 = 0b0000_0011;
const PRECISION_MASK: u8 = 0b0000_1100;

/// Byte order of every number following the flags byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Least significant byte first
    Little,
    /// Most significant byte first
    Big,
}

/// Width of the real samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// IEEE-754 binary32
    Single,
    /// IEEE-754 binary64
    Double,
}

impl Precision {
    /// Bytes per real sample
    #[inline]
    pub fn width(self) -> usize {
        match self {
            Precision::Single => 4,
            Precision::Double => 8,
        }
    }
}

/// Resolved numeric encoding of a record file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoding {
    /// Byte order of integers and reals
    pub byte_order: ByteOrder,
    /// Width of reals
    pub precision: Precision,
}

impl Default for Encoding {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::Little,
            precision: Precision::Double,
        }
    }
}

impl Encoding {
    /// Create an encoding
    pub fn new(byte_order: ByteOrder, precision: Precision) -> Self {
        Self {
            byte_order,
            precision,
        }
    }

    /// Decode a flags byte.
    ///
    /// Unspecified fields (`0`) fall back to `defaults`. Returns `None` for
    /// the reserved value `3` in either field.
    pub fn from_flags(flags: u8, defaults: Encoding) -> Option<Self> {
        let byte_order = match flags & ORDER_MASK {
            0 => defaults.byte_order,
            1 => ByteOrder::Little,
            2 => ByteOrder::Big,
            _ => return None,
        };
        let precision = match (flags & PRECISION_MASK) >> 2 {
            0 => defaults.precision,
            1 => Precision::Single,
            2 => Precision::Double,
            _ => return None,
        };
        Some(Self {
            byte_order,
            precision,
        })
    }

    /// Fully specified flags byte for this encoding
    pub fn flags(self) -> u8 {
        let order = match self.byte_order {
            ByteOrder::Little => 1,
            ByteOrder::Big => 2,
        };
        let precision = match self.precision {
            Precision::Single => 1,
            Precision::Double => 2,
        };
        order | (precision << 2)
    }

    #[inline]
    pub(crate) fn u16_from(self, b: [u8; 2]) -> u16 {
        match self.byte_order {
            ByteOrder::Little => u16::from_le_bytes(b),
            ByteOrder::Big => u16::from_be_bytes(b),
        }
    }

    #[inline]
    pub(crate) fn u32_from(self, b: [u8; 4]) -> u32 {
        match self.byte_order {
            ByteOrder::Little => u32::from_le_bytes(b),
            ByteOrder::Big => u32::from_be_bytes(b),
        }
    }

    #[inline]
    pub(crate) fn u64_from(self, b: [u8; 8]) -> u64 {
        match self.byte_order {
            ByteOrder::Little => u64::from_le_bytes(b),
            ByteOrder::Big => u64::from_be_bytes(b),
        }
    }

    /// Decode one real sample; `b.len()` must equal the precision width.
    #[inline]
    pub(crate) fn real_from(self, b: &[u8]) -> f64 {
        match (self.precision, self.byte_order) {
            (Precision::Single, ByteOrder::Little) => {
                f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64
            }
            (Precision::Single, ByteOrder::Big) => {
                f32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64
            }
            (Precision::Double, ByteOrder::Little) => {
                f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
            }
            (Precision::Double, ByteOrder::Big) => {
                f64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
            }
        }
    }

    #[inline]
    pub(crate) fn u16_bytes(self, v: u16) -> [u8; 2] {
        match self.byte_order {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        }
    }

    #[inline]
    pub(crate) fn u32_bytes(self, v: u32) -> [u8; 4] {
        match self.byte_order {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        }
    }

    #[inline]
    pub(crate) fn u64_bytes(self, v: u64) -> [u8; 8] {
        match self.byte_order {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        }
    }

    /// Append one real sample in this encoding.
    #[inline]
    pub(crate) fn push_real(self, out: &mut Vec<u8>, v: f64) {
        match (self.precision, self.byte_order) {
            (Precision::Single, ByteOrder::Little) => {
                out.extend_from_slice(&(v as f32).to_le_bytes())
            }
            (Precision::Single, ByteOrder::Big) => out.extend_from_slice(&(v as f32).to_be_bytes()),
            (Precision::Double, ByteOrder::Little) => out.extend_from_slice(&v.to_le_bytes()),
            (Precision::Double, ByteOrder::Big) => out.extend_from_slice(&v.to_be_bytes()),
        }
    }
}

/// Coordinate system of the simulation grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordSystem {
    /// Box
    Cartesian,
    /// Annulus / cylinder
    Cylindrical,
    /// Spherical shell (yin-yang or cubed-sphere)
    Spherical,
}

impl CoordSystem {
    /// Decode the on-disk tag
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(CoordSystem::Cartesian),
            1 => Some(CoordSystem::Cylindrical),
            2 => Some(CoordSystem::Spherical),
            _ => None,
        }
    }

    /// On-disk tag
    pub fn tag(self) -> u8 {
        match self {
            CoordSystem::Cartesian => 0,
            CoordSystem::Cylindrical => 1,
            CoordSystem::Spherical => 2,
        }
    }
}

impl fmt::Display for CoordSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordSystem::Cartesian => write!(f, "Cartesian"),
            CoordSystem::Cylindrical => write!(f, "Cylindrical"),
            CoordSystem::Spherical => write!(f, "Spherical"),
        }
    }
}

/// Which axes of the grid carry more than one point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimensionality {
    /// 2D in the x-z plane (`nytot == 1`)
    TwoDimXz,
    /// 2D in the y-z plane (`nxtot == 1`)
    TwoDimYz,
    /// Full 3D grid
    ThreeDim,
}

/// Grid shape of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Points along x
    pub nxtot: u32,
    /// Points along y
    pub nytot: u32,
    /// Points along z (radial)
    pub nztot: u32,
    /// Coordinate system
    pub coords: CoordSystem,
}

impl Geometry {
    /// Create a geometry
    pub fn new(nxtot: u32, nytot: u32, nztot: u32, coords: CoordSystem) -> Self {
        Self {
            nxtot,
            nytot,
            nztot,
            coords,
        }
    }

    /// Classify from the extents. A degenerate y axis wins over a degenerate x
    /// axis, so a single column `(1, 1, n)` is reported as x-z.
    pub fn dimensionality(&self) -> Dimensionality {
        if self.nytot == 1 {
            Dimensionality::TwoDimXz
        } else if self.nxtot == 1 {
            Dimensionality::TwoDimYz
        } else {
            Dimensionality::ThreeDim
        }
    }

    /// True for x-z 2D grids
    pub fn twod_xz(&self) -> bool {
        self.dimensionality() == Dimensionality::TwoDimXz
    }

    /// True for y-z 2D grids
    pub fn twod_yz(&self) -> bool {
        self.dimensionality() == Dimensionality::TwoDimYz
    }

    /// True for 3D grids
    pub fn threed(&self) -> bool {
        self.dimensionality() == Dimensionality::ThreeDim
    }

    /// Number of grid points, `None` on overflow
    pub fn cells(&self) -> Option<u64> {
        (self.nxtot as u64)
            .checked_mul(self.nytot as u64)?
            .checked_mul(self.nztot as u64)
    }
}

/// Where one time-series row or profile block lives in its file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLocation {
    /// Step stored in the leading word
    pub istep: u32,
    /// Byte offset of the leading word
    pub offset: u64,
}

/// Header of the time-series file
#[derive(Debug, Clone)]
pub struct TimeHeader {
    /// Resolved encoding
    pub encoding: Encoding,
    /// Column names, shared with every parsed row
    pub columns: Arc<[String]>,
    /// Offset of the first row
    pub data_offset: u64,
}

impl TimeHeader {
    /// Size of one row in bytes
    pub fn row_size(&self) -> u64 {
        ISTEP_WORD + (self.columns.len() * self.encoding.precision.width()) as u64
    }
}

/// Result of indexing a time-series file without reading row bodies
#[derive(Debug, Clone)]
pub struct TimeScan {
    /// File header
    pub header: TimeHeader,
    /// Every complete row, in file order
    pub rows: Vec<RowLocation>,
    /// Bytes after the last complete row (a row still being written)
    pub trailing_bytes: u64,
}

/// One parsed time-series row
#[derive(Debug, Clone, PartialEq)]
pub struct TimeRow {
    /// Step number
    pub istep: u32,
    /// Column names
    pub columns: Arc<[String]>,
    /// One value per column
    pub values: Vec<f64>,
}

impl TimeRow {
    /// Value of a named column
    pub fn get(&self, name: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == name)?;
        self.values.get(i).copied()
    }

    /// `(name, value)` pairs in column order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// Header of the radial-profile file
#[derive(Debug, Clone)]
pub struct RprofHeader {
    /// Resolved encoding
    pub encoding: Encoding,
    /// Column names
    pub columns: Arc<[String]>,
    /// Levels per block
    pub nz: u32,
    /// Offset of the first block
    pub data_offset: u64,
}

impl RprofHeader {
    /// Size of one block in bytes
    pub fn block_size(&self) -> u64 {
        ISTEP_WORD
            + self.nz as u64 * self.columns.len() as u64 * self.encoding.precision.width() as u64
    }
}

/// Result of indexing a radial-profile file
#[derive(Debug, Clone)]
pub struct RprofScan {
    /// File header
    pub header: RprofHeader,
    /// Every complete block, in file order
    pub blocks: Vec<RowLocation>,
    /// Bytes after the last complete block
    pub trailing_bytes: u64,
}

/// Radial profiles of one step, stored level-major
#[derive(Debug, Clone, PartialEq)]
pub struct RadialProfile {
    /// Step number
    pub istep: u32,
    /// Number of levels
    pub nz: u32,
    /// Column names
    pub columns: Arc<[String]>,
    /// `nz * columns.len()` values
    pub values: Vec<f64>,
}

impl RadialProfile {
    /// All levels of one column, bottom to top
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let ncols = self.columns.len();
        let c = self.columns.iter().position(|n| n == name)?;
        Some(self.values.iter().skip(c).step_by(ncols).copied().collect())
    }

    /// Every column at one level
    pub fn level(&self, iz: usize) -> Option<&[f64]> {
        let ncols = self.columns.len();
        self.values.get(iz * ncols..(iz + 1) * ncols)
    }
}

/// Fixed-size prefix of a snapshot file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotHeader {
    /// Resolved encoding
    pub encoding: Encoding,
    /// Snapshot number
    pub isnap: u32,
    /// Step this snapshot was taken at
    pub istep: u32,
    /// Dimensionless time
    pub time: f64,
    /// Grid shape
    pub geometry: Geometry,
    /// Number of field blocks that follow
    pub nfields: u32,
}

/// One field sampled on the grid, components interleaved per point
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field name
    pub name: String,
    /// 1 for scalars, 3 for vectors, ...
    pub components: u32,
    /// `cells * components` samples
    pub values: Vec<f64>,
}

impl Field {
    /// Samples of one component, in grid order
    pub fn component(&self, c: u32) -> Option<Vec<f64>> {
        if c >= self.components {
            return None;
        }
        Some(
            self.values
                .iter()
                .skip(c as usize)
                .step_by(self.components as usize)
                .copied()
                .collect(),
        )
    }
}

/// A fully parsed snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Header
    pub header: SnapshotHeader,
    /// Fields in file order
    pub fields: Vec<Field>,
}

impl Snapshot {
    /// Field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}
