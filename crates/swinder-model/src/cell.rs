use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::CellValue;

/// Maximum addressable rows per sheet (1,048,576).
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum addressable columns per sheet (32,768).
pub const MAX_COLUMNS: u32 = 32_768;

const COL_BITS: u32 = 15; // 2^15 = 32,768 columns.
const COL_MASK: u64 = (1u64 << COL_BITS) - 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellKeyError {
    #[error("row out of bounds: {0}")]
    RowOutOfBounds(u32),
    #[error("column out of bounds: {0}")]
    ColumnOutOfBounds(u32),
}

/// Compact key used for sparse cell storage.
///
/// The key is a packed `(row, column)` pair:
///
/// ```text
/// key = (row << 15) | column
/// ```
///
/// Keys order row-major, so iterating a sheet's cell map visits cells the way they appear in
/// the record stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(transparent)]
pub struct CellKey(u64);

impl CellKey {
    /// Encode a `(row, column)` coordinate.
    pub fn try_new(row: u32, column: u32) -> Result<Self, CellKeyError> {
        if row >= MAX_ROWS {
            return Err(CellKeyError::RowOutOfBounds(row));
        }
        if column >= MAX_COLUMNS {
            return Err(CellKeyError::ColumnOutOfBounds(column));
        }
        Ok(Self(((row as u64) << COL_BITS) | (column as u64)))
    }

    /// Like [`CellKey::try_new`], panicking on out-of-bounds coordinates.
    #[inline]
    pub fn new(row: u32, column: u32) -> Self {
        match Self::try_new(row, column) {
            Ok(key) => key,
            Err(err) => panic!("{err}"),
        }
    }

    #[inline]
    pub const fn row(self) -> u32 {
        (self.0 >> COL_BITS) as u32
    }

    #[inline]
    pub const fn column(self) -> u32 {
        (self.0 & COL_MASK) as u32
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl<'de> Deserialize<'de> for CellKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = u64::deserialize(deserializer)?;
        let row = raw >> COL_BITS;
        if row >= MAX_ROWS as u64 {
            return Err(D::Error::custom(format!("CellKey row out of bounds: {row}")));
        }
        Ok(CellKey(raw))
    }
}

impl From<CellKey> for u64 {
    fn from(value: CellKey) -> Self {
        value.0
    }
}

/// Target of a hyperlink attached to a cell.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hyperlink {
    /// External target (URL or file path).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Location inside the target (or inside this workbook when there is no target),
    /// e.g. `Sheet2!A1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Text shown for the link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// A single cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub value: CellValue,

    /// Decoded formula text (without a leading `=`), if the cell holds a formula.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,

    /// Index into the workbook format table.
    #[serde(default)]
    pub format_id: u32,

    /// Number of columns covered when the cell anchors a merged area.
    #[serde(default = "one")]
    pub column_span: u32,

    /// Number of rows covered when the cell anchors a merged area.
    #[serde(default = "one")]
    pub row_span: u32,

    /// Set when the cell is hidden under another cell's merged area.
    #[serde(default, skip_serializing_if = "is_false")]
    pub covered: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hyperlink: Option<Hyperlink>,
}

fn one() -> u32 {
    1
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            value: CellValue::Empty,
            formula: None,
            format_id: 0,
            column_span: 1,
            row_span: 1,
            covered: false,
            note: None,
            hyperlink: None,
        }
    }
}

impl Cell {
    pub fn new(value: CellValue) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    /// Returns true if this cell carries no value, formula, format or annotation.
    pub fn is_truly_empty(&self) -> bool {
        *self == Self::default()
    }
}
