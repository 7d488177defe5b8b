//! Payload parsers, one function per record type.
//!
//! Parsers read from an already framed (CONTINUE-merged, decrypted) payload and return a typed
//! value or a [`RecordError`]; the registry turns errors into `Record::Malformed`.

use thiserror::Error;

use super::bytes::{ByteReader, Truncated};
use super::strings::StringError;
use super::BiffVersion;

pub(crate) mod cells;
pub(crate) mod chart;
pub(crate) mod externals;
pub(crate) mod globals;
pub(crate) mod sheet;
pub(crate) mod sst;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum RecordError {
    #[error(transparent)]
    Truncated(#[from] Truncated),
    #[error(transparent)]
    String(#[from] StringError),
    #[error("{0}")]
    Invalid(String),
}

/// Per-stream state a parser may need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DecodeContext {
    pub(crate) version: BiffVersion,
    pub(crate) codepage: u16,
}

impl DecodeContext {
    pub(crate) fn new(version: BiffVersion) -> Self {
        Self {
            version,
            codepage: super::strings::DEFAULT_CODEPAGE,
        }
    }

    pub(crate) fn is_biff8(&self) -> bool {
        self.version == BiffVersion::Biff8
    }
}

/// Row, column and XF index shared by every cell record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CellHeader {
    pub(crate) row: u16,
    pub(crate) column: u16,
    pub(crate) xf: u16,
}

impl CellHeader {
    pub(crate) fn read(r: &mut ByteReader<'_>) -> Result<Self, Truncated> {
        Ok(Self {
            row: r.u16()?,
            column: r.u16()?,
            xf: r.u16()?,
        })
    }
}

/// Inclusive cell rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CellRange {
    pub(crate) first_row: u16,
    pub(crate) last_row: u16,
    pub(crate) first_column: u16,
    pub(crate) last_column: u16,
}

impl CellRange {
    /// `Ref8U`: four u16 fields.
    pub(crate) fn read_ref8(r: &mut ByteReader<'_>) -> Result<Self, Truncated> {
        Ok(Self {
            first_row: r.u16()?,
            last_row: r.u16()?,
            first_column: r.u16()?,
            last_column: r.u16()?,
        })
    }

    /// `RefU`: u16 rows, u8 columns.
    pub(crate) fn read_ref_u(r: &mut ByteReader<'_>) -> Result<Self, Truncated> {
        Ok(Self {
            first_row: r.u16()?,
            last_row: r.u16()?,
            first_column: r.u8()? as u16,
            last_column: r.u8()? as u16,
        })
    }

    pub(crate) fn contains(&self, row: u16, column: u16) -> bool {
        (self.first_row..=self.last_row).contains(&row)
            && (self.first_column..=self.last_column).contains(&column)
    }
}

/// Formula token bytes (`rgce`) plus trailing extra data (`rgcb`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FormulaBytes {
    pub(crate) rgce: Vec<u8>,
    pub(crate) rgcb: Vec<u8>,
}

impl FormulaBytes {
    /// `cce` token bytes followed by everything left in the payload as `rgcb`.
    pub(crate) fn read(r: &mut ByteReader<'_>, cce: usize) -> Result<Self, Truncated> {
        let rgce = r.bytes(cce)?.to_vec();
        let rgcb = r.rest().to_vec();
        Ok(Self { rgce, rgcb })
    }
}
