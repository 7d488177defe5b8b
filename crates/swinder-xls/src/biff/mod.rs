//! BIFF record-stream decoding.
//!
//! Layers, leaf first: [`bytes`] and [`strings`] decode fields from a single payload, [`records`]
//! frames the physical stream into logical records (CONTINUE merging and decryption),
//! [`encryption`] handles FILEPASS, and the parsers under `parsers` turn payloads into the typed
//! [`registry::Record`] values the substream handlers consume.

use std::io::{Cursor, Read, Seek};

pub(crate) mod bytes;
pub(crate) mod encryption;
pub(crate) mod formula;
pub(crate) mod records;
pub(crate) mod registry;
pub(crate) mod strings;

pub(crate) mod parsers;

pub use bytes::{decode_rk, RkValue, Truncated};
pub use encryption::DecryptError;
pub use records::FramingError;
pub use strings::StringError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BiffVersion {
    /// BIFF5/BIFF7 (Excel 5.0 to 95): 8-bit codepage strings.
    Biff5,
    /// BIFF8 (Excel 97 to 2003): unicode strings, SST, 16-bit column fields.
    Biff8,
}

// BIFF version numbers stored in the BOF record payload.
const BOF_VERSION_BIFF5: u16 = 0x0500;
const BOF_VERSION_BIFF8: u16 = 0x0600;
// BOF substream type used to guess BIFF5 when the version field is zero.
const BOF_DT_WORKSHEET: u16 = 0x0010;

const CFB_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// True when `bytes` start with the OLE2 compound file signature.
pub(crate) fn is_compound_file(bytes: &[u8]) -> bool {
    bytes.starts_with(&CFB_SIGNATURE)
}

/// Extract the workbook stream from an in-memory compound file.
pub(crate) fn read_workbook_stream_from_bytes(bytes: &[u8]) -> Result<Vec<u8>, crate::LoadError> {
    let mut comp = cfb::CompoundFile::open(Cursor::new(bytes)).map_err(crate::LoadError::Cfb)?;
    read_workbook_stream(&mut comp)
}

pub(crate) fn read_workbook_stream<R: Read + Seek>(
    comp: &mut cfb::CompoundFile<R>,
) -> Result<Vec<u8>, crate::LoadError> {
    let mut stream = open_xls_workbook_stream(comp)?;
    let mut workbook_stream = Vec::new();
    stream.read_to_end(&mut workbook_stream)?;
    Ok(workbook_stream)
}

fn open_xls_workbook_stream<R: Read + Seek>(
    comp: &mut cfb::CompoundFile<R>,
) -> Result<cfb::Stream<R>, crate::LoadError> {
    for candidate in ["/Workbook", "/Book", "Workbook", "Book"] {
        if let Ok(stream) = comp.open_stream(candidate) {
            return Ok(stream);
        }
    }
    Err(crate::LoadError::MissingWorkbookStream)
}

/// BIFF version declared by a BOF payload, or `None` when the version field is unrecognized.
pub(crate) fn bof_version(record_id: u16, data: &[u8]) -> Option<BiffVersion> {
    let version = bytes::read_u16(data, 0)?;
    let dt = bytes::read_u16(data, 2).unwrap_or(0);
    match (record_id, version) {
        (_, BOF_VERSION_BIFF8) => Some(BiffVersion::Biff8),
        (_, BOF_VERSION_BIFF5) => Some(BiffVersion::Biff5),
        (records::RECORD_BOF_BIFF5, 0) if dt == BOF_DT_WORKSHEET => Some(BiffVersion::Biff5),
        _ => None,
    }
}

/// Detect the BIFF version from the stream's leading BOF record.
///
/// Returns `None` when the stream does not start with a BOF.
pub(crate) fn detect_biff_version(workbook_stream: &[u8]) -> Option<BiffVersion> {
    let (record_id, data) = records::read_biff_record(workbook_stream, 0)?;
    if !records::is_bof_record(record_id) {
        return None;
    }
    Some(match bof_version(record_id, data) {
        Some(version) => version,
        None if record_id == records::RECORD_BOF_BIFF5 => BiffVersion::Biff5,
        None => BiffVersion::Biff8,
    })
}
