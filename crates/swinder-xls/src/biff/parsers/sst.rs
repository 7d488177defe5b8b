//! Shared string table (SST).

use super::super::bytes::ByteReader;
use super::super::strings::{read_unicode_string, LengthPrefix, UnicodeString};
use super::RecordError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SharedStrings {
    /// `cstTotal`: references to the table across the workbook.
    pub(crate) total: u32,
    pub(crate) strings: Vec<UnicodeString>,
    /// Set when the payload ended before `cstUnique` strings were read.
    pub(crate) truncated: bool,
}

/// Parse an SST payload. A string cut short by the end of the record ends the table; the strings
/// read so far are kept.
pub(crate) fn parse_sst(data: &[u8], continue_positions: &[usize]) -> Result<SharedStrings, RecordError> {
    let mut r = ByteReader::new(data);
    let total = r.u32()?;
    let unique = r.u32()? as usize;

    // Each string takes at least three bytes; never trust `cstUnique` for the allocation.
    let mut strings = Vec::with_capacity(unique.min(r.remaining() / 3));
    let mut offset = r.pos();
    let mut truncated = false;
    for index in 0..unique {
        match read_unicode_string(data, offset, LengthPrefix::U16, continue_positions) {
            Ok(s) => {
                offset += s.size;
                strings.push(s);
            }
            Err(err) => {
                log::warn!("SST truncated at string {index} of {unique}: {err}");
                truncated = true;
                break;
            }
        }
    }

    Ok(SharedStrings {
        total,
        strings,
        truncated,
    })
}
