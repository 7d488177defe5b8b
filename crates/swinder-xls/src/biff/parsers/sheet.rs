//! Worksheet metadata records: sizes, margins, header/footer, merges, hyperlinks, notes and the
//! drawing objects notes hang off.

use swinder_model::Hyperlink;

use super::super::bytes::{read_u16, read_u32, ByteReader};
use super::super::strings::{
    decode_ansi, read_long_string, read_short_string, read_unicode_chars, read_unicode_string,
    LengthPrefix,
};
use super::super::BiffVersion;
use super::{CellRange, DecodeContext, RecordError};

/// ROW: row height and default format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RowInfo {
    pub(crate) row: u16,
    /// Height in points.
    pub(crate) height: f64,
    pub(crate) hidden: bool,
    /// Set when the row carries its own XF.
    pub(crate) xf: Option<u16>,
}

const ROW_HIDDEN: u16 = 0x0020;
const ROW_HAS_FORMAT: u16 = 0x0080;

pub(crate) fn parse_row(data: &[u8]) -> Result<RowInfo, RecordError> {
    let mut r = ByteReader::new(data);
    let row = r.u16()?;
    let _first_column = r.u16()?;
    let _last_column = r.u16()?;
    let height = r.u16()? & 0x7FFF;
    r.skip(4)?;
    let flags = r.u16()?;
    let xf = if flags & ROW_HAS_FORMAT != 0 {
        Some(r.u16()? & 0x0FFF)
    } else {
        None
    };
    Ok(RowInfo {
        row,
        height: f64::from(height) / 20.0,
        hidden: flags & ROW_HIDDEN != 0,
        xf,
    })
}

/// COLINFO: width and format for a run of columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ColumnInfo {
    pub(crate) first_column: u16,
    pub(crate) last_column: u16,
    /// Width in characters.
    pub(crate) width: f64,
    pub(crate) xf: u16,
    pub(crate) hidden: bool,
}

pub(crate) fn parse_colinfo(data: &[u8]) -> Result<ColumnInfo, RecordError> {
    let mut r = ByteReader::new(data);
    let first_column = r.u16()?;
    let last_column = r.u16()?;
    let width = r.u16()?;
    let xf = r.u16()?;
    let flags = r.u16()?;
    if last_column < first_column {
        return Err(RecordError::Invalid(format!(
            "COLINFO range {first_column}..={last_column} is inverted"
        )));
    }
    Ok(ColumnInfo {
        first_column,
        last_column,
        width: f64::from(width) / 256.0,
        xf,
        hidden: flags & 0x0001 != 0,
    })
}

/// DEFAULTROWHEIGHT, in points.
pub(crate) fn parse_default_row_height(data: &[u8]) -> Result<f64, RecordError> {
    let mut r = ByteReader::at(data, 2);
    Ok(f64::from(r.u16()?) / 20.0)
}

/// LEFTMARGIN and friends store inches; the model uses points.
pub(crate) fn parse_margin(data: &[u8]) -> Result<f64, RecordError> {
    Ok(ByteReader::new(data).f64()? * 72.0)
}

/// HEADER / FOOTER. An empty payload means the sheet has none.
pub(crate) fn parse_header_footer(
    data: &[u8],
    ctx: DecodeContext,
) -> Result<Option<String>, RecordError> {
    if data.is_empty() {
        return Ok(None);
    }
    let (text, _) = match ctx.version {
        BiffVersion::Biff8 => read_long_string(data, ctx.version, ctx.codepage)?,
        BiffVersion::Biff5 => read_short_string(data, ctx.version, ctx.codepage)?,
    };
    Ok(Some(text))
}

pub(crate) fn parse_merged_cells(data: &[u8]) -> Result<Vec<CellRange>, RecordError> {
    let mut r = ByteReader::new(data);
    let count = r.u16()? as usize;
    let mut ranges = Vec::with_capacity(count.min(r.remaining() / 8));
    for _ in 0..count {
        ranges.push(CellRange::read_ref8(&mut r)?);
    }
    Ok(ranges)
}

// Hyperlink object flags.
const HLINK_HAS_MONIKER: u32 = 0x0000_0001;
const HLINK_HAS_LOCATION: u32 = 0x0000_0008;
const HLINK_HAS_DISPLAY: u32 = 0x0000_0010;
const HLINK_HAS_GUID: u32 = 0x0000_0020;
const HLINK_HAS_CREATION_TIME: u32 = 0x0000_0040;
const HLINK_HAS_FRAME: u32 = 0x0000_0080;
const HLINK_MONIKER_AS_STRING: u32 = 0x0000_0100;

// Stored with the first three GUID fields little-endian.
const CLSID_URL_MONIKER: [u8; 16] = [
    0xE0, 0xC9, 0xEA, 0x79, 0xF9, 0xBA, 0xCE, 0x11, 0x8C, 0x82, 0x00, 0xAA, 0x00, 0x4B, 0xA9, 0x0B,
];
const CLSID_FILE_MONIKER: [u8; 16] = [
    0x03, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
];

const MAX_HLINK_CHARS: usize = 1_000_000;

/// HLINK: a hyperlink over a cell range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HyperlinkRecord {
    pub(crate) range: CellRange,
    pub(crate) link: Hyperlink,
}

pub(crate) fn parse_hlink(data: &[u8], ctx: DecodeContext) -> Result<HyperlinkRecord, RecordError> {
    let mut r = ByteReader::new(data);
    let range = CellRange::read_ref8(&mut r)?;
    // hlinkClsid
    r.skip(16)?;
    let _stream_version = r.u32()?;
    let flags = r.u32()?;

    let mut link = Hyperlink::default();
    if flags & HLINK_HAS_DISPLAY != 0 {
        link.display = non_empty(hyperlink_string(&mut r)?);
    }
    if flags & HLINK_HAS_FRAME != 0 {
        hyperlink_string(&mut r)?;
    }
    if flags & HLINK_HAS_MONIKER != 0 {
        link.target = if flags & HLINK_MONIKER_AS_STRING != 0 {
            non_empty(hyperlink_string(&mut r)?)
        } else {
            moniker(&mut r, ctx.codepage)?
        };
    }
    if flags & HLINK_HAS_LOCATION != 0 {
        link.location = non_empty(hyperlink_string(&mut r)?);
    }
    if flags & HLINK_HAS_GUID != 0 {
        r.skip(16)?;
    }
    if flags & HLINK_HAS_CREATION_TIME != 0 {
        r.skip(8)?;
    }

    if link.target.is_none() && link.location.is_none() {
        return Err(RecordError::Invalid(
            "HLINK record is missing target information".to_string(),
        ));
    }
    Ok(HyperlinkRecord { range, link })
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

fn trim_at_nul(mut s: String) -> String {
    if let Some(idx) = s.find('\0') {
        s.truncate(idx);
    }
    s
}

fn utf16(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    trim_at_nul(String::from_utf16_lossy(&units))
}

/// `HyperlinkString`: u32 character count (including the terminator) then UTF-16LE.
fn hyperlink_string(r: &mut ByteReader<'_>) -> Result<String, RecordError> {
    let cch = r.u32()? as usize;
    if cch > MAX_HLINK_CHARS {
        return Err(RecordError::Invalid(format!(
            "implausible hyperlink string length {cch}"
        )));
    }
    Ok(utf16(r.bytes(cch * 2)?))
}

fn moniker(r: &mut ByteReader<'_>, codepage: u16) -> Result<Option<String>, RecordError> {
    let clsid = r.bytes(16)?;
    if clsid == CLSID_URL_MONIKER {
        // Byte length; may include trailing serialization data after the terminated URL.
        let len = r.u32()? as usize;
        if len > MAX_HLINK_CHARS * 2 {
            return Err(RecordError::Invalid(format!("implausible URL moniker length {len}")));
        }
        return Ok(non_empty(utf16(r.bytes(len)?)));
    }
    if clsid == CLSID_FILE_MONIKER {
        return file_moniker(r, codepage).map(non_empty);
    }
    Err(RecordError::Invalid(format!(
        "unsupported hyperlink moniker CLSID {clsid:02X?}"
    )))
}

fn file_moniker(r: &mut ByteReader<'_>, codepage: u16) -> Result<String, RecordError> {
    let up_levels = r.u16()? as usize;
    let ansi_len = r.u32()? as usize;
    let ansi_bytes = r.bytes(ansi_len)?;
    let nul = ansi_bytes.iter().position(|b| *b == 0).unwrap_or(ansi_bytes.len());
    let mut path = decode_ansi(codepage, &ansi_bytes[..nul]);

    let _end_server = r.u16()?;
    let _version = r.u16()?;
    r.skip(20)?;
    let unicode_size = r.u32()? as usize;
    if unicode_size > 0 {
        let byte_len = r.u32()? as usize;
        let _key = r.u16()?;
        if byte_len > MAX_HLINK_CHARS * 2 {
            return Err(RecordError::Invalid(format!(
                "implausible file moniker path length {byte_len}"
            )));
        }
        let unicode = utf16(r.bytes(byte_len)?);
        if !unicode.is_empty() {
            path = unicode;
        }
    }

    Ok(format!("{}{}", "..\\".repeat(up_levels.min(256)), path))
}

/// NOTE. BIFF8 notes point at an OBJ/TXO pair; BIFF5 notes carry their text inline, and a row of
/// `0xFFFF` marks a continuation of the previous note's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Note {
    Object {
        row: u16,
        column: u16,
        object_id: u16,
        author: String,
    },
    Text {
        row: u16,
        column: u16,
        text: String,
    },
    Continuation {
        text: String,
    },
}

pub(crate) fn parse_note(data: &[u8], ctx: DecodeContext) -> Result<Note, RecordError> {
    let mut r = ByteReader::new(data);
    let row = r.u16()?;
    let column = r.u16()?;
    match ctx.version {
        BiffVersion::Biff8 => {
            let _flags = r.u16()?;
            let object_id = r.u16()?;
            // Some writers leave the author out entirely.
            let author = match read_unicode_string(data, r.pos(), LengthPrefix::U16, &[]) {
                Ok(s) => s.text,
                Err(_) => String::new(),
            };
            Ok(Note::Object {
                row,
                column,
                object_id,
                author,
            })
        }
        BiffVersion::Biff5 => {
            let cch = r.u16()? as usize;
            let available = r.remaining();
            let text = decode_ansi(ctx.codepage, r.bytes(cch.min(available))?);
            if row == 0xFFFF {
                Ok(Note::Continuation { text })
            } else {
                Ok(Note::Text { row, column, text })
            }
        }
    }
}

/// Object type of a comment box.
pub(crate) const OBJ_KIND_NOTE: u16 = 0x0019;

/// OBJ: only the leading `ftCmo` sub-record matters here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Obj {
    pub(crate) kind: u16,
    pub(crate) id: u16,
}

pub(crate) fn parse_obj(data: &[u8]) -> Result<Obj, RecordError> {
    let mut r = ByteReader::new(data);
    let ft = r.u16()?;
    let cb = r.u16()?;
    if ft != 0x0015 || cb != 0x0012 {
        return Err(RecordError::Invalid(format!(
            "OBJ does not start with ftCmo (ft={ft:#06x}, cb={cb:#06x})"
        )));
    }
    Ok(Obj {
        kind: r.u16()?,
        id: r.u16()?,
    })
}

/// TXO: the text of a text box or note. The characters live in the first CONTINUE fragment.
pub(crate) fn parse_txo(data: &[u8], continue_positions: &[usize]) -> Result<String, RecordError> {
    let cch = read_u16(data, 10).ok_or_else(|| {
        RecordError::Invalid(format!("TXO record too short ({} bytes)", data.len()))
    })? as usize;
    if cch == 0 {
        return Ok(String::new());
    }
    let Some((&start, rest)) = continue_positions.split_first() else {
        return Err(RecordError::Invalid(
            "TXO text is missing its CONTINUE record".to_string(),
        ));
    };
    let (text, _) = read_unicode_chars(data, start, cch, rest)?;
    Ok(text)
}

/// MSODRAWING: the Office Art container is not interpreted, only checked for a valid header.
pub(crate) fn parse_msodrawing(data: &[u8]) -> Result<usize, RecordError> {
    let rec_type = read_u16(data, 2).unwrap_or(0);
    let rec_len = read_u32(data, 4).ok_or_else(|| {
        RecordError::Invalid(format!("MSODRAWING too short ({} bytes)", data.len()))
    })?;
    if rec_type < 0xF000 {
        return Err(RecordError::Invalid(format!(
            "MSODRAWING record type {rec_type:#06x} is not an Office Art record"
        )));
    }
    Ok(rec_len as usize)
}
