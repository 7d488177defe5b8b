//! External references and defined names: SUPBOOK (EXTERNBOOK), EXTERNSHEET, EXTERNNAME, NAME.

use super::super::bytes::ByteReader;
use super::super::strings::{
    decode_ansi, read_byte_string, read_short_string, read_unicode_chars, read_unicode_string,
    LengthPrefix,
};
use super::super::BiffVersion;
use super::{DecodeContext, FormulaBytes, RecordError};

// SUPBOOK.cch markers.
const SUPBOOK_SELF: u16 = 0x0401;
const SUPBOOK_ADDIN: u16 = 0x3A01;

/// One SUPBOOK record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExternBook {
    /// References into this workbook.
    Internal { sheet_count: u16 },
    AddIn,
    External { path: String, sheets: Vec<String> },
}

/// Turn an encoded `VirtualPath` into something printable: the encoding markers are dropped and
/// the directory marker becomes a backslash.
fn clean_virtual_path(raw: &str) -> String {
    raw.chars()
        .filter_map(|c| match c {
            '\u{3}' => Some('\\'),
            c if (c as u32) < 0x20 => None,
            c => Some(c),
        })
        .collect()
}

pub(crate) fn parse_supbook(
    data: &[u8],
    continue_positions: &[usize],
) -> Result<ExternBook, RecordError> {
    let mut r = ByteReader::new(data);
    let sheet_count = r.u16()?;
    let cch = r.u16()?;
    match cch {
        SUPBOOK_SELF => return Ok(ExternBook::Internal { sheet_count }),
        SUPBOOK_ADDIN => return Ok(ExternBook::AddIn),
        _ => {}
    }

    let (raw_path, consumed) = read_unicode_chars(data, r.pos(), cch as usize, continue_positions)?;
    let mut offset = r.pos() + consumed;
    let mut sheets = Vec::with_capacity((sheet_count as usize).min(data.len() / 3));
    for _ in 0..sheet_count {
        let name = read_unicode_string(data, offset, LengthPrefix::U16, continue_positions)?;
        offset += name.size;
        sheets.push(name.text);
    }

    Ok(ExternBook::External {
        path: clean_virtual_path(&raw_path),
        sheets,
    })
}

/// `XTI` entry of a BIFF8 EXTERNSHEET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Xti {
    pub(crate) book: u16,
    pub(crate) first_sheet: i16,
    pub(crate) last_sheet: i16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExternSheet {
    /// BIFF8: one record carries the whole table.
    Biff8(Vec<Xti>),
    /// BIFF5: one record per referenced sheet.
    Biff5 { name: String, self_ref: bool },
}

pub(crate) fn parse_externsheet(data: &[u8], ctx: DecodeContext) -> Result<ExternSheet, RecordError> {
    match ctx.version {
        BiffVersion::Biff8 => {
            let mut r = ByteReader::new(data);
            let count = r.u16()? as usize;
            let mut entries = Vec::with_capacity(count.min(r.remaining() / 6));
            for _ in 0..count {
                entries.push(Xti {
                    book: r.u16()?,
                    first_sheet: r.i16()?,
                    last_sheet: r.i16()?,
                });
            }
            Ok(ExternSheet::Biff8(entries))
        }
        BiffVersion::Biff5 => {
            let (raw, _) = read_byte_string(data, LengthPrefix::U8, ctx.codepage)?;
            let mut chars = raw.chars();
            let (name, self_ref) = match chars.next() {
                // Same-workbook sheet reference.
                Some('\u{3}') => (chars.as_str().to_string(), false),
                // The workbook itself.
                Some('\u{4}') => (String::new(), true),
                // Encoded document name.
                Some('\u{1}') | Some('\u{2}') => (clean_virtual_path(chars.as_str()), false),
                _ => (raw.clone(), false),
            };
            Ok(ExternSheet::Biff5 { name, self_ref })
        }
    }
}

pub(crate) fn parse_externname(data: &[u8], ctx: DecodeContext) -> Result<String, RecordError> {
    let r = ByteReader::at(data, 6);
    let (name, _) = read_short_string(r.rest(), ctx.version, ctx.codepage)?;
    Ok(name)
}

const NAME_HIDDEN: u16 = 0x0001;
const NAME_BUILTIN: u16 = 0x0020;

const BUILTIN_NAMES: [&str; 14] = [
    "Consolidate_Area",
    "Auto_Open",
    "Auto_Close",
    "Extract",
    "Database",
    "Criteria",
    "Print_Area",
    "Print_Titles",
    "Recorder",
    "Data_Form",
    "Auto_Activate",
    "Auto_Deactivate",
    "Sheet_Title",
    "_FilterDatabase",
];

/// Display name of a builtin defined name.
pub(crate) fn builtin_name(code: u16) -> Option<&'static str> {
    BUILTIN_NAMES.get(code as usize).copied()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DefinedName {
    pub(crate) name: String,
    pub(crate) builtin: bool,
    pub(crate) hidden: bool,
    /// One-based sheet index for sheet-scoped names, zero for workbook scope.
    pub(crate) sheet: u16,
    pub(crate) formula: FormulaBytes,
}

pub(crate) fn parse_name(
    data: &[u8],
    ctx: DecodeContext,
    continue_positions: &[usize],
) -> Result<DefinedName, RecordError> {
    let mut r = ByteReader::new(data);
    let flags = r.u16()?;
    let _shortcut = r.u8()?;
    let cch = r.u8()? as usize;
    let cce = r.u16()? as usize;
    let _ixals = r.u16()?;
    let sheet = r.u16()?;
    r.skip(4)?;

    let builtin = flags & NAME_BUILTIN != 0;
    let raw_name = match ctx.version {
        BiffVersion::Biff8 => {
            let (text, consumed) = read_unicode_chars(data, r.pos(), cch, continue_positions)?;
            r.skip(consumed)?;
            text
        }
        BiffVersion::Biff5 => decode_ansi(ctx.codepage, r.bytes(cch)?),
    };

    let name = if builtin {
        match raw_name.chars().next().map(|c| c as u16).and_then(builtin_name) {
            Some(name) => name.to_string(),
            None => raw_name,
        }
    } else {
        match raw_name.strip_prefix("_xlfn.") {
            Some(stripped) => stripped.to_string(),
            None => raw_name,
        }
    };

    let formula = FormulaBytes::read(&mut r, cce)?;
    Ok(DefinedName {
        name,
        builtin,
        hidden: flags & NAME_HIDDEN != 0,
        sheet,
        formula,
    })
}
