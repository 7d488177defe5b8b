use std::collections::BTreeSet;
use std::sync::{Mutex, OnceLock};

use encoding_rs::{
    Encoding, BIG5, EUC_KR, GBK, MACINTOSH, SHIFT_JIS, UTF_8, WINDOWS_1250, WINDOWS_1251,
    WINDOWS_1252, WINDOWS_1253, WINDOWS_1254, WINDOWS_1255, WINDOWS_1256, WINDOWS_1257,
    WINDOWS_1258, WINDOWS_874,
};
use thiserror::Error;

use super::bytes::{read_u16, read_u32, read_u8, Truncated};
use super::BiffVersion;

// BIFF8 string option flags (XLUnicodeString / XLUnicodeRichExtendedString).
pub(crate) const STR_FLAG_HIGH_BYTE: u8 = 0x01;
const STR_FLAG_EXT: u8 = 0x04;
const STR_FLAG_RICH_TEXT: u8 = 0x08;

/// Codepage assumed until a CODEPAGE record says otherwise.
pub(crate) const DEFAULT_CODEPAGE: u16 = 1252;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StringError {
    #[error(transparent)]
    Truncated(#[from] Truncated),
    #[error("string continuation split mid-character at offset {0}")]
    SplitMidCharacter(usize),
    #[error("missing string terminator")]
    MissingTerminator,
}

pub(crate) fn encoding_for_codepage(codepage: u16) -> Option<&'static Encoding> {
    Some(match codepage as u32 {
        874 => WINDOWS_874,
        932 => SHIFT_JIS,
        936 => GBK,
        949 => EUC_KR,
        950 => BIG5,
        1250 => WINDOWS_1250,
        1251 => WINDOWS_1251,
        // 367 (US-ASCII) and 32769 (the BIFF "Windows 1252" alias) decode as 1252.
        367 | 1252 | 32769 => WINDOWS_1252,
        1253 => WINDOWS_1253,
        1254 => WINDOWS_1254,
        1255 => WINDOWS_1255,
        1256 => WINDOWS_1256,
        1257 => WINDOWS_1257,
        1258 => WINDOWS_1258,
        10000 | 32768 => MACINTOSH,
        65001 => UTF_8,
        _ => return None,
    })
}

pub(crate) fn decode_ansi(codepage: u16, bytes: &[u8]) -> String {
    if let Some(encoding) = encoding_for_codepage(codepage) {
        let (cow, _, _) = encoding.decode(bytes);
        return cow.into_owned();
    }

    warn_unsupported_codepage(codepage);
    bytes.iter().copied().map(char::from).collect()
}

fn warn_unsupported_codepage(codepage: u16) {
    static WARNED: OnceLock<Mutex<BTreeSet<u16>>> = OnceLock::new();

    let warned = WARNED.get_or_init(|| Mutex::new(BTreeSet::new()));
    let mut warned = match warned.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    if warned.insert(codepage) {
        log::warn!("unsupported CODEPAGE {codepage}; decoding 8-bit strings byte-for-byte");
    }
}

/// Width of a string's character-count prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LengthPrefix {
    U8,
    U16,
}

impl LengthPrefix {
    fn read(self, input: &[u8], offset: usize) -> Result<(usize, usize), Truncated> {
        let value = match self {
            LengthPrefix::U8 => read_u8(input, offset).map(usize::from),
            LengthPrefix::U16 => read_u16(input, offset).map(usize::from),
        };
        let width = match self {
            LengthPrefix::U8 => 1,
            LengthPrefix::U16 => 2,
        };
        value.map(|v| (v, width)).ok_or(Truncated {
            offset,
            needed: width,
            available: input.len().saturating_sub(offset),
        })
    }
}

/// Length-prefixed 8-bit string decoded through `codepage`.
///
/// Returns the text and the number of bytes consumed.
pub(crate) fn read_byte_string(
    input: &[u8],
    prefix: LengthPrefix,
    codepage: u16,
) -> Result<(String, usize), StringError> {
    let (len, width) = prefix.read(input, 0)?;
    let bytes = input.get(width..width + len).ok_or(Truncated {
        offset: width,
        needed: len,
        available: input.len().saturating_sub(width),
    })?;
    Ok((decode_ansi(codepage, bytes), width + len))
}

/// UTF-16LE code units up to (and consuming) a zero unit.
pub(crate) fn read_terminated_unicode_chars(input: &[u8]) -> Result<(String, usize), StringError> {
    let mut units = Vec::new();
    let mut offset = 0usize;
    loop {
        let unit = read_u16(input, offset).ok_or(StringError::MissingTerminator)?;
        offset += 2;
        if unit == 0 {
            break;
        }
        units.push(unit);
    }
    Ok((String::from_utf16_lossy(&units), offset))
}

/// Formatting run of a rich string: characters from `char_index` on use font `font_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FormatRun {
    pub(crate) char_index: u16,
    pub(crate) font_index: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct UnicodeString {
    pub(crate) text: String,
    pub(crate) runs: Vec<FormatRun>,
    /// Bytes consumed, including any flag bytes re-read at CONTINUE boundaries.
    pub(crate) size: usize,
}

/// BIFF8 unicode string (`XLUnicodeRichExtendedString` and its plain variants) at `offset`.
///
/// `continue_positions` are the offsets in `data` where CONTINUE fragments start. When the
/// character array crosses one of them with characters left to read, the fragment starts with a
/// fresh flags byte that may switch between 8-bit and 16-bit characters.
pub(crate) fn read_unicode_string(
    data: &[u8],
    offset: usize,
    prefix: LengthPrefix,
    continue_positions: &[usize],
) -> Result<UnicodeString, StringError> {
    let (cch, width) = prefix.read(data, offset)?;
    let mut cursor = ContinueCursor::new(data, offset + width, continue_positions);
    let flags = cursor.u8()?;

    let run_count = if flags & STR_FLAG_RICH_TEXT != 0 {
        cursor.u16()? as usize
    } else {
        0
    };
    let ext_size = if flags & STR_FLAG_EXT != 0 {
        cursor.u32()? as usize
    } else {
        0
    };

    let text = cursor.chars(cch, flags & STR_FLAG_HIGH_BYTE != 0)?;

    let mut runs = Vec::new();
    for _ in 0..run_count {
        let char_index = cursor.u16()?;
        let font_index = cursor.u16()?;
        if (char_index as usize) < cch {
            runs.push(FormatRun {
                char_index,
                font_index,
            });
        }
    }
    cursor.skip(ext_size)?;

    Ok(UnicodeString {
        text,
        runs,
        size: cursor.pos - offset,
    })
}

/// Flags byte followed by `cch` characters (`XLUnicodeStringNoCch`).
pub(crate) fn read_unicode_chars(
    data: &[u8],
    offset: usize,
    cch: usize,
    continue_positions: &[usize],
) -> Result<(String, usize), StringError> {
    let mut cursor = ContinueCursor::new(data, offset, continue_positions);
    let flags = cursor.u8()?;
    let text = cursor.chars(cch, flags & STR_FLAG_HIGH_BYTE != 0)?;
    Ok((text, cursor.pos - offset))
}

/// 8-bit-length string: `ShortXLUnicodeString` in BIFF8, an ANSI byte string in BIFF5.
pub(crate) fn read_short_string(
    input: &[u8],
    version: BiffVersion,
    codepage: u16,
) -> Result<(String, usize), StringError> {
    match version {
        BiffVersion::Biff5 => read_byte_string(input, LengthPrefix::U8, codepage),
        BiffVersion::Biff8 => read_unicode_string(input, 0, LengthPrefix::U8, &[])
            .map(|s| (s.text, s.size)),
    }
}

/// 16-bit-length string: `XLUnicodeString` in BIFF8, an ANSI byte string in BIFF5.
pub(crate) fn read_long_string(
    input: &[u8],
    version: BiffVersion,
    codepage: u16,
) -> Result<(String, usize), StringError> {
    match version {
        BiffVersion::Biff5 => read_byte_string(input, LengthPrefix::U16, codepage),
        BiffVersion::Biff8 => read_unicode_string(input, 0, LengthPrefix::U16, &[])
            .map(|s| (s.text, s.size)),
    }
}

/// Cursor over a CONTINUE-merged payload that knows where the physical fragments began.
struct ContinueCursor<'a> {
    data: &'a [u8],
    pos: usize,
    boundaries: &'a [usize],
}

impl<'a> ContinueCursor<'a> {
    fn new(data: &'a [u8], pos: usize, boundaries: &'a [usize]) -> Self {
        Self {
            data,
            pos,
            boundaries,
        }
    }

    fn is_boundary(&self, pos: usize) -> bool {
        self.boundaries.binary_search(&pos).is_ok()
    }

    fn truncated(&self, needed: usize) -> Truncated {
        Truncated {
            offset: self.pos,
            needed,
            available: self.data.len().saturating_sub(self.pos),
        }
    }

    fn u8(&mut self) -> Result<u8, Truncated> {
        let v = read_u8(self.data, self.pos).ok_or_else(|| self.truncated(1))?;
        self.pos += 1;
        Ok(v)
    }

    fn u16(&mut self) -> Result<u16, Truncated> {
        let v = read_u16(self.data, self.pos).ok_or_else(|| self.truncated(2))?;
        self.pos += 2;
        Ok(v)
    }

    fn u32(&mut self) -> Result<u32, Truncated> {
        let v = read_u32(self.data, self.pos).ok_or_else(|| self.truncated(4))?;
        self.pos += 4;
        Ok(v)
    }

    fn skip(&mut self, n: usize) -> Result<(), Truncated> {
        match self.pos.checked_add(n) {
            Some(end) if end <= self.data.len() => {
                self.pos = end;
                Ok(())
            }
            _ => Err(self.truncated(n)),
        }
    }

    fn chars(&mut self, cch: usize, mut unicode: bool) -> Result<String, StringError> {
        // Never trust `cch` for the allocation; the payload bounds the real count.
        let mut units: Vec<u16> = Vec::with_capacity(cch.min(self.data.len()));
        for _ in 0..cch {
            if self.is_boundary(self.pos) {
                unicode = self.u8()? & STR_FLAG_HIGH_BYTE != 0;
            }
            if unicode {
                if self.is_boundary(self.pos + 1) {
                    return Err(StringError::SplitMidCharacter(self.pos));
                }
                units.push(self.u16()?);
            } else {
                units.push(u16::from(self.u8()?));
            }
        }
        Ok(String::from_utf16_lossy(&units))
    }
}
