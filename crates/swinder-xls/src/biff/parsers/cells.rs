//! Cell value records.

use super::super::bytes::{decode_rk, read_u16, ByteReader, RkValue};
use super::super::strings::{read_long_string, read_unicode_string, FormatRun, LengthPrefix};
use super::super::BiffVersion;
use super::{CellHeader, CellRange, DecodeContext, FormulaBytes, RecordError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BoolErrValue {
    Boolean(bool),
    Error(u8),
}

pub(crate) fn parse_boolerr(data: &[u8]) -> Result<(CellHeader, BoolErrValue), RecordError> {
    let mut r = ByteReader::new(data);
    let cell = CellHeader::read(&mut r)?;
    let value = r.u8()?;
    let is_error = r.u8()? != 0;
    let value = if is_error {
        BoolErrValue::Error(value)
    } else {
        BoolErrValue::Boolean(value != 0)
    };
    Ok((cell, value))
}

pub(crate) fn parse_number(data: &[u8]) -> Result<(CellHeader, f64), RecordError> {
    let mut r = ByteReader::new(data);
    let cell = CellHeader::read(&mut r)?;
    Ok((cell, r.f64()?))
}

pub(crate) fn parse_rk(data: &[u8]) -> Result<(CellHeader, RkValue), RecordError> {
    let mut r = ByteReader::new(data);
    let cell = CellHeader::read(&mut r)?;
    Ok((cell, decode_rk(r.u32()?)))
}

/// MULRK: a row of RK cells. Entries are `(xf, value)` starting at `first_column`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MulRk {
    pub(crate) row: u16,
    pub(crate) first_column: u16,
    pub(crate) cells: Vec<(u16, RkValue)>,
}

pub(crate) fn parse_mulrk(data: &[u8]) -> Result<MulRk, RecordError> {
    let mut r = ByteReader::new(data);
    let row = r.u16()?;
    let first_column = r.u16()?;
    // The trailing u16 is the last column; everything in between is 6-byte RkRec entries.
    let body = r.remaining().saturating_sub(2);
    if body % 6 != 0 {
        return Err(RecordError::Invalid(format!(
            "MULRK body of {body} bytes is not a whole number of entries"
        )));
    }
    let mut cells = Vec::with_capacity(body / 6);
    for _ in 0..body / 6 {
        let xf = r.u16()?;
        cells.push((xf, decode_rk(r.u32()?)));
    }
    let last_column = r.u16()?;
    check_column_span(first_column, last_column, cells.len())?;
    Ok(MulRk {
        row,
        first_column,
        cells,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MulBlank {
    pub(crate) row: u16,
    pub(crate) first_column: u16,
    pub(crate) xfs: Vec<u16>,
}

pub(crate) fn parse_mulblank(data: &[u8]) -> Result<MulBlank, RecordError> {
    let mut r = ByteReader::new(data);
    let row = r.u16()?;
    let first_column = r.u16()?;
    let body = r.remaining().saturating_sub(2);
    let mut xfs = Vec::with_capacity(body / 2);
    for _ in 0..body / 2 {
        xfs.push(r.u16()?);
    }
    let last_column = r.u16()?;
    check_column_span(first_column, last_column, xfs.len())?;
    Ok(MulBlank {
        row,
        first_column,
        xfs,
    })
}

fn check_column_span(first: u16, last: u16, count: usize) -> Result<(), RecordError> {
    if last < first || (last - first) as usize + 1 != count {
        return Err(RecordError::Invalid(format!(
            "column span {first}..={last} does not match {count} entries"
        )));
    }
    Ok(())
}

/// LABEL and STRING share the layout of a 16-bit-length string.
pub(crate) fn parse_label(
    data: &[u8],
    ctx: DecodeContext,
    continue_positions: &[usize],
) -> Result<(CellHeader, String), RecordError> {
    let mut r = ByteReader::new(data);
    let cell = CellHeader::read(&mut r)?;
    let text = read_string_at(data, r.pos(), ctx, continue_positions)?;
    Ok((cell, text))
}

/// STRING: cached text result of the preceding FORMULA.
pub(crate) fn parse_string(
    data: &[u8],
    ctx: DecodeContext,
    continue_positions: &[usize],
) -> Result<String, RecordError> {
    read_string_at(data, 0, ctx, continue_positions)
}

fn read_string_at(
    data: &[u8],
    offset: usize,
    ctx: DecodeContext,
    continue_positions: &[usize],
) -> Result<String, RecordError> {
    match ctx.version {
        BiffVersion::Biff8 => {
            Ok(read_unicode_string(data, offset, LengthPrefix::U16, continue_positions)?.text)
        }
        BiffVersion::Biff5 => {
            let rest = data.get(offset..).unwrap_or_default();
            Ok(read_long_string(rest, ctx.version, ctx.codepage)?.0)
        }
    }
}

pub(crate) fn parse_labelsst(data: &[u8]) -> Result<(CellHeader, u32), RecordError> {
    let mut r = ByteReader::new(data);
    let cell = CellHeader::read(&mut r)?;
    Ok((cell, r.u32()?))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RString {
    pub(crate) cell: CellHeader,
    pub(crate) text: String,
    pub(crate) runs: Vec<FormatRun>,
}

/// RSTRING: a label with its own formatting runs.
pub(crate) fn parse_rstring(data: &[u8], ctx: DecodeContext) -> Result<RString, RecordError> {
    let mut r = ByteReader::new(data);
    let cell = CellHeader::read(&mut r)?;
    let (text, consumed) = read_long_string(r.rest(), ctx.version, ctx.codepage)?;
    r.skip(consumed)?;

    let mut runs = Vec::new();
    match ctx.version {
        BiffVersion::Biff8 => {
            let count = r.u16()?;
            for _ in 0..count {
                runs.push(FormatRun {
                    char_index: r.u16()?,
                    font_index: r.u16()?,
                });
            }
        }
        BiffVersion::Biff5 => {
            let count = r.u8()?;
            for _ in 0..count {
                runs.push(FormatRun {
                    char_index: r.u8()? as u16,
                    font_index: r.u8()? as u16,
                });
            }
        }
    }

    Ok(RString { cell, text, runs })
}

/// Cached result stored in a FORMULA record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum FormulaResult {
    Number(f64),
    /// The text follows in a STRING record.
    String,
    Boolean(bool),
    Error(u8),
    Empty,
}

fn formula_result(bytes: &[u8]) -> FormulaResult {
    if read_u16(bytes, 6) != Some(0xFFFF) {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[..8]);
        return FormulaResult::Number(f64::from_le_bytes(raw));
    }
    match bytes[0] {
        0x00 => FormulaResult::String,
        0x01 => FormulaResult::Boolean(bytes[2] != 0),
        0x02 => FormulaResult::Error(bytes[2]),
        _ => FormulaResult::Empty,
    }
}

const FORMULA_SHARED: u16 = 0x0008;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Formula {
    pub(crate) cell: CellHeader,
    pub(crate) result: FormulaResult,
    pub(crate) shared: bool,
    pub(crate) tokens: FormulaBytes,
}

pub(crate) fn parse_formula(data: &[u8]) -> Result<Formula, RecordError> {
    let mut r = ByteReader::new(data);
    let cell = CellHeader::read(&mut r)?;
    let result = formula_result(r.bytes(8)?);
    let flags = r.u16()?;
    let _chn = r.u32()?;
    let cce = r.u16()? as usize;
    let tokens = FormulaBytes::read(&mut r, cce)?;
    Ok(Formula {
        cell,
        result,
        shared: flags & FORMULA_SHARED != 0,
        tokens,
    })
}

/// SHRFMLA and ARRAY: a token stream that applies to every cell in `range`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RangeFormula {
    pub(crate) range: CellRange,
    pub(crate) tokens: FormulaBytes,
}

pub(crate) fn parse_shared_formula(data: &[u8]) -> Result<RangeFormula, RecordError> {
    let mut r = ByteReader::new(data);
    let range = CellRange::read_ref_u(&mut r)?;
    let _reserved = r.u8()?;
    let _use_count = r.u8()?;
    let cce = r.u16()? as usize;
    let tokens = FormulaBytes::read(&mut r, cce)?;
    Ok(RangeFormula { range, tokens })
}

pub(crate) fn parse_array(data: &[u8]) -> Result<RangeFormula, RecordError> {
    let mut r = ByteReader::new(data);
    let range = CellRange::read_ref_u(&mut r)?;
    let _flags = r.u16()?;
    let _chn = r.u32()?;
    let cce = r.u16()? as usize;
    let tokens = FormulaBytes::read(&mut r, cce)?;
    Ok(RangeFormula { range, tokens })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BIFF8: DecodeContext = DecodeContext {
        version: BiffVersion::Biff8,
        codepage: 1252,
    };
    const BIFF5: DecodeContext = DecodeContext {
        version: BiffVersion::Biff5,
        codepage: 1252,
    };

    fn header(row: u16, col: u16, xf: u16) -> Vec<u8> {
        [row.to_le_bytes(), col.to_le_bytes(), xf.to_le_bytes()].concat()
    }

    #[test]
    fn mulrk_reads_entries_and_validates_span() {
        let mut data = Vec::new();
        data.extend_from_slice(&3u16.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        for (xf, rk) in [(15u16, (5u32 << 2) | 0x02), (16, (7 << 2) | 0x02)] {
            data.extend_from_slice(&xf.to_le_bytes());
            data.extend_from_slice(&rk.to_le_bytes());
        }
        data.extend_from_slice(&2u16.to_le_bytes());

        let mulrk = parse_mulrk(&data).unwrap();
        assert_eq!(mulrk.row, 3);
        assert_eq!(mulrk.first_column, 1);
        assert_eq!(
            mulrk.cells,
            vec![(15, RkValue::Integer(5)), (16, RkValue::Integer(7))]
        );

        let len = data.len();
        data[len - 2..].copy_from_slice(&9u16.to_le_bytes());
        assert!(matches!(parse_mulrk(&data), Err(RecordError::Invalid(_))));
    }

    #[test]
    fn mulblank_lists_xfs() {
        let mut data = Vec::new();
        for v in [0u16, 4, 21, 22, 23, 6] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let blank = parse_mulblank(&data).unwrap();
        assert_eq!(blank.first_column, 4);
        assert_eq!(blank.xfs, vec![21, 22, 23]);
    }

    #[test]
    fn label_in_both_versions() {
        let mut biff8 = header(1, 2, 15);
        biff8.extend_from_slice(&3u16.to_le_bytes());
        biff8.push(0);
        biff8.extend_from_slice(b"abc");
        assert_eq!(parse_label(&biff8, BIFF8, &[]).unwrap().1, "abc");

        let mut biff5 = header(1, 2, 15);
        biff5.extend_from_slice(&3u16.to_le_bytes());
        biff5.extend_from_slice(b"xyz");
        assert_eq!(parse_label(&biff5, BIFF5, &[]).unwrap().1, "xyz");
    }

    #[test]
    fn boolerr_distinguishes_errors() {
        let mut data = header(0, 0, 0);
        data.extend_from_slice(&[0x07, 0x01]);
        assert_eq!(parse_boolerr(&data).unwrap().1, BoolErrValue::Error(0x07));
        data[6..].copy_from_slice(&[0x01, 0x00]);
        assert_eq!(parse_boolerr(&data).unwrap().1, BoolErrValue::Boolean(true));
    }

    #[test]
    fn biff5_rstring_runs_are_bytes() {
        let mut data = header(0, 0, 0);
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(b"ab");
        data.extend_from_slice(&[1, 1, 6]);
        let rs = parse_rstring(&data, BIFF5).unwrap();
        assert_eq!(rs.text, "ab");
        assert_eq!(
            rs.runs,
            vec![FormatRun {
                char_index: 1,
                font_index: 6
            }]
        );
    }

    fn formula_payload(result: [u8; 8], flags: u16, rgce: &[u8]) -> Vec<u8> {
        let mut out = header(2, 3, 15);
        out.extend_from_slice(&result);
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(rgce.len() as u16).to_le_bytes());
        out.extend_from_slice(rgce);
        out
    }

    #[test]
    fn formula_cached_results() {
        let number = parse_formula(&formula_payload(2.5f64.to_le_bytes(), 0, &[0x1E, 1, 0])).unwrap();
        assert_eq!(number.result, FormulaResult::Number(2.5));
        assert_eq!(number.tokens.rgce, vec![0x1E, 1, 0]);
        assert!(!number.shared);

        let text = parse_formula(&formula_payload([0, 0, 0, 0, 0, 0, 0xFF, 0xFF], 0, &[])).unwrap();
        assert_eq!(text.result, FormulaResult::String);

        let boolean =
            parse_formula(&formula_payload([1, 0, 1, 0, 0, 0, 0xFF, 0xFF], FORMULA_SHARED, &[]))
                .unwrap();
        assert_eq!(boolean.result, FormulaResult::Boolean(true));
        assert!(boolean.shared);

        let error = parse_formula(&formula_payload([2, 0, 0x2A, 0, 0, 0, 0xFF, 0xFF], 0, &[])).unwrap();
        assert_eq!(error.result, FormulaResult::Error(0x2A));

        let empty = parse_formula(&formula_payload([3, 0, 0, 0, 0, 0, 0xFF, 0xFF], 0, &[])).unwrap();
        assert_eq!(empty.result, FormulaResult::Empty);
    }

    #[test]
    fn shared_formula_range() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(&[2, 2, 0, 3]);
        data.extend_from_slice(&1u16.to_le_bytes());
        data.push(0x1D);
        let shared = parse_shared_formula(&data).unwrap();
        assert_eq!(
            shared.range,
            CellRange {
                first_row: 1,
                last_row: 4,
                first_column: 2,
                last_column: 2,
            }
        );
        assert_eq!(shared.tokens.rgce, vec![0x1D]);
    }
}
