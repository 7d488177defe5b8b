//! Formula token (`rgce`) decoding to display text.
//!
//! Tokens are in reverse Polish order: operands push a string onto a stack and operators and
//! functions pop their arguments and push the combined expression. The result is the text Excel
//! would show after the leading `=`.
//!
//! Decoding never fails outright. A token the decoder cannot size stops the walk with a warning,
//! and a missing operand decodes as an empty sub-expression.

use swinder_model::ErrorValue;

use super::bytes::ByteReader;
use super::parsers::{DecodeContext, FormulaBytes};
use super::strings::{decode_ansi, read_unicode_string, LengthPrefix};
use super::BiffVersion;

mod ftab;

pub(crate) use ftab::function_name;

const PTG_EXP: u8 = 0x01;
const PTG_TBL: u8 = 0x02;

// PtgAttr bits.
const ATTR_CHOOSE: u8 = 0x04;
const ATTR_SUM: u8 = 0x10;

// Relative-reference flags; BIFF8 keeps them in the column field, BIFF5 in the row field.
const BIFF8_ROW_RELATIVE: u16 = 0x4000;
const BIFF8_COLUMN_RELATIVE: u16 = 0x8000;
const BIFF5_ROW_RELATIVE: u16 = 0x8000;
const BIFF5_COLUMN_RELATIVE: u16 = 0x4000;

const BIFF8_ROWS: i64 = 65_536;
const BIFF5_ROWS: i64 = 16_384;
const COLUMNS: i64 = 256;

/// Name lookups a token stream can refer to.
pub(crate) trait FormulaResolver {
    /// Sheet prefix for a BIFF8 `ixti`, already quoted when needed. Bad indices give `"Error"`.
    fn extern_sheet(&self, index: u16) -> String;
    /// Name of the sheet at tab position `index`.
    fn sheet_name(&self, index: u16) -> Option<&str>;
    /// Defined name by one-based index.
    fn defined_name(&self, index: u16) -> Option<&str>;
    /// External name by one-based index.
    fn extern_name(&self, index: u16) -> Option<&str>;
}

/// Quote a sheet name for use in a reference when it contains a space or a quote.
pub(crate) fn quote_sheet_name(name: &str) -> String {
    if name.contains(' ') || name.contains('\'') {
        format!("'{}'", name.replace('\'', "''"))
    } else {
        name.to_string()
    }
}

/// Cell the formula belongs to; relative `RefN`/`AreaN` tokens are offsets from it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CellBase {
    pub(crate) row: u32,
    pub(crate) column: u32,
}

impl CellBase {
    pub(crate) fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct DecodedFormula {
    pub(crate) text: String,
    pub(crate) warnings: Vec<String>,
}

/// `(row, column)` of the anchor cell when the token stream is a lone `PtgExp` or `PtgTbl`.
pub(crate) fn shared_formula_anchor(rgce: &[u8]) -> Option<(u16, u16)> {
    let (&ptg, rest) = rgce.split_first()?;
    if ptg != PTG_EXP && ptg != PTG_TBL {
        return None;
    }
    let mut r = ByteReader::new(rest);
    Some((r.u16().ok()?, r.u16().ok()?))
}

pub(crate) fn decode_formula(
    formula: &FormulaBytes,
    base: CellBase,
    ctx: DecodeContext,
    resolver: &dyn FormulaResolver,
) -> DecodedFormula {
    let mut decoder = Decoder {
        rgce: ByteReader::new(&formula.rgce),
        rgcb: ByteReader::new(&formula.rgcb),
        base,
        ctx,
        resolver,
        stack: Vec::new(),
        warnings: Vec::new(),
        incomplete: false,
    };
    decoder.run();
    decoder.finish()
}

/// Outcome of one token.
enum Step {
    Continue,
    Stop,
}

struct Decoder<'a> {
    rgce: ByteReader<'a>,
    rgcb: ByteReader<'a>,
    base: CellBase,
    ctx: DecodeContext,
    resolver: &'a dyn FormulaResolver,
    stack: Vec<String>,
    warnings: Vec<String>,
    /// Decoding stopped before the end of the token stream.
    incomplete: bool,
}

impl Decoder<'_> {
    fn run(&mut self) {
        while self.rgce.remaining() > 0 {
            let offset = self.rgce.pos();
            let Ok(ptg) = self.rgce.u8() else { break };
            match self.token(ptg) {
                Ok(Step::Continue) => {}
                Ok(Step::Stop) => {
                    self.incomplete = true;
                    break;
                }
                Err(err) => {
                    self.warnings
                        .push(format!("truncated formula token 0x{ptg:02X} at {offset}: {err}"));
                    self.incomplete = true;
                    break;
                }
            }
        }
    }

    fn finish(mut self) -> DecodedFormula {
        // A partial stack would read as a different, valid formula.
        if self.incomplete {
            return DecodedFormula {
                text: String::new(),
                warnings: self.warnings,
            };
        }
        let text = self.stack.pop().unwrap_or_default();
        if !self.stack.is_empty() {
            self.warnings.push(format!(
                "formula left {} unused operand(s) on the stack",
                self.stack.len()
            ));
        }
        DecodedFormula {
            text,
            warnings: self.warnings,
        }
    }

    fn is_biff8(&self) -> bool {
        self.ctx.version == BiffVersion::Biff8
    }

    fn pop(&mut self) -> String {
        match self.stack.pop() {
            Some(operand) => operand,
            None => {
                self.warnings.push("formula operator is missing an operand".to_string());
                String::new()
            }
        }
    }

    /// Pop `count` operands, returned in push order.
    fn pop_args(&mut self, count: usize) -> Vec<String> {
        let mut args: Vec<String> = (0..count).map(|_| self.pop()).collect();
        args.reverse();
        args
    }

    fn token(&mut self, ptg: u8) -> Result<Step, super::bytes::Truncated> {
        // Reference classes (value, reference, array) share one decoding.
        let ptg = if ptg >= 0x20 { (ptg & 0x1F) | 0x20 } else { ptg };
        let biff8 = self.is_biff8();

        match ptg {
            PTG_EXP | PTG_TBL => self.rgce.skip(4)?,
            0x03..=0x11 => {
                let rhs = self.pop();
                let lhs = self.pop();
                self.stack.push(format!("{lhs}{}{rhs}", binary_operator(ptg)));
            }
            0x12 => {
                let operand = self.pop();
                self.stack.push(format!("+{operand}"));
            }
            0x13 => {
                let operand = self.pop();
                self.stack.push(format!("-{operand}"));
            }
            0x14 => {
                let operand = self.pop();
                self.stack.push(format!("{operand}%"));
            }
            0x15 => {
                let operand = self.pop();
                self.stack.push(format!("({operand})"));
            }
            0x16 => self.stack.push(String::new()),
            0x17 => {
                let text = self.string_constant()?;
                self.stack.push(quote_string(&text));
            }
            0x19 => {
                let flags = self.rgce.u8()?;
                let data = self.rgce.u16()?;
                if flags & ATTR_CHOOSE != 0 {
                    self.rgce.skip((data as usize + 1) * 2)?;
                } else if flags & ATTR_SUM != 0 {
                    let operand = self.pop();
                    self.stack.push(format!("SUM({operand})"));
                }
            }
            0x1C => {
                let code = self.rgce.u8()?;
                self.stack.push(error_text(code));
            }
            0x1D => {
                let value = self.rgce.u8()? != 0;
                self.stack.push(bool_text(value));
            }
            0x1E => {
                let value = self.rgce.u16()?;
                self.stack.push(value.to_string());
            }
            0x1F => {
                let value = self.rgce.f64()?;
                self.stack.push(format_number(value));
            }
            0x20 => {
                self.rgce.skip(7)?;
                let array = self.array_constant()?;
                self.stack.push(array);
            }
            0x21 => {
                let iftab = self.rgce.u16()?;
                let Some(argc) = ftab::fixed_arg_count(iftab) else {
                    self.warnings
                        .push(format!("unknown fixed-arity function id {iftab}"));
                    return Ok(Step::Stop);
                };
                self.function(iftab, argc);
            }
            0x22 => {
                let argc = (self.rgce.u8()? & 0x7F) as usize;
                let iftab = self.rgce.u16()? & 0x7FFF;
                self.function(iftab, argc);
            }
            0x23 => {
                let index = self.rgce.u16()?;
                self.rgce.skip(if biff8 { 2 } else { 12 })?;
                let name = match self.resolver.defined_name(index) {
                    Some(name) => name.to_string(),
                    None => {
                        self.warnings.push(format!("unknown defined name {index}"));
                        "#NAME?".to_string()
                    }
                };
                self.stack.push(name);
            }
            0x24 => {
                let cell = self.cell_ref(false)?;
                self.stack.push(cell);
            }
            0x25 => {
                let area = self.area_ref(false)?;
                self.stack.push(area);
            }
            0x26 => {
                self.rgce.skip(6)?;
                self.skip_mem_area()?;
            }
            0x27 | 0x28 => self.rgce.skip(6)?,
            0x29 | 0x2E | 0x2F => self.rgce.skip(2)?,
            0x2A => {
                self.rgce.skip(if biff8 { 4 } else { 3 })?;
                self.stack.push("#REF!".to_string());
            }
            0x2B => {
                self.rgce.skip(if biff8 { 8 } else { 6 })?;
                self.stack.push("#REF!".to_string());
            }
            0x2C => {
                let cell = self.cell_ref(true)?;
                self.stack.push(cell);
            }
            0x2D => {
                let area = self.area_ref(true)?;
                self.stack.push(area);
            }
            0x39 => {
                let index = if biff8 {
                    let _ixti = self.rgce.u16()?;
                    let index = self.rgce.u16()?;
                    self.rgce.skip(2)?;
                    index
                } else {
                    let _ixals = self.rgce.i16()?;
                    self.rgce.skip(8)?;
                    let index = self.rgce.u16()?;
                    self.rgce.skip(12)?;
                    index
                };
                let name = match self.resolver.extern_name(index) {
                    Some(name) => name.to_string(),
                    None => {
                        self.warnings.push(format!("unknown external name {index}"));
                        "#NAME?".to_string()
                    }
                };
                self.stack.push(name);
            }
            0x3A => {
                let sheet = self.sheet_prefix()?;
                let cell = self.cell_ref(false)?;
                self.stack.push(format!("{sheet}!{cell}"));
            }
            0x3B => {
                let sheet = self.sheet_prefix()?;
                let area = self.area_ref(false)?;
                self.stack.push(format!("{sheet}!{area}"));
            }
            0x3C => {
                self.rgce.skip(if biff8 { 6 } else { 17 })?;
                self.stack.push("#REF!".to_string());
            }
            0x3D => {
                self.rgce.skip(if biff8 { 10 } else { 20 })?;
                self.stack.push("#REF!".to_string());
            }
            other => {
                self.warnings
                    .push(format!("unsupported formula token 0x{other:02X}"));
                return Ok(Step::Stop);
            }
        }
        Ok(Step::Continue)
    }

    fn function(&mut self, iftab: u16, argc: usize) {
        let mut args = self.pop_args(argc);
        let name = if iftab == ftab::USER_DEFINED && !args.is_empty() {
            args.remove(0)
        } else {
            match function_name(iftab) {
                Some(name) => name.to_string(),
                None => {
                    self.warnings.push(format!("unknown function id {iftab}"));
                    format!("FUNC{iftab}")
                }
            }
        };
        self.stack.push(format!("{name}({})", args.join(",")));
    }

    fn string_constant(&mut self) -> Result<String, super::bytes::Truncated> {
        if self.is_biff8() {
            let data = self.rgce.data();
            match read_unicode_string(data, self.rgce.pos(), LengthPrefix::U8, &[]) {
                Ok(s) => {
                    self.rgce.skip(s.size)?;
                    Ok(s.text)
                }
                Err(_) => {
                    // Force a truncation error at the current position.
                    self.rgce.skip(self.rgce.remaining() + 1)?;
                    Ok(String::new())
                }
            }
        } else {
            let len = self.rgce.u8()? as usize;
            Ok(decode_ansi(self.ctx.codepage, self.rgce.bytes(len)?))
        }
    }

    fn array_constant(&mut self) -> Result<String, super::bytes::Truncated> {
        let columns = self.rgcb.u8()? as usize + 1;
        let rows = self.rgcb.u16()? as usize + 1;
        let mut out = String::from("{");
        for row in 0..rows {
            if row > 0 {
                out.push(';');
            }
            for column in 0..columns {
                if column > 0 {
                    out.push(',');
                }
                let value = self.array_value()?;
                out.push_str(&value);
            }
        }
        out.push('}');
        Ok(out)
    }

    fn array_value(&mut self) -> Result<String, super::bytes::Truncated> {
        let kind = self.rgcb.u8()?;
        let value = match kind {
            0x01 => format_number(self.rgcb.f64()?),
            0x02 => {
                let text = if self.is_biff8() {
                    match read_unicode_string(
                        self.rgcb.data(),
                        self.rgcb.pos(),
                        LengthPrefix::U16,
                        &[],
                    ) {
                        Ok(s) => {
                            self.rgcb.skip(s.size)?;
                            s.text
                        }
                        Err(_) => {
                            self.rgcb.skip(self.rgcb.remaining() + 1)?;
                            String::new()
                        }
                    }
                } else {
                    let len = self.rgcb.u8()? as usize;
                    decode_ansi(self.ctx.codepage, self.rgcb.bytes(len)?)
                };
                quote_string(&text)
            }
            0x04 => {
                let value = self.rgcb.u8()? != 0;
                self.rgcb.skip(7)?;
                bool_text(value)
            }
            0x10 => {
                let code = self.rgcb.u8()?;
                self.rgcb.skip(7)?;
                error_text(code)
            }
            _ => {
                self.rgcb.skip(8)?;
                String::new()
            }
        };
        Ok(value)
    }

    fn skip_mem_area(&mut self) -> Result<(), super::bytes::Truncated> {
        let count = self.rgcb.u16()? as usize;
        let entry = if self.is_biff8() { 8 } else { 6 };
        self.rgcb.skip(count * entry)
    }

    /// Sheet part of a 3D reference, without the `!`.
    fn sheet_prefix(&mut self) -> Result<String, super::bytes::Truncated> {
        if self.is_biff8() {
            let ixti = self.rgce.u16()?;
            return Ok(self.resolver.extern_sheet(ixti));
        }

        let ixals = self.rgce.i16()?;
        self.rgce.skip(8)?;
        let first = self.rgce.i16()?;
        let last = self.rgce.i16()?;
        if first < 0 {
            // Not a same-workbook tab; fall back to the EXTERNSHEET entry.
            let index = ixals.unsigned_abs().saturating_sub(1);
            return Ok(self.resolver.extern_sheet(index));
        }
        let name = |index: i16| {
            self.resolver
                .sheet_name(index as u16)
                .map(quote_sheet_name)
                .unwrap_or_else(|| "Error".to_string())
        };
        if last > first {
            Ok(format!("{}:{}", name(first), name(last)))
        } else {
            Ok(name(first))
        }
    }

    /// One cell: BIFF8 `rw u16, col u16` or BIFF5 `rw u16, col u8`.
    fn read_cell(&mut self) -> Result<RawCell, super::bytes::Truncated> {
        if self.is_biff8() {
            let row = self.rgce.u16()?;
            let column = self.rgce.u16()?;
            Ok(RawCell {
                row: i64::from(row),
                column: i64::from(column & 0x3FFF),
                row_relative: column & BIFF8_ROW_RELATIVE != 0,
                column_relative: column & BIFF8_COLUMN_RELATIVE != 0,
            })
        } else {
            let row = self.rgce.u16()?;
            let column = self.rgce.u8()?;
            Ok(RawCell {
                row: i64::from(row & 0x3FFF),
                column: i64::from(column),
                row_relative: row & BIFF5_ROW_RELATIVE != 0,
                column_relative: row & BIFF5_COLUMN_RELATIVE != 0,
            })
        }
    }

    fn cell_ref(&mut self, relative_to_base: bool) -> Result<String, super::bytes::Truncated> {
        let cell = self.read_cell()?;
        Ok(self.render_cell(cell, relative_to_base))
    }

    fn area_ref(&mut self, relative_to_base: bool) -> Result<String, super::bytes::Truncated> {
        let (first, last) = if self.is_biff8() {
            let first_row = self.rgce.u16()?;
            let last_row = self.rgce.u16()?;
            let first_column = self.rgce.u16()?;
            let last_column = self.rgce.u16()?;
            (
                RawCell::biff8(first_row, first_column),
                RawCell::biff8(last_row, last_column),
            )
        } else {
            let first_row = self.rgce.u16()?;
            let last_row = self.rgce.u16()?;
            let first_column = self.rgce.u8()?;
            let last_column = self.rgce.u8()?;
            (
                RawCell::biff5(first_row, first_column),
                RawCell::biff5(last_row, last_column),
            )
        };
        Ok(format!(
            "{}:{}",
            self.render_cell(first, relative_to_base),
            self.render_cell(last, relative_to_base)
        ))
    }

    fn render_cell(&self, cell: RawCell, relative_to_base: bool) -> String {
        let biff8 = self.is_biff8();
        let rows = if biff8 { BIFF8_ROWS } else { BIFF5_ROWS };
        let mut row = cell.row;
        let mut column = cell.column;
        if relative_to_base {
            if cell.row_relative {
                let offset = if biff8 {
                    i64::from(row as u16 as i16)
                } else {
                    // 14-bit two's complement.
                    (row << 50) >> 50
                };
                row = (i64::from(self.base.row) + offset).rem_euclid(rows);
            }
            if cell.column_relative {
                let offset = i64::from(column as u8 as i8);
                column = (i64::from(self.base.column) + offset).rem_euclid(COLUMNS);
            }
        }

        let mut out = String::new();
        if !cell.column_relative {
            out.push('$');
        }
        out.push_str(&column_name(column as u32));
        if !cell.row_relative {
            out.push('$');
        }
        out.push_str(&(row + 1).to_string());
        out
    }
}

#[derive(Debug, Clone, Copy)]
struct RawCell {
    row: i64,
    column: i64,
    row_relative: bool,
    column_relative: bool,
}

impl RawCell {
    fn biff8(row: u16, column: u16) -> Self {
        Self {
            row: i64::from(row),
            column: i64::from(column & 0x3FFF),
            row_relative: column & BIFF8_ROW_RELATIVE != 0,
            column_relative: column & BIFF8_COLUMN_RELATIVE != 0,
        }
    }

    fn biff5(row: u16, column: u8) -> Self {
        Self {
            row: i64::from(row & 0x3FFF),
            column: i64::from(column),
            row_relative: row & BIFF5_ROW_RELATIVE != 0,
            column_relative: row & BIFF5_COLUMN_RELATIVE != 0,
        }
    }
}

fn binary_operator(ptg: u8) -> &'static str {
    match ptg {
        0x03 => "+",
        0x04 => "-",
        0x05 => "*",
        0x06 => "/",
        0x07 => "^",
        0x08 => "&",
        0x09 => "<",
        0x0A => "<=",
        0x0B => "=",
        0x0C => ">=",
        0x0D => ">",
        0x0E => "<>",
        0x0F => " ",
        0x10 => ",",
        _ => ":",
    }
}

fn quote_string(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

fn bool_text(value: bool) -> String {
    let text = if value { "TRUE" } else { "FALSE" };
    text.to_string()
}

fn error_text(code: u8) -> String {
    ErrorValue::from_code(code)
        .map(|e| e.as_str())
        .unwrap_or("#N/A")
        .to_string()
}

fn format_number(value: f64) -> String {
    format!("{value}")
}

/// Column letters for a zero-based column index: `0 -> A`, `26 -> AA`.
pub(crate) fn column_name(column: u32) -> String {
    let mut n = column + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}
