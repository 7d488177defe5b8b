//! Worksheet substream handler: cells, formulas and sheet metadata.

use std::collections::{BTreeMap, HashMap};

use swinder_model::{Cell, CellValue, ErrorValue, HeaderFooter, RichText, Sheet, Workbook};

use crate::biff::bytes::RkValue;
use crate::biff::formula::{column_name, decode_formula, shared_formula_anchor, CellBase};
use crate::biff::parsers::cells::{BoolErrValue, FormulaResult, RangeFormula};
use crate::biff::parsers::sheet::{Note, OBJ_KIND_NOTE};
use crate::biff::parsers::{CellHeader, CellRange, FormulaBytes};
use crate::biff::registry::{MarginSide, Record};
use crate::globals::Globals;
use crate::warnings::Warnings;

/// Highest column a BIFF5/BIFF8 sheet can address.
const LAST_BIFF_COLUMN: u16 = 0xFF;

/// Merged areas above this many cells get an anchor span but no covered flags.
const MAX_COVERED_CELLS: usize = 1 << 16;

/// Borrowed state a worksheet record may touch.
pub(crate) struct SheetEnv<'a> {
    pub(crate) globals: &'a mut Globals,
    pub(crate) workbook: &'a mut Workbook,
    pub(crate) warnings: &'a mut Warnings,
}

impl SheetEnv<'_> {
    /// Write `value` with the format of `xf` into the cell at `header`, creating it.
    fn store(&mut self, sheet: usize, header: CellHeader, value: CellValue) -> Option<&mut Cell> {
        let format_id =
            self.globals
                .converted_format_id(header.xf, &mut self.workbook.formats, self.warnings);
        let cell = self
            .workbook
            .sheets
            .get_mut(sheet)?
            .cell(u32::from(header.column), u32::from(header.row), true)?;
        cell.value = value;
        cell.format_id = format_id;
        Some(cell)
    }

    fn existing_cell(&mut self, sheet: usize, row: u16, column: u16) -> Option<&mut Cell> {
        self.workbook
            .sheets
            .get_mut(sheet)?
            .cell(u32::from(column), u32::from(row), false)
    }
}

/// A BIFF8 note waiting for the TXO text of its drawing object.
#[derive(Debug, Clone, Copy)]
struct PendingNote {
    row: u16,
    column: u16,
    object_id: u16,
}

#[derive(Debug)]
pub(crate) struct WorksheetHandler {
    sheet: usize,
    /// SHRFMLA token streams keyed by their anchor `(row, column)`.
    shared_formulas: HashMap<(u16, u16), RangeFormula>,
    /// ARRAY token streams keyed by their anchor.
    array_formulas: HashMap<(u16, u16), RangeFormula>,
    /// Formula cells whose PtgExp anchor has not been seen yet.
    unresolved: Vec<(CellHeader, (u16, u16))>,
    /// Formula cell waiting for its STRING result.
    pending_string: Option<(u16, u16)>,
    /// TXO text by drawing object id.
    object_texts: HashMap<u16, String>,
    last_object: Option<u16>,
    notes: Vec<PendingNote>,
    /// Cell of the last BIFF5 note, for continuation records.
    last_note: Option<(u16, u16)>,
}

impl WorksheetHandler {
    pub(crate) fn new(sheet: usize) -> Self {
        Self {
            sheet,
            shared_formulas: HashMap::new(),
            array_formulas: HashMap::new(),
            unresolved: Vec::new(),
            pending_string: None,
            object_texts: HashMap::new(),
            last_object: None,
            notes: Vec::new(),
            last_note: None,
        }
    }

    pub(crate) fn sheet(&self) -> usize {
        self.sheet
    }

    pub(crate) fn handle(&mut self, record: Record, env: &mut SheetEnv<'_>) {
        if !matches!(record, Record::String(_) | Record::SharedFormula(_) | Record::Array(_)) {
            self.pending_string = None;
        }
        let sheet = self.sheet;
        match record {
            Record::Blank(header) => {
                env.store(sheet, header, CellValue::Empty);
            }
            Record::BoolErr(header, value) => {
                let value = match value {
                    BoolErrValue::Boolean(b) => CellValue::Boolean(b),
                    BoolErrValue::Error(code) => error_value(code, env.warnings),
                };
                env.store(sheet, header, value);
            }
            Record::Number(header, value) => {
                env.store(sheet, header, CellValue::Float(value));
            }
            Record::Rk(header, value) => {
                env.store(sheet, header, rk_value(value));
            }
            Record::MulRk(mulrk) => {
                for (offset, (xf, value)) in mulrk.cells.into_iter().enumerate() {
                    let Some(column) = column_at(mulrk.first_column, offset) else {
                        env.warnings.push(format!(
                            "MULRK on row {} runs past the last column",
                            u32::from(mulrk.row) + 1
                        ));
                        break;
                    };
                    let header = CellHeader {
                        row: mulrk.row,
                        column,
                        xf,
                    };
                    env.store(sheet, header, rk_value(value));
                }
            }
            Record::MulBlank(mulblank) => {
                for (offset, xf) in mulblank.xfs.into_iter().enumerate() {
                    let Some(column) = column_at(mulblank.first_column, offset) else {
                        env.warnings.push(format!(
                            "MULBLANK on row {} runs past the last column",
                            u32::from(mulblank.row) + 1
                        ));
                        break;
                    };
                    let header = CellHeader {
                        row: mulblank.row,
                        column,
                        xf,
                    };
                    env.store(sheet, header, CellValue::Empty);
                }
            }
            Record::Label(header, text) => {
                env.store(sheet, header, CellValue::String(text));
            }
            Record::LabelSst(header, index) => {
                let text = env.globals.string_from_sst(index).to_string();
                let runs = env.globals.format_runs_from_sst(index);
                let value = if runs.is_empty() {
                    CellValue::String(text)
                } else {
                    let fonts = env.globals.rich_runs(&runs);
                    CellValue::RichText(RichText::new(text, fonts))
                };
                env.store(sheet, header, value);
            }
            Record::RString(rstring) => {
                let value = if rstring.runs.is_empty() {
                    CellValue::String(rstring.text)
                } else {
                    let runs: BTreeMap<u32, u16> = rstring
                        .runs
                        .iter()
                        .map(|run| (u32::from(run.char_index), run.font_index))
                        .collect();
                    let fonts = env.globals.rich_runs(&runs);
                    CellValue::RichText(RichText::new(rstring.text, fonts))
                };
                env.store(sheet, rstring.cell, value);
            }
            Record::Formula(formula) => {
                let header = formula.cell;
                let value = match formula.result {
                    FormulaResult::Number(n) => CellValue::Float(n),
                    FormulaResult::Boolean(b) => CellValue::Boolean(b),
                    FormulaResult::Error(code) => error_value(code, env.warnings),
                    FormulaResult::String | FormulaResult::Empty => CellValue::Empty,
                };
                let text = match shared_formula_anchor(&formula.tokens.rgce) {
                    Some(anchor) => match self.range_formula(anchor) {
                        Some(tokens) => Some(decode_cell_formula(&tokens, header, env)),
                        None => {
                            self.unresolved.push((header, anchor));
                            None
                        }
                    },
                    None => Some(decode_cell_formula(&formula.tokens, header, env)),
                };
                if let Some(cell) = env.store(sheet, header, value) {
                    cell.formula = text;
                }
                if formula.result == FormulaResult::String {
                    self.pending_string = Some((header.row, header.column));
                }
            }
            Record::String(text) => match self.pending_string.take() {
                Some((row, column)) => {
                    if let Some(cell) = env.existing_cell(sheet, row, column) {
                        cell.value = CellValue::String(text);
                    }
                }
                None => log::debug!("STRING record without a preceding formula"),
            },
            Record::SharedFormula(range_formula) => {
                self.add_range_formula(range_formula, false, env);
            }
            Record::Array(range_formula) => {
                self.add_range_formula(range_formula, true, env);
            }

            Record::Row(info) => {
                let format_id = match info.xf {
                    Some(xf) => Some(env.globals.converted_format_id(
                        xf,
                        &mut env.workbook.formats,
                        env.warnings,
                    )),
                    None => None,
                };
                if let Some(row) = self.sheet_mut(env).and_then(|s| s.row(u32::from(info.row), true)) {
                    row.height = info.height;
                    row.visible = !info.hidden;
                    if let Some(format_id) = format_id {
                        row.format_id = format_id;
                    }
                }
            }
            Record::ColInfo(info) => {
                let format_id = env
                    .globals
                    .converted_format_id(info.xf, &mut env.workbook.formats, env.warnings);
                let last = info.last_column.min(LAST_BIFF_COLUMN);
                let Some(sheet) = self.sheet_mut(env) else { return };
                for index in info.first_column..=last {
                    if let Some(column) = sheet.column(u32::from(index), true) {
                        column.width = info.width;
                        column.visible = !info.hidden;
                        column.format_id = format_id;
                    }
                }
            }
            Record::DefColWidth(width) => {
                if let Some(sheet) = self.sheet_mut(env) {
                    sheet.default_column_width = Some(f64::from(width));
                }
            }
            Record::DefaultRowHeight(height) => {
                if let Some(sheet) = self.sheet_mut(env) {
                    sheet.default_row_height = Some(height);
                }
            }
            Record::Margin { side, points } => {
                if let Some(sheet) = self.sheet_mut(env) {
                    let margin = match side {
                        MarginSide::Left => &mut sheet.margins.left,
                        MarginSide::Right => &mut sheet.margins.right,
                        MarginSide::Top => &mut sheet.margins.top,
                        MarginSide::Bottom => &mut sheet.margins.bottom,
                    };
                    *margin = points;
                }
            }
            Record::Header(text) => {
                if let (Some(sheet), Some(text)) = (self.sheet_mut(env), text) {
                    sheet.header = HeaderFooter::parse(&text);
                }
            }
            Record::Footer(text) => {
                if let (Some(sheet), Some(text)) = (self.sheet_mut(env), text) {
                    sheet.footer = HeaderFooter::parse(&text);
                }
            }
            Record::MergedCells(ranges) => {
                for range in ranges {
                    self.merge(range, env);
                }
            }
            Record::Hlink(hlink) => {
                let Some(sheet) = self.sheet_mut(env) else { return };
                let row = u32::from(hlink.range.first_row);
                let column = u32::from(hlink.range.first_column);
                if let Some(cell) = sheet.cell(column, row, true) {
                    cell.hyperlink = Some(hlink.link);
                }
            }
            Record::Note(note) => self.note(note, env),
            Record::Obj(obj) => {
                self.last_object = Some(obj.id);
                if obj.kind != OBJ_KIND_NOTE {
                    log::debug!("drawing object {} of kind 0x{:04X}", obj.id, obj.kind);
                }
            }
            Record::Txo(text) => match self.last_object.take() {
                Some(id) => {
                    self.object_texts.insert(id, text);
                }
                None => log::debug!("TXO record without a preceding OBJ"),
            },
            Record::MsoDrawing { len } => {
                log::debug!("sheet drawing container of {len} bytes");
            }
            Record::Protect(protected) => {
                if let Some(sheet) = self.sheet_mut(env) {
                    sheet.protected = protected;
                }
            }
            Record::Password(hash) => {
                if let Some(sheet) = self.sheet_mut(env) {
                    sheet.password_hash = (hash != 0).then_some(hash);
                }
            }
            Record::Malformed { id, reason } => {
                env.warnings
                    .push(format!("malformed worksheet record 0x{id:04X}: {reason}"));
            }
            other => log::debug!("worksheet substream ignores {other:?}"),
        }
    }

    /// Flush state that only resolves at the end of the substream.
    pub(crate) fn finish(mut self, env: &mut SheetEnv<'_>) {
        for note in std::mem::take(&mut self.notes) {
            let text = self
                .object_texts
                .get(&note.object_id)
                .cloned()
                .unwrap_or_default();
            if let Some(cell) = self
                .sheet_mut(env)
                .and_then(|s| s.cell(u32::from(note.column), u32::from(note.row), true))
            {
                cell.note = Some(text);
            }
        }
        for (header, (row, column)) in std::mem::take(&mut self.unresolved) {
            env.warnings.push(format!(
                "formula at {}{} refers to missing shared formula at {}{}",
                column_name(u32::from(header.column)),
                u32::from(header.row) + 1,
                column_name(u32::from(column)),
                u32::from(row) + 1,
            ));
        }
    }

    fn sheet_mut<'e>(&self, env: &'e mut SheetEnv<'_>) -> Option<&'e mut Sheet> {
        env.workbook.sheets.get_mut(self.sheet)
    }

    fn range_formula(&self, anchor: (u16, u16)) -> Option<FormulaBytes> {
        self.shared_formulas
            .get(&anchor)
            .or_else(|| self.array_formulas.get(&anchor))
            .map(|f| f.tokens.clone())
    }

    fn add_range_formula(&mut self, formula: RangeFormula, array: bool, env: &mut SheetEnv<'_>) {
        let range = formula.range;
        let anchor = (range.first_row, range.first_column);
        let tokens = formula.tokens.clone();
        if array {
            self.array_formulas.insert(anchor, formula);
        } else {
            self.shared_formulas.insert(anchor, formula);
        }

        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.unresolved)
            .into_iter()
            .partition(|(header, target)| {
                *target == anchor && range.contains(header.row, header.column)
            });
        self.unresolved = waiting;
        for (header, _) in ready {
            let text = decode_cell_formula(&tokens, header, env);
            if let Some(cell) = env.existing_cell(self.sheet, header.row, header.column) {
                cell.formula = Some(text);
            }
        }
    }

    fn merge(&self, range: CellRange, env: &mut SheetEnv<'_>) {
        if range.last_row < range.first_row || range.last_column < range.first_column {
            env.warnings
                .push(format!("ignoring inverted merged area {range:?}"));
            return;
        }
        let rows = u32::from(range.last_row - range.first_row) + 1;
        let columns = u32::from(range.last_column - range.first_column) + 1;
        let covered = (rows as usize).saturating_mul(columns as usize) <= MAX_COVERED_CELLS;
        if !covered {
            log::warn!("merged area {range:?} too large to mark covered cells");
        }
        let Some(sheet) = self.sheet_mut(env) else { return };

        if let Some(anchor) = sheet.cell(
            u32::from(range.first_column),
            u32::from(range.first_row),
            true,
        ) {
            anchor.column_span = columns;
            anchor.row_span = rows;
        }
        if !covered {
            return;
        }
        for row in range.first_row..=range.last_row {
            for column in range.first_column..=range.last_column {
                if (row, column) == (range.first_row, range.first_column) {
                    continue;
                }
                if let Some(cell) = sheet.cell(u32::from(column), u32::from(row), true) {
                    cell.covered = true;
                }
            }
        }
    }

    fn note(&mut self, note: Note, env: &mut SheetEnv<'_>) {
        match note {
            Note::Object {
                row,
                column,
                object_id,
                author,
            } => {
                log::debug!("note at ({row}, {column}) by {author:?}");
                self.notes.push(PendingNote {
                    row,
                    column,
                    object_id,
                });
            }
            Note::Text { row, column, text } => {
                self.last_note = Some((row, column));
                if let Some(cell) = self
                    .sheet_mut(env)
                    .and_then(|s| s.cell(u32::from(column), u32::from(row), true))
                {
                    cell.note = Some(text);
                }
            }
            Note::Continuation { text } => {
                let Some((row, column)) = self.last_note else {
                    log::debug!("note continuation without a note");
                    return;
                };
                if let Some(cell) = env.existing_cell(self.sheet, row, column) {
                    cell.note.get_or_insert_with(String::new).push_str(&text);
                }
            }
        }
    }
}

fn decode_cell_formula(tokens: &FormulaBytes, header: CellHeader, env: &mut SheetEnv<'_>) -> String {
    let base = CellBase::new(u32::from(header.row), u32::from(header.column));
    let ctx = env.globals.decode_context();
    let decoded = decode_formula(tokens, base, ctx, &*env.globals);
    for warning in decoded.warnings {
        env.warnings.push(format!(
            "formula at {}{}: {warning}",
            column_name(base.column),
            base.row + 1
        ));
    }
    decoded.text
}

/// Column of entry `offset` in a MULRK/MULBLANK run, or `None` past the last addressable column.
fn column_at(first_column: u16, offset: usize) -> Option<u16> {
    u16::try_from(offset)
        .ok()
        .and_then(|offset| first_column.checked_add(offset))
}

fn rk_value(value: RkValue) -> CellValue {
    match value {
        RkValue::Integer(i) => CellValue::Integer(i64::from(i)),
        RkValue::Float(f) => CellValue::Float(f),
    }
}

fn error_value(code: u8, warnings: &mut Warnings) -> CellValue {
    match ErrorValue::from_code(code) {
        Some(error) => CellValue::Error(error),
        None => {
            warnings.push(format!("unknown error code 0x{code:02X}"));
            CellValue::Error(ErrorValue::NA)
        }
    }
}
