//! Record id → typed record.
//!
//! [`decode`] is the single place that knows which parser handles which id. Parse failures
//! become [`Record::Malformed`] so one damaged record never stops the stream.

use swinder_model::{ChartObjectKind, Color};

use super::bytes::RkValue;
use super::encryption::{parse_filepass, DecryptError, FilePass};
use super::parsers::cells::{self, BoolErrValue, Formula, MulBlank, MulRk, RString, RangeFormula};
use super::parsers::chart::{self, Ai, ChartRect, SeriesCounts};
use super::parsers::externals::{self, DefinedName, ExternBook, ExternSheet};
use super::parsers::globals::{self, Bof, BoundSheet, Font, NumberFormat, Xf};
use super::parsers::sheet::{self, ColumnInfo, HyperlinkRecord, Note, Obj, RowInfo};
use super::parsers::sst::{self, SharedStrings};
use super::parsers::{CellHeader, CellRange, DecodeContext, RecordError};
use super::records::{self, LogicalRecord};

// Workbook globals.
pub(crate) const RECORD_PROTECT: u16 = 0x0012;
pub(crate) const RECORD_PASSWORD: u16 = 0x0013;
pub(crate) const RECORD_EXTERNSHEET: u16 = 0x0017;
pub(crate) const RECORD_NAME: u16 = 0x0018;
pub(crate) const RECORD_DATEMODE: u16 = 0x0022;
pub(crate) const RECORD_EXTERNNAME: u16 = 0x0023;
pub(crate) const RECORD_WINDOW1: u16 = 0x003D;
pub(crate) const RECORD_CODEPAGE: u16 = 0x0042;
pub(crate) const RECORD_FONT: u16 = 0x0031;
pub(crate) const RECORD_PALETTE: u16 = 0x0092;
pub(crate) const RECORD_XF: u16 = 0x00E0;
pub(crate) const RECORD_SST: u16 = 0x00FC;
pub(crate) const RECORD_SUPBOOK: u16 = 0x01AE;
pub(crate) const RECORD_FORMAT: u16 = 0x041E;

// Cells.
pub(crate) const RECORD_FORMULA: u16 = 0x0006;
pub(crate) const RECORD_MULRK: u16 = 0x00BD;
pub(crate) const RECORD_MULBLANK: u16 = 0x00BE;
pub(crate) const RECORD_RSTRING: u16 = 0x00D6;
pub(crate) const RECORD_LABELSST: u16 = 0x00FD;
pub(crate) const RECORD_BLANK: u16 = 0x0201;
pub(crate) const RECORD_NUMBER: u16 = 0x0203;
pub(crate) const RECORD_LABEL: u16 = 0x0204;
pub(crate) const RECORD_BOOLERR: u16 = 0x0205;
pub(crate) const RECORD_STRING: u16 = 0x0207;
pub(crate) const RECORD_ARRAY: u16 = 0x0221;
pub(crate) const RECORD_RK: u16 = 0x027E;
pub(crate) const RECORD_SHRFMLA: u16 = 0x04BC;

// Worksheet metadata.
pub(crate) const RECORD_HEADER: u16 = 0x0014;
pub(crate) const RECORD_FOOTER: u16 = 0x0015;
pub(crate) const RECORD_NOTE: u16 = 0x001C;
pub(crate) const RECORD_LEFTMARGIN: u16 = 0x0026;
pub(crate) const RECORD_RIGHTMARGIN: u16 = 0x0027;
pub(crate) const RECORD_TOPMARGIN: u16 = 0x0028;
pub(crate) const RECORD_BOTTOMMARGIN: u16 = 0x0029;
pub(crate) const RECORD_DEFCOLWIDTH: u16 = 0x0055;
pub(crate) const RECORD_OBJ: u16 = 0x005D;
pub(crate) const RECORD_COLINFO: u16 = 0x007D;
pub(crate) const RECORD_MERGEDCELLS: u16 = 0x00E5;
pub(crate) const RECORD_MSODRAWING: u16 = 0x00EC;
pub(crate) const RECORD_TXO: u16 = 0x01B6;
pub(crate) const RECORD_HLINK: u16 = 0x01B8;
pub(crate) const RECORD_ROW: u16 = 0x0208;
pub(crate) const RECORD_DEFAULTROWHEIGHT: u16 = 0x0225;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MarginSide {
    Left,
    Right,
    Top,
    Bottom,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Record {
    Bof(Bof),
    Eof,

    // Globals.
    BoundSheet(BoundSheet),
    CodePage(u16),
    DateMode { date_1904: bool },
    FilePass(Result<FilePass, DecryptError>),
    Font(Font),
    Format(NumberFormat),
    Xf(Xf),
    Palette(Vec<Color>),
    Sst(SharedStrings),
    ExternBook(ExternBook),
    ExternSheet(ExternSheet),
    ExternName(String),
    Name(DefinedName),
    Window1 { active_tab: u16 },
    MsoDrawingGroup(Vec<u8>),

    // Workbook or worksheet.
    Protect(bool),
    Password(u16),

    // Cells.
    Blank(CellHeader),
    BoolErr(CellHeader, BoolErrValue),
    Number(CellHeader, f64),
    Rk(CellHeader, RkValue),
    MulRk(MulRk),
    MulBlank(MulBlank),
    Label(CellHeader, String),
    LabelSst(CellHeader, u32),
    RString(RString),
    String(String),
    Formula(Formula),
    SharedFormula(RangeFormula),
    Array(RangeFormula),

    // Worksheet metadata.
    Row(RowInfo),
    ColInfo(ColumnInfo),
    DefColWidth(u16),
    DefaultRowHeight(f64),
    Margin { side: MarginSide, points: f64 },
    Header(Option<String>),
    Footer(Option<String>),
    MergedCells(Vec<CellRange>),
    Hlink(HyperlinkRecord),
    Note(Note),
    Obj(Obj),
    Txo(String),
    MsoDrawing { len: usize },

    // Charts.
    Begin,
    End,
    Chart(ChartRect),
    Series(SeriesCounts),
    SeriesText(String),
    Ai(Ai),
    ChartContainer(ChartObjectKind),

    Unknown { id: u16 },
    Malformed { id: u16, reason: String },
}

/// Decode a framed record.
pub(crate) fn decode(record: &LogicalRecord<'_>, ctx: DecodeContext) -> Record {
    let id = record.id;
    if id == records::RECORD_FILEPASS {
        return Record::FilePass(parse_filepass(ctx.version, &record.data));
    }
    match decode_payload(id, &record.data, &record.continue_positions, ctx) {
        Ok(decoded) => decoded,
        Err(err) => Record::Malformed {
            id,
            reason: err.to_string(),
        },
    }
}

fn decode_payload(
    id: u16,
    data: &[u8],
    continue_positions: &[usize],
    ctx: DecodeContext,
) -> Result<Record, RecordError> {
    if records::is_bof_record(id) {
        return Ok(Record::Bof(globals::parse_bof(id, data)?));
    }
    if let Some(kind) = chart::container_kind(id) {
        return Ok(Record::ChartContainer(kind));
    }

    let decoded = match id {
        records::RECORD_EOF => Record::Eof,

        records::RECORD_BOUNDSHEET => Record::BoundSheet(globals::parse_boundsheet(data, ctx)?),
        RECORD_CODEPAGE => Record::CodePage(globals::parse_u16(data)?),
        RECORD_DATEMODE => Record::DateMode {
            date_1904: globals::parse_u16(data)? != 0,
        },
        RECORD_FONT => Record::Font(globals::parse_font(data, ctx)?),
        RECORD_FORMAT => Record::Format(globals::parse_format(data, ctx)?),
        RECORD_XF => Record::Xf(globals::parse_xf(data, ctx)?),
        RECORD_PALETTE => Record::Palette(globals::parse_palette(data)?),
        RECORD_SST => Record::Sst(sst::parse_sst(data, continue_positions)?),
        RECORD_SUPBOOK => Record::ExternBook(externals::parse_supbook(data, continue_positions)?),
        RECORD_EXTERNSHEET => Record::ExternSheet(externals::parse_externsheet(data, ctx)?),
        RECORD_EXTERNNAME => Record::ExternName(externals::parse_externname(data, ctx)?),
        RECORD_NAME => Record::Name(externals::parse_name(data, ctx, continue_positions)?),
        RECORD_WINDOW1 => Record::Window1 {
            active_tab: globals::parse_window1(data)?,
        },
        records::RECORD_MSODRAWINGGROUP => Record::MsoDrawingGroup(data.to_vec()),
        RECORD_PROTECT => Record::Protect(globals::parse_u16(data)? != 0),
        RECORD_PASSWORD => Record::Password(globals::parse_u16(data)?),

        RECORD_BLANK => {
            let mut r = super::bytes::ByteReader::new(data);
            Record::Blank(CellHeader::read(&mut r)?)
        }
        RECORD_BOOLERR => {
            let (cell, value) = cells::parse_boolerr(data)?;
            Record::BoolErr(cell, value)
        }
        RECORD_NUMBER => {
            let (cell, value) = cells::parse_number(data)?;
            Record::Number(cell, value)
        }
        RECORD_RK => {
            let (cell, value) = cells::parse_rk(data)?;
            Record::Rk(cell, value)
        }
        RECORD_MULRK => Record::MulRk(cells::parse_mulrk(data)?),
        RECORD_MULBLANK => Record::MulBlank(cells::parse_mulblank(data)?),
        RECORD_LABEL => {
            let (cell, text) = cells::parse_label(data, ctx, continue_positions)?;
            Record::Label(cell, text)
        }
        RECORD_LABELSST => {
            let (cell, index) = cells::parse_labelsst(data)?;
            Record::LabelSst(cell, index)
        }
        RECORD_RSTRING => Record::RString(cells::parse_rstring(data, ctx)?),
        RECORD_STRING => Record::String(cells::parse_string(data, ctx, continue_positions)?),
        RECORD_FORMULA => Record::Formula(cells::parse_formula(data)?),
        RECORD_SHRFMLA => Record::SharedFormula(cells::parse_shared_formula(data)?),
        RECORD_ARRAY => Record::Array(cells::parse_array(data)?),

        RECORD_ROW => Record::Row(sheet::parse_row(data)?),
        RECORD_COLINFO => Record::ColInfo(sheet::parse_colinfo(data)?),
        RECORD_DEFCOLWIDTH => Record::DefColWidth(globals::parse_u16(data)?),
        RECORD_DEFAULTROWHEIGHT => {
            Record::DefaultRowHeight(sheet::parse_default_row_height(data)?)
        }
        RECORD_LEFTMARGIN | RECORD_RIGHTMARGIN | RECORD_TOPMARGIN | RECORD_BOTTOMMARGIN => {
            let side = match id {
                RECORD_LEFTMARGIN => MarginSide::Left,
                RECORD_RIGHTMARGIN => MarginSide::Right,
                RECORD_TOPMARGIN => MarginSide::Top,
                _ => MarginSide::Bottom,
            };
            Record::Margin {
                side,
                points: sheet::parse_margin(data)?,
            }
        }
        RECORD_HEADER => Record::Header(sheet::parse_header_footer(data, ctx)?),
        RECORD_FOOTER => Record::Footer(sheet::parse_header_footer(data, ctx)?),
        RECORD_MERGEDCELLS => Record::MergedCells(sheet::parse_merged_cells(data)?),
        RECORD_HLINK => Record::Hlink(sheet::parse_hlink(data, ctx)?),
        RECORD_NOTE => Record::Note(sheet::parse_note(data, ctx)?),
        RECORD_OBJ => Record::Obj(sheet::parse_obj(data)?),
        RECORD_TXO => Record::Txo(sheet::parse_txo(data, continue_positions)?),
        RECORD_MSODRAWING => Record::MsoDrawing {
            len: sheet::parse_msodrawing(data)?,
        },

        chart::RECORD_BEGIN => Record::Begin,
        chart::RECORD_END => Record::End,
        chart::RECORD_CHART => Record::Chart(chart::parse_chart(data)?),
        chart::RECORD_SERIES => Record::Series(chart::parse_series(data)?),
        chart::RECORD_SERIESTEXT => Record::SeriesText(chart::parse_seriestext(data, ctx)?),
        chart::RECORD_AI => Record::Ai(chart::parse_ai(data)?),

        _ => Record::Unknown { id },
    };
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::super::BiffVersion;
    use super::*;
    use pretty_assertions::assert_eq;

    fn logical(id: u16, data: &[u8]) -> LogicalRecord<'_> {
        LogicalRecord {
            offset: 0,
            id,
            data: Cow::Borrowed(data),
            continue_positions: Vec::new(),
        }
    }

    fn ctx() -> DecodeContext {
        DecodeContext::new(BiffVersion::Biff8)
    }

    #[test]
    fn unknown_ids_are_skippable() {
        assert_eq!(decode(&logical(0x7777, &[1, 2, 3]), ctx()), Record::Unknown { id: 0x7777 });
    }

    #[test]
    fn short_known_records_are_malformed() {
        match decode(&logical(RECORD_NUMBER, &[0, 0, 0]), ctx()) {
            Record::Malformed { id, reason } => {
                assert_eq!(id, RECORD_NUMBER);
                assert!(!reason.is_empty());
            }
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn number_and_flags() {
        let mut data = vec![1, 0, 2, 0, 15, 0];
        data.extend_from_slice(&3.25f64.to_le_bytes());
        assert_eq!(
            decode(&logical(RECORD_NUMBER, &data), ctx()),
            Record::Number(
                CellHeader {
                    row: 1,
                    column: 2,
                    xf: 15
                },
                3.25
            )
        );
        assert_eq!(
            decode(&logical(RECORD_DATEMODE, &[1, 0]), ctx()),
            Record::DateMode { date_1904: true }
        );
        assert_eq!(
            decode(&logical(RECORD_TOPMARGIN, &1.0f64.to_le_bytes()), ctx()),
            Record::Margin {
                side: MarginSide::Top,
                points: 72.0
            }
        );
    }

    #[test]
    fn filepass_errors_are_kept_as_values() {
        match decode(&logical(records::RECORD_FILEPASS, &[0x09, 0x00]), ctx()) {
            Record::FilePass(Err(DecryptError::UnsupportedEncryption(_))) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn chart_containers() {
        assert_eq!(
            decode(&logical(chart::RECORD_PLOTAREA, &[]), ctx()),
            Record::ChartContainer(ChartObjectKind::PlotArea)
        );
        assert_eq!(decode(&logical(chart::RECORD_BEGIN, &[]), ctx()), Record::Begin);
    }
}
