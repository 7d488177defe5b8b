//! Workbook-globals state and the lookups worksheet handlers resolve through it.

use std::collections::{BTreeMap, HashMap};

use swinder_model::{
    Color, FillPattern, Format, FormatAlignment, FormatBackground, FormatBorders, FormatFont,
    FormatTable, HorizontalAlignment, NamedArea, Pen, PenStyle, Script, Sheet, SheetKind,
    VerticalAlignment, Workbook,
};

use crate::biff::formula::{
    decode_formula, quote_sheet_name, CellBase, FormulaResolver,
};
use crate::biff::parsers::externals::{ExternBook, ExternSheet, Xti};
use crate::biff::parsers::globals::{BoundSheet, BoundSheetKind, Font, Xf};
use crate::biff::parsers::DecodeContext;
use crate::biff::registry::Record;
use crate::biff::strings::{FormatRun, UnicodeString, DEFAULT_CODEPAGE};
use crate::biff::BiffVersion;
use crate::warnings::Warnings;

/// Colors 8..=63 before any PALETTE record.
const DEFAULT_PALETTE: [u32; 56] = [
    0x000000, 0xFFFFFF, 0xFF0000, 0x00FF00, 0x0000FF, 0xFFFF00, 0xFF00FF, 0x00FFFF, //
    0x800000, 0x008000, 0x000080, 0x808000, 0x800080, 0x008080, 0xC0C0C0, 0x808080, //
    0x9999FF, 0x993366, 0xFFFFCC, 0xCCFFFF, 0x660066, 0xFF8080, 0x0066CC, 0xCCCCFF, //
    0x000080, 0xFF00FF, 0xFFFF00, 0x00FFFF, 0x800080, 0x800000, 0x008080, 0x0000FF, //
    0x00CCFF, 0xCCFFFF, 0xCCFFCC, 0xFFFF99, 0x99CCFF, 0xFF99CC, 0xCC99FF, 0xFFCC99, //
    0x3366FF, 0x33CCCC, 0x99CC00, 0xFFCC00, 0xFF9900, 0xFF6600, 0x666699, 0x969696, //
    0x003366, 0x339966, 0x003300, 0x333300, 0x993300, 0x993366, 0x333399, 0x333333, //
];

/// Colors 0..=7.
const STANDARD_COLORS: [u32; 8] = [
    0x000000, 0xFFFFFF, 0xFF0000, 0x00FF00, 0x0000FF, 0xFFFF00, 0xFF00FF, 0x00FFFF,
];

/// Index of the font slot that is never written.
const RESERVED_FONT_INDEX: usize = 4;

/// Value format strings for the builtin `ifmt` ids.
pub(crate) fn builtin_number_format(index: u16) -> Option<&'static str> {
    let format = match index {
        0 => "General",
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        5 => "\"$\"#,##0_);(\"S\"#,##0)",
        6 => "\"$\"#,##0_);[Red](\"S\"#,##0)",
        7 => "\"$\"#,##0.00_);(\"S\"#,##0.00)",
        8 => "\"$\"#,##0.00_);[Red](\"S\"#,##0.00)",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        12 => "#?/?",
        13 => "#??/??",
        14 => "M/D/YY",
        15 => "D-MMM-YY",
        16 => "D-MMM",
        17 => "MMM-YY",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "M/D/YY h:mm",
        37 => "_(#,##0_);(#,##0)",
        38 => "_(#,##0_);[Red](#,##0)",
        39 => "_(#,##0.00_);(#,##0)",
        40 => "_(#,##0.00_);[Red](#,##0)",
        41 => "_(\"$\"*#,##0_);_(\"$\"*#,##0_);_(\"$\"*\"-\");(@_)",
        42 => "_(*#,##0_);(*(#,##0);_(*\"-\");_(@_)",
        43 | 44 => "_(\"$\"*#,##0.00_);_(\"$\"*#,##0.00_);_(\"$\"*\"-\");(@_)",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mm:ss.0",
        48 => "##0.0E+0",
        49 => "@",
        _ => return None,
    };
    Some(format)
}

/// Pen for an XF border style.
fn border_pen(style: u8, color: Color) -> Pen {
    let (width, pen_style) = match style {
        0 => (0.0, PenStyle::NoLine),
        1 => (0.5, PenStyle::Solid),
        2 => (1.0, PenStyle::Solid),
        3 => (0.5, PenStyle::Dash),
        4 => (0.5, PenStyle::Dot),
        5 => (2.0, PenStyle::Solid),
        6 => (0.5, PenStyle::Double),
        7 => (0.1, PenStyle::Solid),
        8 => (1.0, PenStyle::Dash),
        9 => (0.5, PenStyle::DashDot),
        10 => (1.0, PenStyle::DashDot),
        11 => (0.5, PenStyle::DashDotDot),
        12 => (1.0, PenStyle::DashDotDot),
        // slanted dash-dot
        13 => (1.0, PenStyle::DashDot),
        _ => (0.5, PenStyle::Solid),
    };
    Pen::new(width, pen_style, color)
}

fn fill_pattern(id: u8) -> FillPattern {
    match id {
        0x00 => FillPattern::Empty,
        0x01 => FillPattern::Solid,
        0x02 => FillPattern::Dense4,
        0x03 => FillPattern::Dense3,
        0x04 => FillPattern::Dense5,
        0x05 | 0x0B => FillPattern::Horizontal,
        0x06 | 0x0C => FillPattern::Vertical,
        0x07 | 0x0D => FillPattern::ForwardDiagonal,
        0x08 | 0x0E => FillPattern::BackwardDiagonal,
        0x09 => FillPattern::Dense1,
        0x0A => FillPattern::Dense2,
        0x0F => FillPattern::Cross,
        0x10 => FillPattern::DiagonalCross,
        0x11 => FillPattern::Dense6,
        0x12 => FillPattern::Dense7,
        _ => FillPattern::Solid,
    }
}

/// Rotation as stored in the model: counterclockwise degrees, with clockwise angles folded
/// into the upper half-turn.
pub(crate) fn converted_rotation(trot: u32) -> u32 {
    if trot > 90 {
        360 - (trot - 90)
    } else {
        trot
    }
}

/// State collected from the globals substream.
pub(crate) struct Globals {
    version: BiffVersion,
    codepage: u16,
    fonts: Vec<Font>,
    number_formats: HashMap<u16, String>,
    xfs: Vec<Xf>,
    shared_strings: Vec<UnicodeString>,
    extern_books: Vec<ExternBook>,
    extern_sheets: Vec<Xti>,
    biff5_extern_sheets: Vec<String>,
    names: Vec<String>,
    extern_names: Vec<String>,
    palette: Vec<Color>,
    /// Names of every BOUNDSHEET in tab order, including ones with no `Sheet` in the model.
    tab_names: Vec<String>,
    /// BOF stream offset → index into `Workbook::sheets`.
    bof_sheets: HashMap<u32, usize>,
    drawing_group: Vec<u8>,

    font_cache: HashMap<u16, FormatFont>,
    format_cache: HashMap<u16, Format>,
    format_ids: HashMap<u16, u32>,
}

impl Globals {
    pub(crate) fn new(version: BiffVersion) -> Self {
        Self {
            version,
            codepage: DEFAULT_CODEPAGE,
            fonts: Vec::new(),
            number_formats: HashMap::new(),
            xfs: Vec::new(),
            shared_strings: Vec::new(),
            extern_books: Vec::new(),
            extern_sheets: Vec::new(),
            biff5_extern_sheets: Vec::new(),
            names: Vec::new(),
            extern_names: Vec::new(),
            palette: DEFAULT_PALETTE.iter().map(|&rgb| Color::from_rgb(rgb)).collect(),
            tab_names: Vec::new(),
            bof_sheets: HashMap::new(),
            drawing_group: Vec::new(),
            font_cache: HashMap::new(),
            format_cache: HashMap::new(),
            format_ids: HashMap::new(),
        }
    }

    pub(crate) fn decode_context(&self) -> DecodeContext {
        DecodeContext {
            version: self.version,
            codepage: self.codepage,
        }
    }

    pub(crate) fn palette(&self) -> &[Color] {
        &self.palette
    }

    /// Sheet created by the BOUNDSHEET that points at `bof_position`.
    pub(crate) fn sheet_for_bof(&self, bof_position: usize) -> Option<usize> {
        let position = u32::try_from(bof_position).ok()?;
        self.bof_sheets.get(&position).copied()
    }

    pub(crate) fn drawing_group(&self) -> &[u8] {
        &self.drawing_group
    }

    /// Apply one globals record. Records the globals substream does not own are debug-logged.
    pub(crate) fn handle(&mut self, record: Record, workbook: &mut Workbook, warnings: &mut Warnings) {
        match record {
            Record::Bof(_) | Record::Eof => {}
            Record::BoundSheet(bound) => self.bound_sheet(bound, workbook),
            Record::CodePage(codepage) => {
                log::debug!("workbook codepage {codepage}");
                self.codepage = codepage;
            }
            Record::DateMode { date_1904 } => {
                if date_1904 {
                    log::warn!("workbook uses the 1904 date system; serial values are kept as stored");
                }
                workbook.date_1904 = date_1904;
            }
            Record::Font(font) => {
                self.fonts.push(font);
                if self.fonts.len() == RESERVED_FONT_INDEX {
                    self.fonts.push(Font::default());
                }
            }
            Record::Format(format) => {
                self.number_formats.insert(format.index, format.format_string);
            }
            Record::Xf(xf) => self.xfs.push(xf),
            Record::Palette(colors) => {
                for (slot, color) in self.palette.iter_mut().zip(colors) {
                    *slot = color;
                }
                self.font_cache.clear();
                self.format_cache.clear();
                self.format_ids.clear();
                workbook.colors = self.palette.clone();
            }
            Record::Sst(sst) => {
                if sst.truncated {
                    warnings.push(format!(
                        "SST holds {} strings but the record ended early",
                        sst.strings.len()
                    ));
                }
                self.shared_strings = sst.strings;
            }
            Record::ExternBook(book) => self.extern_books.push(book),
            Record::ExternSheet(ExternSheet::Biff8(entries)) => self.extern_sheets = entries,
            Record::ExternSheet(ExternSheet::Biff5 { name, self_ref }) => {
                self.biff5_extern_sheets
                    .push(if self_ref { String::new() } else { name });
            }
            Record::ExternName(name) => self.extern_names.push(name),
            Record::Name(name) => {
                self.names.push(name.name.clone());
                let decoded = decode_formula(
                    &name.formula,
                    CellBase::default(),
                    self.decode_context(),
                    &*self,
                );
                for warning in decoded.warnings {
                    warnings.push(format!("defined name {}: {warning}", name.name));
                }
                workbook.named_areas.push(NamedArea {
                    name: name.name,
                    sheet: (name.sheet > 0).then(|| u32::from(name.sheet) - 1),
                    formula: decoded.text,
                    builtin: name.builtin,
                });
            }
            Record::Window1 { active_tab } => workbook.active_tab = u32::from(active_tab),
            Record::Protect(protected) => workbook.protected = protected,
            Record::Password(hash) => workbook.password_hash = (hash != 0).then_some(hash),
            Record::MsoDrawingGroup(bytes) => self.drawing_group.extend_from_slice(&bytes),
            Record::Malformed { id, reason } => {
                warnings.push(format!("malformed globals record 0x{id:04X}: {reason}"));
            }
            other => log::debug!("globals substream ignores {other:?}"),
        }
    }

    fn bound_sheet(&mut self, bound: BoundSheet, workbook: &mut Workbook) {
        self.tab_names.push(bound.name.clone());
        let kind = match bound.kind {
            BoundSheetKind::Worksheet => SheetKind::Worksheet,
            BoundSheetKind::Chart => SheetKind::Chart,
            other => {
                log::debug!("skipping {other:?} sheet {:?}", bound.name);
                return;
            }
        };
        let mut sheet = Sheet::new(bound.name);
        sheet.kind = kind;
        sheet.visibility = bound.visibility;
        let index = workbook.add_sheet(sheet);
        self.bof_sheets.insert(bound.bof_position, index);
    }

    /// Map a palette index to a color.
    pub(crate) fn converted_color(&self, index: u16) -> Color {
        match index {
            0..=7 => Color::from_rgb(STANDARD_COLORS[index as usize]),
            8..=0x3F => self
                .palette
                .get(index as usize - 8)
                .copied()
                .unwrap_or_else(Color::black),
            0x41 => Color::white(),
            _ => Color::black(),
        }
    }

    /// Font for a FONT index. Unknown indices give a null font.
    pub(crate) fn converted_font(&mut self, index: u16) -> FormatFont {
        if let Some(font) = self.font_cache.get(&index) {
            return font.clone();
        }
        let Some(record) = self.fonts.get(index as usize) else {
            return FormatFont::new();
        };

        let mut font = FormatFont::new();
        font.set_font_size(f64::from(record.height) / 20.0);
        font.set_font_family(record.name.clone());
        font.set_color(self.converted_color(record.color_index));
        font.set_bold(record.weight > 500);
        font.set_italic(record.italic);
        font.set_strikeout(record.strikeout);
        font.set_script(match record.escapement {
            1 => Script::Superscript,
            2 => Script::Subscript,
            _ => Script::None,
        });
        font.set_underline(record.underline != 0);

        self.font_cache.insert(index, font.clone());
        font
    }

    /// Value format string for a FORMAT index.
    fn value_format(&self, index: u16, warnings: &mut Warnings) -> String {
        if let Some(custom) = self.number_formats.get(&index) {
            return custom.clone();
        }
        if let Some(builtin) = builtin_number_format(index) {
            return builtin.to_string();
        }
        warnings.push(format!("unknown number format {index}; using General"));
        "General".to_string()
    }

    /// Format described by an XF index. Unknown indices give a null format.
    pub(crate) fn converted_format(&mut self, index: u16, warnings: &mut Warnings) -> Format {
        if let Some(format) = self.format_cache.get(&index) {
            return format.clone();
        }
        let Some(xf) = self.xfs.get(index as usize).cloned() else {
            return Format::new();
        };

        let mut format = Format::new();
        format.value_format = self.value_format(xf.format_index, warnings);
        format.font = self.converted_font(xf.font_index);
        format.alignment = converted_alignment(&xf);
        format.borders = self.converted_borders(&xf);
        format.background = self.converted_background(&xf);

        self.format_cache.insert(index, format.clone());
        format
    }

    /// Intern the format of an XF into `formats`, caching the slot per XF.
    pub(crate) fn converted_format_id(
        &mut self,
        index: u16,
        formats: &mut FormatTable,
        warnings: &mut Warnings,
    ) -> u32 {
        if let Some(&id) = self.format_ids.get(&index) {
            return id;
        }
        let format = self.converted_format(index, warnings);
        let id = formats.intern(format);
        self.format_ids.insert(index, id);
        id
    }

    fn converted_borders(&self, xf: &Xf) -> FormatBorders {
        let mut borders = FormatBorders::new();
        borders.set_left_border(border_pen(xf.left_style, self.converted_color(xf.left_color)));
        borders.set_right_border(border_pen(xf.right_style, self.converted_color(xf.right_color)));
        borders.set_top_border(border_pen(xf.top_style, self.converted_color(xf.top_color)));
        borders.set_bottom_border(border_pen(
            xf.bottom_style,
            self.converted_color(xf.bottom_color),
        ));
        if xf.diagonal_down {
            borders.set_diagonal_down(border_pen(
                xf.diagonal_style,
                self.converted_color(xf.diagonal_color),
            ));
        }
        if xf.diagonal_up {
            borders.set_diagonal_up(border_pen(
                xf.diagonal_style,
                self.converted_color(xf.diagonal_color),
            ));
        }
        borders
    }

    fn converted_background(&self, xf: &Xf) -> FormatBackground {
        let mut background = FormatBackground::new();
        background.set_pattern(fill_pattern(xf.fill_pattern));
        background.set_foreground_color(self.converted_color(xf.pattern_fore_color));
        background.set_background_color(self.converted_color(xf.pattern_back_color));
        background
    }

    /// Text of a shared string; out of range gives an empty string.
    pub(crate) fn string_from_sst(&self, index: u32) -> &str {
        self.shared_strings
            .get(index as usize)
            .map(|s| s.text.as_str())
            .unwrap_or("")
    }

    /// Formatting runs of a shared string (character index → font index); out of range gives
    /// no runs.
    pub(crate) fn format_runs_from_sst(&self, index: u32) -> BTreeMap<u32, u16> {
        self.shared_strings
            .get(index as usize)
            .map(|s| runs_by_char(&s.runs))
            .unwrap_or_default()
    }

    /// Resolve runs to fonts.
    pub(crate) fn rich_runs(&mut self, runs: &BTreeMap<u32, u16>) -> BTreeMap<u32, FormatFont> {
        runs.iter()
            .map(|(&position, &font)| (position, self.converted_font(font)))
            .collect()
    }

    /// Defined name by one-based index.
    pub(crate) fn name_from_index(&self, index: u16) -> Option<&str> {
        let slot = usize::from(index).checked_sub(1)?;
        self.names.get(slot).map(String::as_str)
    }

    /// External name by one-based index.
    pub(crate) fn extern_name_from_index(&self, index: u16) -> Option<&str> {
        let slot = usize::from(index).checked_sub(1)?;
        self.extern_names.get(slot).map(String::as_str)
    }

    fn biff8_extern_sheet(&self, index: u16) -> String {
        let error = || "Error".to_string();
        let Some(xti) = self.extern_sheets.get(index as usize) else {
            return error();
        };
        match self.extern_books.get(xti.book as usize) {
            Some(ExternBook::Internal { .. }) => {
                let Ok(tab) = usize::try_from(xti.first_sheet) else {
                    return error();
                };
                match self.tab_names.get(tab) {
                    Some(name) => quote_sheet_name(name),
                    None => error(),
                }
            }
            Some(ExternBook::External { path, .. }) => quote_sheet_name(path),
            Some(ExternBook::AddIn) | None => error(),
        }
    }
}

fn runs_by_char(runs: &[FormatRun]) -> BTreeMap<u32, u16> {
    runs.iter()
        .map(|run| (u32::from(run.char_index), run.font_index))
        .collect()
}

fn converted_alignment(xf: &Xf) -> FormatAlignment {
    let mut alignment = FormatAlignment::new();
    let horizontal = match xf.horizontal {
        1 => Some(HorizontalAlignment::Left),
        2 | 6 => Some(HorizontalAlignment::Center),
        3 => Some(HorizontalAlignment::Right),
        4 => Some(HorizontalAlignment::Fill),
        5 => Some(HorizontalAlignment::Justify),
        7 => Some(HorizontalAlignment::Distributed),
        _ => None,
    };
    if let Some(horizontal) = horizontal {
        alignment.set_horizontal(horizontal);
    }
    alignment.set_vertical(match xf.vertical {
        0 => VerticalAlignment::Top,
        1 => VerticalAlignment::Middle,
        3 => VerticalAlignment::Justify,
        4 => VerticalAlignment::Distributed,
        _ => VerticalAlignment::Bottom,
    });
    alignment.set_wrap(xf.wrap);
    alignment.set_shrink_to_fit(xf.shrink_to_fit);
    alignment.set_indent_level(u32::from(xf.indent));
    if xf.stacked_letters() {
        alignment.set_stacked_letters(true);
    } else {
        alignment.set_rotation_angle(converted_rotation(u32::from(xf.rotation)));
    }
    alignment
}

impl FormulaResolver for Globals {
    fn extern_sheet(&self, index: u16) -> String {
        match self.version {
            BiffVersion::Biff8 => self.biff8_extern_sheet(index),
            BiffVersion::Biff5 => match self.biff5_extern_sheets.get(index as usize) {
                Some(name) if !name.is_empty() => quote_sheet_name(name),
                _ => "Error".to_string(),
            },
        }
    }

    fn sheet_name(&self, index: u16) -> Option<&str> {
        self.tab_names.get(index as usize).map(String::as_str)
    }

    fn defined_name(&self, index: u16) -> Option<&str> {
        self.name_from_index(index)
    }

    fn extern_name(&self, index: u16) -> Option<&str> {
        self.extern_name_from_index(index)
    }
}
