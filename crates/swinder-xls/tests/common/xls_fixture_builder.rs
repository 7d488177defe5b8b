#![allow(dead_code)]

use std::io::{Cursor, Write};

// Just enough BIFF5/BIFF8 to exercise the reader. Record ids stay named so fixtures read like the
// record sequence they produce.
pub const RECORD_BOF: u16 = 0x0809;
pub const RECORD_EOF: u16 = 0x000A;
pub const RECORD_CODEPAGE: u16 = 0x0042;
pub const RECORD_DATEMODE: u16 = 0x0022;
pub const RECORD_FILEPASS: u16 = 0x002F;
pub const RECORD_FONT: u16 = 0x0031;
pub const RECORD_FORMAT: u16 = 0x041E;
pub const RECORD_XF: u16 = 0x00E0;
pub const RECORD_BOUNDSHEET: u16 = 0x0085;
pub const RECORD_SST: u16 = 0x00FC;
pub const RECORD_CONTINUE: u16 = 0x003C;
pub const RECORD_WINDOW1: u16 = 0x003D;
pub const RECORD_LABELSST: u16 = 0x00FD;
pub const RECORD_LABEL: u16 = 0x0204;
pub const RECORD_NUMBER: u16 = 0x0203;
pub const RECORD_FORMULA: u16 = 0x0006;
pub const RECORD_MERGEDCELLS: u16 = 0x00E5;
pub const RECORD_MULRK: u16 = 0x00BD;
pub const RECORD_MULBLANK: u16 = 0x00BE;
pub const RECORD_BLANK: u16 = 0x0201;
pub const RECORD_BOOLERR: u16 = 0x0205;
pub const RECORD_RK: u16 = 0x027E;
pub const RECORD_RSTRING: u16 = 0x00D6;
pub const RECORD_STRING: u16 = 0x0207;
pub const RECORD_SHRFMLA: u16 = 0x04BC;
pub const RECORD_ARRAY: u16 = 0x0221;
pub const RECORD_ROW: u16 = 0x0208;
pub const RECORD_COLINFO: u16 = 0x007D;
pub const RECORD_HLINK: u16 = 0x01B8;
pub const RECORD_NOTE: u16 = 0x001C;
pub const RECORD_OBJ: u16 = 0x005D;
pub const RECORD_TXO: u16 = 0x01B6;
pub const RECORD_HEADER: u16 = 0x0014;

const BOF_VERSION_BIFF5: u16 = 0x0500;
const BOF_VERSION_BIFF8: u16 = 0x0600;
const BOF_DT_WORKBOOK_GLOBALS: u16 = 0x0005;
const BOF_DT_WORKSHEET: u16 = 0x0010;

const COLOR_AUTOMATIC: u16 = 0x7FFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Biff5,
    Biff8,
}

pub fn push_record(out: &mut Vec<u8>, id: u16, data: &[u8]) {
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&(data.len() as u16).to_le_bytes());
    out.extend_from_slice(data);
}

fn bof(version: Version, dt: u16) -> Vec<u8> {
    // [0..2] BIFF version, [2..4] substream type; build/year fields keep stable defaults.
    let mut out = vec![0u8; if version == Version::Biff8 { 16 } else { 8 }];
    let vers = match version {
        Version::Biff5 => BOF_VERSION_BIFF5,
        Version::Biff8 => BOF_VERSION_BIFF8,
    };
    out[0..2].copy_from_slice(&vers.to_le_bytes());
    out[2..4].copy_from_slice(&dt.to_le_bytes());
    out[4..6].copy_from_slice(&0x0DBBu16.to_le_bytes()); // build
    out[6..8].copy_from_slice(&0x07CCu16.to_le_bytes()); // year
    out
}

/// 8-bit-length string as FONT/BOUNDSHEET store it.
pub fn write_short_string(out: &mut Vec<u8>, version: Version, s: &str) {
    let bytes = s.as_bytes();
    out.push(bytes.len() as u8);
    if version == Version::Biff8 {
        out.push(0); // compressed
    }
    out.extend_from_slice(bytes);
}

/// 16-bit-length string (`XLUnicodeString` with 8-bit characters in BIFF8).
pub fn write_string(out: &mut Vec<u8>, version: Version, s: &str) {
    let bytes = s.as_bytes();
    out.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    if version == Version::Biff8 {
        out.push(0);
    }
    out.extend_from_slice(bytes);
}

pub fn font(version: Version, height_twips: u16, weight: u16, name: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&height_twips.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // option flags
    out.extend_from_slice(&COLOR_AUTOMATIC.to_le_bytes());
    out.extend_from_slice(&weight.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // escapement
    out.push(0); // underline
    out.push(0); // family
    out.push(0); // charset
    out.push(0); // reserved
    write_short_string(&mut out, version, name);
    out
}

pub fn format_record(version: Version, id: u16, code: &str) -> Vec<u8> {
    let mut out = id.to_le_bytes().to_vec();
    match version {
        Version::Biff8 => write_string(&mut out, version, code),
        Version::Biff5 => write_short_string(&mut out, version, code),
    }
    out
}

/// Cell XF with bottom alignment and no borders.
pub fn xf(version: Version, font_idx: u16, fmt_idx: u16) -> Vec<u8> {
    let mut out = vec![0u8; if version == Version::Biff8 { 20 } else { 16 }];
    out[0..2].copy_from_slice(&font_idx.to_le_bytes());
    out[2..4].copy_from_slice(&fmt_idx.to_le_bytes());
    out[4..6].copy_from_slice(&0x0001u16.to_le_bytes()); // locked cell XF
    out[6] = 0x20; // general, bottom
    out
}

pub fn sst(strings: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(strings.len() as u32).to_le_bytes());
    out.extend_from_slice(&(strings.len() as u32).to_le_bytes());
    for s in strings {
        write_string(&mut out, Version::Biff8, s);
    }
    out
}

fn cell_header(row: u16, col: u16, xf: u16) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&row.to_le_bytes());
    out.extend_from_slice(&col.to_le_bytes());
    out.extend_from_slice(&xf.to_le_bytes());
    out
}

pub fn labelsst(row: u16, col: u16, xf: u16, isst: u32) -> Vec<u8> {
    let mut out = cell_header(row, col, xf);
    out.extend_from_slice(&isst.to_le_bytes());
    out
}

pub fn label(version: Version, row: u16, col: u16, xf: u16, text: &str) -> Vec<u8> {
    let mut out = cell_header(row, col, xf);
    write_string(&mut out, version, text);
    out
}

pub fn label_bytes(row: u16, col: u16, xf: u16, raw: &[u8]) -> Vec<u8> {
    let mut out = cell_header(row, col, xf);
    out.extend_from_slice(&(raw.len() as u16).to_le_bytes());
    out.extend_from_slice(raw);
    out
}

pub fn number(row: u16, col: u16, xf: u16, value: f64) -> Vec<u8> {
    let mut out = cell_header(row, col, xf);
    out.extend_from_slice(&value.to_le_bytes());
    out
}

/// FORMULA with a numeric cached result.
pub fn formula(row: u16, col: u16, xf: u16, cached: f64, rgce: &[u8]) -> Vec<u8> {
    let mut out = cell_header(row, col, xf);
    out.extend_from_slice(&cached.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // grbit
    out.extend_from_slice(&0u32.to_le_bytes()); // chn
    out.extend_from_slice(&(rgce.len() as u16).to_le_bytes());
    out.extend_from_slice(rgce);
    out
}

/// BIFF8 PtgRef with both coordinates relative.
pub fn ptg_ref(row: u16, col: u16) -> Vec<u8> {
    let mut out = vec![0x24];
    out.extend_from_slice(&row.to_le_bytes());
    out.extend_from_slice(&(col | 0xC000).to_le_bytes());
    out
}

/// MULRK with one integer RK per column starting at `first_col`.
pub fn mulrk(row: u16, first_col: u16, values: &[i32]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&row.to_le_bytes());
    out.extend_from_slice(&first_col.to_le_bytes());
    for &v in values {
        out.extend_from_slice(&0u16.to_le_bytes()); // xf
        out.extend_from_slice(&(((v as u32) << 2) | 0x02).to_le_bytes());
    }
    let last = first_col.wrapping_add(values.len() as u16).wrapping_sub(1);
    out.extend_from_slice(&last.to_le_bytes());
    out
}

pub fn mulblank(row: u16, first_col: u16, count: u16) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&row.to_le_bytes());
    out.extend_from_slice(&first_col.to_le_bytes());
    for _ in 0..count {
        out.extend_from_slice(&0u16.to_le_bytes());
    }
    out.extend_from_slice(&first_col.wrapping_add(count).wrapping_sub(1).to_le_bytes());
    out
}

pub fn merged_cells(ranges: &[(u16, u16, u16, u16)]) -> Vec<u8> {
    let mut out = (ranges.len() as u16).to_le_bytes().to_vec();
    for &(rw_first, rw_last, col_first, col_last) in ranges {
        for v in [rw_first, rw_last, col_first, col_last] {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
    out
}

pub fn window1(active_tab: u16) -> Vec<u8> {
    let mut out = vec![0u8; 18];
    out[10..12].copy_from_slice(&active_tab.to_le_bytes());
    out[14..16].copy_from_slice(&1u16.to_le_bytes()); // cTabSel
    out[16..18].copy_from_slice(&600u16.to_le_bytes()); // wTabRatio
    out
}

struct SheetSpec {
    name: String,
    records: Vec<u8>,
}

/// Assembles a workbook stream: globals, one BOUNDSHEET per sheet, then each sheet substream.
pub struct WorkbookBuilder {
    version: Version,
    globals: Vec<u8>,
    sheets: Vec<SheetSpec>,
}

impl WorkbookBuilder {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            globals: Vec::new(),
            sheets: Vec::new(),
        }
    }

    pub fn biff8() -> Self {
        Self::new(Version::Biff8)
    }

    pub fn biff5() -> Self {
        Self::new(Version::Biff5)
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Append a record to the globals substream (before the BOUNDSHEETs).
    pub fn global(mut self, id: u16, payload: &[u8]) -> Self {
        push_record(&mut self.globals, id, payload);
        self
    }

    /// Add a worksheet; `records` is its body without BOF/EOF (see [`push_record`]).
    pub fn sheet(mut self, name: &str, records: Vec<u8>) -> Self {
        self.sheets.push(SheetSpec {
            name: name.to_string(),
            records,
        });
        self
    }

    fn boundsheet(&self, offset: u32, name: &str) -> Vec<u8> {
        let mut out = offset.to_le_bytes().to_vec();
        out.push(0); // visible
        out.push(0); // worksheet
        write_short_string(&mut out, self.version, name);
        out
    }

    pub fn build_stream(&self) -> Vec<u8> {
        let mut globals = Vec::new();
        push_record(&mut globals, RECORD_BOF, &bof(self.version, BOF_DT_WORKBOOK_GLOBALS));
        globals.extend_from_slice(&self.globals);

        let boundsheets_len: usize = self
            .sheets
            .iter()
            .map(|s| 4 + self.boundsheet(0, &s.name).len())
            .sum();
        let mut offset = globals.len() + boundsheets_len + 4;

        let mut substreams = Vec::new();
        for sheet in &self.sheets {
            push_record(
                &mut globals,
                RECORD_BOUNDSHEET,
                &self.boundsheet(offset as u32, &sheet.name),
            );
            let mut body = Vec::new();
            push_record(&mut body, RECORD_BOF, &bof(self.version, BOF_DT_WORKSHEET));
            body.extend_from_slice(&sheet.records);
            push_record(&mut body, RECORD_EOF, &[]);
            offset += body.len();
            substreams.push(body);
        }
        push_record(&mut globals, RECORD_EOF, &[]);

        for body in substreams {
            globals.extend_from_slice(&body);
        }
        globals
    }

    pub fn build_xls(&self) -> Vec<u8> {
        let stream_name = match self.version {
            Version::Biff8 => "Workbook",
            Version::Biff5 => "Book",
        };
        wrap_in_cfb(stream_name, &self.build_stream())
    }
}

pub fn wrap_in_cfb(stream_name: &str, workbook_stream: &[u8]) -> Vec<u8> {
    let cursor = Cursor::new(Vec::new());
    let mut ole = cfb::CompoundFile::create(cursor).expect("create cfb");
    {
        let mut stream = ole.create_stream(stream_name).expect("workbook stream");
        stream
            .write_all(workbook_stream)
            .expect("write workbook stream");
    }
    ole.into_inner().into_inner()
}

/// Workbook with one FONT (12pt), one XF using it, a two-entry SST and a `Data` sheet whose A1
/// holds SST entry 1.
pub fn build_shared_string_workbook() -> WorkbookBuilder {
    let v = Version::Biff8;
    let mut sheet = Vec::new();
    push_record(&mut sheet, RECORD_LABELSST, &labelsst(0, 0, 0, 1));
    push_record(&mut sheet, RECORD_NUMBER, &number(1, 0, 0, 2.5));
    WorkbookBuilder::biff8()
        .global(RECORD_FONT, &font(v, 240, 400, "Arial"))
        .global(RECORD_XF, &xf(v, 0, 0))
        .global(RECORD_SST, &sst(&["Alpha", "Beta"]))
        .sheet("Data", sheet)
}
