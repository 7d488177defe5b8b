//! Workbook-globals records: BOF, BOUNDSHEET, FONT, FORMAT, XF, PALETTE and the one-field flags.

use swinder_model::{Color, SheetVisibility};

use super::super::bytes::ByteReader;
use super::super::strings::{read_byte_string, read_long_string, read_short_string, LengthPrefix};
use super::super::{bof_version, BiffVersion};
use super::{DecodeContext, RecordError};

/// `BOF.dt`: the kind of substream a BOF opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubstreamKind {
    Workbook,
    VbModule,
    Worksheet,
    Chart,
    MacroSheet,
    Workspace,
    Other(u16),
}

impl SubstreamKind {
    fn from_dt(dt: u16) -> Self {
        match dt {
            0x0005 => SubstreamKind::Workbook,
            0x0006 => SubstreamKind::VbModule,
            0x0010 => SubstreamKind::Worksheet,
            0x0020 => SubstreamKind::Chart,
            0x0040 => SubstreamKind::MacroSheet,
            0x0100 => SubstreamKind::Workspace,
            other => SubstreamKind::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Bof {
    pub(crate) version: Option<BiffVersion>,
    pub(crate) kind: SubstreamKind,
}

pub(crate) fn parse_bof(record_id: u16, data: &[u8]) -> Result<Bof, RecordError> {
    let mut r = ByteReader::new(data);
    let _version = r.u16()?;
    let dt = r.u16()?;
    Ok(Bof {
        version: bof_version(record_id, data),
        kind: SubstreamKind::from_dt(dt),
    })
}

/// `BOUNDSHEET.dt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BoundSheetKind {
    Worksheet,
    MacroSheet,
    Chart,
    VbModule,
    Other(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BoundSheet {
    /// Stream offset of the sheet's BOF record.
    pub(crate) bof_position: u32,
    pub(crate) visibility: SheetVisibility,
    pub(crate) kind: BoundSheetKind,
    pub(crate) name: String,
}

pub(crate) fn parse_boundsheet(data: &[u8], ctx: DecodeContext) -> Result<BoundSheet, RecordError> {
    let mut r = ByteReader::new(data);
    let bof_position = r.u32()?;
    let state = r.u8()?;
    let dt = r.u8()?;
    let (name, _) = read_short_string(r.rest(), ctx.version, ctx.codepage)?;

    let visibility = match state & 0x03 {
        0 => SheetVisibility::Visible,
        1 => SheetVisibility::Hidden,
        _ => SheetVisibility::VeryHidden,
    };
    let kind = match dt {
        0x00 => BoundSheetKind::Worksheet,
        0x01 => BoundSheetKind::MacroSheet,
        0x02 => BoundSheetKind::Chart,
        0x06 => BoundSheetKind::VbModule,
        other => BoundSheetKind::Other(other),
    };

    Ok(BoundSheet {
        bof_position,
        visibility,
        kind,
        name,
    })
}

/// FONT record fields the resolver needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Font {
    /// Height in twips.
    pub(crate) height: u16,
    pub(crate) italic: bool,
    pub(crate) strikeout: bool,
    pub(crate) color_index: u16,
    /// 400 normal, 700 bold.
    pub(crate) weight: u16,
    /// 0 none, 1 superscript, 2 subscript.
    pub(crate) escapement: u16,
    pub(crate) underline: u8,
    pub(crate) name: String,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            height: 200,
            italic: false,
            strikeout: false,
            color_index: 0x7FFF,
            weight: 400,
            escapement: 0,
            underline: 0,
            name: "Arial".to_string(),
        }
    }
}

const FONT_ITALIC: u16 = 0x0002;
const FONT_STRIKEOUT: u16 = 0x0008;

pub(crate) fn parse_font(data: &[u8], ctx: DecodeContext) -> Result<Font, RecordError> {
    let mut r = ByteReader::new(data);
    let height = r.u16()?;
    let grbit = r.u16()?;
    let color_index = r.u16()?;
    let weight = r.u16()?;
    let escapement = r.u16()?;
    let underline = r.u8()?;
    // family, charset, reserved
    r.skip(3)?;
    let (name, _) = read_short_string(r.rest(), ctx.version, ctx.codepage)?;

    Ok(Font {
        height,
        italic: grbit & FONT_ITALIC != 0,
        strikeout: grbit & FONT_STRIKEOUT != 0,
        color_index,
        weight,
        escapement,
        underline,
        name,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NumberFormat {
    pub(crate) index: u16,
    pub(crate) format_string: String,
}

pub(crate) fn parse_format(data: &[u8], ctx: DecodeContext) -> Result<NumberFormat, RecordError> {
    let mut r = ByteReader::new(data);
    let index = r.u16()?;
    let (format_string, _) = match ctx.version {
        BiffVersion::Biff8 => read_long_string(r.rest(), ctx.version, ctx.codepage)?,
        BiffVersion::Biff5 => read_byte_string(r.rest(), LengthPrefix::U8, ctx.codepage)?,
    };
    Ok(NumberFormat {
        index,
        format_string,
    })
}

pub(crate) fn parse_palette(data: &[u8]) -> Result<Vec<Color>, RecordError> {
    let mut r = ByteReader::new(data);
    let count = r.u16()? as usize;
    let mut colors = Vec::with_capacity(count.min(r.remaining() / 4));
    for _ in 0..count {
        let rgb = r.bytes(4)?;
        colors.push(Color::new(rgb[0], rgb[1], rgb[2]));
    }
    Ok(colors)
}

/// WINDOW1: only the selected tab is kept.
pub(crate) fn parse_window1(data: &[u8]) -> Result<u16, RecordError> {
    let mut r = ByteReader::at(data, 10);
    Ok(r.u16()?)
}

/// CODEPAGE, DATEMODE, PROTECT, PASSWORD and friends: a single u16.
pub(crate) fn parse_u16(data: &[u8]) -> Result<u16, RecordError> {
    let mut r = ByteReader::new(data);
    Ok(r.u16()?)
}

/// Extended format (XF) fields in a version-independent shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Xf {
    pub(crate) font_index: u16,
    pub(crate) format_index: u16,
    pub(crate) is_style: bool,
    pub(crate) parent: u16,
    /// `alc`: 0 general, 1 left, 2 center, 3 right, 4 fill, 5 justify, 6 center across, 7 distributed.
    pub(crate) horizontal: u8,
    /// `alcV`: 0 top, 1 center, 2 bottom, 3 justify, 4 distributed.
    pub(crate) vertical: u8,
    pub(crate) wrap: bool,
    /// `trot`: 0-90 counterclockwise, 91-180 clockwise, 255 stacked.
    pub(crate) rotation: u8,
    pub(crate) indent: u8,
    pub(crate) shrink_to_fit: bool,
    pub(crate) left_style: u8,
    pub(crate) right_style: u8,
    pub(crate) top_style: u8,
    pub(crate) bottom_style: u8,
    pub(crate) diagonal_style: u8,
    pub(crate) left_color: u16,
    pub(crate) right_color: u16,
    pub(crate) top_color: u16,
    pub(crate) bottom_color: u16,
    pub(crate) diagonal_color: u16,
    pub(crate) diagonal_down: bool,
    pub(crate) diagonal_up: bool,
    pub(crate) fill_pattern: u8,
    pub(crate) pattern_fore_color: u16,
    pub(crate) pattern_back_color: u16,
}

impl Xf {
    pub(crate) fn stacked_letters(&self) -> bool {
        self.rotation == 0xFF
    }
}

fn bits(value: u32, shift: u32, width: u32) -> u32 {
    (value >> shift) & ((1 << width) - 1)
}

pub(crate) fn parse_xf(data: &[u8], ctx: DecodeContext) -> Result<Xf, RecordError> {
    let mut r = ByteReader::new(data);
    let font_index = r.u16()?;
    let format_index = r.u16()?;
    let type_prot = r.u16()?;
    let align = r.u8()?;

    let mut xf = Xf {
        font_index,
        format_index,
        is_style: type_prot & 0x0004 != 0,
        parent: type_prot >> 4,
        horizontal: align & 0x07,
        wrap: align & 0x08 != 0,
        vertical: (align >> 4) & 0x07,
        ..Xf::default()
    };

    match ctx.version {
        BiffVersion::Biff8 => {
            xf.rotation = r.u8()?;
            let indent = r.u8()?;
            xf.indent = indent & 0x0F;
            xf.shrink_to_fit = indent & 0x10 != 0;
            let _used_attributes = r.u8()?;

            let border1 = r.u32()?;
            xf.left_style = bits(border1, 0, 4) as u8;
            xf.right_style = bits(border1, 4, 4) as u8;
            xf.top_style = bits(border1, 8, 4) as u8;
            xf.bottom_style = bits(border1, 12, 4) as u8;
            xf.left_color = bits(border1, 16, 7) as u16;
            xf.right_color = bits(border1, 23, 7) as u16;
            let diagonal = bits(border1, 30, 2);
            xf.diagonal_down = diagonal & 0x1 != 0;
            xf.diagonal_up = diagonal & 0x2 != 0;

            let border2 = r.u32()?;
            xf.top_color = bits(border2, 0, 7) as u16;
            xf.bottom_color = bits(border2, 7, 7) as u16;
            xf.diagonal_color = bits(border2, 14, 7) as u16;
            xf.diagonal_style = bits(border2, 21, 4) as u8;
            xf.fill_pattern = bits(border2, 26, 6) as u8;

            let fill = r.u16()? as u32;
            xf.pattern_fore_color = bits(fill, 0, 7) as u16;
            xf.pattern_back_color = bits(fill, 7, 7) as u16;
        }
        BiffVersion::Biff5 => {
            let orientation = r.u8()?;
            xf.rotation = match orientation & 0x03 {
                1 => 0xFF,
                2 => 90,
                3 => 180,
                _ => 0,
            };

            let area = r.u32()?;
            xf.pattern_fore_color = bits(area, 0, 7) as u16;
            xf.pattern_back_color = bits(area, 7, 7) as u16;
            xf.fill_pattern = bits(area, 16, 6) as u8;
            xf.bottom_style = bits(area, 22, 3) as u8;
            xf.bottom_color = bits(area, 25, 7) as u16;

            let border = r.u32()?;
            xf.top_style = bits(border, 0, 3) as u8;
            xf.left_style = bits(border, 3, 3) as u8;
            xf.right_style = bits(border, 6, 3) as u8;
            xf.top_color = bits(border, 9, 7) as u16;
            xf.left_color = bits(border, 16, 7) as u16;
            xf.right_color = bits(border, 23, 7) as u16;
        }
    }

    Ok(xf)
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

    fn font_payload(name: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&240u16.to_le_bytes());
        out.extend_from_slice(&(FONT_ITALIC).to_le_bytes());
        out.extend_from_slice(&10u16.to_le_bytes());
        out.extend_from_slice(&700u16.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.push(1);
        out.extend_from_slice(&[0, 0, 0]);
        out.push(name.len() as u8);
        out.push(0);
        out.extend_from_slice(name.as_bytes());
        out
    }

    #[test]
    fn parses_biff8_font() {
        let font = parse_font(&font_payload("Verdana"), BIFF8).unwrap();
        assert_eq!(
            font,
            Font {
                height: 240,
                italic: true,
                strikeout: false,
                color_index: 10,
                weight: 700,
                escapement: 2,
                underline: 1,
                name: "Verdana".to_string(),
            }
        );
    }

    #[test]
    fn truncated_font_is_an_error() {
        let payload = font_payload("Verdana");
        assert!(parse_font(&payload[..9], BIFF8).is_err());
        assert!(parse_font(&payload[..payload.len() - 1], BIFF8).is_err());
    }

    #[test]
    fn parses_boundsheet_state_and_kind() {
        let mut payload = 0x1234u32.to_le_bytes().to_vec();
        payload.extend_from_slice(&[0x02, 0x02, 3, 0]);
        payload.extend_from_slice(b"Cht");
        let sheet = parse_boundsheet(&payload, BIFF8).unwrap();
        assert_eq!(sheet.bof_position, 0x1234);
        assert_eq!(sheet.visibility, SheetVisibility::VeryHidden);
        assert_eq!(sheet.kind, BoundSheetKind::Chart);
        assert_eq!(sheet.name, "Cht");
    }

    #[test]
    fn biff5_boundsheet_name_uses_codepage() {
        let mut payload = 0u32.to_le_bytes().to_vec();
        payload.extend_from_slice(&[0x00, 0x00, 2, 0xC4, b'b']);
        let sheet = parse_boundsheet(&payload, BIFF5).unwrap();
        assert_eq!(sheet.name, "\u{00C4}b");
    }

    #[test]
    fn parses_biff8_xf_bit_fields() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&5u16.to_le_bytes()); // ifnt
        payload.extend_from_slice(&164u16.to_le_bytes()); // ifmt
        payload.extend_from_slice(&0x0004u16.to_le_bytes()); // style XF
        payload.push(0x08 | 0x02 | (1 << 4)); // centered, wrap, middle
        payload.push(135); // trot
        payload.push(0x10 | 3); // shrink, indent 3
        payload.push(0);
        let border1: u32 = 1 | (2 << 4) | (5 << 8) | (6 << 12) | (8 << 16) | (9 << 23) | (2 << 30);
        payload.extend_from_slice(&border1.to_le_bytes());
        let border2: u32 = 10 | (11 << 7) | (12 << 14) | (1 << 21) | (17 << 26);
        payload.extend_from_slice(&border2.to_le_bytes());
        let fill: u16 = 20 | (21 << 7);
        payload.extend_from_slice(&fill.to_le_bytes());

        let xf = parse_xf(&payload, BIFF8).unwrap();
        assert_eq!(xf.font_index, 5);
        assert_eq!(xf.format_index, 164);
        assert!(xf.is_style);
        assert_eq!((xf.horizontal, xf.vertical, xf.wrap), (2, 1, true));
        assert_eq!((xf.rotation, xf.indent, xf.shrink_to_fit), (135, 3, true));
        assert_eq!(
            (xf.left_style, xf.right_style, xf.top_style, xf.bottom_style),
            (1, 2, 5, 6)
        );
        assert_eq!((xf.left_color, xf.right_color), (8, 9));
        assert!(xf.diagonal_up && !xf.diagonal_down);
        assert_eq!((xf.top_color, xf.bottom_color, xf.diagonal_color), (10, 11, 12));
        assert_eq!((xf.diagonal_style, xf.fill_pattern), (1, 17));
        assert_eq!((xf.pattern_fore_color, xf.pattern_back_color), (20, 21));
    }

    #[test]
    fn biff5_xf_orientation_maps_to_rotation() {
        let mut payload = vec![0u8; 16];
        payload[6] = 0x03; // right aligned
        payload[7] = 0x01; // stacked
        let xf = parse_xf(&payload, BIFF5).unwrap();
        assert_eq!(xf.horizontal, 3);
        assert!(xf.stacked_letters());

        payload[7] = 0x02;
        assert_eq!(parse_xf(&payload, BIFF5).unwrap().rotation, 90);
    }

    #[test]
    fn palette_reads_rgb_entries() {
        let payload = [2, 0, 0x12, 0x34, 0x56, 0, 0xFF, 0, 0, 0];
        assert_eq!(
            parse_palette(&payload).unwrap(),
            vec![Color::from_rgb(0x123456), Color::new(0xFF, 0, 0)]
        );
        assert!(parse_palette(&payload[..7]).is_err());
    }
}
