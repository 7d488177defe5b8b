//! Chart substream records.

use swinder_model::ChartObjectKind;

use super::super::bytes::ByteReader;
use super::super::strings::read_short_string;
use super::{DecodeContext, FormulaBytes, RecordError};

pub(crate) const RECORD_CHART: u16 = 0x1002;
pub(crate) const RECORD_SERIES: u16 = 0x1003;
pub(crate) const RECORD_DATAFORMAT: u16 = 0x1006;
pub(crate) const RECORD_SERIESTEXT: u16 = 0x100D;
pub(crate) const RECORD_CHARTFORMAT: u16 = 0x1014;
pub(crate) const RECORD_LEGEND: u16 = 0x1015;
pub(crate) const RECORD_BAR: u16 = 0x1017;
pub(crate) const RECORD_LINE: u16 = 0x1018;
pub(crate) const RECORD_PIE: u16 = 0x1019;
pub(crate) const RECORD_AREA: u16 = 0x101A;
pub(crate) const RECORD_SCATTER: u16 = 0x101B;
pub(crate) const RECORD_AXIS: u16 = 0x101D;
pub(crate) const RECORD_TEXT: u16 = 0x1025;
pub(crate) const RECORD_FRAME: u16 = 0x1032;
pub(crate) const RECORD_BEGIN: u16 = 0x1033;
pub(crate) const RECORD_END: u16 = 0x1034;
pub(crate) const RECORD_PLOTAREA: u16 = 0x1035;
pub(crate) const RECORD_RADAR: u16 = 0x103E;
pub(crate) const RECORD_SURFACE: u16 = 0x103F;
pub(crate) const RECORD_AXISPARENT: u16 = 0x1041;
pub(crate) const RECORD_AI: u16 = 0x1051;

/// Records that open an object a following BEGIN/END block can nest under.
pub(crate) fn container_kind(record_id: u16) -> Option<ChartObjectKind> {
    let kind = match record_id {
        RECORD_DATAFORMAT => ChartObjectKind::DataFormat,
        RECORD_CHARTFORMAT => ChartObjectKind::ChartFormat,
        RECORD_LEGEND => ChartObjectKind::Legend,
        RECORD_BAR => ChartObjectKind::Bar,
        RECORD_LINE => ChartObjectKind::Line,
        RECORD_PIE => ChartObjectKind::Pie,
        RECORD_AREA => ChartObjectKind::Area,
        RECORD_SCATTER => ChartObjectKind::Scatter,
        RECORD_AXIS => ChartObjectKind::Axis,
        RECORD_TEXT => ChartObjectKind::Text,
        RECORD_FRAME => ChartObjectKind::Frame,
        RECORD_PLOTAREA => ChartObjectKind::PlotArea,
        RECORD_RADAR => ChartObjectKind::Radar,
        RECORD_SURFACE => ChartObjectKind::Surface,
        RECORD_AXISPARENT => ChartObjectKind::AxisParent,
        _ => return None,
    };
    Some(kind)
}

/// CHART: position and size in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ChartRect {
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) width: f64,
    pub(crate) height: f64,
}

pub(crate) fn parse_chart(data: &[u8]) -> Result<ChartRect, RecordError> {
    let mut r = ByteReader::new(data);
    Ok(ChartRect {
        x: r.fixed32()?,
        y: r.fixed32()?,
        width: r.fixed32()?,
        height: r.fixed32()?,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SeriesCounts {
    pub(crate) category_count: u16,
    pub(crate) value_count: u16,
}

pub(crate) fn parse_series(data: &[u8]) -> Result<SeriesCounts, RecordError> {
    let mut r = ByteReader::at(data, 4);
    Ok(SeriesCounts {
        category_count: r.u16()?,
        value_count: r.u16()?,
    })
}

pub(crate) fn parse_seriestext(data: &[u8], ctx: DecodeContext) -> Result<String, RecordError> {
    let r = ByteReader::at(data, 2);
    let (text, _) = read_short_string(r.rest(), ctx.version, ctx.codepage)?;
    Ok(text)
}

/// What an AI record links to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AiTarget {
    SeriesName,
    Values,
    Categories,
    BubbleSizes,
    Other(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Ai {
    pub(crate) target: AiTarget,
    /// Reference type; 2 means the data comes from `formula`.
    pub(crate) reference_type: u8,
    pub(crate) formula: FormulaBytes,
}

pub(crate) const AI_REFERENCE_WORKSHEET: u8 = 2;

pub(crate) fn parse_ai(data: &[u8]) -> Result<Ai, RecordError> {
    let mut r = ByteReader::new(data);
    let target = match r.u8()? {
        0 => AiTarget::SeriesName,
        1 => AiTarget::Values,
        2 => AiTarget::Categories,
        3 => AiTarget::BubbleSizes,
        other => AiTarget::Other(other),
    };
    let reference_type = r.u8()?;
    let _flags = r.u16()?;
    let _number_format = r.u16()?;
    let cce = r.u16()? as usize;
    let formula = FormulaBytes::read(&mut r, cce)?;
    Ok(Ai {
        target,
        reference_type,
        formula,
    })
}
