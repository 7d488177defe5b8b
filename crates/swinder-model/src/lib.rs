//! `swinder-model` defines the in-memory document produced by the `.xls` reader.
//!
//! The model is deliberately passive: it stores what the reader resolved (cell values, decoded
//! formula text, interned formats, sheet metadata) and exposes lookups over it. Everything is
//! `serde`-serializable so a loaded workbook can be snapshotted and compared.

mod cell;
pub mod chart;
mod format;
mod sheet;
mod value;
mod workbook;

pub use cell::{Cell, CellKey, CellKeyError, Hyperlink, MAX_COLUMNS, MAX_ROWS};
pub use chart::{Chart, ChartObject, ChartObjectId, ChartObjectKind, Series};
pub use format::{
    Color, Format, FormatAlignment, FormatBackground, FormatBorders, FormatFont, FormatTable,
    HorizontalAlignment, Pen, PenStyle, Script, VerticalAlignment, FillPattern,
};
pub use sheet::{Column, HeaderFooter, Margins, Row, Sheet, SheetKind, SheetVisibility};
pub use value::{CellValue, ErrorValue, RichText};
pub use workbook::{NamedArea, Workbook};
