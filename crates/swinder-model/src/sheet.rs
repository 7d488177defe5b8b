use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Cell, CellKey, Chart};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SheetKind {
    #[default]
    Worksheet,
    Chart,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SheetVisibility {
    #[default]
    Visible,
    Hidden,
    VeryHidden,
}

/// Column metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Width in characters of the default font.
    pub width: f64,
    pub visible: bool,
    pub format_id: u32,
}

impl Default for Column {
    fn default() -> Self {
        Self {
            width: 8.43,
            visible: true,
            format_id: 0,
        }
    }
}

/// Row metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Height in points.
    pub height: f64,
    pub visible: bool,
    pub format_id: u32,
}

impl Default for Row {
    fn default() -> Self {
        Self {
            height: 12.75,
            visible: true,
            format_id: 0,
        }
    }
}

/// Page header or footer, split into its three sections.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderFooter {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub left: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub center: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub right: String,
}

impl HeaderFooter {
    /// Split an Excel header/footer string on its `&L`, `&C` and `&R` section markers.
    ///
    /// Text before any marker belongs to the center section. Other `&` codes are kept verbatim.
    pub fn parse(raw: &str) -> Self {
        let mut out = Self::default();
        let mut current = &mut out.center;
        let mut chars = raw.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch == '&' {
                match chars.peek().copied() {
                    Some('L') | Some('l') => {
                        chars.next();
                        current = &mut out.left;
                        continue;
                    }
                    Some('C') | Some('c') => {
                        chars.next();
                        current = &mut out.center;
                        continue;
                    }
                    Some('R') | Some('r') => {
                        chars.next();
                        current = &mut out.right;
                        continue;
                    }
                    _ => {}
                }
            }
            current.push(ch);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.center.is_empty() && self.right.is_empty()
    }
}

/// Page margins in points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Default for Margins {
    fn default() -> Self {
        // Excel defaults: 0.75" left/right, 1" top/bottom.
        Self {
            left: 54.0,
            right: 54.0,
            top: 72.0,
            bottom: 72.0,
        }
    }
}

/// A worksheet or chart sheet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub kind: SheetKind,
    #[serde(default)]
    pub visibility: SheetVisibility,
    #[serde(default)]
    pub protected: bool,
    /// Legacy 16-bit sheet password verifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<u16>,
    #[serde(default)]
    pub header: HeaderFooter,
    #[serde(default)]
    pub footer: HeaderFooter,
    #[serde(default)]
    pub margins: Margins,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_column_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_row_height: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub charts: Vec<Chart>,

    #[serde(default)]
    cells: BTreeMap<CellKey, Cell>,
    #[serde(default)]
    columns: BTreeMap<u32, Column>,
    #[serde(default)]
    rows: BTreeMap<u32, Row>,
    #[serde(default)]
    max_row: u32,
    #[serde(default)]
    max_column: u32,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SheetKind::Worksheet,
            visibility: SheetVisibility::Visible,
            protected: false,
            password_hash: None,
            header: HeaderFooter::default(),
            footer: HeaderFooter::default(),
            margins: Margins::default(),
            default_column_width: None,
            default_row_height: None,
            charts: Vec::new(),
            cells: BTreeMap::new(),
            columns: BTreeMap::new(),
            rows: BTreeMap::new(),
            max_row: 0,
            max_column: 0,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == SheetVisibility::Visible
    }

    /// Mutable access to the cell at `(column, row)`.
    ///
    /// With `auto_create == false` a missing cell yields `None` and the sheet is left untouched;
    /// with `auto_create == true` the cell is inserted and `max_row`/`max_column` grow to cover
    /// it. Coordinates outside the addressable grid always yield `None`.
    pub fn cell(&mut self, column: u32, row: u32, auto_create: bool) -> Option<&mut Cell> {
        let key = CellKey::try_new(row, column).ok()?;
        if !auto_create {
            return self.cells.get_mut(&key);
        }
        self.max_row = self.max_row.max(row);
        self.max_column = self.max_column.max(column);
        Some(self.cells.entry(key).or_default())
    }

    /// Read-only cell lookup.
    pub fn get_cell(&self, column: u32, row: u32) -> Option<&Cell> {
        let key = CellKey::try_new(row, column).ok()?;
        self.cells.get(&key)
    }

    /// Populated cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (CellKey, &Cell)> {
        self.cells.iter().map(|(k, v)| (*k, v))
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn column(&mut self, index: u32, auto_create: bool) -> Option<&mut Column> {
        if auto_create {
            Some(self.columns.entry(index).or_default())
        } else {
            self.columns.get_mut(&index)
        }
    }

    pub fn get_column(&self, index: u32) -> Option<&Column> {
        self.columns.get(&index)
    }

    pub fn row(&mut self, index: u32, auto_create: bool) -> Option<&mut Row> {
        if auto_create {
            Some(self.rows.entry(index).or_default())
        } else {
            self.rows.get_mut(&index)
        }
    }

    pub fn get_row(&self, index: u32) -> Option<&Row> {
        self.rows.get(&index)
    }

    /// Highest row index ever given a cell. Never decreases.
    pub fn max_row(&self) -> u32 {
        self.max_row
    }

    /// Highest column index ever given a cell. Never decreases.
    pub fn max_column(&self) -> u32 {
        self.max_column
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CellValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn lookup_without_auto_create_does_not_grow() {
        let mut sheet = Sheet::new("Sheet1");
        assert!(sheet.cell(5, 7, false).is_none());
        assert_eq!(sheet.cell_count(), 0);
        assert_eq!((sheet.max_row(), sheet.max_column()), (0, 0));
    }

    #[test]
    fn auto_create_inserts_one_cell_and_tracks_extent() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.cell(5, 7, true).unwrap().value = CellValue::Integer(1);
        assert_eq!(sheet.cell_count(), 1);
        assert_eq!((sheet.max_row(), sheet.max_column()), (7, 5));

        sheet.cell(2, 3, true);
        assert_eq!(sheet.cell_count(), 2);
        assert_eq!((sheet.max_row(), sheet.max_column()), (7, 5));

        assert_eq!(
            sheet.get_cell(5, 7).map(|c| c.value.clone()),
            Some(CellValue::Integer(1))
        );
    }

    #[test]
    fn out_of_grid_cells_are_rejected() {
        let mut sheet = Sheet::new("Sheet1");
        assert!(sheet.cell(crate::MAX_COLUMNS, 0, true).is_none());
        assert_eq!(sheet.max_column(), 0);
    }

    #[test]
    fn column_and_row_metadata_is_lazy() {
        let mut sheet = Sheet::new("Sheet1");
        assert!(sheet.column(3, false).is_none());
        sheet.column(3, true).unwrap().width = 20.0;
        assert_eq!(sheet.get_column(3).map(|c| c.width), Some(20.0));

        assert!(sheet.row(9, false).is_none());
        sheet.row(9, true).unwrap().visible = false;
        assert_eq!(sheet.get_row(9).map(|r| r.visible), Some(false));
    }

    #[test]
    fn header_sections_split_on_markers() {
        assert_eq!(
            HeaderFooter::parse("&LLeft&CPage &P&RRight"),
            HeaderFooter {
                left: "Left".to_string(),
                center: "Page &P".to_string(),
                right: "Right".to_string(),
            }
        );
        assert_eq!(HeaderFooter::parse("Plain").center, "Plain");
        assert!(HeaderFooter::parse("").is_empty());
    }
}
