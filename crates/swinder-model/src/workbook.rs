use serde::{Deserialize, Serialize};

use crate::{Color, Format, FormatTable, Sheet};

/// A defined name (named range / formula).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedArea {
    pub name: String,
    /// Sheet index for sheet-scoped names; `None` for workbook scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<u32>,
    /// Decoded formula text (without a leading `=`).
    pub formula: String,
    #[serde(default)]
    pub builtin: bool,
}

/// Root of a loaded document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    #[serde(default)]
    pub sheets: Vec<Sheet>,
    #[serde(default)]
    pub formats: FormatTable,
    /// Resolved color table (the palette in effect after loading).
    #[serde(default)]
    pub colors: Vec<Color>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub named_areas: Vec<NamedArea>,
    /// Index of the selected sheet tab.
    #[serde(default)]
    pub active_tab: u32,
    /// Workbook structure is protected.
    #[serde(default)]
    pub protected: bool,
    /// Legacy 16-bit workbook password verifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<u16>,
    /// Serial dates count from 1904-01-01 instead of 1900-01-01.
    #[serde(default)]
    pub date_1904: bool,
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbook {
    pub fn new() -> Self {
        Self {
            sheets: Vec::new(),
            formats: FormatTable::new(),
            colors: Vec::new(),
            named_areas: Vec::new(),
            active_tab: 0,
            protected: false,
            password_hash: None,
            date_1904: false,
        }
    }

    /// Append a sheet, returning its index.
    pub fn add_sheet(&mut self, sheet: Sheet) -> usize {
        self.sheets.push(sheet);
        self.sheets.len() - 1
    }

    pub fn sheet(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    pub fn sheet_mut(&mut self, index: usize) -> Option<&mut Sheet> {
        self.sheets.get_mut(index)
    }

    /// Find a sheet by name (case-insensitive, like Excel).
    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.sheets
            .iter()
            .find(|s| s.name.to_lowercase() == name.to_lowercase())
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Intern (deduplicate) a format into the workbook format table.
    pub fn intern_format(&mut self, format: Format) -> u32 {
        self.formats.intern(format)
    }

    /// Format by id, falling back to the default format (id 0) for unknown ids.
    pub fn format(&self, format_id: u32) -> Option<&Format> {
        self.formats.get(format_id).or_else(|| self.formats.get(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_lookup_is_case_insensitive() {
        let mut workbook = Workbook::new();
        workbook.add_sheet(Sheet::new("Data"));
        assert!(workbook.sheet_by_name("DATA").is_some());
        assert!(workbook.sheet_by_name("Other").is_none());
    }

    #[test]
    fn unknown_format_id_falls_back_to_default() {
        let mut workbook = Workbook::new();
        let mut format = Format::new();
        format.value_format = "0.00".to_string();
        let id = workbook.intern_format(format);
        assert_eq!(workbook.format(id).map(Format::value_format), Some("0.00"));
        assert_eq!(workbook.format(999).map(Format::value_format), Some("General"));
    }
}
