use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::FormatFont;

/// Value stored in a cell.
///
/// Uses an explicit `{type, value}` tagged layout so snapshots stay stable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    #[default]
    Empty,
    Boolean(bool),
    /// Exact integer (RK-encoded integers keep their integral form).
    Integer(i64),
    Float(f64),
    String(String),
    RichText(RichText),
    Error(ErrorValue),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Plain text of string-like values.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            CellValue::RichText(rt) => Some(&rt.text),
            _ => None,
        }
    }

    /// Numeric view of `Integer`/`Float` values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<ErrorValue> for CellValue {
    fn from(value: ErrorValue) -> Self {
        CellValue::Error(value)
    }
}

impl From<RichText> for CellValue {
    fn from(value: RichText) -> Self {
        CellValue::RichText(value)
    }
}

/// Text with font overrides keyed by the character index at which each run starts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RichText {
    pub text: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub runs: BTreeMap<u32, FormatFont>,
}

impl RichText {
    pub fn new(text: impl Into<String>, runs: BTreeMap<u32, FormatFont>) -> Self {
        Self {
            text: text.into(),
            runs,
        }
    }
}

/// Excel error literal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorValue {
    Null,
    Div0,
    Value,
    Ref,
    Name,
    Num,
    NA,
    GettingData,
}

impl ErrorValue {
    /// Map a BIFF error code (BOOLERR / FORMULA results, PtgErr) to its literal.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x00 => ErrorValue::Null,
            0x07 => ErrorValue::Div0,
            0x0F => ErrorValue::Value,
            0x17 => ErrorValue::Ref,
            0x1D => ErrorValue::Name,
            0x24 => ErrorValue::Num,
            0x2A => ErrorValue::NA,
            0x2B => ErrorValue::GettingData,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorValue::Null => "#NULL!",
            ErrorValue::Div0 => "#DIV/0!",
            ErrorValue::Value => "#VALUE!",
            ErrorValue::Ref => "#REF!",
            ErrorValue::Name => "#NAME?",
            ErrorValue::Num => "#NUM!",
            ErrorValue::NA => "#N/A",
            ErrorValue::GettingData => "#GETTING_DATA",
        }
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_map_to_literals() {
        assert_eq!(ErrorValue::from_code(0x07), Some(ErrorValue::Div0));
        assert_eq!(ErrorValue::from_code(0x2A).map(ErrorValue::as_str), Some("#N/A"));
        assert_eq!(ErrorValue::from_code(0x99), None);
    }

    #[test]
    fn cell_value_serializes_tagged() {
        let json = serde_json::to_string(&CellValue::Integer(3)).unwrap();
        assert_eq!(json, r#"{"type":"integer","value":3}"#);
        let back: CellValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CellValue::Integer(3));
    }

    #[test]
    fn text_view_covers_rich_text() {
        let rich = CellValue::from(RichText::new("hello", BTreeMap::new()));
        assert_eq!(rich.as_text(), Some("hello"));
        assert_eq!(CellValue::Float(1.5).as_text(), None);
        assert_eq!(CellValue::Integer(2).as_f64(), Some(2.0));
    }
}
