use core::fmt;
use std::collections::HashMap;

use ordered_float::OrderedFloat;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An RGB color.
///
/// Serialized as a `#RRGGBB` hex string.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub rgb: u32,
}

impl Color {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self {
            rgb: ((red as u32) << 16) | ((green as u32) << 8) | blue as u32,
        }
    }

    pub const fn from_rgb(rgb: u32) -> Self {
        Self { rgb: rgb & 0x00FF_FFFF }
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0)
    }

    pub const fn white() -> Self {
        Self::new(255, 255, 255)
    }

    pub const fn red(self) -> u8 {
        (self.rgb >> 16) as u8
    }

    pub const fn green(self) -> u8 {
        (self.rgb >> 8) as u8
    }

    pub const fn blue(self) -> u8 {
        self.rgb as u8
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.rgb)
    }
}

impl Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let hex = s
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| D::Error::custom("color must be a #RRGGBB hex string"))?;
        if hex.len() != 6 {
            return Err(D::Error::custom("color must be a #RRGGBB hex string"));
        }
        let rgb = u32::from_str_radix(hex, 16).map_err(|_| D::Error::custom("invalid hex"))?;
        Ok(Color::from_rgb(rgb))
    }
}

/// Vertical offset of the glyphs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Script {
    #[default]
    None,
    Subscript,
    Superscript,
}

/// Font part of a [`Format`].
///
/// A freshly constructed font is *null* (unspecified); any setter marks it specified.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormatFont {
    null: bool,
    family: String,
    size: OrderedFloat<f64>,
    color: Color,
    bold: bool,
    italic: bool,
    underline: bool,
    strikeout: bool,
    script: Script,
}

impl Default for FormatFont {
    fn default() -> Self {
        Self {
            null: true,
            family: "Arial".to_string(),
            size: OrderedFloat(11.0),
            color: Color::black(),
            bold: false,
            italic: false,
            underline: false,
            strikeout: false,
            script: Script::None,
        }
    }
}

impl FormatFont {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_null(&self) -> bool {
        self.null
    }

    pub fn font_family(&self) -> &str {
        &self.family
    }

    pub fn set_font_family(&mut self, family: impl Into<String>) {
        self.family = family.into();
        self.null = false;
    }

    /// Size in points.
    pub fn font_size(&self) -> f64 {
        self.size.0
    }

    pub fn set_font_size(&mut self, size: f64) {
        self.size = OrderedFloat(size);
        self.null = false;
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
        self.null = false;
    }

    pub fn bold(&self) -> bool {
        self.bold
    }

    pub fn set_bold(&mut self, bold: bool) {
        self.bold = bold;
        self.null = false;
    }

    pub fn italic(&self) -> bool {
        self.italic
    }

    pub fn set_italic(&mut self, italic: bool) {
        self.italic = italic;
        self.null = false;
    }

    pub fn underline(&self) -> bool {
        self.underline
    }

    pub fn set_underline(&mut self, underline: bool) {
        self.underline = underline;
        self.null = false;
    }

    pub fn strikeout(&self) -> bool {
        self.strikeout
    }

    pub fn set_strikeout(&mut self, strikeout: bool) {
        self.strikeout = strikeout;
        self.null = false;
    }

    pub fn script(&self) -> Script {
        self.script
    }

    pub fn set_script(&mut self, script: Script) {
        self.script = script;
        self.null = false;
    }

    pub fn subscript(&self) -> bool {
        self.script == Script::Subscript
    }

    pub fn superscript(&self) -> bool {
        self.script == Script::Superscript
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HorizontalAlignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
    Fill,
    Distributed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerticalAlignment {
    Top,
    #[default]
    Middle,
    Bottom,
    Justify,
    Distributed,
}

/// Alignment part of a [`Format`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormatAlignment {
    null: bool,
    horizontal: HorizontalAlignment,
    vertical: VerticalAlignment,
    wrap: bool,
    shrink_to_fit: bool,
    indent_level: u32,
    rotation_angle: u32,
    stacked_letters: bool,
}

impl Default for FormatAlignment {
    fn default() -> Self {
        Self {
            null: true,
            horizontal: HorizontalAlignment::Left,
            vertical: VerticalAlignment::Middle,
            wrap: false,
            shrink_to_fit: false,
            indent_level: 0,
            rotation_angle: 0,
            stacked_letters: false,
        }
    }
}

impl FormatAlignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_null(&self) -> bool {
        self.null
    }

    pub fn horizontal(&self) -> HorizontalAlignment {
        self.horizontal
    }

    pub fn set_horizontal(&mut self, horizontal: HorizontalAlignment) {
        self.horizontal = horizontal;
        self.null = false;
    }

    pub fn vertical(&self) -> VerticalAlignment {
        self.vertical
    }

    pub fn set_vertical(&mut self, vertical: VerticalAlignment) {
        self.vertical = vertical;
        self.null = false;
    }

    pub fn wrap(&self) -> bool {
        self.wrap
    }

    pub fn set_wrap(&mut self, wrap: bool) {
        self.wrap = wrap;
        self.null = false;
    }

    pub fn shrink_to_fit(&self) -> bool {
        self.shrink_to_fit
    }

    pub fn set_shrink_to_fit(&mut self, shrink: bool) {
        self.shrink_to_fit = shrink;
        self.null = false;
    }

    pub fn indent_level(&self) -> u32 {
        self.indent_level
    }

    pub fn set_indent_level(&mut self, indent: u32) {
        self.indent_level = indent;
        self.null = false;
    }

    /// Rotation in degrees, counter-clockwise (`0..=90`) or `270..360` for downward text.
    pub fn rotation_angle(&self) -> u32 {
        self.rotation_angle
    }

    pub fn set_rotation_angle(&mut self, angle: u32) {
        self.rotation_angle = angle;
        self.null = false;
    }

    pub fn stacked_letters(&self) -> bool {
        self.stacked_letters
    }

    pub fn set_stacked_letters(&mut self, stacked: bool) {
        self.stacked_letters = stacked;
        self.null = false;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PenStyle {
    #[default]
    NoLine,
    Solid,
    Dash,
    Dot,
    DashDot,
    DashDotDot,
    Double,
}

/// A border line.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Pen {
    /// Line width in points.
    pub width: OrderedFloat<f64>,
    pub style: PenStyle,
    pub color: Color,
}

impl Pen {
    pub fn new(width: f64, style: PenStyle, color: Color) -> Self {
        Self {
            width: OrderedFloat(width),
            style,
            color,
        }
    }
}

/// Border part of a [`Format`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormatBorders {
    null: bool,
    left: Pen,
    right: Pen,
    top: Pen,
    bottom: Pen,
    /// Top-left to bottom-right.
    diagonal_down: Pen,
    /// Bottom-left to top-right.
    diagonal_up: Pen,
}

impl Default for FormatBorders {
    fn default() -> Self {
        Self {
            null: true,
            left: Pen::default(),
            right: Pen::default(),
            top: Pen::default(),
            bottom: Pen::default(),
            diagonal_down: Pen::default(),
            diagonal_up: Pen::default(),
        }
    }
}

impl FormatBorders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_null(&self) -> bool {
        self.null
    }

    pub fn left_border(&self) -> &Pen {
        &self.left
    }

    pub fn set_left_border(&mut self, pen: Pen) {
        self.left = pen;
        self.null = false;
    }

    pub fn right_border(&self) -> &Pen {
        &self.right
    }

    pub fn set_right_border(&mut self, pen: Pen) {
        self.right = pen;
        self.null = false;
    }

    pub fn top_border(&self) -> &Pen {
        &self.top
    }

    pub fn set_top_border(&mut self, pen: Pen) {
        self.top = pen;
        self.null = false;
    }

    pub fn bottom_border(&self) -> &Pen {
        &self.bottom
    }

    pub fn set_bottom_border(&mut self, pen: Pen) {
        self.bottom = pen;
        self.null = false;
    }

    pub fn diagonal_down(&self) -> &Pen {
        &self.diagonal_down
    }

    pub fn set_diagonal_down(&mut self, pen: Pen) {
        self.diagonal_down = pen;
        self.null = false;
    }

    pub fn diagonal_up(&self) -> &Pen {
        &self.diagonal_up
    }

    pub fn set_diagonal_up(&mut self, pen: Pen) {
        self.diagonal_up = pen;
        self.null = false;
    }
}

/// Named cell fill patterns.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FillPattern {
    #[default]
    Empty,
    Solid,
    Dense1,
    Dense2,
    Dense3,
    Dense4,
    Dense5,
    Dense6,
    Dense7,
    Horizontal,
    Vertical,
    ForwardDiagonal,
    BackwardDiagonal,
    Cross,
    DiagonalCross,
}

/// Background part of a [`Format`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormatBackground {
    null: bool,
    pattern: FillPattern,
    background_color: Color,
    foreground_color: Color,
}

impl Default for FormatBackground {
    fn default() -> Self {
        Self {
            null: true,
            pattern: FillPattern::Empty,
            background_color: Color::white(),
            foreground_color: Color::black(),
        }
    }
}

impl FormatBackground {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_null(&self) -> bool {
        self.null
    }

    pub fn pattern(&self) -> FillPattern {
        self.pattern
    }

    pub fn set_pattern(&mut self, pattern: FillPattern) {
        self.pattern = pattern;
        self.null = false;
    }

    pub fn background_color(&self) -> Color {
        self.background_color
    }

    pub fn set_background_color(&mut self, color: Color) {
        self.background_color = color;
        self.null = false;
    }

    pub fn foreground_color(&self) -> Color {
        self.foreground_color
    }

    pub fn set_foreground_color(&mut self, color: Color) {
        self.foreground_color = color;
        self.null = false;
    }
}

/// Fully resolved cell format.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Format {
    #[serde(default)]
    pub font: FormatFont,
    #[serde(default)]
    pub alignment: FormatAlignment,
    #[serde(default)]
    pub borders: FormatBorders,
    #[serde(default)]
    pub background: FormatBackground,
    #[serde(default = "general")]
    pub value_format: String,
}

fn general() -> String {
    "General".to_string()
}

impl Default for Format {
    fn default() -> Self {
        Self {
            font: FormatFont::default(),
            alignment: FormatAlignment::default(),
            borders: FormatBorders::default(),
            background: FormatBackground::default(),
            value_format: general(),
        }
    }
}

impl Format {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn font(&self) -> &FormatFont {
        &self.font
    }

    pub fn alignment(&self) -> &FormatAlignment {
        &self.alignment
    }

    pub fn borders(&self) -> &FormatBorders {
        &self.borders
    }

    pub fn background(&self) -> &FormatBackground {
        &self.background
    }

    pub fn value_format(&self) -> &str {
        &self.value_format
    }

    /// True when font, alignment and borders are all unspecified.
    pub fn is_null(&self) -> bool {
        self.font.is_null() && self.alignment.is_null() && self.borders.is_null()
    }

    /// Layer `other` over `self`: every specified part of `other` replaces the matching part.
    pub fn apply(&mut self, other: &Format) -> &mut Self {
        if !other.alignment.is_null() {
            self.alignment = other.alignment.clone();
        }
        if !other.font.is_null() {
            self.font = other.font.clone();
        }
        if !other.borders.is_null() {
            self.borders = other.borders.clone();
        }
        if !other.value_format.is_empty() && other.value_format != "General" {
            self.value_format = other.value_format.clone();
        }
        if !other.background.is_null() {
            self.background = other.background.clone();
        }
        self
    }
}

/// Deduplicated table of formats.
///
/// Cells, columns and rows store a `format_id` into this table. Id `0` is always the default
/// format.
#[derive(Clone, Debug, Serialize)]
pub struct FormatTable {
    pub formats: Vec<Format>,
    #[serde(skip)]
    index: HashMap<Format, u32>,
}

impl Default for FormatTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatTable {
    pub fn new() -> Self {
        let mut table = Self {
            formats: vec![Format::default()],
            index: HashMap::new(),
        };
        table.rebuild_index();
        table
    }

    /// Insert (or reuse) a format, returning its id.
    pub fn intern(&mut self, format: Format) -> u32 {
        if let Some(id) = self.index.get(&format) {
            return *id;
        }
        let id = self.formats.len() as u32;
        self.formats.push(format.clone());
        self.index.insert(format, id);
        id
    }

    pub fn get(&self, format_id: u32) -> Option<&Format> {
        self.formats.get(format_id as usize)
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (i, format) in self.formats.iter().cloned().enumerate() {
            self.index.insert(format, i as u32);
        }
    }
}

impl PartialEq for FormatTable {
    fn eq(&self, other: &Self) -> bool {
        self.formats == other.formats
    }
}

impl<'de> Deserialize<'de> for FormatTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Helper {
            #[serde(default)]
            formats: Vec<Format>,
        }

        let mut helper = Helper::deserialize(deserializer)?;
        if helper.formats.is_empty() {
            helper.formats.push(Format::default());
        }

        let mut table = FormatTable {
            formats: helper.formats,
            index: HashMap::new(),
        };
        table.rebuild_index();
        Ok(table)
    }
}
