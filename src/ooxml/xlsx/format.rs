//! Style description types.
//!
//! A [`CellFormat`] is the value registered with the style registry. Two
//! formats that compare equal always resolve to the same style handle, so
//! every type here implements `Eq` and `Hash` by value (font sizes compare by
//! their bit pattern).

use crate::common::style::Color;
use std::hash::{Hash, Hasher};

/// Cell format information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CellFormat {
    pub font: Option<CellFont>,
    pub fill: Option<CellFill>,
    pub border: Option<CellBorder>,
    pub alignment: Option<CellAlignment>,
    pub number_format: Option<NumberFormat>,
}

impl CellFormat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_font(mut self, font: CellFont) -> Self {
        self.font = Some(font);
        self
    }

    pub fn with_fill(mut self, fill: CellFill) -> Self {
        self.fill = Some(fill);
        self
    }

    pub fn with_border(mut self, border: CellBorder) -> Self {
        self.border = Some(border);
        self
    }

    pub fn with_alignment(mut self, alignment: CellAlignment) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn with_number_format(mut self, number_format: NumberFormat) -> Self {
        self.number_format = Some(number_format);
        self
    }
}

/// Font properties for a cell.
#[derive(Debug, Clone, Default)]
pub struct CellFont {
    pub name: Option<String>,
    pub size: Option<f64>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub color: Option<Color>,
}

impl PartialEq for CellFont {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.size.map(f64::to_bits) == other.size.map(f64::to_bits)
            && self.bold == other.bold
            && self.italic == other.italic
            && self.underline == other.underline
            && self.strikethrough == other.strikethrough
            && self.color == other.color
    }
}

impl Eq for CellFont {}

impl Hash for CellFont {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.size.map(f64::to_bits).hash(state);
        self.bold.hash(state);
        self.italic.hash(state);
        self.underline.hash(state);
        self.strikethrough.hash(state);
        self.color.hash(state);
    }
}

/// Fill properties for a cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellFill {
    pub pattern_type: CellFillPatternType,
    pub fg_color: Option<Color>,
    pub bg_color: Option<Color>,
}

impl CellFill {
    /// A solid fill in one color.
    pub fn solid(color: Color) -> Self {
        Self {
            pattern_type: CellFillPatternType::Solid,
            fg_color: Some(color),
            bg_color: None,
        }
    }
}

/// Cell fill pattern types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellFillPatternType {
    None,
    Solid,
    Gray125,
    DarkGray,
    MediumGray,
    LightGray,
    Gray0625,
    DarkHorizontal,
    DarkVertical,
    DarkDown,
    DarkUp,
    DarkGrid,
    DarkTrellis,
}

impl CellFillPatternType {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Solid => "solid",
            Self::Gray125 => "gray125",
            Self::DarkGray => "darkGray",
            Self::MediumGray => "mediumGray",
            Self::LightGray => "lightGray",
            Self::Gray0625 => "gray0625",
            Self::DarkHorizontal => "darkHorizontal",
            Self::DarkVertical => "darkVertical",
            Self::DarkDown => "darkDown",
            Self::DarkUp => "darkUp",
            Self::DarkGrid => "darkGrid",
            Self::DarkTrellis => "darkTrellis",
        }
    }
}

/// Border properties for a cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CellBorder {
    pub left: Option<CellBorderSide>,
    pub right: Option<CellBorderSide>,
    pub top: Option<CellBorderSide>,
    pub bottom: Option<CellBorderSide>,
    pub diagonal: Option<CellBorderSide>,
}

impl CellBorder {
    /// The same line on all four outer edges.
    pub fn all(side: CellBorderSide) -> Self {
        Self {
            left: Some(side.clone()),
            right: Some(side.clone()),
            top: Some(side.clone()),
            bottom: Some(side),
            diagonal: None,
        }
    }
}

/// Border side properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellBorderSide {
    pub style: CellBorderLineStyle,
    pub color: Option<Color>,
}

/// Border line styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellBorderLineStyle {
    None,
    Thin,
    Medium,
    Dashed,
    Dotted,
    Thick,
    Double,
    Hair,
    MediumDashed,
    DashDot,
    MediumDashDot,
    DashDotDot,
    MediumDashDotDot,
    SlantDashDot,
}

impl CellBorderLineStyle {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Thin => "thin",
            Self::Medium => "medium",
            Self::Dashed => "dashed",
            Self::Dotted => "dotted",
            Self::Thick => "thick",
            Self::Double => "double",
            Self::Hair => "hair",
            Self::MediumDashed => "mediumDashed",
            Self::DashDot => "dashDot",
            Self::MediumDashDot => "mediumDashDot",
            Self::DashDotDot => "dashDotDot",
            Self::MediumDashDotDot => "mediumDashDotDot",
            Self::SlantDashDot => "slantDashDot",
        }
    }
}

/// Alignment properties for a cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CellAlignment {
    pub horizontal: Option<HorizontalAlignment>,
    pub vertical: Option<VerticalAlignment>,
    pub wrap_text: bool,
    pub indent: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HorizontalAlignment {
    Left,
    Center,
    Right,
    Justify,
    Fill,
}

impl HorizontalAlignment {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
            Self::Justify => "justify",
            Self::Fill => "fill",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerticalAlignment {
    Top,
    Center,
    Bottom,
    Justify,
}

impl VerticalAlignment {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Center => "center",
            Self::Bottom => "bottom",
            Self::Justify => "justify",
        }
    }
}

/// Number format of a cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NumberFormat {
    /// One of the formats every reader knows by id.
    Standard(StandardNumberFormat),
    /// A format code such as `yyyy-mm-dd`.
    Custom(String),
}

impl NumberFormat {
    pub fn custom(code: impl Into<String>) -> Self {
        Self::Custom(code.into())
    }
}

/// Built-in number formats (ids 0-49 are implied by every reader).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardNumberFormat {
    General,
    NoDecimalPlaces,
    TwoDecimalPlaces,
    ThousandsSeparator,
    ThousandsSeparatorTwoDecimalPlaces,
    Percent,
    PercentTwoDecimalPlaces,
    Scientific,
    Fraction,
    ShortDate,
    LongDate,
    DayAndMonth,
    MonthAndYear,
    TwelveHourClock,
    TwentyFourHourClock,
    ShortDateTime,
    Text,
}

impl StandardNumberFormat {
    pub(crate) fn id(&self) -> u32 {
        match self {
            Self::General => 0,
            Self::NoDecimalPlaces => 1,
            Self::TwoDecimalPlaces => 2,
            Self::ThousandsSeparator => 3,
            Self::ThousandsSeparatorTwoDecimalPlaces => 4,
            Self::Percent => 9,
            Self::PercentTwoDecimalPlaces => 10,
            Self::Scientific => 11,
            Self::Fraction => 12,
            Self::ShortDate => 14,
            Self::LongDate => 15,
            Self::DayAndMonth => 16,
            Self::MonthAndYear => 17,
            Self::TwelveHourClock => 19,
            Self::TwentyFourHourClock => 21,
            Self::ShortDateTime => 22,
            Self::Text => 49,
        }
    }
}
