//! Style registry and `xl/styles.xml` generator.
//!
//! Every [`CellFormat`] registered during a document resolves to a
//! [`StyleId`], the index of its `<xf>` record in `cellXfs`. Fonts, fills,
//! borders and custom number formats are deduplicated independently, so two
//! cell formats that share a font reference the same `<font>` record.

use crate::common::error::{Error, Result};
use crate::common::style::Color;
use crate::common::xml::{escape_xml, push_attr, push_num_attr};
use crate::ooxml::opc::constants::namespace;
use crate::ooxml::xlsx::format::{
    CellAlignment, CellBorder, CellBorderSide, CellFill, CellFillPatternType, CellFont, CellFormat,
    NumberFormat,
};
use std::collections::HashMap;
use tracing::debug;

/// Upper bound on registered cell formats per workbook.
pub const MAX_STYLES: usize = 64_000;

/// First id available to custom number formats.
const FIRST_CUSTOM_NUM_FMT_ID: u32 = 164;

/// Handle to a registered cell format.
///
/// Handles are written into worksheet XML as plain integers, so a handle is
/// stable for the rest of the document once it has been returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StyleId(pub(crate) u32);

impl StyleId {
    /// Index of the `<xf>` record this handle refers to.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Style handles used when a cell has no explicit style.
///
/// Built once when the document is created and never changed afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultStyling {
    /// Applied to date cells without an explicit style.
    pub date_time: Option<StyleId>,
}

impl DefaultStyling {
    /// Register the defaults in `builder` and take the snapshot.
    pub(crate) fn register(
        builder: &mut StylesBuilder,
        date_time_format: Option<&NumberFormat>,
    ) -> Result<Self> {
        let date_time = date_time_format
            .map(|format| {
                builder.add_cell_format(&CellFormat::new().with_number_format(format.clone()))
            })
            .transpose()?;
        Ok(Self { date_time })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct XfRecord {
    font_id: u32,
    fill_id: u32,
    border_id: u32,
    num_fmt_id: u32,
    alignment: Option<CellAlignment>,
}

/// Collects unique fonts, fills, borders and cell formats and renders them.
#[derive(Debug)]
pub struct StylesBuilder {
    fonts: Vec<CellFont>,
    font_map: HashMap<CellFont, u32>,
    fills: Vec<CellFill>,
    fill_map: HashMap<CellFill, u32>,
    borders: Vec<CellBorder>,
    border_map: HashMap<CellBorder, u32>,
    /// Custom format codes; the id of entry `i` is `164 + i`.
    number_formats: Vec<String>,
    number_format_map: HashMap<String, u32>,
    cell_formats: Vec<XfRecord>,
    cell_format_map: HashMap<CellFormat, StyleId>,
}

impl StylesBuilder {
    /// Create a builder holding the records every reader requires.
    pub fn new() -> Self {
        let mut builder = Self {
            fonts: Vec::new(),
            font_map: HashMap::new(),
            fills: Vec::new(),
            fill_map: HashMap::new(),
            borders: Vec::new(),
            border_map: HashMap::new(),
            number_formats: Vec::new(),
            number_format_map: HashMap::new(),
            cell_formats: Vec::new(),
            cell_format_map: HashMap::new(),
        };

        builder.add_font(&CellFont::default());

        // The first two fills are reserved
        for pattern_type in [CellFillPatternType::None, CellFillPatternType::Gray125] {
            builder.add_fill(&CellFill {
                pattern_type,
                fg_color: None,
                bg_color: None,
            });
        }

        builder.add_border(&CellBorder::default());

        builder.cell_formats.push(XfRecord {
            font_id: 0,
            fill_id: 0,
            border_id: 0,
            num_fmt_id: 0,
            alignment: None,
        });
        builder
            .cell_format_map
            .insert(CellFormat::default(), StyleId(0));

        builder
    }

    /// Number of registered cell formats, including the default one.
    pub fn len(&self) -> usize {
        self.cell_formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_formats.is_empty()
    }

    /// Register a cell format and return its handle.
    ///
    /// A format equal to one registered before returns the existing handle.
    pub fn add_cell_format(&mut self, format: &CellFormat) -> Result<StyleId> {
        if let Some(&id) = self.cell_format_map.get(format) {
            return Ok(id);
        }

        if self.cell_formats.len() >= MAX_STYLES {
            return Err(Error::invalid_operation(format!(
                "A workbook cannot hold more than {} styles",
                MAX_STYLES
            )));
        }

        let record = XfRecord {
            font_id: format.font.as_ref().map_or(0, |font| self.add_font(font)),
            fill_id: format.fill.as_ref().map_or(0, |fill| self.add_fill(fill)),
            border_id: format
                .border
                .as_ref()
                .map_or(0, |border| self.add_border(border)),
            num_fmt_id: format
                .number_format
                .as_ref()
                .map_or(0, |num_fmt| self.add_number_format(num_fmt)),
            alignment: format.alignment.clone(),
        };

        let id = StyleId(self.cell_formats.len() as u32);
        self.cell_formats.push(record);
        self.cell_format_map.insert(format.clone(), id);
        debug!(style = id.0, "registered cell format");

        Ok(id)
    }

    fn add_font(&mut self, font: &CellFont) -> u32 {
        if let Some(&index) = self.font_map.get(font) {
            return index;
        }

        let index = self.fonts.len() as u32;
        self.fonts.push(font.clone());
        self.font_map.insert(font.clone(), index);
        index
    }

    fn add_fill(&mut self, fill: &CellFill) -> u32 {
        if let Some(&index) = self.fill_map.get(fill) {
            return index;
        }

        let index = self.fills.len() as u32;
        self.fills.push(fill.clone());
        self.fill_map.insert(fill.clone(), index);
        index
    }

    fn add_border(&mut self, border: &CellBorder) -> u32 {
        if let Some(&index) = self.border_map.get(border) {
            return index;
        }

        let index = self.borders.len() as u32;
        self.borders.push(border.clone());
        self.border_map.insert(border.clone(), index);
        index
    }

    fn add_number_format(&mut self, format: &NumberFormat) -> u32 {
        let code = match format {
            NumberFormat::Standard(standard) => return standard.id(),
            NumberFormat::Custom(code) => code,
        };

        if let Some(&id) = self.number_format_map.get(code) {
            return id;
        }

        let id = FIRST_CUSTOM_NUM_FMT_ID + self.number_formats.len() as u32;
        self.number_formats.push(code.clone());
        self.number_format_map.insert(code.clone(), id);
        id
    }

    /// Generate the complete styles.xml content.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(1024 + self.cell_formats.len() * 64);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push_str("<styleSheet");
        push_attr(&mut xml, "xmlns", namespace::SML_MAIN);
        xml.push('>');

        if !self.number_formats.is_empty() {
            xml.push_str("<numFmts");
            push_num_attr(&mut xml, "count", self.number_formats.len());
            xml.push('>');
            for (i, code) in self.number_formats.iter().enumerate() {
                xml.push_str("<numFmt");
                push_num_attr(&mut xml, "numFmtId", FIRST_CUSTOM_NUM_FMT_ID + i as u32);
                push_attr(&mut xml, "formatCode", code);
                xml.push_str("/>");
            }
            xml.push_str("</numFmts>");
        }

        xml.push_str("<fonts");
        push_num_attr(&mut xml, "count", self.fonts.len());
        xml.push('>');
        for font in &self.fonts {
            write_font(&mut xml, font);
        }
        xml.push_str("</fonts>");

        xml.push_str("<fills");
        push_num_attr(&mut xml, "count", self.fills.len());
        xml.push('>');
        for fill in &self.fills {
            write_fill(&mut xml, fill);
        }
        xml.push_str("</fills>");

        xml.push_str("<borders");
        push_num_attr(&mut xml, "count", self.borders.len());
        xml.push('>');
        for border in &self.borders {
            write_border(&mut xml, border);
        }
        xml.push_str("</borders>");

        xml.push_str(r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#);

        xml.push_str("<cellXfs");
        push_num_attr(&mut xml, "count", self.cell_formats.len());
        xml.push('>');
        for record in &self.cell_formats {
            write_xf(&mut xml, record);
        }
        xml.push_str("</cellXfs>");

        xml.push_str(r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#);
        xml.push_str("</styleSheet>");

        xml
    }
}

impl Default for StylesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn write_xf(xml: &mut String, record: &XfRecord) {
    xml.push_str("<xf");
    push_num_attr(xml, "numFmtId", record.num_fmt_id);
    push_num_attr(xml, "fontId", record.font_id);
    push_num_attr(xml, "fillId", record.fill_id);
    push_num_attr(xml, "borderId", record.border_id);
    xml.push_str(r#" xfId="0""#);

    if record.font_id != 0 {
        xml.push_str(r#" applyFont="1""#);
    }
    if record.fill_id != 0 {
        xml.push_str(r#" applyFill="1""#);
    }
    if record.border_id != 0 {
        xml.push_str(r#" applyBorder="1""#);
    }
    if record.num_fmt_id != 0 {
        xml.push_str(r#" applyNumberFormat="1""#);
    }

    match &record.alignment {
        Some(alignment) => {
            xml.push_str(r#" applyAlignment="1"><alignment"#);
            if let Some(horizontal) = alignment.horizontal {
                push_attr(xml, "horizontal", horizontal.as_str());
            }
            if let Some(vertical) = alignment.vertical {
                push_attr(xml, "vertical", vertical.as_str());
            }
            if alignment.wrap_text {
                xml.push_str(r#" wrapText="1""#);
            }
            if alignment.indent > 0 {
                push_num_attr(xml, "indent", alignment.indent);
            }
            xml.push_str("/></xf>");
        },
        None => xml.push_str("/>"),
    }
}

fn write_color(xml: &mut String, element: &str, color: &Color) {
    xml.push('<');
    xml.push_str(element);
    push_attr(xml, "rgb", &color.to_argb_hex());
    xml.push_str("/>");
}

fn write_font(xml: &mut String, font: &CellFont) {
    xml.push_str("<font>");

    if font.bold {
        xml.push_str("<b/>");
    }
    if font.italic {
        xml.push_str("<i/>");
    }
    if font.strikethrough {
        xml.push_str("<strike/>");
    }
    if font.underline {
        xml.push_str("<u/>");
    }

    let mut buf = ryu::Buffer::new();
    xml.push_str(r#"<sz val=""#);
    xml.push_str(trim_float(buf.format(font.size.unwrap_or(11.0))));
    xml.push_str(r#""/>"#);

    if let Some(ref color) = font.color {
        write_color(xml, "color", color);
    }

    xml.push_str(r#"<name val=""#);
    xml.push_str(&escape_xml(font.name.as_deref().unwrap_or("Calibri")));
    xml.push_str(r#""/>"#);

    xml.push_str("</font>");
}

fn write_fill(xml: &mut String, fill: &CellFill) {
    xml.push_str("<fill><patternFill");
    push_attr(xml, "patternType", fill.pattern_type.as_str());

    if fill.fg_color.is_none() && fill.bg_color.is_none() {
        xml.push_str("/></fill>");
        return;
    }

    xml.push('>');
    if let Some(ref fg_color) = fill.fg_color {
        write_color(xml, "fgColor", fg_color);
    }
    if let Some(ref bg_color) = fill.bg_color {
        write_color(xml, "bgColor", bg_color);
    }
    xml.push_str("</patternFill></fill>");
}

fn write_border(xml: &mut String, border: &CellBorder) {
    xml.push_str("<border>");
    write_border_side(xml, "left", border.left.as_ref());
    write_border_side(xml, "right", border.right.as_ref());
    write_border_side(xml, "top", border.top.as_ref());
    write_border_side(xml, "bottom", border.bottom.as_ref());
    write_border_side(xml, "diagonal", border.diagonal.as_ref());
    xml.push_str("</border>");
}

fn write_border_side(xml: &mut String, side: &str, border_side: Option<&CellBorderSide>) {
    xml.push('<');
    xml.push_str(side);

    let Some(bs) = border_side else {
        xml.push_str("/>");
        return;
    };

    push_attr(xml, "style", bs.style.as_str());
    match bs.color {
        Some(ref color) => {
            xml.push('>');
            write_color(xml, "color", color);
            xml.push_str("</");
            xml.push_str(side);
            xml.push('>');
        },
        None => xml.push_str("/>"),
    }
}

/// Drop a trailing `.0` so integral values render as integers.
#[inline]
pub(crate) fn trim_float(s: &str) -> &str {
    s.strip_suffix(".0").unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::xlsx::format::{
        CellBorderLineStyle, HorizontalAlignment, StandardNumberFormat,
    };
    use proptest::prelude::*;

    #[test]
    fn test_create_default_styles() {
        let builder = StylesBuilder::new();
        assert_eq!(builder.fonts.len(), 1);
        assert_eq!(builder.fills.len(), 2);
        assert_eq!(builder.borders.len(), 1);
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_default_format_is_style_zero() {
        let mut builder = StylesBuilder::new();
        assert_eq!(builder.add_cell_format(&CellFormat::default()).unwrap(), StyleId(0));
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_add_cell_format_dedups() {
        let mut builder = StylesBuilder::new();

        let format = CellFormat::new().with_font(CellFont {
            bold: true,
            ..Default::default()
        });

        let first = builder.add_cell_format(&format).unwrap();
        assert_eq!(first, StyleId(1));
        assert_eq!(builder.add_cell_format(&format.clone()).unwrap(), first);
        assert_eq!(builder.len(), 2);
    }

    #[test]
    fn test_components_are_shared() {
        let mut builder = StylesBuilder::new();
        let font = CellFont {
            italic: true,
            ..Default::default()
        };

        let a = builder
            .add_cell_format(&CellFormat::new().with_font(font.clone()))
            .unwrap();
        let b = builder
            .add_cell_format(
                &CellFormat::new()
                    .with_font(font)
                    .with_fill(CellFill::solid(Color::rgb(0, 0, 255))),
            )
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(builder.fonts.len(), 2);
        assert_eq!(builder.cell_formats[1].font_id, builder.cell_formats[2].font_id);
    }

    #[test]
    fn test_number_formats() {
        let mut builder = StylesBuilder::new();
        let percent = builder
            .add_cell_format(
                &CellFormat::new()
                    .with_number_format(NumberFormat::Standard(StandardNumberFormat::Percent)),
            )
            .unwrap();
        let custom = builder
            .add_cell_format(&CellFormat::new().with_number_format(NumberFormat::custom("0.000")))
            .unwrap();

        assert_eq!(builder.cell_formats[percent.0 as usize].num_fmt_id, 9);
        assert_eq!(builder.cell_formats[custom.0 as usize].num_fmt_id, 164);

        let xml = builder.to_xml();
        assert!(xml.contains(r#"<numFmts count="1"><numFmt numFmtId="164" formatCode="0.000"/></numFmts>"#));
        assert!(xml.contains(r#"<cellXfs count="3">"#));
    }

    #[test]
    fn test_default_styling_registers_date_format() {
        let mut builder = StylesBuilder::new();
        let defaults =
            DefaultStyling::register(&mut builder, Some(&NumberFormat::custom("yyyy-mm-dd")))
                .unwrap();
        assert_eq!(defaults.date_time, Some(StyleId(1)));

        let none = DefaultStyling::register(&mut builder, None).unwrap();
        assert_eq!(none.date_time, None);
    }

    #[test]
    fn test_generate_xml() {
        let mut builder = StylesBuilder::new();

        let format = CellFormat::new()
            .with_font(CellFont {
                bold: true,
                size: Some(12.0),
                color: Some(Color::rgb(255, 0, 0)),
                ..Default::default()
            })
            .with_border(CellBorder::all(CellBorderSide {
                style: CellBorderLineStyle::Thin,
                color: None,
            }))
            .with_alignment(CellAlignment {
                horizontal: Some(HorizontalAlignment::Center),
                wrap_text: true,
                ..Default::default()
            });

        builder.add_cell_format(&format).unwrap();

        let xml = builder.to_xml();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains(r#"<font><b/><sz val="12"/><color rgb="FFFF0000"/><name val="Calibri"/></font>"#));
        assert!(xml.contains(r#"<fill><patternFill patternType="gray125"/></fill>"#));
        assert!(xml.contains(r#"<left style="thin"/>"#));
        assert!(xml.contains(r#"<alignment horizontal="center" wrapText="1"/>"#));
        assert!(xml.ends_with("</styleSheet>"));
    }

    #[test]
    fn test_style_cap() {
        let mut builder = StylesBuilder::new();
        for i in 1..MAX_STYLES {
            builder
                .add_cell_format(&CellFormat::new().with_number_format(NumberFormat::custom(
                    format!("0.{}", i),
                )))
                .unwrap();
        }
        let err = builder
            .add_cell_format(&CellFormat::new().with_number_format(NumberFormat::custom("x")))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
    }

    fn arb_format() -> impl Strategy<Value = CellFormat> {
        (
            any::<bool>(),
            any::<bool>(),
            prop::option::of(prop::sample::select(vec![8.0, 10.5, 11.0, 14.0])),
            prop::option::of((any::<u8>(), any::<u8>(), any::<u8>())),
            prop::option::of(prop::sample::select(vec!["0.0", "0%", "yyyy"])),
        )
            .prop_map(|(bold, italic, size, fill, code)| {
                let mut format = CellFormat::new().with_font(CellFont {
                    bold,
                    italic,
                    size,
                    ..Default::default()
                });
                if let Some((r, g, b)) = fill {
                    format = format.with_fill(CellFill::solid(Color::rgb(r, g, b)));
                }
                if let Some(code) = code {
                    format = format.with_number_format(NumberFormat::custom(code));
                }
                format
            })
    }

    proptest! {
        #[test]
        fn prop_equal_formats_share_a_handle(formats in prop::collection::vec(arb_format(), 1..40)) {
            let mut builder = StylesBuilder::new();
            let ids: Vec<StyleId> = formats
                .iter()
                .map(|f| builder.add_cell_format(f).unwrap())
                .collect();

            for (i, a) in formats.iter().enumerate() {
                for (j, b) in formats.iter().enumerate() {
                    prop_assert_eq!(a == b, ids[i] == ids[j]);
                }
            }
            // Re-registering never creates new records
            let before = builder.len();
            for f in &formats {
                builder.add_cell_format(f).unwrap();
            }
            prop_assert_eq!(builder.len(), before);
        }
    }
}
