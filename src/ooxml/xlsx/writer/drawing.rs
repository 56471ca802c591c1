//! Drawing part holding the pictures of one worksheet.

use crate::common::unit::px_to_emu_96;
use crate::common::xml::{push_attr, push_num_attr};
use crate::ooxml::opc::Relationships;
use crate::ooxml::opc::constants::{namespace, relationship_type as rt};
use crate::ooxml::xlsx::image::{EmbeddedImage, ImageAnchor};
use std::collections::HashMap;

#[derive(Debug)]
struct Picture {
    anchor: ImageAnchor,
    image_rel_id: String,
    image_id: u32,
}

/// Pictures placed on a worksheet, plus the relationships to their media.
///
/// An image placed more than once is referenced by a single relationship.
#[derive(Debug, Default)]
pub(crate) struct WorksheetDrawing {
    pictures: Vec<Picture>,
    rels: Relationships,
    image_rel_ids: HashMap<u32, String>,
}

impl WorksheetDrawing {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.pictures.is_empty()
    }

    pub(crate) fn add(&mut self, anchor: ImageAnchor, image: &EmbeddedImage) {
        let rels = &mut self.rels;
        let image_rel_id = self
            .image_rel_ids
            .entry(image.id)
            .or_insert_with(|| {
                rels.add(rt::IMAGE, format!("../media/image{}.png", image.id))
                    .to_string()
            })
            .clone();

        self.pictures.push(Picture {
            anchor,
            image_rel_id,
            image_id: image.id,
        });
    }

    /// Generate `xl/drawings/drawingN.xml`.
    pub(crate) fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(256 + self.pictures.len() * 768);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push_str("<xdr:wsDr");
        push_attr(&mut xml, "xmlns:xdr", namespace::DML_SPREADSHEET_DRAWING);
        push_attr(&mut xml, "xmlns:a", namespace::DML_MAIN);
        push_attr(&mut xml, "xmlns:r", namespace::OFC_RELATIONSHIPS);
        xml.push('>');

        for (i, picture) in self.pictures.iter().enumerate() {
            match picture.anchor {
                ImageAnchor::OneCell {
                    from,
                    offset_x,
                    offset_y,
                    width,
                    height,
                } => {
                    xml.push_str("<xdr:oneCellAnchor>");
                    write_marker(&mut xml, "xdr:from", from.column - 1, from.row - 1, offset_x, offset_y);
                    xml.push_str("<xdr:ext");
                    push_num_attr(&mut xml, "cx", px_to_emu_96(width));
                    push_num_attr(&mut xml, "cy", px_to_emu_96(height));
                    xml.push_str("/>");
                    write_picture(&mut xml, i as u32 + 2, picture);
                    xml.push_str("<xdr:clientData/></xdr:oneCellAnchor>");
                },
                ImageAnchor::TwoCell {
                    from,
                    to,
                    offset_x,
                    offset_y,
                } => {
                    xml.push_str(r#"<xdr:twoCellAnchor editAs="oneCell">"#);
                    write_marker(&mut xml, "xdr:from", from.column - 1, from.row - 1, offset_x, offset_y);
                    // The end marker sits on the top-left corner of the next cell
                    write_marker(&mut xml, "xdr:to", to.column, to.row, 0, 0);
                    write_picture(&mut xml, i as u32 + 2, picture);
                    xml.push_str("<xdr:clientData/></xdr:twoCellAnchor>");
                },
            }
        }

        xml.push_str("</xdr:wsDr>");
        xml
    }

    pub(crate) fn rels_xml(&self) -> String {
        self.rels.to_xml()
    }
}

fn write_marker(xml: &mut String, tag: &str, column: u32, row: u32, dx: u32, dy: u32) {
    xml.push('<');
    xml.push_str(tag);
    xml.push_str("><xdr:col>");
    xml.push_str(itoa::Buffer::new().format(column));
    xml.push_str("</xdr:col><xdr:colOff>");
    xml.push_str(itoa::Buffer::new().format(px_to_emu_96(dx)));
    xml.push_str("</xdr:colOff><xdr:row>");
    xml.push_str(itoa::Buffer::new().format(row));
    xml.push_str("</xdr:row><xdr:rowOff>");
    xml.push_str(itoa::Buffer::new().format(px_to_emu_96(dy)));
    xml.push_str("</xdr:rowOff></");
    xml.push_str(tag);
    xml.push('>');
}

fn write_picture(xml: &mut String, shape_id: u32, picture: &Picture) {
    let name = format!("Picture {}", picture.image_id);

    xml.push_str("<xdr:pic><xdr:nvPicPr><xdr:cNvPr");
    push_num_attr(xml, "id", shape_id);
    push_attr(xml, "name", &name);
    xml.push_str(r#"/><xdr:cNvPicPr><a:picLocks noChangeAspect="1"/></xdr:cNvPicPr></xdr:nvPicPr>"#);
    xml.push_str("<xdr:blipFill><a:blip");
    push_attr(xml, "r:embed", &picture.image_rel_id);
    xml.push_str("/><a:stretch><a:fillRect/></a:stretch></xdr:blipFill>");
    xml.push_str(r#"<xdr:spPr><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></xdr:spPr></xdr:pic>"#);
}
