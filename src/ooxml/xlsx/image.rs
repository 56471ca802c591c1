//! Embedded images and their placement on a worksheet.

use crate::common::error::{Error, Result};
use crate::common::reference::CellRef;

/// Largest width or height, in pixels, an image may be shown at.
pub const MAX_IMAGE_DIMENSION: u32 = 225_000;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

/// An image stored in the document.
///
/// Returned by `Spreadsheet::embed_image` and only valid for the document that
/// returned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub(crate) id: u32,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) document: u64,
}

impl EmbeddedImage {
    /// Natural width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Natural height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// 1-based number of the image within its document.
    pub fn id(&self) -> u32 {
        self.id
    }
}

/// Read the pixel size from a PNG's signature and `IHDR` chunk.
pub(crate) fn png_dimensions(data: &[u8]) -> Result<(u32, u32)> {
    if data.len() < 24 || data[..8] != PNG_SIGNATURE || &data[12..16] != b"IHDR" {
        return Err(Error::invalid_argument(
            "Image is not a PNG file (only PNG images can be embedded)",
        ));
    }

    let read_u32 =
        |at: usize| u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
    let (width, height) = (read_u32(16), read_u32(20));
    if width == 0 || height == 0 {
        return Err(Error::invalid_argument("PNG image has a zero dimension"));
    }
    Ok((width, height))
}

/// How large the image is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageSize {
    /// The natural size.
    Original,
    /// The natural size times a factor.
    Scaled(f32),
    /// An explicit size in pixels.
    Dimensions { width: u32, height: u32 },
    /// Stretched over the cells from the anchor through `to`, inclusive.
    FillCells { to: CellRef },
}

/// Where and how an image is placed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageCanvas {
    pub anchor: CellRef,
    pub size: ImageSize,
    /// Offset from the anchor cell's top-left corner, in pixels.
    pub offset_x: u32,
    pub offset_y: u32,
}

impl ImageCanvas {
    pub fn original_size(anchor: CellRef) -> Self {
        Self::new(anchor, ImageSize::Original)
    }

    pub fn scaled(anchor: CellRef, factor: f32) -> Self {
        Self::new(anchor, ImageSize::Scaled(factor))
    }

    pub fn dimensions(anchor: CellRef, width: u32, height: u32) -> Self {
        Self::new(anchor, ImageSize::Dimensions { width, height })
    }

    pub fn fill_cells(anchor: CellRef, to: CellRef) -> Self {
        Self::new(anchor, ImageSize::FillCells { to })
    }

    fn new(anchor: CellRef, size: ImageSize) -> Self {
        Self {
            anchor,
            size,
            offset_x: 0,
            offset_y: 0,
        }
    }

    pub fn with_offset(mut self, x: u32, y: u32) -> Self {
        self.offset_x = x;
        self.offset_y = y;
        self
    }

    /// Work out the anchor for `image`, checking the resulting size.
    pub(crate) fn resolve(&self, image: &EmbeddedImage) -> Result<ImageAnchor> {
        let (width, height) = match self.size {
            ImageSize::Original => (image.width, image.height),
            ImageSize::Scaled(factor) => {
                if !(factor.is_finite() && factor > 0.0) {
                    return Err(Error::invalid_argument(format!(
                        "Image scale {} must be a positive number",
                        factor
                    )));
                }
                let scale = |px: u32| (f64::from(px) * f64::from(factor)).round();
                (
                    scaled_px("width", scale(image.width))?,
                    scaled_px("height", scale(image.height))?,
                )
            },
            ImageSize::Dimensions { width, height } => (width, height),
            ImageSize::FillCells { to } => {
                if to.column < self.anchor.column || to.row < self.anchor.row {
                    return Err(Error::invalid_argument(format!(
                        "Image cannot fill from {} to {}",
                        self.anchor, to
                    )));
                }
                return Ok(ImageAnchor::TwoCell {
                    from: self.anchor,
                    to,
                    offset_x: self.offset_x,
                    offset_y: self.offset_y,
                });
            },
        };

        check_dimension("width", width)?;
        check_dimension("height", height)?;

        Ok(ImageAnchor::OneCell {
            from: self.anchor,
            offset_x: self.offset_x,
            offset_y: self.offset_y,
            width,
            height,
        })
    }
}

/// A resolved placement, ready to serialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ImageAnchor {
    OneCell {
        from: CellRef,
        offset_x: u32,
        offset_y: u32,
        width: u32,
        height: u32,
    },
    TwoCell {
        from: CellRef,
        /// Last covered cell.
        to: CellRef,
        offset_x: u32,
        offset_y: u32,
    },
}

fn scaled_px(what: &str, px: f64) -> Result<u32> {
    if !(1.0..=f64::from(MAX_IMAGE_DIMENSION)).contains(&px) {
        return Err(Error::invalid_argument(format!(
            "Scaled image {} {} is outside 1..={}",
            what, px, MAX_IMAGE_DIMENSION
        )));
    }
    Ok(px as u32)
}

fn check_dimension(what: &str, px: u32) -> Result<()> {
    if px == 0 || px > MAX_IMAGE_DIMENSION {
        return Err(Error::invalid_argument(format!(
            "Image {} {} is outside 1..={}",
            what, px, MAX_IMAGE_DIMENSION
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A minimal PNG whose header claims the given size.
    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend_from_slice(&13u32.to_be_bytes());
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&[8, 6, 0, 0, 0]);
        data.extend_from_slice(&[0, 0, 0, 0]); // CRC is not checked
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(b"IEND");
        data.extend_from_slice(&[0xAE, 0x42, 0x60, 0x82]);
        data
    }

    fn image(width: u32, height: u32) -> EmbeddedImage {
        EmbeddedImage {
            id: 1,
            width,
            height,
            document: 0,
        }
    }

    fn cell(s: &str) -> CellRef {
        s.parse().unwrap()
    }

    #[test]
    fn test_png_dimensions() {
        assert_eq!(png_dimensions(&png_bytes(640, 480)).unwrap(), (640, 480));
        assert!(png_dimensions(b"GIF89a").is_err());
        assert!(png_dimensions(&png_bytes(0, 10)).is_err());

        let mut jpeg = png_bytes(1, 1);
        jpeg[1] = b'J';
        assert!(png_dimensions(&jpeg).is_err());
    }

    #[test]
    fn test_scaled() {
        let anchor = ImageCanvas::scaled(cell("B2"), 0.5).resolve(&image(200, 101)).unwrap();
        assert_eq!(
            anchor,
            ImageAnchor::OneCell {
                from: cell("B2"),
                offset_x: 0,
                offset_y: 0,
                width: 100,
                height: 51,
            }
        );

        assert!(ImageCanvas::scaled(cell("A1"), 0.0).resolve(&image(10, 10)).is_err());
        assert!(ImageCanvas::scaled(cell("A1"), f32::NAN).resolve(&image(10, 10)).is_err());
        // Rounds to zero
        assert!(ImageCanvas::scaled(cell("A1"), 0.01).resolve(&image(10, 10)).is_err());
        assert!(ImageCanvas::scaled(cell("A1"), 1000.0).resolve(&image(300, 10)).is_err());
    }

    #[test]
    fn test_dimensions_bounds() {
        assert!(ImageCanvas::dimensions(cell("A1"), 225_000, 1).resolve(&image(1, 1)).is_ok());
        assert!(ImageCanvas::dimensions(cell("A1"), 225_001, 1).resolve(&image(1, 1)).is_err());
        assert!(ImageCanvas::dimensions(cell("A1"), 5, 0).resolve(&image(1, 1)).is_err());
    }

    #[test]
    fn test_fill_cells() {
        let canvas = ImageCanvas::fill_cells(cell("B2"), cell("D5")).with_offset(3, 4);
        assert!(matches!(
            canvas.resolve(&image(1, 1)).unwrap(),
            ImageAnchor::TwoCell { offset_x: 3, offset_y: 4, .. }
        ));
        assert!(ImageCanvas::fill_cells(cell("B2"), cell("A5")).resolve(&image(1, 1)).is_err());
    }
}
