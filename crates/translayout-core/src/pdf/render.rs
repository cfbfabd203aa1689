use image::RgbImage;
use mupdf::{Colorspace, Matrix};

use crate::error::{Error, Result};
use super::document::PdfDocument;
use super::page_index::PageIndex;

/// PDF user space resolution in points per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Rendered page dimensions in pixels.
#[derive(Debug, Clone, Copy)]
pub struct PageSize {
    pub width: u32,
    pub height: u32,
}

/// Rasterizes PDF pages to RGB bitmaps for the OCR path.
pub struct PageRasterizer<'a> {
    pub doc: &'a PdfDocument,
    /// Target resolution in dots per inch
    pub dpi: u32,
}

impl<'a> PageRasterizer<'a> {
    pub const fn new(doc: &'a PdfDocument, dpi: u32) -> Self {
        Self { doc, dpi }
    }

    #[allow(clippy::cast_precision_loss)] // DPI values are small integers
    fn scale(&self) -> f32 {
        self.dpi as f32 / POINTS_PER_INCH
    }

    /// Pixel size of a page at the configured resolution.
    pub fn page_size(&self, page_num: usize) -> Result<PageSize> {
        let page_index = PageIndex::try_from_page_num(page_num, self.doc.page_count())?;

        let doc = self.doc.open_document()?;
        let page = doc
            .load_page(page_index.into())
            .map_err(|e| Error::PdfRasterize {
                page: page_num,
                reason: format!("Failed to load page: {e}"),
            })?;

        let bounds = page.bounds().map_err(|e| Error::PdfRasterize {
            page: page_num,
            reason: format!("Failed to get bounds: {e}"),
        })?;

        let width = f32_to_u32((bounds.x1 - bounds.x0) * self.scale());
        let height = f32_to_u32((bounds.y1 - bounds.y0) * self.scale());

        Ok(PageSize { width, height })
    }

    /// Render a page to an RGB image buffer.
    pub fn rasterize_page(&self, page_num: usize) -> Result<RgbImage> {
        let page_index = PageIndex::try_from_page_num(page_num, self.doc.page_count())?;

        let doc = self.doc.open_document()?;
        let page = doc
            .load_page(page_index.into())
            .map_err(|e| Error::PdfRasterize {
                page: page_num,
                reason: format!("Failed to load page: {e}"),
            })?;

        let scale = self.scale();
        let matrix = Matrix::new_scale(scale, scale);

        let pixmap = page
            .to_pixmap(&matrix, &Colorspace::device_rgb(), 1.0, true)
            .map_err(|e| Error::PdfRasterize {
                page: page_num,
                reason: format!("Failed to render: {e}"),
            })?;

        let pixels = pixmap.samples();
        let img_width = pixmap.width();
        let img_height = pixmap.height();

        // mupdf may hand back RGB, RGBA or grayscale depending on build flags
        let n = pixmap.n() as usize;
        let mut rgb_pixels = Vec::with_capacity((img_width * img_height * 3) as usize);

        for chunk in pixels.chunks(n) {
            match n {
                3 => rgb_pixels.extend_from_slice(chunk),
                4 => rgb_pixels.extend_from_slice(&chunk[..3]),
                1 => {
                    rgb_pixels.push(chunk[0]);
                    rgb_pixels.push(chunk[0]);
                    rgb_pixels.push(chunk[0]);
                }
                _ => {
                    return Err(Error::PdfRasterize {
                        page: page_num,
                        reason: format!("Unexpected pixel format with {n} components"),
                    });
                }
            }
        }

        RgbImage::from_raw(img_width, img_height, rgb_pixels).ok_or_else(|| Error::PdfRasterize {
            page: page_num,
            reason: "Failed to create image buffer".to_string(),
        })
    }
}

/// Convert f32 dimension to u32, clamping to valid range.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
const fn f32_to_u32(value: f32) -> u32 {
    const MAX: f32 = u32::MAX as f32;
    // Manual clamp since f32::clamp isn't const
    let clamped = if value < 0.0 {
        0.0
    } else if value > MAX {
        MAX
    } else {
        value
    };
    clamped as u32
}
