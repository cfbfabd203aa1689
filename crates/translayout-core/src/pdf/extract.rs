use mupdf::TextPageOptions;

use crate::error::{Error, Result};
use crate::region::{BoundingBox, TextSpan};
use super::document::PdfDocument;
use super::page_index::PageIndex;

/// Scale factor from measured line height to visual font size.
///
/// The line bbox height reported by mupdf runs slightly smaller than the
/// nominal font size, so the estimate is scaled up to match.
const FONT_SIZE_SCALE: f32 = 1.18;

/// Text extraction from digitally-born PDF pages.
pub struct TextExtractor<'a> {
    pub doc: &'a PdfDocument,
}

impl<'a> TextExtractor<'a> {
    pub const fn new(doc: &'a PdfDocument) -> Self {
        Self { doc }
    }

    /// Extract one [`TextSpan`] per visual line of text.
    ///
    /// Line granularity keeps replacement boxes tight: each span covers one
    /// baseline, so the rewritten text lands where the original line was
    /// without reflowing whole paragraphs.
    pub fn extract_page_spans(&self, page_num: usize) -> Result<Vec<TextSpan>> {
        let page_index = PageIndex::try_from_page_num(page_num, self.doc.page_count())?;

        let doc = self.doc.open_document()?;
        let page = doc
            .load_page(page_index.into())
            .map_err(|e| Error::PdfTextExtraction {
                page: page_num,
                reason: format!("Failed to load page: {e}"),
            })?;

        let text_page =
            page.to_text_page(TextPageOptions::empty())
                .map_err(|e| Error::PdfTextExtraction {
                    page: page_num,
                    reason: format!("Failed to get text page: {e}"),
                })?;

        let mut spans = Vec::new();

        for block in text_page.blocks() {
            for line in block.lines() {
                let mut line_text = String::new();
                let mut line_bbox: Option<BoundingBox> = None;

                for text_char in line.chars() {
                    if let Some(c) = text_char.char() {
                        line_text.push(c);
                    }

                    let char_bbox = BoundingBox::from_quad(&text_char.quad());
                    line_bbox =
                        Some(line_bbox.map_or(char_bbox, |bbox| bbox.union(&char_bbox)));
                }

                let trimmed = line_text.trim();
                let Some(bbox) = line_bbox else { continue };
                if trimmed.is_empty() || bbox.is_degenerate() {
                    continue;
                }

                let font_size = (bbox.height() * FONT_SIZE_SCALE).clamp(6.0, 36.0);

                // The character-level API exposes no font descriptor, so style
                // defaults to black regular text
                spans.push(TextSpan {
                    text: trimmed.to_string(),
                    bbox,
                    font_name: String::new(),
                    font_size,
                    color: 0x0000_0000,
                    flags: 0,
                });
            }
        }

        Ok(spans)
    }

    /// Get plain text from a page, used by mode selection.
    pub fn page_text(&self, page_num: usize) -> Result<String> {
        let page_index = PageIndex::try_from_page_num(page_num, self.doc.page_count())?;

        let doc = self.doc.open_document()?;
        let page = doc
            .load_page(page_index.into())
            .map_err(|e| Error::PdfTextExtraction {
                page: page_num,
                reason: format!("Failed to load page: {e}"),
            })?;

        let text_page =
            page.to_text_page(TextPageOptions::empty())
                .map_err(|e| Error::PdfTextExtraction {
                    page: page_num,
                    reason: format!("Failed to get text page: {e}"),
                })?;

        let mut all_text = String::new();
        for block in text_page.blocks() {
            for line in block.lines() {
                for text_char in line.chars() {
                    if let Some(c) = text_char.char() {
                        all_text.push(c);
                    }
                }
                all_text.push('\n');
            }
        }

        Ok(all_text)
    }
}
