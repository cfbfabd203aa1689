//! Native text replacement via content-stream rewriting.
//!
//! # Coordinate systems
//!
//! mupdf extraction uses a top-left origin with Y growing downward; PDF
//! content streams use a bottom-left origin with Y growing upward. The
//! conversion is `pdf_y = page_height - mupdf_y`, applied here at the
//! content-stream boundary and nowhere else.
//!
//! # Replacement strategy
//!
//! Each page is rewritten with one appended content stream in two phases:
//! 1. White rectangles over every span that gets a translation, so
//!    erasure completes before any new text is drawn and later rectangles
//!    cannot cover earlier translations.
//! 2. Translated text for those spans, at a size shrunk from the original
//!    in proportion to how much longer the translation is.
//!
//! Spans with blank translations or degenerate boxes are left untouched:
//! keeping the original text beats erasing it with nothing to put back.

use std::path::Path;

use lopdf::{Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::error::{Error, Result};
use crate::region::TextSpan;
use super::font::{self, EmbeddedFont};
use super::page_index::PageIndex;

/// Minimum font size for replacement text, in points.
const MIN_FONT_SIZE: f32 = 6.0;

/// Headroom factor applied to the length-ratio size estimate. Translations
/// moderately longer than the source still keep the original size.
const RATIO_HEADROOM: f32 = 1.2;

/// Baseline offset above the span's bottom edge, in points.
const BASELINE_RISE: f32 = 2.0;

/// The font the replacement text is set in.
pub enum ReplacementFont {
    /// A TrueType font embedded as CIDFontType2/Identity-H
    Embedded(&'static EmbeddedFont),
    /// A built-in Type1 font by name, used when no TrueType font parsed
    Builtin(&'static str),
}

/// Rewrites pages of a digitally-born PDF in place.
///
/// Holds the document across `replace_page` calls so the replacement font
/// is embedded once and every page rewrite lands in a single save.
pub struct NativeRenderer {
    doc: Option<Document>,
    font: ReplacementFont,
    /// Type0 font object, created on first page rewrite
    font_object: Option<ObjectId>,
}

impl NativeRenderer {
    pub const fn new(font: ReplacementFont) -> Self {
        Self {
            doc: None,
            font,
            font_object: None,
        }
    }

    /// Load a document for rewriting, replacing any previously open one.
    pub fn open(&mut self, pdf_bytes: &[u8]) -> Result<()> {
        let doc = Document::load_mem(pdf_bytes)
            .map_err(|e| Error::Lopdf(format!("Failed to load PDF: {e}")))?;
        self.doc = Some(doc);
        self.font_object = None;
        Ok(())
    }

    /// Replace all given spans on one page with their translations.
    ///
    /// `page_height` is the page height in points, needed for coordinate
    /// conversion. Fails without touching the document when the span and
    /// translation lists are out of step.
    pub fn replace_page(
        &mut self,
        page_num: usize,
        page_height: f32,
        spans: &[TextSpan],
        translations: &[String],
    ) -> Result<()> {
        if spans.len() != translations.len() {
            return Err(Error::BlockCountMismatch {
                blocks: spans.len(),
                translations: translations.len(),
            });
        }
        if spans.is_empty() {
            return Ok(());
        }

        let doc = self.doc.as_mut().ok_or(Error::NoDocumentOpen)?;

        let pages = doc.get_pages();
        let page_index = PageIndex::try_from_page_num(page_num, pages.len())?;
        let page_id = *pages
            .get(&page_index.as_lopdf_page_number())
            .ok_or(Error::PdfInvalidPage {
                page: page_num,
                total: pages.len(),
            })?;

        // Register the replacement font on this page, creating the font
        // objects on first use
        let resource_name = match &self.font {
            ReplacementFont::Embedded(embedded) => {
                let font_id = match self.font_object {
                    Some(id) => id,
                    None => {
                        let id = embedded.create_font_objects(doc);
                        self.font_object = Some(id);
                        id
                    }
                };
                font::add_font_to_page(doc, page_id, "FTx", font_id)?;
                "FTx"
            }
            ReplacementFont::Builtin(base_font) => font::add_builtin_font(doc, page_id, base_font)?,
        };

        let content =
            build_page_content(&self.font, resource_name, page_height, spans, translations);
        Self::append_content_to_page(doc, page_id, &content)?;

        debug!("Rewrote {} spans on page {}", spans.len(), page_num);
        Ok(())
    }

    /// Save the rewritten document to a file.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.save_to_bytes()?;
        std::fs::write(path.as_ref(), bytes)
            .map_err(|e| Error::PdfSave(format!("Failed to write output file: {e}")))?;
        Ok(())
    }

    /// Save the rewritten document to memory.
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>> {
        let doc = self.doc.as_mut().ok_or(Error::NoDocumentOpen)?;
        doc.compress();

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|e| Error::PdfSave(format!("Failed to save PDF: {e}")))?;
        Ok(output)
    }

    /// Append a content stream to a page, preserving existing streams.
    fn append_content_to_page(doc: &mut Document, page_id: ObjectId, content: &str) -> Result<()> {
        let content_stream = Stream::new(lopdf::Dictionary::new(), content.as_bytes().to_vec());
        let content_id = doc.add_object(Object::Stream(content_stream));

        let page = doc
            .get_object_mut(page_id)
            .map_err(|e| Error::Lopdf(format!("Failed to get page: {e}")))?;

        if let Object::Dictionary(dict) = page {
            let existing_contents = dict.get(b"Contents").ok().cloned();

            match existing_contents {
                Some(Object::Reference(existing_id)) => {
                    dict.set(
                        "Contents",
                        Object::Array(vec![
                            Object::Reference(existing_id),
                            Object::Reference(content_id),
                        ]),
                    );
                }
                Some(Object::Array(mut arr)) => {
                    arr.push(Object::Reference(content_id));
                    dict.set("Contents", Object::Array(arr));
                }
                _ => {
                    dict.set("Contents", Object::Reference(content_id));
                }
            }
        }

        Ok(())
    }
}

fn build_page_content(
    font: &ReplacementFont,
    resource_name: &str,
    page_height: f32,
    spans: &[TextSpan],
    translations: &[String],
) -> String {
    use std::fmt::Write;

    let replaced: Vec<(&TextSpan, &String)> = spans
        .iter()
        .zip(translations)
        .filter(|(span, translation)| {
            !translation.trim().is_empty() && !span.bbox.is_degenerate()
        })
        .collect();

    let mut content = String::new();
    content.push_str("q\n");

    // Phase 1: erase every span that gets a translation
    content.push_str("1 1 1 rg\n");
    for (span, _) in &replaced {
        let rect_y = page_height - span.bbox.y1;
        let _ = writeln!(
            content,
            "{:.2} {:.2} {:.2} {:.2} re f",
            span.bbox.x0,
            rect_y,
            span.bbox.width(),
            span.bbox.height()
        );
    }

    // Phase 2: draw the translations
    //
    // Some scanned PDFs carry an invisible OCR text layer (3 Tr), so the
    // render mode is reset to fill
    content.push_str("0 Tr\n");

    for &(span, translation) in &replaced {
        let font_size = fit_font_size(&span.text, translation, span.font_size);
        let baseline_y = page_height - span.bbox.y1 + BASELINE_RISE;

        let (r, g, b) = span.color_rgb();
        let _ = writeln!(content, "{r:.3} {g:.3} {b:.3} rg");

        content.push_str("BT\n");
        let _ = writeln!(content, "/{resource_name} {font_size:.2} Tf");
        let _ = writeln!(content, "{:.2} {:.2} Td", span.bbox.x0, baseline_y);
        match font {
            ReplacementFont::Embedded(embedded) => {
                let _ = writeln!(content, "<{}> Tj", embedded.text_to_hex_glyphs(translation));
            }
            ReplacementFont::Builtin(_) => {
                let _ = writeln!(content, "({}) Tj", escape_literal(translation));
            }
        }
        content.push_str("ET\n");
    }

    content.push_str("Q\n");
    content
}

/// Pick a font size that keeps the translation near the original footprint.
///
/// Scales the original size down by the character-count ratio when the
/// translation is substantially longer, never below [`MIN_FONT_SIZE`] and
/// never above the original size.
pub fn fit_font_size(original: &str, translation: &str, original_size: f32) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let ratio = original.chars().count() as f32 / translation.chars().count().max(1) as f32;
    let candidate = (original_size * ratio * RATIO_HEADROOM).min(original_size);
    candidate.clamp(MIN_FONT_SIZE, original_size.max(MIN_FONT_SIZE))
}

/// Escape a string for a PDF literal string. Characters outside the ASCII
/// range are replaced since the built-in font path cannot encode them.
fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\\' => out.push_str("\\\\"),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::region::BoundingBox;

    fn span(text: &str, size: f32) -> TextSpan {
        TextSpan {
            text: text.to_string(),
            bbox: BoundingBox::new(72.0, 100.0, 300.0, 114.0),
            font_name: String::new(),
            font_size: size,
            color: 0,
            flags: 0,
        }
    }

    #[test]
    fn test_fit_font_size_same_length_keeps_original() {
        let size = fit_font_size("hello", "salut", 12.0);
        assert!((size - 12.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_fit_font_size_shrinks_for_longer_translation() {
        let size = fit_font_size("hello", "a much longer translated string", 12.0);
        assert!(size < 12.0);
        assert!(size >= 6.0);
    }

    #[test]
    fn test_fit_font_size_floor() {
        // 2 chars becoming 40 should bottom out at the minimum
        let size = fit_font_size("ab", &"x".repeat(40), 12.0);
        assert!((size - 6.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_fit_font_size_never_exceeds_original() {
        // Shorter translation must not grow the text
        let size = fit_font_size("a very long original string", "kurz", 10.0);
        assert!((size - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_replace_page_requires_open_document() {
        let mut renderer =
            NativeRenderer::new(ReplacementFont::Embedded(EmbeddedFont::fallback().unwrap()));
        let result = renderer.replace_page(0, 792.0, &[span("x", 12.0)], &["y".to_string()]);
        assert!(matches!(result, Err(Error::NoDocumentOpen)));
    }

    #[test]
    fn test_replace_page_count_mismatch() {
        let mut renderer =
            NativeRenderer::new(ReplacementFont::Embedded(EmbeddedFont::fallback().unwrap()));
        let result = renderer.replace_page(
            0,
            792.0,
            &[span("one", 12.0), span("two", 12.0)],
            &["only one".to_string()],
        );
        assert!(matches!(
            result,
            Err(Error::BlockCountMismatch {
                blocks: 2,
                translations: 1
            })
        ));
    }

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal("a(b)c"), "a\\(b\\)c");
        assert_eq!(escape_literal("back\\slash"), "back\\\\slash");
        assert_eq!(escape_literal("café"), "caf?");
    }

    #[test]
    fn test_content_phases_ordered() {
        let font = ReplacementFont::Embedded(EmbeddedFont::fallback().unwrap());
        let spans = vec![span("first", 12.0), span("second", 12.0)];
        let translations = vec!["uno".to_string(), "dos".to_string()];
        let content = build_page_content(&font, "FTx", 792.0, &spans, &translations);

        // All erase rectangles come before the first text object
        let first_text = content.find("BT").unwrap();
        let last_rect = content.rfind("re f").unwrap();
        assert!(last_rect < first_text);
        assert_eq!(content.matches("re f").count(), 2);
        assert_eq!(content.matches("BT").count(), 2);
    }

    #[test]
    fn test_blank_translation_leaves_span_untouched() {
        let font = ReplacementFont::Embedded(EmbeddedFont::fallback().unwrap());
        let spans = vec![span("first", 12.0), span("second", 12.0)];
        let translations = vec!["uno".to_string(), String::new()];
        let content = build_page_content(&font, "FTx", 792.0, &spans, &translations);

        // The blank-translation span is neither erased nor drawn
        assert_eq!(content.matches("re f").count(), 1);
        assert_eq!(content.matches("BT").count(), 1);
    }

    #[test]
    fn test_degenerate_span_skipped() {
        let font = ReplacementFont::Embedded(EmbeddedFont::fallback().unwrap());
        let degenerate = TextSpan {
            bbox: BoundingBox::new(72.0, 100.0, 72.0, 114.0),
            ..span("flat", 12.0)
        };
        let content =
            build_page_content(&font, "FTx", 792.0, &[degenerate], &["x".to_string()]);

        assert_eq!(content.matches("re f").count(), 0);
        assert_eq!(content.matches("BT").count(), 0);
    }
}
