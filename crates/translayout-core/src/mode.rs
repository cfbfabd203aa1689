//! Processing mode selection.
//!
//! Digitally-born PDFs keep their vector text and get rewritten in place;
//! scanned PDFs have no usable text layer and go through rasterize + OCR.
//! The choice is made once per document by probing a few pages for
//! extractable text.

use tracing::info;

use crate::error::Result;
use crate::pdf::{PdfDocument, TextExtractor};

/// How a document's text is recovered and replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingMode {
    /// Extract vector text spans and rewrite content streams
    Native,
    /// Rasterize pages, OCR them and rebuild the PDF from images
    Raster,
}

/// Minimum extractable characters for a page to count as having real text.
/// Scanned pages often yield a few stray characters from stamps or OCR
/// remnants; those must not flip the document to native handling.
const MIN_TEXT_CHARS: usize = 50;

/// Pages probed per document.
const SAMPLE_PAGES: usize = 3;

/// Choose the processing mode by sampling pages spread across the document.
///
/// Up to three pages are probed at an even stride; the document is treated
/// as native only when a strict majority of probes carry text. An
/// unreadable probe page counts as having no text rather than failing the
/// run.
pub fn select_mode(doc: &PdfDocument) -> Result<ProcessingMode> {
    let total = doc.page_count();
    if total == 0 {
        return Ok(ProcessingMode::Raster);
    }

    let extractor = TextExtractor::new(doc);
    let step = (total / SAMPLE_PAGES).max(1);

    let mut sampled = 0_usize;
    let mut with_text = 0_usize;

    let mut page = 0;
    while page < total && sampled < SAMPLE_PAGES {
        let has_text = extractor
            .page_text(page)
            .map(|text| text.trim().chars().count() >= MIN_TEXT_CHARS)
            .unwrap_or(false);

        if has_text {
            with_text += 1;
        }
        sampled += 1;
        page += step;
    }

    let mode = if with_text * 2 > sampled {
        ProcessingMode::Native
    } else {
        ProcessingMode::Raster
    };

    info!(
        "Selected {:?} mode ({with_text}/{sampled} sampled pages with text)",
        mode
    );
    Ok(mode)
}
