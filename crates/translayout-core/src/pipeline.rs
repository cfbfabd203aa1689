//! End-to-end document translation.
//!
//! [`DocumentTranslator`] wires the stages together: mode selection, page
//! range filtering, then either the raster path (rasterize, OCR, translate,
//! draw, reassemble) or the native path (extract, translate, rewrite
//! content streams). Progress is reported through a caller-supplied
//! callback so the core stays free of terminal concerns.

use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use image::RgbImage;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::fonts::FontResolver;
use crate::mode::{select_mode, ProcessingMode};
use crate::ocr::{HttpOcrEngine, OcrEngine};
use crate::page_range::parse_page_range;
use crate::pdf::{images_to_pdf, NativeRenderer, PageRasterizer, PdfDocument, TextExtractor};
use crate::raster::RasterRenderer;
use crate::region::{OcrRegion, Region};
use crate::translate::{create_backend, RegionTranslator, TranslationBackend};

/// Progress reporting hook: stage name, steps completed, total steps.
pub type ProgressCallback = dyn Fn(&str, usize, usize) + Send + Sync;

/// Translates whole documents while preserving their layout.
pub struct DocumentTranslator {
    config: AppConfig,
    backend: Arc<dyn TranslationBackend>,
    ocr: Arc<dyn OcrEngine>,
    resolver: FontResolver,
    progress: Option<Box<ProgressCallback>>,
}

impl DocumentTranslator {
    /// Build a translator with the default backend and OCR engine from
    /// configuration.
    pub fn new(config: AppConfig) -> Result<Self> {
        let backend = create_backend(&config.translator)?;
        let ocr: Arc<dyn OcrEngine> = Arc::new(HttpOcrEngine::new(config.ocr.clone()));
        Ok(Self::with_services(config, backend, ocr))
    }

    /// Build a translator with explicit services. Used by tests to inject
    /// mock backends.
    pub fn with_services(
        config: AppConfig,
        backend: Arc<dyn TranslationBackend>,
        ocr: Arc<dyn OcrEngine>,
    ) -> Self {
        Self {
            config,
            backend,
            ocr,
            resolver: FontResolver::new(),
            progress: None,
        }
    }

    /// Install a progress callback.
    pub fn on_progress(mut self, callback: Box<ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    fn report(&self, stage: &str, current: usize, total: usize) {
        if let Some(callback) = &self.progress {
            callback(stage, current, total);
        }
    }

    /// Translate a document file to a new file.
    ///
    /// `page_expression` selects pages ("all", "3", "2-5", "1-3,7"); pages
    /// outside the document are skipped with a warning, and selecting no
    /// valid pages at all is an error.
    pub async fn translate_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        page_expression: &str,
    ) -> Result<()> {
        let doc = PdfDocument::from_file(input.as_ref())?;
        let pages = parse_page_range(page_expression, doc.page_count());
        if pages.is_empty() {
            return Err(Error::NoValidPages);
        }

        info!(
            "Translating {} ({} of {} pages)",
            input.as_ref().display(),
            pages.len(),
            doc.page_count()
        );

        match select_mode(&doc)? {
            ProcessingMode::Raster => self.translate_raster(&doc, &pages, output.as_ref()).await,
            ProcessingMode::Native => self.translate_native(&doc, &pages, output.as_ref()).await,
        }
    }

    /// Raster path: rasterize, OCR, translate and redraw each selected
    /// page, then rebuild the document from the page images.
    async fn translate_raster(
        &self,
        doc: &PdfDocument,
        pages: &[usize],
        output: &Path,
    ) -> Result<()> {
        self.report("Converting PDF", 0, 4);
        let rasterizer = PageRasterizer::new(doc, self.config.dpi);
        let mut images = Vec::with_capacity(pages.len());
        for &page in pages {
            images.push(rasterizer.rasterize_page(page)?);
        }

        self.report("Running OCR", 1, 4);
        let page_regions = self.ocr.recognize(&images).await?;

        self.report("Translating", 2, 4);
        let translated = self.translate_and_draw(images, page_regions).await?;

        self.report("Saving PDF", 3, 4);
        let pdf_bytes = images_to_pdf(&translated, self.config.dpi, Some(doc.metadata()))?;
        std::fs::write(output, pdf_bytes)
            .map_err(|e| Error::PdfSave(format!("Failed to write output file: {e}")))?;

        self.report("Done", 4, 4);
        Ok(())
    }

    /// Translate regions page-by-page with bounded concurrency and draw
    /// the results onto the page images, preserving page order.
    async fn translate_and_draw(
        &self,
        images: Vec<RgbImage>,
        page_regions: Vec<Vec<OcrRegion>>,
    ) -> Result<Vec<RgbImage>> {
        let translator = RegionTranslator::new(
            Arc::clone(&self.backend),
            self.config.source_lang.clone(),
            self.config.target_lang.clone(),
        );
        let renderer = RasterRenderer::new(&self.resolver, self.config.target_lang.clone());

        let page_count = images.len();
        let tasks = images
            .into_iter()
            .zip(page_regions)
            .enumerate()
            .map(|(index, (image, regions))| {
                let regions: Vec<Region> = regions.into_iter().map(Region::Ocr).collect();
                let translator = &translator;
                async move {
                    let texts: Vec<String> =
                        regions.iter().map(|r| r.text().to_string()).collect();
                    let translations = translator.translate_batch(&texts).await;
                    (index, image, regions, translations)
                }
            });

        let mut results: Vec<Option<RgbImage>> = (0..page_count).map(|_| None).collect();
        let mut stream =
            futures::stream::iter(tasks).buffer_unordered(self.config.num_workers.max(1));

        while let Some((index, mut image, regions, translations)) = stream.next().await {
            renderer.render_translations(&mut image, &regions, &translations)?;
            results[index] = Some(image);
        }

        // Every slot was filled by exactly one task
        Ok(results.into_iter().flatten().collect())
    }

    /// Native path: extract spans, translate them, then rewrite the
    /// selected pages in place and save the whole document.
    async fn translate_native(
        &self,
        doc: &PdfDocument,
        pages: &[usize],
        output: &Path,
    ) -> Result<()> {
        self.report("Extracting text", 0, 3);
        let extractor = TextExtractor::new(doc);
        let mut page_spans = Vec::with_capacity(pages.len());
        for &page in pages {
            page_spans.push(extractor.extract_page_spans(page)?);
        }

        self.report("Translating", 1, 3);
        let translator = RegionTranslator::new(
            Arc::clone(&self.backend),
            self.config.source_lang.clone(),
            self.config.target_lang.clone(),
        );

        let tasks = page_spans.iter().enumerate().map(|(index, spans)| {
            let translator = &translator;
            async move {
                let texts: Vec<String> = spans.iter().map(|s| s.text.clone()).collect();
                (index, translator.translate_batch(&texts).await)
            }
        });

        let mut translations: Vec<Vec<String>> = vec![Vec::new(); page_spans.len()];
        let mut stream =
            futures::stream::iter(tasks).buffer_unordered(self.config.num_workers.max(1));
        while let Some((index, result)) = stream.next().await {
            translations[index] = result;
        }

        self.report("Saving PDF", 2, 3);
        // The coverage check only needs a representative slice of the output
        let sample: String = translations
            .iter()
            .flatten()
            .flat_map(|t| t.chars())
            .take(4000)
            .collect();
        let font = self
            .resolver
            .replacement_font(&self.config.target_lang, &sample);
        let mut renderer = NativeRenderer::new(font);
        renderer.open(doc.bytes())?;

        for ((&page, spans), page_translations) in
            pages.iter().zip(&page_spans).zip(&translations)
        {
            if spans.is_empty() {
                warn!("No text found on page {page}, leaving it unchanged");
                continue;
            }
            let (_, page_height) = doc.page_dimensions(page)?;
            renderer.replace_page(page, page_height, spans, page_translations)?;
        }

        renderer.save(output)?;

        self.report("Done", 3, 3);
        Ok(())
    }
}
