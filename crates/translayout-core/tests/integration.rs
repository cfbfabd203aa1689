//! End-to-end tests over synthetic documents built in memory.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::RgbImage;
use lopdf::{Document, Object, Stream};
use tempfile::tempdir;

use translayout_core::mode::select_mode;
use translayout_core::ocr::OcrEngine;
use translayout_core::pdf::PdfDocument;
use translayout_core::region::{BoundingBox, Formatting, OcrRegion};
use translayout_core::translate::TranslationBackend;
use translayout_core::{AppConfig, DocumentTranslator, Error, Lang, ProcessingMode};

/// Build a PDF where each inner slice is one page of text lines.
fn build_text_pdf(pages: &[&[&str]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let page_tree_id = doc.new_object_id();

    let font_id = doc.add_object(lopdf::Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));

    let resources_id = doc.add_object(lopdf::Dictionary::from_iter([(
        "Font",
        Object::Dictionary(lopdf::Dictionary::from_iter([(
            "F1",
            Object::Reference(font_id),
        )])),
    )]));

    let mut kids = Vec::new();

    for lines in pages {
        let mut content = String::new();
        let mut y = 700;
        for line in *lines {
            content.push_str("BT\n/F1 12 Tf\n");
            content.push_str(&format!("72 {y} Td\n({line}) Tj\nET\n"));
            y -= 20;
        }

        let content_id = doc.add_object(Stream::new(
            lopdf::Dictionary::new(),
            content.into_bytes(),
        ));

        let page_id = doc.add_object(lopdf::Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(page_tree_id)),
            ("Contents", Object::Reference(content_id)),
            ("Resources", Object::Reference(resources_id)),
            (
                "MediaBox",
                Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
            ),
        ]));
        kids.push(Object::Reference(page_id));
    }

    let count = i64::try_from(kids.len()).unwrap();
    let page_tree = lopdf::Dictionary::from_iter([
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Kids", Object::Array(kids)),
        ("Count", Object::Integer(count)),
    ]);
    doc.objects
        .insert(page_tree_id, Object::Dictionary(page_tree));

    let catalog_id = doc.add_object(lopdf::Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(page_tree_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut output = Vec::new();
    doc.save_to(&mut output).unwrap();
    output
}

/// A page of prose long enough to pass the native-mode text threshold.
const PROSE: &[&str] = &[
    "The quick brown fox jumps over the lazy dog near the riverbank today.",
    "Reports from the northern region describe steady improvement in trade.",
    "Each chapter of the manual covers one subsystem in considerable depth.",
];

fn blank_pdf(page_count: usize) -> Vec<u8> {
    let pages: Vec<&[&str]> = (0..page_count).map(|_| &[][..]).collect();
    build_text_pdf(&pages)
}

fn prose_pdf(page_count: usize) -> Vec<u8> {
    let pages: Vec<&[&str]> = (0..page_count).map(|_| PROSE).collect();
    build_text_pdf(&pages)
}

struct MockBackend;

#[async_trait]
impl TranslationBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        _source: &Lang,
        _target: &Lang,
    ) -> translayout_core::Result<Vec<String>> {
        Ok(texts.iter().map(|t| format!("tr:{t}")).collect())
    }

    async fn translate(
        &self,
        text: &str,
        _source: &Lang,
        _target: &Lang,
    ) -> translayout_core::Result<String> {
        Ok(format!("tr:{text}"))
    }
}

/// OCR stub reporting one text region per page.
struct MockOcr;

#[async_trait]
impl OcrEngine for MockOcr {
    async fn recognize(
        &self,
        pages: &[RgbImage],
    ) -> translayout_core::Result<Vec<Vec<OcrRegion>>> {
        Ok(pages
            .iter()
            .map(|_| {
                vec![OcrRegion {
                    text: "detected heading".to_string(),
                    bbox: BoundingBox::new(100.0, 100.0, 500.0, 140.0),
                    polygon: vec![],
                    confidence: 0.97,
                    formatting: Formatting::default(),
                }]
            })
            .collect())
    }
}

fn translator(config: AppConfig) -> DocumentTranslator {
    DocumentTranslator::with_services(config, Arc::new(MockBackend), Arc::new(MockOcr))
}

#[test]
fn test_mode_native_for_text_pdf() {
    let doc = PdfDocument::from_bytes(prose_pdf(3)).unwrap();
    assert_eq!(select_mode(&doc).unwrap(), ProcessingMode::Native);
}

#[test]
fn test_mode_raster_for_blank_pdf() {
    let doc = PdfDocument::from_bytes(blank_pdf(3)).unwrap();
    assert_eq!(select_mode(&doc).unwrap(), ProcessingMode::Raster);
}

#[test]
fn test_mode_majority_vote() {
    // One text page among three blanks: raster wins
    let pages: Vec<&[&str]> = vec![PROSE, &[], &[], &[]];
    let doc = PdfDocument::from_bytes(build_text_pdf(&pages)).unwrap();
    assert_eq!(select_mode(&doc).unwrap(), ProcessingMode::Raster);
}

#[tokio::test]
async fn test_native_end_to_end() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.pdf");
    let output = dir.path().join("output.pdf");
    std::fs::write(&input, prose_pdf(2)).unwrap();

    translator(AppConfig::default())
        .translate_file(&input, &output, "all")
        .await
        .unwrap();

    let result = Document::load(&output).unwrap();
    assert_eq!(result.get_pages().len(), 2);
}

#[tokio::test]
async fn test_native_page_subset_keeps_other_pages() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.pdf");
    let output = dir.path().join("output.pdf");
    std::fs::write(&input, prose_pdf(3)).unwrap();

    translator(AppConfig::default())
        .translate_file(&input, &output, "2")
        .await
        .unwrap();

    // Untranslated pages survive in the output document
    let result = Document::load(&output).unwrap();
    assert_eq!(result.get_pages().len(), 3);
}

#[tokio::test]
async fn test_raster_end_to_end() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.pdf");
    let output = dir.path().join("output.pdf");
    std::fs::write(&input, blank_pdf(2)).unwrap();

    // Low DPI keeps the test fast
    let config = AppConfig {
        dpi: 72,
        ..AppConfig::default()
    };

    translator(config)
        .translate_file(&input, &output, "all")
        .await
        .unwrap();

    let result = Document::load(&output).unwrap();
    assert_eq!(result.get_pages().len(), 2);
}

#[tokio::test]
async fn test_out_of_range_pages_error() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.pdf");
    let output = dir.path().join("output.pdf");
    std::fs::write(&input, prose_pdf(1)).unwrap();

    let result = translator(AppConfig::default())
        .translate_file(&input, &output, "99")
        .await;

    assert!(matches!(result, Err(Error::NoValidPages)));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_progress_stage_sequence_native() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.pdf");
    let output = dir.path().join("output.pdf");
    std::fs::write(&input, prose_pdf(1)).unwrap();

    let stages: Arc<Mutex<Vec<(String, usize, usize)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&stages);

    translator(AppConfig::default())
        .on_progress(Box::new(move |stage, current, total| {
            sink.lock().unwrap().push((stage.to_string(), current, total));
        }))
        .translate_file(&input, &output, "all")
        .await
        .unwrap();

    let stages = stages.lock().unwrap();
    let names: Vec<&str> = stages.iter().map(|(s, _, _)| s.as_str()).collect();
    assert_eq!(
        names,
        vec!["Extracting text", "Translating", "Saving PDF", "Done"]
    );
    assert_eq!(stages.first().unwrap().2, 3);
    assert_eq!(stages.last().unwrap().1, 3);
}

#[tokio::test]
async fn test_progress_stage_sequence_raster() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.pdf");
    let output = dir.path().join("output.pdf");
    std::fs::write(&input, blank_pdf(1)).unwrap();

    let stages: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&stages);

    let config = AppConfig {
        dpi: 72,
        ..AppConfig::default()
    };

    translator(config)
        .on_progress(Box::new(move |stage, _, _| {
            sink.lock().unwrap().push(stage.to_string());
        }))
        .translate_file(&input, &output, "all")
        .await
        .unwrap();

    let stages = stages.lock().unwrap();
    assert_eq!(
        *stages,
        vec!["Converting PDF", "Running OCR", "Translating", "Saving PDF", "Done"]
    );
}
