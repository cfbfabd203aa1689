//! OCR engine client.
//!
//! The detector/recognizer is a black box behind an HTTP boundary: pages go
//! out as base64-encoded PNGs together with the model knobs from
//! [`OcrConfig`], text lines come back with boxes and confidence. This
//! module owns the request shape and the text-cleaning step that turns raw
//! recognizer output into [`OcrRegion`]s.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::RgbImage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OcrConfig;
use crate::error::{Error, Result};
use crate::region::{BoundingBox, Formatting, OcrRegion};

/// Trait for OCR engines.
///
/// One call covers a batch of page images; the result has one region list
/// per input image, in the same order.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, pages: &[RgbImage]) -> Result<Vec<Vec<OcrRegion>>>;
}

/// OCR client speaking JSON over HTTP.
pub struct HttpOcrEngine {
    client: Client,
    config: OcrConfig,
}

#[derive(Debug, Serialize)]
struct OcrRequest<'a> {
    device: &'a str,
    detector_batch_size: usize,
    recognition_batch_size: usize,
    layout_batch_size: usize,
    images: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    pages: Vec<OcrPage>,
}

#[derive(Debug, Deserialize)]
struct OcrPage {
    lines: Vec<OcrLine>,
}

#[derive(Debug, Deserialize)]
struct OcrLine {
    text: String,
    bbox: [f32; 4],
    #[serde(default)]
    polygon: Vec<[f32; 2]>,
    #[serde(default)]
    confidence: f32,
}

impl HttpOcrEngine {
    /// Create a client carrying the given model knobs.
    ///
    /// # Panics
    /// Panics if the HTTP client cannot be created (TLS backend unavailable).
    #[allow(clippy::expect_used)]
    pub fn new(config: OcrConfig) -> Self {
        let client = Client::builder()
            // Recognition of a large batch on CPU can be slow
            .timeout(Duration::from_secs(600))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    fn encode_page(image: &RgbImage) -> Result<String> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| Error::OcrImageEncode(e.to_string()))?;
        Ok(BASE64.encode(png))
    }

    async fn recognize_chunk(&self, pages: &[RgbImage]) -> Result<Vec<Vec<OcrRegion>>> {
        let images = pages
            .iter()
            .map(Self::encode_page)
            .collect::<Result<Vec<_>>>()?;

        let request = OcrRequest {
            device: self.config.device.as_str(),
            detector_batch_size: self.config.detector_batch_size,
            recognition_batch_size: self.config.recognition_batch_size,
            layout_batch_size: self.config.layout_batch_size,
            images,
        };

        let url = format!("{}/ocr", self.config.endpoint.trim_end_matches('/'));
        debug!("OCR request for {} pages to {}", pages.len(), url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::OcrRequest(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::OcrRequest(format!("HTTP {status}: {body}")));
        }

        let parsed: OcrResponse = response
            .json()
            .await
            .map_err(|e| Error::OcrInvalidResponse(e.to_string()))?;

        if parsed.pages.len() != pages.len() {
            return Err(Error::OcrInvalidResponse(format!(
                "expected {} pages, got {}",
                pages.len(),
                parsed.pages.len()
            )));
        }

        Ok(parsed.pages.into_iter().map(page_to_regions).collect())
    }
}

#[async_trait]
impl OcrEngine for HttpOcrEngine {
    async fn recognize(&self, pages: &[RgbImage]) -> Result<Vec<Vec<OcrRegion>>> {
        let mut all_regions = Vec::with_capacity(pages.len());
        // Pages are submitted in config-sized groups, sequentially; the
        // service parallelizes internally.
        for chunk in pages.chunks(self.config.batch_pages.max(1)) {
            let mut regions = self.recognize_chunk(chunk).await?;
            all_regions.append(&mut regions);
        }
        Ok(all_regions)
    }
}

fn page_to_regions(page: OcrPage) -> Vec<OcrRegion> {
    page.lines
        .into_iter()
        .filter_map(|line| {
            let (text, formatting) = clean_text(&line.text);
            // Regions that are empty after cleaning never reach translation
            if text.is_empty() {
                return None;
            }
            Some(OcrRegion {
                text,
                bbox: BoundingBox::new(line.bbox[0], line.bbox[1], line.bbox[2], line.bbox[3]),
                polygon: line.polygon.iter().map(|p| (p[0], p[1])).collect(),
                confidence: line.confidence,
                formatting,
            })
        })
        .collect()
}

/// Strip inline markup and extract formatting information.
///
/// Some recognizers emit formatting tags like `<b>` for bold text. The tag
/// presence is preserved as style hints while the tags themselves, and any
/// other bracketed markup, are removed. Internal whitespace is collapsed.
pub fn clean_text(text: &str) -> (String, Formatting) {
    let lower = text.to_lowercase();
    let formatting = Formatting {
        bold: lower.contains("<b>") || lower.contains("</b>"),
        underline: lower.contains("<u>") || lower.contains("</u>"),
    };

    let mut stripped = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => stripped.push(c),
            _ => {}
        }
    }

    let cleaned = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    (cleaned, formatting)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_plain() {
        let (text, fmt) = clean_text("Hello world");
        assert_eq!(text, "Hello world");
        assert_eq!(fmt, Formatting::default());
    }

    #[test]
    fn test_clean_text_strips_bold_tags() {
        let (text, fmt) = clean_text("<b>Chapter One</b>");
        assert_eq!(text, "Chapter One");
        assert!(fmt.bold);
        assert!(!fmt.underline);
    }

    #[test]
    fn test_clean_text_case_insensitive_tags() {
        let (text, fmt) = clean_text("<B>Loud</B> and <U>clear</U>");
        assert_eq!(text, "Loud and clear");
        assert!(fmt.bold);
        assert!(fmt.underline);
    }

    #[test]
    fn test_clean_text_strips_unknown_markup() {
        let (text, fmt) = clean_text("<i>styled</i> <span>text</span>");
        assert_eq!(text, "styled text");
        assert!(!fmt.bold);
    }

    #[test]
    fn test_clean_text_collapses_whitespace() {
        let (text, _) = clean_text("  spaced \t out\n text  ");
        assert_eq!(text, "spaced out text");
    }

    #[test]
    fn test_clean_text_only_markup_becomes_empty() {
        let (text, _) = clean_text("<b></b>");
        assert!(text.is_empty());
    }

    #[test]
    fn test_regions_dropped_when_empty_after_cleaning() {
        let page = OcrPage {
            lines: vec![
                OcrLine {
                    text: "<b>kept</b>".to_string(),
                    bbox: [0.0, 0.0, 10.0, 10.0],
                    polygon: vec![],
                    confidence: 0.9,
                },
                OcrLine {
                    text: "<hr>".to_string(),
                    bbox: [0.0, 20.0, 10.0, 30.0],
                    polygon: vec![],
                    confidence: 0.9,
                },
            ],
        };
        let regions = page_to_regions(page);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].text, "kept");
        assert!(regions[0].formatting.bold);
    }
}
