//! Drawing translated text onto rasterized pages.
//!
//! The page bitmap is edited in place in two passes: first every text
//! region is erased with a color sampled from its surroundings, then every
//! translation is drawn. Running the passes separately keeps a later
//! erase from painting over an earlier region's freshly drawn text when
//! boxes overlap.

use ab_glyph::{FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::trace;

use crate::config::Lang;
use crate::error::{Error, Result};
use crate::fonts::FontResolver;
use crate::region::{BoundingBox, Region};

/// Padding around a region when sampling its background, in pixels.
const SAMPLE_PAD: i32 = 2;

/// Sampling stride; every Nth pixel of an edge strip is read.
const SAMPLE_STRIDE: i32 = 5;

/// Minimum distance of a sampled edge from the image boundary, in pixels.
const SAMPLE_BORDER: i32 = 3;

/// Fraction of the region height used as the initial text size.
const INITIAL_SIZE_FACTOR: f32 = 0.75;

/// Text may fill at most this fraction of the region width.
const MAX_WIDTH_FRACTION: f32 = 0.95;

const MIN_TEXT_SIZE: f32 = 6.0;
const MAX_INITIAL_SIZE: f32 = 48.0;
const MIN_INITIAL_SIZE: f32 = 8.0;

/// Renders translated text into page bitmaps.
pub struct RasterRenderer<'a> {
    resolver: &'a FontResolver,
    target: Lang,
}

impl<'a> RasterRenderer<'a> {
    pub const fn new(resolver: &'a FontResolver, target: Lang) -> Self {
        Self { resolver, target }
    }

    /// Erase all regions, then draw all translations.
    ///
    /// Fails without touching the image when the region and translation
    /// lists are out of step. Degenerate regions are skipped in both
    /// passes; blank translations are erased but not drawn.
    pub fn render_translations(
        &self,
        image: &mut RgbImage,
        regions: &[Region],
        translations: &[String],
    ) -> Result<()> {
        if regions.len() != translations.len() {
            return Err(Error::BlockCountMismatch {
                blocks: regions.len(),
                translations: translations.len(),
            });
        }

        let renderable: Vec<(usize, Rgb<u8>)> = regions
            .iter()
            .enumerate()
            .filter(|(_, region)| !region.bbox().is_degenerate())
            .map(|(i, region)| (i, sample_background(image, region.bbox())))
            .collect();

        // Pass 1: erase
        for &(i, background) in &renderable {
            erase_region(image, regions[i].bbox(), background);
        }

        // Pass 2: draw
        for &(i, background) in &renderable {
            let translation = &translations[i];
            if translation.trim().is_empty() {
                continue;
            }
            self.draw_region(image, &regions[i], translation, background);
        }

        Ok(())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn draw_region(
        &self,
        image: &mut RgbImage,
        region: &Region,
        translation: &str,
        background: Rgb<u8>,
    ) {
        let bbox = region.bbox();
        let formatting = region.formatting();
        let font = self.resolver.raster_font(&self.target, formatting.bold);

        let size = fit_text_size(&font, translation, bbox.width(), bbox.height());
        let scale = PxScale::from(size);
        let (text_w, text_h) = text_size(scale, &font, translation);

        let color = contrast_color(background);

        let x = bbox.x0.max(0.0) as i32;
        let y = (bbox.y0 + (bbox.height() - text_h as f32) / 2.0).max(0.0) as i32;

        trace!(
            "Drawing {} chars at ({x}, {y}) size {size:.1}",
            translation.chars().count()
        );
        draw_text_mut(image, color, x, y, scale, &font, translation);

        if formatting.underline {
            let line_y = y as f32 + text_h as f32 + 1.0;
            draw_line_segment_mut(
                image,
                (x as f32, line_y),
                (x as f32 + text_w as f32, line_y),
                color,
            );
        }
    }
}

/// Shrink from the initial size until the text fits the region width.
///
/// Starts at three quarters of the region height so a single text line
/// fills the box without clipping ascenders, then steps down a point at a
/// time while the rendered width overflows.
#[allow(clippy::cast_precision_loss)]
fn fit_text_size(font: &FontRef<'_>, text: &str, box_width: f32, box_height: f32) -> f32 {
    let mut size = (box_height * INITIAL_SIZE_FACTOR)
        .round()
        .clamp(MIN_INITIAL_SIZE, MAX_INITIAL_SIZE);

    loop {
        let (text_w, _) = text_size(PxScale::from(size), font, text);
        if (text_w as f32) <= box_width * MAX_WIDTH_FRACTION || size <= MIN_TEXT_SIZE {
            return size;
        }
        size -= 1.0;
    }
}

/// Fill a region with the sampled background color.
///
/// The fill is padded so antialiased glyph edges just outside the box are
/// erased too.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn erase_region(image: &mut RgbImage, bbox: &BoundingBox, background: Rgb<u8>) {
    let (img_w, img_h) = image.dimensions();

    let x0 = (bbox.x0 as i32 - SAMPLE_PAD).clamp(0, img_w as i32);
    let y0 = (bbox.y0 as i32 - SAMPLE_PAD).clamp(0, img_h as i32);
    let x1 = (bbox.x1.ceil() as i32 + SAMPLE_PAD).clamp(0, img_w as i32);
    let y1 = (bbox.y1.ceil() as i32 + SAMPLE_PAD).clamp(0, img_h as i32);

    let width = (x1 - x0).max(0) as u32;
    let height = (y1 - y0).max(0) as u32;
    if width == 0 || height == 0 {
        return;
    }

    draw_filled_rect_mut(image, Rect::at(x0, y0).of_size(width, height), background);
}

/// Per-channel median of thin strips sampled just outside a region.
///
/// Each edge of the 2px-padded box contributes a 1px strip read at a
/// fixed stride, but only when that edge lies far enough inside the
/// image; pixels inside the box are never read, so the original text
/// cannot skew the estimate. A region covering the whole page qualifies
/// no edge and falls back to white.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn sample_background(image: &RgbImage, bbox: &BoundingBox) -> Rgb<u8> {
    let (img_w, img_h) = image.dimensions();
    let (img_w, img_h) = (img_w as i32, img_h as i32);

    let x0 = bbox.x0 as i32 - SAMPLE_PAD;
    let y0 = bbox.y0 as i32 - SAMPLE_PAD;
    let x1 = bbox.x1.ceil() as i32 + SAMPLE_PAD;
    let y1 = bbox.y1.ceil() as i32 + SAMPLE_PAD;

    let mut samples: Vec<Rgb<u8>> = Vec::new();

    let sample_row = |row: i32, samples: &mut Vec<Rgb<u8>>| {
        let end = x1.min(img_w - 1);
        let mut x = x0.max(0);
        while x <= end {
            samples.push(*image.get_pixel(x as u32, row as u32));
            x += SAMPLE_STRIDE;
        }
    };
    let sample_col = |col: i32, samples: &mut Vec<Rgb<u8>>| {
        let end = y1.min(img_h - 1);
        let mut y = y0.max(0);
        while y <= end {
            samples.push(*image.get_pixel(col as u32, y as u32));
            y += SAMPLE_STRIDE;
        }
    };

    if y0 >= SAMPLE_BORDER {
        sample_row(y0, &mut samples);
    }
    if y1 + SAMPLE_BORDER < img_h {
        sample_row(y1, &mut samples);
    }
    if x0 >= SAMPLE_BORDER {
        sample_col(x0, &mut samples);
    }
    if x1 + SAMPLE_BORDER < img_w {
        sample_col(x1, &mut samples);
    }

    if samples.is_empty() {
        return Rgb([255, 255, 255]);
    }

    let mut reds: Vec<u8> = samples.iter().map(|p| p[0]).collect();
    let mut greens: Vec<u8> = samples.iter().map(|p| p[1]).collect();
    let mut blues: Vec<u8> = samples.iter().map(|p| p[2]).collect();
    Rgb([median(&mut reds), median(&mut greens), median(&mut blues)])
}

fn median(values: &mut [u8]) -> u8 {
    values.sort_unstable();
    values[values.len() / 2]
}

/// Black or white, whichever contrasts with the background.
///
/// BT.601 luma; backgrounds darker than mid-gray get white text.
pub fn contrast_color(background: Rgb<u8>) -> Rgb<u8> {
    let luminance = 0.299 * f32::from(background[0])
        + 0.587 * f32::from(background[1])
        + 0.114 * f32::from(background[2]);

    if luminance < 128.0 {
        Rgb([255, 255, 255])
    } else {
        Rgb([0, 0, 0])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::region::{Formatting, OcrRegion, TextSpan};

    fn region(x0: f32, y0: f32, x1: f32, y1: f32, text: &str) -> Region {
        Region::Ocr(OcrRegion {
            text: text.to_string(),
            bbox: BoundingBox::new(x0, y0, x1, y1),
            polygon: vec![],
            confidence: 0.95,
            formatting: Formatting::default(),
        })
    }

    fn white_image(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
    }

    #[test]
    fn test_contrast_color() {
        assert_eq!(contrast_color(Rgb([255, 255, 255])), Rgb([0, 0, 0]));
        assert_eq!(contrast_color(Rgb([0, 0, 0])), Rgb([255, 255, 255]));
        assert_eq!(contrast_color(Rgb([30, 30, 120])), Rgb([255, 255, 255]));
        assert_eq!(contrast_color(Rgb([200, 200, 180])), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_sample_background_uniform() {
        let image = RgbImage::from_pixel(100, 100, Rgb([240, 230, 220]));
        let bg = sample_background(&image, &BoundingBox::new(20.0, 20.0, 80.0, 40.0));
        assert_eq!(bg, Rgb([240, 230, 220]));
    }

    #[test]
    fn test_sample_background_ignores_region_interior() {
        // Black text pixels inside the region must not dominate the median
        let mut image = white_image(100, 100);
        for y in 25..35 {
            for x in 25..75 {
                image.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        let bg = sample_background(&image, &BoundingBox::new(25.0, 25.0, 75.0, 35.0));
        assert_eq!(bg, Rgb([255, 255, 255]));
    }

    #[test]
    fn test_sample_background_full_page_region_falls_back_to_white() {
        // No edge is far enough from the boundary to sample, so the
        // page's own dark pixels must not leak into the estimate
        let image = RgbImage::from_pixel(60, 60, Rgb([0, 0, 0]));
        let bg = sample_background(&image, &BoundingBox::new(0.0, 0.0, 60.0, 60.0));
        assert_eq!(bg, Rgb([255, 255, 255]));
    }

    #[test]
    fn test_sample_background_reads_sole_qualifying_edge() {
        // Box flush with the top, left and right: only the bottom strip
        // qualifies, so its color must decide the estimate
        let mut image = RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]));
        for x in 0..100 {
            image.put_pixel(x, 89, Rgb([200, 210, 220]));
        }
        let bg = sample_background(&image, &BoundingBox::new(0.0, 0.0, 100.0, 87.0));
        assert_eq!(bg, Rgb([200, 210, 220]));
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let resolver = FontResolver::new();
        let renderer = RasterRenderer::new(&resolver, Lang::new("en"));
        let mut image = white_image(50, 50);

        let result = renderer.render_translations(
            &mut image,
            &[region(5.0, 5.0, 45.0, 20.0, "text")],
            &[],
        );
        assert!(matches!(result, Err(Error::BlockCountMismatch { .. })));
    }

    #[test]
    fn test_render_changes_pixels() {
        let resolver = FontResolver::new();
        let renderer = RasterRenderer::new(&resolver, Lang::new("en"));

        // Dark original text on white background
        let mut image = white_image(200, 60);
        for y in 20..36 {
            for x in 10..150 {
                image.put_pixel(x, y, Rgb([20, 20, 20]));
            }
        }

        renderer
            .render_translations(
                &mut image,
                &[region(10.0, 20.0, 150.0, 36.0, "original")],
                &["ok".to_string()],
            )
            .unwrap();

        // The original dark band must be gone from the region edges
        assert_eq!(*image.get_pixel(149, 21), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_degenerate_region_left_untouched() {
        let resolver = FontResolver::new();
        let renderer = RasterRenderer::new(&resolver, Lang::new("en"));
        let mut image = RgbImage::from_pixel(50, 50, Rgb([10, 10, 10]));
        let before = image.clone();

        renderer
            .render_translations(
                &mut image,
                &[region(30.0, 10.0, 30.0, 20.0, "zero width")],
                &["x".to_string()],
            )
            .unwrap();

        assert_eq!(image, before);
    }

    #[test]
    fn test_span_region_renders_through_same_path() {
        let resolver = FontResolver::new();
        let renderer = RasterRenderer::new(&resolver, Lang::new("en"));
        let mut image = white_image(200, 60);

        let span = TextSpan {
            text: "original".to_string(),
            bbox: BoundingBox::new(10.0, 20.0, 150.0, 36.0),
            font_name: String::new(),
            font_size: 12.0,
            color: 0,
            flags: 0,
        };
        renderer
            .render_translations(&mut image, &[Region::Span(span)], &["ok".to_string()])
            .unwrap();

        // Glyph pixels landed inside the box
        let changed = (10..150)
            .any(|x| (20..36).any(|y| *image.get_pixel(x, y) != Rgb([255, 255, 255])));
        assert!(changed);
    }

    #[test]
    fn test_adjacent_regions_do_not_bleed_outside() {
        let resolver = FontResolver::new();
        let renderer = RasterRenderer::new(&resolver, Lang::new("en"));
        let mut image = RgbImage::from_pixel(120, 60, Rgb([230, 230, 230]));

        renderer
            .render_translations(
                &mut image,
                &[
                    region(10.0, 15.0, 55.0, 40.0, "left"),
                    region(58.0, 15.0, 105.0, 40.0, "right"),
                ],
                &["a".to_string(), "b".to_string()],
            )
            .unwrap();

        // Pixels well away from both boxes keep the original background
        assert_eq!(*image.get_pixel(2, 2), Rgb([230, 230, 230]));
        assert_eq!(*image.get_pixel(117, 57), Rgb([230, 230, 230]));
    }

    #[test]
    fn test_fit_text_size_shrinks_long_text() {
        let resolver = FontResolver::new();
        let font = resolver.raster_font(&Lang::new("en"), false);

        let short = fit_text_size(&font, "hi", 200.0, 30.0);
        let long = fit_text_size(&font, &"word ".repeat(20), 200.0, 30.0);
        assert!(long <= short);
        assert!(long >= MIN_TEXT_SIZE);
    }
}
