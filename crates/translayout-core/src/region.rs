//! Mode-agnostic text region model.
//!
//! Both pipelines produce rectangles of source-language text that flow
//! through the same translation service:
//! - raster mode: [`OcrRegion`] in pixel coordinates, with style hints
//!   recovered from inline markup in the OCR output
//! - native mode: [`TextSpan`] in point coordinates, with style derived
//!   from font-descriptor flags
//!
//! The [`Region`] enum is the common shape consumed by the text-fitting
//! and contrast logic, which only needs text and geometry.

/// Axis-aligned bounding rectangle.
///
/// Pixel space for raster mode, point space for native mode. The origin is
/// top-left in both (mupdf convention); conversion to PDF's bottom-left
/// origin happens at the content-stream boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// A region is only renderable when it has positive area.
    pub fn is_degenerate(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0 || !self.x0.is_finite() || !self.y1.is_finite()
    }

    /// Create from mupdf Quad (4 points defining a quadrilateral)
    pub const fn from_quad(quad: &mupdf::Quad) -> Self {
        let x0 = quad.ul.x.min(quad.ur.x).min(quad.ll.x).min(quad.lr.x);
        let y0 = quad.ul.y.min(quad.ur.y).min(quad.ll.y).min(quad.lr.y);
        let x1 = quad.ul.x.max(quad.ur.x).max(quad.ll.x).max(quad.lr.x);
        let y1 = quad.ul.y.max(quad.ur.y).max(quad.ll.y).max(quad.lr.y);
        Self { x0, y0, x1, y1 }
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Style hints recovered from OCR markup tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Formatting {
    pub bold: bool,
    pub underline: bool,
}

/// A text region detected by OCR on a rasterized page.
#[derive(Debug, Clone)]
pub struct OcrRegion {
    /// Cleaned text content (markup stripped, whitespace collapsed)
    pub text: String,
    /// Bounding box in pixel coordinates
    pub bbox: BoundingBox,
    /// Precise polygon outline, kept for downstream consumers
    pub polygon: Vec<(f32, f32)>,
    /// Recognition confidence, currently not filtered on
    pub confidence: f32,
    /// Style hints from inline markup
    pub formatting: Formatting,
}

/// Font flag bit for bold (matches PDF font-descriptor convention)
const FLAG_BOLD: u32 = 1 << 4;
/// Font flag bit for italic
const FLAG_ITALIC: u32 = 1 << 1;

/// A text span extracted from a digitally-born PDF page.
#[derive(Debug, Clone)]
pub struct TextSpan {
    /// Text content
    pub text: String,
    /// Bounding box in point coordinates (top-left origin)
    pub bbox: BoundingBox,
    /// Font name as reported by the extractor
    pub font_name: String,
    /// Font size in points
    pub font_size: f32,
    /// Text color packed as 0xRRGGBB
    pub color: u32,
    /// Font descriptor flags (bit 4 = bold, bit 1 = italic)
    pub flags: u32,
}

impl TextSpan {
    pub const fn is_bold(&self) -> bool {
        self.flags & FLAG_BOLD != 0
    }

    pub const fn is_italic(&self) -> bool {
        self.flags & FLAG_ITALIC != 0
    }

    /// Unpack the color into RGB components in the 0.0-1.0 range.
    pub fn color_rgb(&self) -> (f32, f32, f32) {
        let r = ((self.color >> 16) & 0xFF) as f32 / 255.0;
        let g = ((self.color >> 8) & 0xFF) as f32 / 255.0;
        let b = (self.color & 0xFF) as f32 / 255.0;
        (r, g, b)
    }
}

/// Common shape for the two region variants.
///
/// Created per-page by the extraction/OCR stage, consumed once by
/// translation and once by rendering; never persisted.
#[derive(Debug, Clone)]
pub enum Region {
    Ocr(OcrRegion),
    Span(TextSpan),
}

impl Region {
    pub fn text(&self) -> &str {
        match self {
            Self::Ocr(r) => &r.text,
            Self::Span(s) => &s.text,
        }
    }

    pub const fn bbox(&self) -> &BoundingBox {
        match self {
            Self::Ocr(r) => &r.bbox,
            Self::Span(s) => &s.bbox,
        }
    }

    pub fn formatting(&self) -> Formatting {
        match self {
            Self::Ocr(r) => r.formatting,
            Self::Span(s) => Formatting {
                bold: s.is_bold(),
                underline: false,
            },
        }
    }
}
