//! PDF reading, rasterizing and rewriting.
//!
//! Built on two libraries with distinct roles:
//! - mupdf reads: page counts, metadata, text extraction, rasterization
//! - lopdf writes: content-stream surgery for native text replacement and
//!   assembly of new documents from rendered page images

pub mod assemble;
pub mod document;
pub mod extract;
pub mod font;
pub mod page_index;
pub mod render;
pub mod replace;

pub use assemble::images_to_pdf;
pub use document::{DocumentMetadata, PdfDocument};
pub use extract::TextExtractor;
pub use font::EmbeddedFont;
pub use page_index::PageIndex;
pub use render::PageRasterizer;
pub use replace::{NativeRenderer, ReplacementFont};
