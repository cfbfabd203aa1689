//! Layout-preserving PDF translation.
//!
//! Translates PDF documents while keeping text where the original put it.
//! Digitally-born documents have their content streams rewritten in place;
//! scanned documents are rasterized, run through OCR, and rebuilt with the
//! translated text drawn over sampled backgrounds. Mode selection, page
//! range filtering and translation batching are shared between the two
//! paths.
//!
//! The main entry point is [`pipeline::DocumentTranslator`]; the CLI in
//! the sibling crate is a thin wrapper around it.

pub mod config;
pub mod error;
pub mod fonts;
pub mod mode;
pub mod ocr;
pub mod page_range;
pub mod pdf;
pub mod pipeline;
pub mod raster;
pub mod region;
pub mod translate;

pub use config::{AppConfig, Device, Lang, OcrConfig, TranslatorConfig};
pub use error::{Error, Result};
pub use mode::ProcessingMode;
pub use pipeline::DocumentTranslator;
