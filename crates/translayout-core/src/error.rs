use thiserror::Error;

/// Unified error type for translayout-core
///
/// This enum encompasses all error cases that can occur in the library:
/// - PDF operations (opening, reading, rasterizing, rewriting, saving)
/// - OCR operations (HTTP requests, responses)
/// - Translation operations (API requests, responses, rate limiting)
/// - Rendering operations (font loading, text replacement)
/// - Configuration operations (loading, validation)
/// - General I/O operations
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // PDF Errors
    // ==========================================================================
    /// Failed to open or parse a PDF file
    #[error("failed to open PDF: {0}")]
    PdfOpen(String),

    /// Invalid page number requested
    #[error("invalid page number {page} (document has {total} pages)")]
    PdfInvalidPage { page: usize, total: usize },

    /// Failed to extract text from a PDF page
    #[error("failed to extract text from page {page}: {reason}")]
    PdfTextExtraction { page: usize, reason: String },

    /// Failed to rasterize a PDF page
    #[error("failed to rasterize page {page}: {reason}")]
    PdfRasterize { page: usize, reason: String },

    /// Failed to save a PDF
    #[error("failed to save PDF: {0}")]
    PdfSave(String),

    /// Error from the lopdf library
    #[error("lopdf error: {0}")]
    Lopdf(String),

    /// The page range selected no pages from the document
    #[error("no valid pages to process")]
    NoValidPages,

    // ==========================================================================
    // OCR Errors
    // ==========================================================================
    /// OCR service request failed
    #[error("OCR request failed: {0}")]
    OcrRequest(String),

    /// Invalid response from the OCR service
    #[error("invalid OCR response: {0}")]
    OcrInvalidResponse(String),

    /// Failed to encode a page image for the OCR service
    #[error("failed to encode page image: {0}")]
    OcrImageEncode(String),

    // ==========================================================================
    // Translation Errors
    // ==========================================================================
    /// Translation API request failed
    #[error("translation API request failed: {0}")]
    TranslationRequest(String),

    /// Invalid response from translation API
    #[error("invalid translation API response: {0}")]
    TranslationInvalidResponse(String),

    /// Rate limited by translation API
    #[error("translation rate limited{}", retry_after.map(|s| format!(", retry after {s} seconds")).unwrap_or_default())]
    TranslationRateLimited { retry_after: Option<u64> },

    /// Translation request timed out
    #[error("translation request timed out")]
    TranslationTimeout,

    /// Maximum retry attempts exceeded for translation
    #[error("translation failed after maximum retries")]
    TranslationMaxRetriesExceeded,

    // ==========================================================================
    // Rendering Errors
    // ==========================================================================
    /// Block and translation lists are out of step
    #[error("block/translation count mismatch: {blocks} blocks, {translations} translations")]
    BlockCountMismatch { blocks: usize, translations: usize },

    /// A save or replace operation was attempted without an open document
    #[error("no document open")]
    NoDocumentOpen,

    /// Failed to parse or embed a font
    #[error("font error: {0}")]
    Font(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
