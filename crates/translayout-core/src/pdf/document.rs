use std::path::Path;
use std::sync::Arc;

use mupdf::{Document as MuDocument, MetadataName};

use crate::error::{Error, Result};
use super::page_index::PageIndex;

/// Thread-safe wrapper around a PDF document.
///
/// mupdf document handles are not `Send`, so the raw bytes are kept behind
/// an `Arc` and a fresh handle is opened per operation. Opening from bytes
/// is cheap relative to rasterization and text extraction.
pub struct PdfDocument {
    bytes: Arc<Vec<u8>>,
    /// Cached metadata, read once on load
    metadata: DocumentMetadata,
    page_count: usize,
}

/// Document information dictionary fields, carried over to the output PDF.
#[derive(Debug, Clone, Default)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
}

impl PdfDocument {
    /// Open a PDF from bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();

        let doc = MuDocument::from_bytes(&bytes, "")
            .map_err(|e| Error::PdfOpen(format!("Failed to parse PDF: {e}")))?;

        let page_count = doc
            .page_count()
            .map_err(|e| Error::PdfOpen(format!("Failed to get page count: {e}")))?;

        // mupdf returns empty string for absent metadata entries
        let get_meta = |name| -> Option<String> { doc.metadata(name).ok().filter(|s| !s.is_empty()) };

        let metadata = DocumentMetadata {
            title: get_meta(MetadataName::Title),
            author: get_meta(MetadataName::Author),
            subject: get_meta(MetadataName::Subject),
            keywords: get_meta(MetadataName::Keywords),
            creator: get_meta(MetadataName::Creator),
            producer: get_meta(MetadataName::Producer),
            creation_date: get_meta(MetadataName::CreationDate),
            modification_date: get_meta(MetadataName::ModDate),
        };

        Ok(Self {
            bytes: Arc::new(bytes),
            metadata,
            page_count: usize::try_from(page_count).unwrap_or(0),
        })
    }

    /// Open a PDF from a file path
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| {
            Error::PdfOpen(format!(
                "Failed to read file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_bytes(bytes)
    }

    pub const fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    pub const fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Page size in points as (width, height).
    pub fn page_dimensions(&self, page_num: usize) -> Result<(f32, f32)> {
        let page_index = PageIndex::try_from_page_num(page_num, self.page_count)?;

        let doc = self.open_document()?;
        let page = doc
            .load_page(page_index.into())
            .map_err(|e| Error::PdfOpen(format!("Failed to load page {page_num}: {e}")))?;
        let bounds = page
            .bounds()
            .map_err(|e| Error::PdfOpen(format!("Failed to get bounds of page {page_num}: {e}")))?;

        Ok((bounds.x1 - bounds.x0, bounds.y1 - bounds.y0))
    }

    /// Open the document for operations (creates a temporary handle)
    pub(crate) fn open_document(&self) -> Result<MuDocument> {
        MuDocument::from_bytes(&self.bytes, "")
            .map_err(|e| Error::PdfOpen(format!("Failed to open document: {e}")))
    }
}

impl Clone for PdfDocument {
    /// O(1): only the `Arc` pointer and the small metadata struct are cloned.
    fn clone(&self) -> Self {
        Self {
            bytes: Arc::clone(&self.bytes),
            metadata: self.metadata.clone(),
            page_count: self.page_count,
        }
    }
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("page_count", &self.page_count)
            .field("metadata", &self.metadata)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}
