//! Page index newtype for safe conversion between usize and i32.
//!
//! mupdf takes i32 page indices while the rest of the crate uses usize;
//! this wrapper centralizes the checked conversion in one place.

use std::fmt;

use crate::error::Error;

/// A zero-based page index that can be safely passed to mupdf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex(i32);

impl PageIndex {
    #[must_use]
    pub const fn new(index: i32) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Get the index as usize for Rust collections.
    #[must_use]
    #[allow(clippy::cast_sign_loss)] // Only constructed from non-negative values
    pub const fn as_usize(self) -> usize {
        if self.0 < 0 { 0 } else { self.0 as usize }
    }

    /// Get the 1-indexed page number for lopdf (which uses 1-based indexing).
    #[must_use]
    pub const fn as_lopdf_page_number(self) -> u32 {
        (self.0 + 1).cast_unsigned()
    }

    /// Create a `PageIndex` validated against the document's page count.
    pub fn try_from_page_num(page_num: usize, total_pages: usize) -> Result<Self, Error> {
        if page_num >= total_pages {
            return Err(Error::PdfInvalidPage {
                page: page_num,
                total: total_pages,
            });
        }

        let index = i32::try_from(page_num).map_err(|_| Error::PdfInvalidPage {
            page: page_num,
            total: total_pages,
        })?;

        Ok(Self(index))
    }
}

impl From<PageIndex> for i32 {
    fn from(index: PageIndex) -> Self {
        index.0
    }
}

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
