//! Pagination window for list queries.
//!
//! Pages are 1-indexed and always have a positive size, so the offset of any
//! [`Pagination`] is well defined.

use serde::{Deserialize, Serialize};

/// Default number of documents per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Parameters for paginating through large result sets.
///
/// # Example
///
/// ```ignore
/// use docgate::page::Pagination;
///
/// let params = Pagination::new(2, 50);
/// // Offset is (2-1) * 50 = 50
/// assert_eq!(params.offset(), 50);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// The page number (1-indexed).
    pub page: usize,
    /// Number of documents per page.
    pub page_size: usize,
}

impl Pagination {
    /// Creates new pagination parameters.
    ///
    /// A zero `page` is clamped to the first page and a zero `page_size` falls
    /// back to [`DEFAULT_PAGE_SIZE`].
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page: page.max(1),
            page_size: if page_size == 0 { DEFAULT_PAGE_SIZE } else { page_size },
        }
    }

    /// Calculates the offset (number of documents to skip) for this page.
    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, page_size: DEFAULT_PAGE_SIZE }
    }
}
