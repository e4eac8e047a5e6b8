//! Paged-read request and envelope types.

use serde::{Deserialize, Serialize};

/// Direction for sorted reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first
    Asc,
    /// Largest first
    Desc,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::Asc
    }
}

/// A request for one page of a collection.
///
/// `page` is 1-based. `sort_by` names a serialized field of the entity;
/// ties are broken by insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based page number
    pub page: usize,
    /// Items per page
    pub page_size: usize,
    /// Field to sort by; `None` keeps insertion order
    pub sort_by: Option<String>,
    /// Sort direction (ignored when `sort_by` is `None`)
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl PageRequest {
    /// An unsorted request for the given page.
    #[must_use]
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page,
            page_size,
            sort_by: None,
            sort_order: SortOrder::Asc,
        }
    }

    /// Sort by the named field.
    #[must_use]
    pub fn sorted_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(field.into());
        self.sort_order = order;
        self
    }
}

/// One page of results plus the totals needed to render pagination.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Entities on this page, in result order
    pub items: Vec<T>,
    /// Live entities across all pages
    pub total_items: usize,
    /// `ceil(total_items / page_size)`
    pub total_pages: usize,
    /// The requested (1-based) page number
    pub current_page: usize,
    /// Whether a later page exists
    pub has_next: bool,
    /// Whether an earlier page exists
    pub has_prev: bool,
}

impl<T> Page<T> {
    /// Assemble the envelope for `items` sliced out of `total_items`.
    pub(crate) fn assemble(
        items: Vec<T>,
        total_items: usize,
        page: usize,
        page_size: usize,
    ) -> Self {
        let total_pages = total_items.div_ceil(page_size);
        Self {
            items,
            total_items,
            total_pages,
            current_page: page,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}
