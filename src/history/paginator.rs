//! In-process ordering and page slicing over a full scan.

use super::filter::param;
use super::types::{Pagination, QueryParams};
use crate::storage::VerificationRecord;

/// Page size used when the request carries none or an invalid one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Largest accepted page size.
pub const MAX_PAGE_SIZE: usize = 100;

/// Requested page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: usize,
    pub page_size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Create a request, replacing invalid values with the defaults.
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page: page.max(1),
            page_size: if (1..=MAX_PAGE_SIZE).contains(&page_size) {
                page_size
            } else {
                DEFAULT_PAGE_SIZE
            },
        }
    }

    /// Read `page` and `pageSize`. Bad input never fails the request.
    pub fn from_params(params: &QueryParams) -> Self {
        let page = param(params, "page")
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .unwrap_or(1);
        let page_size = param(params, "pageSize")
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self::new(page, page_size)
    }
}

/// One slice of an ordered sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Order records newest first.
pub fn sort_newest_first(records: &mut [VerificationRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Slice an already ordered sequence.
///
/// A page past the end yields no items rather than an error.
pub fn paginate<T>(items: Vec<T>, request: PageRequest) -> Page<T> {
    // Requests built field by field skip the fallbacks in `new`.
    let request = PageRequest::new(request.page, request.page_size);
    let total_records = items.len();
    let total_pages = total_records.div_ceil(request.page_size);
    let start = request.page.saturating_sub(1).saturating_mul(request.page_size);

    let items = if start >= total_records {
        Vec::new()
    } else {
        let end = start.saturating_add(request.page_size).min(total_records);
        items.into_iter().skip(start).take(end - start).collect()
    };

    Page {
        items,
        pagination: Pagination {
            current_page: request.page,
            page_size: request.page_size,
            total_records,
            total_pages,
            has_next_page: request.page < total_pages,
            has_previous_page: request.page > 1,
        },
    }
}
