//! Pagination metadata for content responses
//!
//! Only present when the request sets a `limit`.

use serde::Serialize;

/// `meta.pagination` block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    /// Current page number (1-indexed)
    pub page: i64,
    pub page_size: i64,
    /// Total number of pages
    pub page_count: i64,
    /// Total number of matching entries
    pub total: i64,
}

/// Calculate pagination metadata from the total and the requested window
///
/// The page is the one containing `offset`; a non-positive limit yields no
/// metadata.
///
/// # Examples
/// ```
/// use cdp_api::pagination::calculate_pagination;
///
/// // 250 total results, 100 per page, starting at row 100 = page 2 of 3
/// let p = calculate_pagination(250, 100, 100).unwrap();
/// assert_eq!(p.page, 2);
/// assert_eq!(p.page_count, 3);
/// ```
pub fn calculate_pagination(total: i64, limit: i64, offset: i64) -> Option<PaginationMeta> {
    if limit <= 0 {
        return None;
    }

    let page_count = (total + limit - 1) / limit;
    let page = offset.max(0) / limit + 1;

    Some(PaginationMeta {
        page,
        page_size: limit,
        page_count,
        total,
    })
}
