//! Page results.

use serde::Serialize;

use crate::value::Row;

/// A page with the total row count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LengthAwarePaginator {
    /// Rows on this page.
    pub items: Vec<Row>,
    /// Rows across all pages.
    pub total: u64,
    /// Requested page size.
    pub per_page: u64,
    /// 1-based page number.
    pub current_page: u64,
    /// Last page number; at least 1.
    pub last_page: u64,
}

impl LengthAwarePaginator {
    /// Creates a page, deriving the last page from `total`.
    #[must_use]
    pub fn new(items: Vec<Row>, total: u64, per_page: u64, current_page: u64) -> Self {
        let last_page = if per_page == 0 {
            1
        } else {
            total.div_ceil(per_page).max(1)
        };
        Self {
            items,
            total,
            per_page,
            current_page,
            last_page,
        }
    }

    /// Returns true if a page follows this one.
    #[must_use]
    pub const fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page
    }

    /// 1-based index of the first row on this page, if any.
    #[must_use]
    pub fn first_item(&self) -> Option<u64> {
        if self.items.is_empty() {
            return None;
        }
        Some((self.current_page - 1) * self.per_page + 1)
    }
}

/// A page without a total; one extra row is fetched to detect more pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginator {
    /// Rows on this page.
    pub items: Vec<Row>,
    /// Requested page size.
    pub per_page: u64,
    /// 1-based page number.
    pub current_page: u64,
    /// A further page exists.
    pub has_more: bool,
}

impl Paginator {
    /// Creates a page from up to `per_page + 1` fetched rows.
    #[must_use]
    pub fn new(mut items: Vec<Row>, per_page: u64, current_page: u64) -> Self {
        let per_page_len = usize::try_from(per_page).unwrap_or(usize::MAX);
        let has_more = items.len() > per_page_len;
        items.truncate(per_page_len);
        Self {
            items,
            per_page,
            current_page,
            has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SqlValue;

    fn rows(n: i64) -> Vec<Row> {
        (0..n).map(|i| Row::from_pairs([("id", SqlValue::Int(i))])).collect()
    }

    #[test]
    fn test_last_page_rounds_up() {
        let page = LengthAwarePaginator::new(rows(5), 23, 5, 2);
        assert_eq!(page.last_page, 5);
        assert!(page.has_more_pages());
        assert_eq!(page.first_item(), Some(6));
    }

    #[test]
    fn test_empty_total_has_one_page() {
        let page = LengthAwarePaginator::new(Vec::new(), 0, 15, 1);
        assert_eq!(page.last_page, 1);
        assert!(!page.has_more_pages());
        assert_eq!(page.first_item(), None);
    }

    #[test]
    fn test_simple_paginator_trims_lookahead_row() {
        let page = Paginator::new(rows(4), 3, 1);
        assert!(page.has_more);
        assert_eq!(page.items.len(), 3);

        let last = Paginator::new(rows(2), 3, 2);
        assert!(!last.has_more);
        assert_eq!(last.items.len(), 2);
    }
}
