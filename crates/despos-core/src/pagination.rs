//! # Pagination Windows
//!
//! Converts a `(page_number, item_count)` request into an inclusive row
//! range `[first, last]`.
//!
//! ## Formulas
//! ```text
//! Legacy   first = p·(n−1) + (p > 0 ? 1 : 0)      last = n·(p+1) − 1
//! Standard first = p·n                            last = p·n + n − 1
//!
//!   p=0 n=10    Legacy [0, 9]     Standard [0, 9]
//!   p=1 n=10    Legacy [10, 19]   Standard [10, 19]
//!   p=2 n=10    Legacy [19, 29]   Standard [20, 29]
//! ```
//! Legacy windows overlap from the third page on; it is kept for parity with
//! listings produced by the older deployment.

use serde::{Deserialize, Serialize};

/// Which windowing formula a gateway uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageFormula {
    Legacy,
    #[default]
    Standard,
}

/// A page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub number: u32,
    pub item_count: u32,
}

impl Page {
    pub fn new(number: u32, item_count: u32) -> Self {
        Page { number, item_count }
    }
}

/// Inclusive row range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub first: i64,
    pub last: i64,
}

impl RowRange {
    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }

    /// `LIMIT` for SQL.
    pub fn limit(&self) -> i64 {
        (self.last - self.first + 1).max(0)
    }

    /// `OFFSET` for SQL.
    pub fn offset(&self) -> i64 {
        self.first
    }
}

impl PageFormula {
    pub fn window(self, page: Page) -> RowRange {
        let p = i64::from(page.number);
        let n = i64::from(page.item_count);

        match self {
            PageFormula::Legacy => RowRange {
                first: p * (n - 1) + if p > 0 { 1 } else { 0 },
                last: n * (p + 1) - 1,
            },
            PageFormula::Standard => RowRange {
                first: p * n,
                last: p * n + n - 1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_third_page() {
        let range = PageFormula::Legacy.window(Page::new(2, 10));
        assert_eq!(range, RowRange { first: 19, last: 29 });
        assert_eq!(range.limit(), 11);
    }

    #[test]
    fn test_legacy_first_pages_match_standard() {
        for number in 0..2 {
            let page = Page::new(number, 10);
            assert_eq!(
                PageFormula::Legacy.window(page),
                PageFormula::Standard.window(page)
            );
        }
    }

    #[test]
    fn test_standard_windows_do_not_overlap() {
        let a = PageFormula::Standard.window(Page::new(2, 10));
        let b = PageFormula::Standard.window(Page::new(3, 10));

        assert_eq!(a, RowRange { first: 20, last: 29 });
        assert_eq!(b.first, a.last + 1);
        assert_eq!(a.limit(), 10);
        assert_eq!(a.offset(), 20);
    }

    #[test]
    fn test_zero_item_count_is_empty() {
        assert!(PageFormula::Standard.window(Page::new(0, 0)).is_empty());
        assert!(PageFormula::Legacy.window(Page::new(0, 0)).is_empty());
    }
}
