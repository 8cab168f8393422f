//! Pagination types shared by every feed.

use serde::{Deserialize, Serialize};

/// 1-indexed page request, normalized so that `page >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Normalize raw input: missing or non-positive pages become page 1.
    pub fn new(page: Option<i64>, page_size: u32) -> Self {
        let page = match page {
            Some(p) if p > 0 => u32::try_from(p).unwrap_or(u32::MAX),
            _ => 1,
        };
        Self {
            page,
            page_size: page_size.max(1),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }

    /// `max(1, ceil(total / page_size))`.
    pub fn total_pages(&self, total: i64) -> u32 {
        let size = i64::from(self.page_size);
        let pages = (total.max(0) + size - 1) / size;
        u32::try_from(pages.max(1)).unwrap_or(u32::MAX)
    }
}

/// One page of a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total_count: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: i64) -> Self {
        let total_pages = request.total_pages(total);
        Self {
            items,
            current_page: request.page,
            total_pages,
            total_count: total,
            has_next: request.page < total_pages,
            has_prev: request.page > 1,
        }
    }

    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), request, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_normalization() {
        assert_eq!(PageRequest::new(None, 10).page, 1);
        assert_eq!(PageRequest::new(Some(0), 10).page, 1);
        assert_eq!(PageRequest::new(Some(-4), 10).page, 1);
        assert_eq!(PageRequest::new(Some(3), 10).page, 3);
    }

    #[test]
    fn test_offsets() {
        let request = PageRequest::new(Some(2), 10);
        assert_eq!(request.offset(), 10);
        assert_eq!(request.limit(), 10);
    }

    #[test]
    fn test_total_pages() {
        let request = PageRequest::new(None, 10);
        assert_eq!(request.total_pages(0), 1);
        assert_eq!(request.total_pages(10), 1);
        assert_eq!(request.total_pages(13), 2);
    }

    #[test]
    fn test_page_flags() {
        let first: Page<i32> = Page::new(vec![0; 10], PageRequest::new(Some(1), 10), 13);
        assert!(first.has_next);
        assert!(!first.has_prev);

        let second: Page<i32> = Page::new(vec![0; 3], PageRequest::new(Some(2), 10), 13);
        assert!(!second.has_next);
        assert!(second.has_prev);

        let beyond: Page<i32> = Page::new(vec![], PageRequest::new(Some(3), 10), 13);
        assert!(!beyond.has_next);
        assert_eq!(beyond.total_pages, 2);
    }
}
