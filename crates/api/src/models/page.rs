//! Paginated responses.

use serde::Serialize;

/// One page of a larger result set. Page numbers are 0-based.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: i64,
    pub total_pages: i64,
    pub size: i64,
    pub number: i64,
}

impl<T> Page<T> {
    /// Build a page from its content and the total row count.
    #[must_use]
    pub fn new(content: Vec<T>, total_elements: i64, size: i64, number: i64) -> Self {
        let total_pages = if size > 0 {
            (total_elements + size - 1) / size
        } else {
            0
        };
        Self {
            content,
            total_elements,
            total_pages,
            size,
            number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_rounds_up() {
        let page = Page::new(vec![1, 2, 3], 41, 20, 0);
        assert_eq!(page.total_pages, 3);
        let page: Page<i32> = Page::new(vec![], 0, 20, 0);
        assert_eq!(page.total_pages, 0);
        let page: Page<i32> = Page::new(vec![], 40, 20, 1);
        assert_eq!(page.total_pages, 2);
    }
}
