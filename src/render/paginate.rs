//! Fixed-size paging over the agenda.

/// One page of items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    /// Requested index reduced modulo `total_pages`.
    pub index: usize,
    /// Always at least 1.
    pub total_pages: usize,
}

impl<T> Page<'_, T> {
    /// 1-based page number for display.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Splits `items` into pages of `page_size` and returns page
/// `requested % total_pages`. A `page_size` of 0 is treated as 1.
pub fn paginate<T>(items: &[T], page_size: usize, requested: usize) -> Page<'_, T> {
    let page_size = page_size.max(1);
    let total_pages = items.len().div_ceil(page_size).max(1);
    let index = requested % total_pages;

    let start = (index * page_size).min(items.len());
    let end = (start + page_size).min(items.len());

    Page {
        items: &items[start..end],
        index,
        total_pages,
    }
}
