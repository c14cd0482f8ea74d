//! Pagination over ordered collections.
//!
//! One [`Pager`] per view. The pager only remembers the page size and the
//! current page; the collection is passed in on every call so the page can
//! be re-clamped whenever the backing data changes size.

/// How a view reports an empty collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyPages {
    /// Always report at least one page ("1 / 1").
    Placeholder,
    /// Report zero pages, a distinct "no records" condition.
    NoRecords,
}

/// Page position for one view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pager {
    page_size: usize,
    page: usize,
    empty: EmptyPages,
}

/// The visible window of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct PageView<'a, T> {
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub items: &'a [T],
}

impl<T> PageView<'_, T> {
    pub fn has_records(&self) -> bool {
        self.total_items > 0
    }

    pub fn has_prev(&self) -> bool {
        self.has_records() && self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.has_records() && self.page < self.total_pages
    }
}

impl Pager {
    pub fn new(page_size: usize, empty: EmptyPages) -> Self {
        Self {
            page_size: page_size.max(1),
            page: 1,
            empty,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// Total pages for a collection of `len` items.
    pub fn total_pages(&self, len: usize) -> usize {
        let pages = len.div_ceil(self.page_size);
        match self.empty {
            EmptyPages::Placeholder => pages.max(1),
            EmptyPages::NoRecords => pages,
        }
    }

    /// Clamp the current page after the collection changed size.
    pub fn clamp(&mut self, len: usize) {
        self.page = clamp_page(self.page, self.total_pages(len));
    }

    pub fn reset(&mut self) {
        self.page = 1;
    }

    /// Move to page `n`. Returns `false`, leaving the pager untouched, when
    /// the collection is empty or the clamped target is already current.
    pub fn go_to(&mut self, n: usize, len: usize) -> bool {
        if len == 0 {
            return false;
        }
        let target = clamp_page(n, self.total_pages(len));
        if target == self.page {
            return false;
        }
        self.page = target;
        true
    }

    /// The visible window for `items` without moving the stored page.
    pub fn window<'a, T>(&self, items: &'a [T]) -> PageView<'a, T> {
        let total_pages = self.total_pages(items.len());
        let page = clamp_page(self.page, total_pages);
        let start = ((page - 1) * self.page_size).min(items.len());
        let end = (start + self.page_size).min(items.len());

        PageView {
            page,
            total_pages,
            total_items: items.len(),
            items: &items[start..end],
        }
    }
}

/// Stateless form of [`Pager::window`]: clamp `requested` and slice.
pub fn view<T>(items: &[T], page_size: usize, requested: usize) -> PageView<'_, T> {
    let mut pager = Pager::new(page_size, EmptyPages::Placeholder);
    pager.page = requested;
    pager.window(items)
}

fn clamp_page(page: usize, total_pages: usize) -> usize {
    page.clamp(1, total_pages.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_clamps_past_last_page() {
        let items: Vec<u32> = (1..=12).collect();
        let page = view(&items, 5, 4);
        assert_eq!(page.page, 3);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items, &[11, 12]);
    }

    #[test]
    fn test_view_clamps_page_zero() {
        let items: Vec<u32> = (1..=7).collect();
        let page = view(&items, 5, 0);
        assert_eq!(page.page, 1);
        assert_eq!(page.items, &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_empty_placeholder_reports_one_page() {
        let empty: Vec<u32> = Vec::new();
        let pager = Pager::new(5, EmptyPages::Placeholder);
        let page = pager.window(&empty);
        assert_eq!((page.page, page.total_pages), (1, 1));
        assert!(page.items.is_empty());
        assert!(!page.has_prev() && !page.has_next());
    }

    #[test]
    fn test_empty_no_records_reports_zero_pages() {
        let empty: Vec<u32> = Vec::new();
        let pager = Pager::new(5, EmptyPages::NoRecords);
        let page = pager.window(&empty);
        assert_eq!((page.page, page.total_pages), (1, 0));
        assert!(!page.has_records());
    }

    #[test]
    fn test_go_to_is_noop_when_empty_or_current() {
        let mut pager = Pager::new(5, EmptyPages::Placeholder);
        assert!(!pager.go_to(2, 0));
        assert!(!pager.go_to(1, 12));
        assert!(pager.go_to(9, 12));
        assert_eq!(pager.page(), 3);
        assert!(!pager.go_to(3, 12));
    }

    #[test]
    fn test_shrinking_collection_clamps_page() {
        let mut pager = Pager::new(5, EmptyPages::Placeholder);
        assert!(pager.go_to(3, 15));
        pager.clamp(6);
        assert_eq!(pager.page(), 2);
        pager.clamp(0);
        assert_eq!(pager.page(), 1);
    }
}
