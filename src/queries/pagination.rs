//! Offset pagination for the "load more" lead list.

/// Rows per page on the leads table.
pub const PAGE_SIZE: usize = 50;

/// Inclusive row range `[from, to]` for a zero-based page.
pub fn page_range(page: usize, page_size: usize) -> (usize, usize) {
    let from = page * page_size;
    (from, from + page_size - 1)
}

/// Next page to request, or `None` once a short page shows the end.
pub fn next_page_param(last_page_len: usize, pages_loaded: usize, page_size: usize) -> Option<usize> {
    if last_page_len < page_size {
        None
    } else {
        Some(pages_loaded)
    }
}

/// Pages accumulated by an infinite list.
#[derive(Debug, Clone, PartialEq)]
pub struct Pages<T> {
    pages: Vec<Vec<T>>,
    page_size: usize,
}

impl<T> Pages<T> {
    pub fn new(page_size: usize) -> Self {
        Self {
            pages: Vec::new(),
            page_size,
        }
    }

    pub fn push(&mut self, page: Vec<T>) {
        self.pages.push(page);
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Page to request next. Before the first page this is `Some(0)`.
    pub fn next_page(&self) -> Option<usize> {
        match self.pages.last() {
            None => Some(0),
            Some(last) => next_page_param(last.len(), self.pages.len(), self.page_size),
        }
    }

    pub fn has_next_page(&self) -> bool {
        !self.pages.is_empty() && self.next_page().is_some()
    }

    pub fn len(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.pages.iter().flatten()
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }
}

impl<T: Clone> Pages<T> {
    pub fn flatten(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_cover_consecutive_rows() {
        assert_eq!(page_range(0, PAGE_SIZE), (0, 49));
        assert_eq!(page_range(1, PAGE_SIZE), (50, 99));
        assert_eq!(page_range(3, 10), (30, 39));
    }

    #[test]
    fn short_page_ends_pagination() {
        assert_eq!(next_page_param(50, 1, 50), Some(1));
        assert_eq!(next_page_param(49, 1, 50), None);
        assert_eq!(next_page_param(0, 3, 50), None);
    }

    #[test]
    fn pages_track_next_and_flatten() {
        let mut pages = Pages::new(2);
        assert_eq!(pages.next_page(), Some(0));
        assert!(!pages.has_next_page());

        pages.push(vec!["a", "b"]);
        assert_eq!(pages.next_page(), Some(1));
        assert!(pages.has_next_page());

        pages.push(vec!["c"]);
        assert_eq!(pages.next_page(), None);
        assert_eq!(pages.flatten(), vec!["a", "b", "c"]);
        assert_eq!(pages.len(), 3);

        pages.clear();
        assert!(pages.is_empty());
        assert_eq!(pages.next_page(), Some(0));
    }
}
