//! Page module: fixed-size pagination for field lists and result rows.

use serde::{Deserialize, Serialize};

/// One page of a larger list.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a, T> {
    pub slice: &'a [T],
    pub current_page: usize,
    pub total_pages: usize,
}

/// Slices `items` into fixed-size pages. `total_pages` is at least 1 even for
/// an empty list; `current_page` is clamped into `[1, total_pages]`.
pub fn paginate<T>(items: &[T], page_size: usize, current_page: usize) -> Page<'_, T> {
    let page_size = page_size.max(1);
    let total_pages = total_pages(items.len(), page_size);
    let current_page = current_page.clamp(1, total_pages);
    let start = (current_page - 1) * page_size;
    let end = (start + page_size).min(items.len());
    let slice = if start < items.len() {
        &items[start..end]
    } else {
        &[]
    };
    Page {
        slice,
        current_page,
        total_pages,
    }
}

fn total_pages(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size).max(1)
}

/// Stateful pagination cursor. Navigating outside `[1, total_pages]` is a
/// no-op; the page is re-clamped whenever the underlying list changes size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pager {
    page_size: usize,
    current_page: usize,
    total_pages: usize,
}

impl Pager {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            current_page: 1,
            total_pages: 1,
        }
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Recomputes the page count for a list of `len` items and clamps the
    /// current page into range.
    pub fn resize(&mut self, len: usize) {
        self.total_pages = total_pages(len, self.page_size);
        self.current_page = self.current_page.clamp(1, self.total_pages);
    }

    /// Moves to `page` if it is within `[1, total_pages]`; otherwise leaves
    /// the current page unchanged.
    pub fn set_page(&mut self, page: usize) {
        if (1..=self.total_pages).contains(&page) {
            self.current_page = page;
        }
    }

    pub fn next_page(&mut self) {
        self.set_page(self.current_page + 1);
    }

    pub fn prev_page(&mut self) {
        if self.current_page > 1 {
            self.set_page(self.current_page - 1);
        }
    }

    /// The slice of `items` for the current page.
    pub fn page_of<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        paginate(items, self.page_size, self.current_page).slice
    }
}
