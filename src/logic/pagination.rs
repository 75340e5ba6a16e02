use serde::Serialize;

/// A contiguous, clamped slice of a collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageWindow<R> {
    /// Index of the page actually shown, after clamping
    pub page_index: usize,
    pub page_size: usize,
    /// Length of the whole collection
    pub total_items: usize,
    /// Never zero, an empty collection still has one (empty) page
    pub total_pages: usize,
    pub items: Vec<R>,
}

impl<R> PageWindow<R> {
    pub fn is_first(&self) -> bool {
        self.page_index == 0
    }

    pub fn is_last(&self) -> bool {
        self.page_index + 1 >= self.total_pages
    }

    /// Offset of the first item of this page in the collection
    pub fn offset(&self) -> usize {
        self.page_index * self.page_size
    }
}

/// Number of pages needed for `len` items, at least one.
pub fn total_pages(len: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    len.div_ceil(page_size).max(1)
}

/// Clamp a requested page index into `[0, total_pages - 1]`.
pub fn clamp_page_index(index: i64, len: usize, page_size: usize) -> usize {
    let last = total_pages(len, page_size) - 1;
    if index <= 0 {
        0
    } else {
        usize::try_from(index).map_or(last, |i| i.min(last))
    }
}

/// Slice `items` into the page at `index`. Negative indexes resolve to the
/// first page and indexes past the end resolve to the last page.
pub fn paginate<R: Clone>(items: &[R], index: i64, page_size: usize) -> PageWindow<R> {
    let page_size = page_size.max(1);
    let page_index = clamp_page_index(index, items.len(), page_size);
    let start = (page_index * page_size).min(items.len());
    let end = (start + page_size).min(items.len());

    PageWindow {
        page_index,
        page_size,
        total_items: items.len(),
        total_pages: total_pages(items.len(), page_size),
        items: items[start..end].to_vec(),
    }
}
