//! Pagination math for the transaction detail view.

/// Number of page links shown in the navigation window.
const PAGE_WINDOW: u32 = 5;

/// Total pages needed to show `total_count` rows at `page_size` per page.
pub fn total_pages(total_count: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    total_count.div_ceil(page_size as u64) as u32
}

/// The run of page numbers to render around `current_page`.
///
/// At most [`PAGE_WINDOW`] entries, centred on the current page and
/// shifted as needed to stay inside `[1, total_pages]`.
pub fn page_window(current_page: u32, total_pages: u32) -> Vec<u32> {
    if total_pages <= PAGE_WINDOW {
        return (1..=total_pages).collect();
    }
    let start = current_page
        .saturating_sub(PAGE_WINDOW / 2)
        .max(1)
        .min(total_pages - PAGE_WINDOW + 1);
    (start..start + PAGE_WINDOW).collect()
}
