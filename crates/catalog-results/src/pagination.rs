use std::fmt;

/// Every page is listed up to this many pages.
pub const FULL_WINDOW_PAGES: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page(u32),
    Ellipsis,
}

impl fmt::Display for PageItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageItem::Page(n) => write!(f, "{n}"),
            PageItem::Ellipsis => f.write_str("..."),
        }
    }
}

/// Page numbers to offer for `total_pages`, centred on `current`.
///
/// Up to seven pages are all listed. Beyond that the first and last page are
/// always shown, plus `current - 1 ..= current + 1` clipped to the inner range.
/// At the edges the clipped window is widened to two pages so the neighbour
/// after page 1 (or before the last page) is reachable. One ellipsis stands in
/// for any run of hidden pages on either side of the window.
pub fn page_window(total_pages: u32, current: u32) -> Vec<PageItem> {
    if total_pages == 0 {
        return Vec::new();
    }
    let current = current.clamp(1, total_pages);
    if total_pages <= FULL_WINDOW_PAGES {
        return (1..=total_pages).map(PageItem::Page).collect();
    }

    let last = total_pages;
    let mut start = current.saturating_sub(1).max(2);
    let mut end = (current + 1).min(last - 1);
    if end <= start {
        if start == 2 {
            end = 3;
        } else {
            start = last - 2;
            end = last - 1;
        }
    }

    let mut items = Vec::with_capacity(7);
    items.push(PageItem::Page(1));
    if start > 2 {
        items.push(PageItem::Ellipsis);
    }
    items.extend((start..=end).map(PageItem::Page));
    if end < last - 1 {
        items.push(PageItem::Ellipsis);
    }
    items.push(PageItem::Page(last));
    items
}
