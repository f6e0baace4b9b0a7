//! Local filter-and-paginate.
//!
//! The filtered view is kept as indices into the fetch window, so filtering
//! never copies or reorders records.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Pagination state of the filtered view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationDescriptor {
    /// Current page, clamped to `[1, max(total_pages, 1)]`.
    pub current_page: usize,
    /// `ceil(total_items / page_size)`, 0 when there are no items.
    pub total_pages: usize,
    /// Records in the filtered view.
    pub total_items: usize,
    /// Records per page.
    pub page_size: usize,
    /// A later page exists.
    pub has_next: bool,
    /// An earlier page exists.
    pub has_previous: bool,
}

impl PaginationDescriptor {
    /// Derives the descriptor for `total_items` records viewed at `page`.
    ///
    /// Out-of-range pages are clamped, never rejected.
    #[must_use]
    pub fn new(total_items: usize, page: usize, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let total_pages = total_items.div_ceil(page_size);
        let current_page = clamp_page(page, total_pages);
        Self {
            current_page,
            total_pages,
            total_items,
            page_size,
            has_next: current_page < total_pages,
            has_previous: current_page > 1,
        }
    }

    /// Index range of the current page within the filtered view.
    ///
    /// Always satisfies `start <= end <= total_items`.
    #[must_use]
    pub fn slice_range(&self) -> Range<usize> {
        let start = ((self.current_page - 1) * self.page_size).min(self.total_items);
        let end = (start + self.page_size).min(self.total_items);
        start..end
    }

    /// 1-based position of the first record on the page (0 when empty).
    #[must_use]
    pub fn first_item(&self) -> usize {
        let range = self.slice_range();
        if range.is_empty() {
            0
        } else {
            range.start + 1
        }
    }

    /// 1-based position of the last record on the page (0 when empty).
    #[must_use]
    pub fn last_item(&self) -> usize {
        self.slice_range().end
    }
}

impl Default for PaginationDescriptor {
    fn default() -> Self {
        Self::new(0, 1, 10)
    }
}

/// Clamps `page` to `[1, max(total_pages, 1)]`.
#[must_use]
pub fn clamp_page(page: usize, total_pages: usize) -> usize {
    page.clamp(1, total_pages.max(1))
}

/// Indices of the records `keep` accepts, in window order.
pub fn filter_indices<T, F>(records: &[T], mut keep: F) -> Vec<usize>
where
    F: FnMut(&T) -> bool,
{
    records
        .iter()
        .enumerate()
        .filter_map(|(i, record)| keep(record).then_some(i))
        .collect()
}

/// Records on the current page of a filtered view.
#[must_use]
pub fn page_slice<'a, T>(
    records: &'a [T],
    filtered: &[usize],
    pagination: &PaginationDescriptor,
) -> Vec<&'a T> {
    filtered
        .get(pagination.slice_range())
        .unwrap_or_default()
        .iter()
        .filter_map(|&i| records.get(i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_descriptor_basic() {
        let p = PaginationDescriptor::new(25, 2, 10);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.current_page, 2);
        assert!(p.has_next);
        assert!(p.has_previous);
        assert_eq!(p.slice_range(), 10..20);
        assert_eq!((p.first_item(), p.last_item()), (11, 20));
    }

    #[test]
    fn test_last_page_is_partial() {
        let p = PaginationDescriptor::new(25, 3, 10);
        assert_eq!(p.slice_range(), 20..25);
        assert!(!p.has_next);
    }

    #[test]
    fn test_page_clamped_after_page_size_grows() {
        // 12 items on page 2 of size 10, then page size becomes 25
        let before = PaginationDescriptor::new(12, 2, 10);
        assert_eq!(before.slice_range(), 10..12);

        let after = PaginationDescriptor::new(12, before.current_page, 25);

        assert_eq!(after.current_page, 1);
        assert_eq!(after.total_pages, 1);
        assert_eq!(after.slice_range(), 0..12);
    }

    #[test]
    fn test_empty_view() {
        let p = PaginationDescriptor::new(0, 5, 10);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.current_page, 1);
        assert!(p.slice_range().is_empty());
        assert!(!p.has_next);
        assert!(!p.has_previous);
        assert_eq!((p.first_item(), p.last_item()), (0, 0));
    }

    #[test]
    fn test_page_zero_clamps_to_one() {
        assert_eq!(PaginationDescriptor::new(5, 0, 2).current_page, 1);
        assert_eq!(clamp_page(0, 0), 1);
        assert_eq!(clamp_page(9, 3), 3);
    }

    #[test]
    fn test_filter_indices_and_slice() {
        let records = vec![1, 2, 3, 4, 5, 6, 7];
        let even = filter_indices(&records, |n| n % 2 == 0);
        assert_eq!(even, vec![1, 3, 5]);

        let p = PaginationDescriptor::new(even.len(), 2, 2);
        assert_eq!(page_slice(&records, &even, &p), vec![&6]);
    }

    proptest! {
        #[test]
        fn prop_filtered_view_is_ordered_subset(
            records in prop::collection::vec(0u32..100, 0..200),
            threshold in 0u32..100,
        ) {
            let kept = filter_indices(&records, |n| *n >= threshold);

            prop_assert!(kept.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(kept.iter().all(|&i| i < records.len() && records[i] >= threshold));
            let expected = records.iter().filter(|n| **n >= threshold).count();
            prop_assert_eq!(kept.len(), expected);
        }

        #[test]
        fn prop_slice_bounds_hold(
            total in 0usize..5000,
            page in 0usize..1000,
            size in 0usize..200,
        ) {
            let p = PaginationDescriptor::new(total, page, size);
            let range = p.slice_range();

            prop_assert!(range.start <= range.end);
            prop_assert!(range.end <= total);
            prop_assert!(range.len() <= p.page_size);
            prop_assert!(p.current_page >= 1);
            prop_assert!(p.current_page <= p.total_pages.max(1));
            if total > 0 {
                prop_assert!(!range.is_empty());
            }
        }
    }
}
