//! Page-number controls with ellipsis collapsing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One control in a page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageToken {
    /// A page button.
    Page(usize),
    /// A collapsed run of pages.
    Ellipsis,
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page(n) => write!(f, "{n}"),
            Self::Ellipsis => f.write_str("…"),
        }
    }
}

/// Computes the page controls around `current`.
///
/// Shows up to `max_visible` consecutive pages centred on `current`, plus
/// the first and last page with an ellipsis where pages are skipped.
/// `max_visible` is expected to be odd and at least 3; it is clamped to
/// `[1, total]`. `total == 0` yields no controls.
#[must_use]
pub fn page_window(current: usize, total: usize, max_visible: usize) -> Vec<PageToken> {
    if total == 0 {
        return Vec::new();
    }

    let max_visible = max_visible.clamp(1, total);
    let current = current.clamp(1, total);
    let half = max_visible / 2;

    let start = current.saturating_sub(half).max(1);
    let end = start.saturating_add(max_visible - 1).min(total);
    let start = (end + 1).saturating_sub(max_visible).max(1);

    let mut tokens = Vec::with_capacity(max_visible + 4);
    if start > 1 {
        tokens.push(PageToken::Page(1));
        if start > 2 {
            tokens.push(PageToken::Ellipsis);
        }
    }
    tokens.extend((start..=end).map(PageToken::Page));
    if end < total {
        if end < total - 1 {
            tokens.push(PageToken::Ellipsis);
        }
        tokens.push(PageToken::Page(total));
    }
    tokens
}

/// Renders tokens as a single line, marking the current page with brackets.
#[must_use]
pub fn render_line(tokens: &[PageToken], current: usize) -> String {
    tokens
        .iter()
        .map(|token| match token {
            PageToken::Page(n) if *n == current => format!("[{n}]"),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use PageToken::{Ellipsis, Page};

    #[test]
    fn test_middle_of_many_pages() {
        assert_eq!(
            page_window(6, 12, 5),
            vec![
                Page(1),
                Ellipsis,
                Page(4),
                Page(5),
                Page(6),
                Page(7),
                Page(8),
                Ellipsis,
                Page(12)
            ]
        );
    }

    #[test]
    fn test_few_pages_no_ellipsis() {
        assert_eq!(page_window(1, 3, 5), vec![Page(1), Page(2), Page(3)]);
    }

    #[test]
    fn test_start_of_many_pages() {
        assert_eq!(
            page_window(1, 12, 5),
            vec![Page(1), Page(2), Page(3), Page(4), Page(5), Ellipsis, Page(12)]
        );
    }

    #[test]
    fn test_end_of_many_pages() {
        assert_eq!(
            page_window(12, 12, 5),
            vec![Page(1), Ellipsis, Page(8), Page(9), Page(10), Page(11), Page(12)]
        );
    }

    #[test]
    fn test_adjacent_edge_has_no_ellipsis() {
        // start == 2: page 1 shown without a gap marker
        assert_eq!(
            page_window(4, 7, 5),
            vec![Page(1), Page(2), Page(3), Page(4), Page(5), Page(6), Page(7)]
        );
    }

    #[test]
    fn test_huge_max_visible_shows_every_page() {
        assert_eq!(page_window(1, 3, 2_000_000_001), vec![Page(1), Page(2), Page(3)]);
        let tokens = page_window(500, 1000, usize::MAX);
        assert_eq!(tokens.len(), 1000);
        assert_eq!(tokens.last(), Some(&Page(1000)));
    }

    #[test]
    fn test_zero_pages() {
        assert!(page_window(1, 0, 5).is_empty());
    }

    #[test]
    fn test_render_line() {
        let tokens = page_window(6, 12, 5);
        assert_eq!(render_line(&tokens, 6), "1 … 4 5 [6] 7 8 … 12");
    }

    proptest! {
        #[test]
        fn prop_window_is_bounded_and_sorted(
            total in 1usize..500,
            current in 1usize..500,
            half in 1usize..6,
        ) {
            let max_visible = half * 2 + 1;
            let current = current.min(total);
            let tokens = page_window(current, total, max_visible);

            let pages: Vec<usize> = tokens
                .iter()
                .filter_map(|t| match t { Page(n) => Some(*n), Ellipsis => None })
                .collect();

            prop_assert!(pages.windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(pages.first().copied(), Some(1));
            prop_assert_eq!(pages.last().copied(), Some(total));
            prop_assert!(pages.contains(&current));
            prop_assert!(tokens.len() <= max_visible + 4);
            prop_assert!(!tokens.windows(2).any(|w| w[0] == Ellipsis && w[1] == Ellipsis));
            prop_assert_eq!(tokens, page_window(current, total, max_visible));
        }
    }
}
