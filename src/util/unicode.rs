use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Display width in terminal cells.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Truncate a string to fit within `max_cells` terminal cells, appending `…`
/// if truncated.
pub fn truncate_to_width(s: &str, max_cells: usize) -> String {
    if max_cells == 0 {
        return String::new();
    }
    if display_width(s) <= max_cells {
        return s.to_string();
    }
    if max_cells == 1 {
        return "\u{2026}".to_string();
    }
    let budget = max_cells - 1;
    let mut width = 0;
    let mut result = String::new();
    for grapheme in s.graphemes(true) {
        let gw = UnicodeWidthStr::width(grapheme);
        if width + gw > budget {
            break;
        }
        width += gw;
        result.push_str(grapheme);
    }
    result.push('\u{2026}');
    result
}

/// Truncate, then right-pad with spaces to exactly `cells` terminal cells.
pub fn fit_to_width(s: &str, cells: usize) -> String {
    let mut out = truncate_to_width(s, cells);
    let width = display_width(&out);
    out.extend(std::iter::repeat_n(' ', cells.saturating_sub(width)));
    out
}

/// Next grapheme boundary after `byte_offset`. Returns None if at end.
pub fn next_grapheme_boundary(s: &str, byte_offset: usize) -> Option<usize> {
    if byte_offset >= s.len() {
        return None;
    }
    match s[byte_offset..].grapheme_indices(true).nth(1) {
        Some((i, _)) => Some(byte_offset + i),
        None => Some(s.len()),
    }
}

/// Previous grapheme boundary before `byte_offset`. Returns None if at start.
pub fn prev_grapheme_boundary(s: &str, byte_offset: usize) -> Option<usize> {
    if byte_offset == 0 {
        return None;
    }
    let mut last = 0;
    for (i, _) in s[..byte_offset].grapheme_indices(true) {
        last = i;
    }
    Some(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── widths ─────────────────────────────────────────────────────

    #[test]
    fn widths_for_ascii_cjk_emoji() {
        assert_eq!(display_width("hello"), 5);
        assert_eq!(display_width("你好"), 4);
        assert_eq!(display_width("🎉"), 2);
        assert_eq!(display_width(""), 0);
    }

    // ── truncation ─────────────────────────────────────────────────

    #[test]
    fn truncate_short_string_untouched() {
        assert_eq!(truncate_to_width("hi", 10), "hi");
        assert_eq!(truncate_to_width("hello", 5), "hello");
    }

    #[test]
    fn truncate_reserves_a_cell_for_ellipsis() {
        assert_eq!(truncate_to_width("hello world", 8), "hello w\u{2026}");
    }

    #[test]
    fn truncate_never_splits_a_wide_char() {
        let result = truncate_to_width("你好世界", 4);
        assert!(display_width(&result) <= 4);
        assert!(result.ends_with('\u{2026}'));
    }

    #[test]
    fn truncate_tiny_budgets() {
        assert_eq!(truncate_to_width("hello", 0), "");
        assert_eq!(truncate_to_width("hello", 1), "\u{2026}");
    }

    // ── fitting ────────────────────────────────────────────────────

    #[test]
    fn fit_pads_to_exact_width() {
        assert_eq!(fit_to_width("ab", 5), "ab   ");
        assert_eq!(display_width(&fit_to_width("你好世界", 5)), 5);
    }

    // ── grapheme boundaries ────────────────────────────────────────

    #[test]
    fn boundaries_over_ascii() {
        assert_eq!(next_grapheme_boundary("abc", 0), Some(1));
        assert_eq!(next_grapheme_boundary("abc", 2), Some(3));
        assert_eq!(next_grapheme_boundary("abc", 3), None);
        assert_eq!(prev_grapheme_boundary("abc", 3), Some(2));
        assert_eq!(prev_grapheme_boundary("abc", 0), None);
    }

    #[test]
    fn boundaries_respect_clusters() {
        let s = "cafe\u{0301}!";
        // é is e + combining accent: bytes 3..6 form one cluster.
        assert_eq!(next_grapheme_boundary(s, 3), Some(6));
        assert_eq!(prev_grapheme_boundary(s, 6), Some(3));
    }
}
