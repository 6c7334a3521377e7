//! Printed-vs-physical page offset detection (supplemented feature, spec
//! `SPEC_FULL.md`: original `page_offset_detector.py` was referenced by
//! `usdm_combiner.py` but not retrieved into `original_source/`; this
//! reimplements the documented heuristic from the footer regex it used).
//!
//! Clinical protocols print a page number in the footer (`"Page 12 of 340"`,
//! or just `"12"`) that is usually offset from the physical PDF page index
//! by the cover/TOC page count. We recover that offset so provenance page
//! numbers the model reports (printed numbers, since that's what it reads)
//! can be converted to physical indices: `physical = printed + offset`.

use once_cell::sync::Lazy;
use regex::Regex;

static FOOTER_PAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:page\s+)?(\d{1,5})\s*(?:of\s+\d{1,5})?\s*$").unwrap());

const FOOTER_WINDOW: usize = 120;
const MIN_AGREEING_PAGES: usize = 3;

/// Detect a consistent `physical - printed` offset from the footer region
/// of each page's text. Returns `None` when there isn't enough agreement
/// across pages to trust a single offset (e.g. scanned PDFs with no
/// extractable footer text).
pub fn detect_page_offset(pages: &[String]) -> Option<i64> {
    let mut votes: std::collections::HashMap<i64, usize> = std::collections::HashMap::new();

    for (physical_index, text) in pages.iter().enumerate() {
        let physical_page = (physical_index + 1) as i64;
        if let Some(printed) = extract_footer_page_number(text) {
            let offset = physical_page - printed;
            *votes.entry(offset).or_insert(0) += 1;
        }
    }

    let (best_offset, best_count) = votes.into_iter().max_by_key(|(_, count)| *count)?;
    if best_count >= MIN_AGREEING_PAGES {
        Some(best_offset)
    } else {
        None
    }
}

fn extract_footer_page_number(page_text: &str) -> Option<i64> {
    let trimmed = page_text.trim_end();
    let tail_start = trimmed.len().saturating_sub(FOOTER_WINDOW);
    let tail = &trimmed[tail_start..];

    tail.lines()
        .rev()
        .find_map(|line| FOOTER_PAGE_RE.captures(line.trim()))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with_footer(body: &str, footer: &str) -> String {
        format!("{body}\n\n{footer}")
    }

    #[test]
    fn detects_consistent_offset_across_pages() {
        let pages = vec![
            page_with_footer("Cover page", "Page 1 of 10"),
            page_with_footer("Table of contents", "Page 2 of 10"),
            page_with_footer("Intro", "1"),
            page_with_footer("Body", "2"),
            page_with_footer("More body", "3"),
        ];
        // physical pages 3,4,5 show printed 1,2,3 -> offset 2
        assert_eq!(detect_page_offset(&pages), Some(2));
    }

    #[test]
    fn returns_none_when_footers_are_inconsistent() {
        let pages = vec![
            page_with_footer("a", "7"),
            page_with_footer("b", "nothing useful here"),
        ];
        assert_eq!(detect_page_offset(&pages), None);
    }

    #[test]
    fn returns_none_for_empty_input() {
        assert_eq!(detect_page_offset(&[]), None);
    }
}
