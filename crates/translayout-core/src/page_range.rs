//! Page range parsing.
//!
//! Turns a human-friendly expression like `"1-3,7,10-12"` into sorted,
//! deduplicated 0-based page indices clamped to the document bounds.
//! Malformed tokens are skipped with a warning rather than aborting the
//! whole expression.

use std::collections::BTreeSet;

use tracing::warn;

/// Parse a page range expression into 0-based page indices.
///
/// Accepted forms, all 1-based at this boundary:
/// - `""` or `"all"` (case-insensitive): every page
/// - `"5"`: a single page
/// - `"1-10"`: an inclusive range, endpoints clamped to the document
/// - comma-separated combinations of the above
pub fn parse_page_range(expression: &str, total_pages: usize) -> Vec<usize> {
    let trimmed = expression.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
        return (0..total_pages).collect();
    }

    let compact: String = expression.chars().filter(|c| !c.is_whitespace()).collect();

    let mut pages = BTreeSet::new();
    for part in compact.split(',') {
        if part.contains('-') {
            parse_range_part(part, total_pages, &mut pages);
        } else {
            parse_single_part(part, total_pages, &mut pages);
        }
    }

    pages.into_iter().collect()
}

/// Parse a `start-end` token, clamping endpoints into `[1, total_pages]`.
fn parse_range_part(part: &str, total_pages: usize, pages: &mut BTreeSet<usize>) {
    let parsed = part.split_once('-').and_then(|(start_str, end_str)| {
        let start: usize = start_str.parse().ok()?;
        let end: usize = end_str.parse().ok()?;
        Some((start, end))
    });

    let Some((start, end)) = parsed else {
        warn!("Invalid range '{part}', skipping");
        return;
    };

    let start = start.max(1);
    let end = end.min(total_pages);
    for p in start..=end {
        pages.insert(p - 1);
    }
}

/// Parse a single 1-based page number; out-of-bounds values contribute nothing.
fn parse_single_part(part: &str, total_pages: usize, pages: &mut BTreeSet<usize>) {
    match part.parse::<usize>() {
        Ok(p) if (1..=total_pages).contains(&p) => {
            pages.insert(p - 1);
        }
        Ok(_) => {}
        Err(_) => {
            warn!("Invalid page '{part}', skipping");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_all_and_empty_select_everything() {
        let every: Vec<usize> = (0..10).collect();
        assert_eq!(parse_page_range("all", 10), every);
        assert_eq!(parse_page_range("ALL", 10), every);
        assert_eq!(parse_page_range("", 10), every);
        assert_eq!(parse_page_range("  ", 10), every);
    }

    #[test]
    fn test_single_page() {
        assert_eq!(parse_page_range("5", 10), vec![4]);
    }

    #[test]
    fn test_simple_range() {
        assert_eq!(parse_page_range("1-3", 10), vec![0, 1, 2]);
    }

    #[test]
    fn test_combined_expression() {
        assert_eq!(parse_page_range("1-3,7,9-10", 10), vec![0, 1, 2, 6, 8, 9]);
    }

    #[test]
    fn test_invalid_token_is_skipped() {
        assert_eq!(parse_page_range("1,abc,3", 10), vec![0, 2]);
    }

    #[test]
    fn test_malformed_range_is_skipped() {
        assert_eq!(parse_page_range("1-2-3,5", 10), vec![4]);
        assert_eq!(parse_page_range("x-3", 10), Vec::<usize>::new());
    }

    #[test]
    fn test_range_endpoints_are_clamped() {
        // Start below 1 and end beyond the document are pulled into bounds
        assert_eq!(parse_page_range("0-3", 10), vec![0, 1, 2]);
        assert_eq!(parse_page_range("8-99", 10), vec![7, 8, 9]);
    }

    #[test]
    fn test_empty_clamped_range_contributes_nothing() {
        assert_eq!(parse_page_range("20-30", 10), Vec::<usize>::new());
    }

    #[test]
    fn test_out_of_bounds_single_pages() {
        assert_eq!(parse_page_range("0", 10), Vec::<usize>::new());
        assert_eq!(parse_page_range("11", 10), Vec::<usize>::new());
    }

    #[test]
    fn test_duplicates_are_merged() {
        assert_eq!(parse_page_range("1,1,1-2,2", 10), vec![0, 1]);
    }

    #[test]
    fn test_whitespace_inside_expression() {
        assert_eq!(parse_page_range("1 - 3, 5", 10), vec![0, 1, 2, 4]);
    }

    #[test]
    fn test_zero_page_document() {
        assert_eq!(parse_page_range("all", 0), Vec::<usize>::new());
        assert_eq!(parse_page_range("1-5", 0), Vec::<usize>::new());
    }

    #[test]
    fn test_output_is_sorted_subset() {
        let result = parse_page_range("9,3,7-8,1", 10);
        assert_eq!(result, vec![0, 2, 6, 7, 8]);
        assert!(result.iter().all(|&p| p < 10));
    }
}
