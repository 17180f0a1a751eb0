//! Page-range expressions
//!
//! A range expression is a comma-separated list of tokens. Each token is a
//! 1-based page number (`3`), an inclusive range in either order (`3-5`,
//! `5-3`), or the keyword `all`. Resolving an expression against a page count
//! yields the canonical index set: zero-based, ascending, no duplicates.

use std::collections::BTreeSet;

use crate::error::{Error, Result};

/// Resolve a page-range expression against a document of `total` pages.
///
/// Tokens that do not parse are ignored, single page numbers outside
/// `1..=total` are ignored, and range bounds are clamped into `1..=total`.
/// An empty result is returned as-is; use [`select_pages`] when an empty
/// selection should be reported as an error.
///
/// # Example
///
/// ```
/// use pdf_pageops::range::parse_page_range;
///
/// assert_eq!(parse_page_range("1,3-5", 10), vec![0, 2, 3, 4]);
/// assert_eq!(parse_page_range("5-2", 10), vec![1, 2, 3, 4]);
/// assert_eq!(parse_page_range("ALL", 3), vec![0, 1, 2]);
/// assert!(parse_page_range("99", 5).is_empty());
/// ```
pub fn parse_page_range(spec: &str, total: usize) -> Vec<usize> {
    let tokens: Vec<&str> = spec
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect();

    if tokens.iter().any(|token| token.eq_ignore_ascii_case("all")) {
        return (0..total).collect();
    }

    let mut selected = BTreeSet::new();
    for token in tokens {
        if token.contains('-') {
            if let Some((first, last)) = parse_range_token(token) {
                let start = first.min(last).max(1);
                let end = first.max(last).min(total as i64);
                for page in start..=end {
                    selected.insert(page as usize - 1);
                }
            }
        } else if let Ok(page) = token.parse::<i64>() {
            if page >= 1 && page <= total as i64 {
                selected.insert(page as usize - 1);
            }
        }
    }

    selected.into_iter().collect()
}

/// Resolve a page-range expression, rejecting an empty selection.
///
/// Composition operations must not run without pages to work on, so an
/// expression that selects nothing is reported as [`Error::EmptySelection`],
/// distinct from every other failure.
pub fn select_pages(spec: &str, total: usize) -> Result<Vec<usize>> {
    let indices = parse_page_range(spec, total);
    if indices.is_empty() {
        return Err(Error::EmptySelection {
            spec: spec.to_string(),
            total,
        });
    }
    Ok(indices)
}

/// Split `a-b` into its two integer bounds
fn parse_range_token(token: &str) -> Option<(i64, i64)> {
    let mut parts = token.split('-');
    let first = parse_bound(parts.next()?)?;
    let last = parse_bound(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some((first, last))
}

/// A range bound; digit runs too long for `i64` saturate so they clamp to the last page
fn parse_bound(text: &str) -> Option<i64> {
    let text = text.trim();
    match text.parse::<i64>() {
        Ok(bound) => Some(bound),
        Err(_) if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) => Some(i64::MAX),
        Err(_) => None,
    }
}
