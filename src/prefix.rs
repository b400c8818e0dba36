//! Selector parsing and effective prefix resolution.

use std::collections::HashSet;

/// Splits raw selector arguments into individual selectors.
///
/// Automation commonly passes several selectors as one multi-line value, so
/// every argument is split on newlines. Lines are trimmed and blank lines
/// dropped; internal whitespace is kept.
pub fn parse_selectors<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .flat_map(|value| {
            value
                .as_ref()
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Combines the shared prefix with each unique selector.
///
/// Duplicate selectors are dropped (first occurrence keeps its position), and
/// empty segments are omitted before joining with a single `/`.
///
/// # Example
///
/// ```
/// use s3mirror::resolve_prefixes;
///
/// let selectors = vec!["v1".to_string(), "v2".to_string(), "v1".to_string()];
/// assert_eq!(
///     resolve_prefixes("releases", &selectors),
///     vec!["releases/v1", "releases/v2"]
/// );
/// ```
pub fn resolve_prefixes(prefix: &str, selectors: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    selectors
        .iter()
        .filter(|selector| seen.insert(selector.as_str()))
        .map(|selector| {
            [prefix, selector.as_str()]
                .into_iter()
                .filter(|segment| !segment.is_empty())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect()
}
