//! Offset pagination over registry URLs
//!
//! Both functions work on the raw URL string so unrelated query parameters
//! keep their exact spelling and order. Neither performs I/O or panics on
//! malformed input.

use std::num::IntErrorKind;

/// Query parameter carrying the page size
pub const PAGE_SIZE_PARAM: &str = "limit";

/// Query parameter carrying the record offset
pub const OFFSET_PARAM: &str = "offset";

/// Ensures `url` carries both a page size and an offset, without advancing
///
/// Existing values are left untouched, so applying this twice yields the
/// same URL.
///
/// # Examples
///
/// ```
/// use well_registry_etl::extract::normalize_page_url;
///
/// let url = normalize_page_url("https://registry.example.gov/ml/", 8);
/// assert_eq!(url, "https://registry.example.gov/ml/?limit=8&offset=0");
/// assert_eq!(normalize_page_url(&url, 8), url);
/// ```
pub fn normalize_page_url(url: &str, page_size: u32) -> String {
    let (base, fragment) = split_fragment(url);
    let mut next = ensure_param(base, PAGE_SIZE_PARAM, &page_size.to_string());
    next = ensure_param(&next, OFFSET_PARAM, "0");
    rejoin_fragment(next, fragment)
}

/// Returns the URL of the page after `url`
///
/// The page size parameter is appended when missing. A missing offset is
/// appended as `offset=0`; an existing one is advanced by the URL's own page
/// size (or `page_size` when that is absent or unusable) and spliced back in
/// place.
///
/// # Examples
///
/// ```
/// use well_registry_etl::extract::next_page_url;
///
/// let first = next_page_url("https://registry.example.gov/ml/", 8);
/// assert_eq!(first, "https://registry.example.gov/ml/?limit=8&offset=0");
///
/// let second = next_page_url(&first, 8);
/// assert_eq!(second, "https://registry.example.gov/ml/?limit=8&offset=8");
/// ```
pub fn next_page_url(url: &str, page_size: u32) -> String {
    let (base, fragment) = split_fragment(url);
    let sized = ensure_param(base, PAGE_SIZE_PARAM, &page_size.to_string());

    let step = find_param(&sized, PAGE_SIZE_PARAM)
        .and_then(|span| sized[span.start..span.end].trim().parse::<u64>().ok())
        .filter(|size| *size > 0)
        .unwrap_or(u64::from(page_size));

    let next = match find_param(&sized, OFFSET_PARAM) {
        None => append_param(&sized, OFFSET_PARAM, "0"),
        Some(span) => {
            let current = parse_offset(&sized[span.start..span.end]);
            let advanced = current.saturating_add(step);
            let mut spliced = String::with_capacity(sized.len() + 4);
            spliced.push_str(&sized[..span.start]);
            if span.bare {
                spliced.push('=');
            }
            spliced.push_str(&advanced.to_string());
            spliced.push_str(&sized[span.end..]);
            spliced
        }
    };

    rejoin_fragment(next, fragment)
}

/// Byte range of a parameter's value inside a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ValueSpan {
    start: usize,
    end: usize,
    /// The parameter appeared without `=`
    bare: bool,
}

/// Locates the value of query parameter `name`
///
/// Only exact names match: `xoffset=3` is not an `offset` parameter. A bare
/// `name` without `=` is reported as present with an empty value so it is
/// never appended a second time.
fn find_param(url: &str, name: &str) -> Option<ValueSpan> {
    let query_start = url.find('?')? + 1;
    let mut segment_start = query_start;

    for segment in url[query_start..].split('&') {
        if let Some(rest) = segment.strip_prefix(name) {
            if rest.is_empty() {
                let end = segment_start + segment.len();
                return Some(ValueSpan {
                    start: end,
                    end,
                    bare: true,
                });
            }
            if rest.starts_with('=') {
                return Some(ValueSpan {
                    start: segment_start + name.len() + 1,
                    end: segment_start + segment.len(),
                    bare: false,
                });
            }
        }
        segment_start += segment.len() + 1;
    }

    None
}

fn ensure_param(url: &str, name: &str, value: &str) -> String {
    if find_param(url, name).is_some() {
        url.to_string()
    } else {
        append_param(url, name, value)
    }
}

fn append_param(url: &str, name: &str, value: &str) -> String {
    let mut out = String::with_capacity(url.len() + name.len() + value.len() + 2);
    out.push_str(url);
    if !url.contains('?') {
        out.push('?');
    } else if !url.ends_with('?') && !url.ends_with('&') {
        out.push('&');
    }
    out.push_str(name);
    out.push('=');
    out.push_str(value);
    out
}

/// Malformed values count as 0, oversized ones saturate
fn parse_offset(raw: &str) -> u64 {
    match raw.trim().parse::<u64>() {
        Ok(value) => value,
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => u64::MAX,
        Err(_) => 0,
    }
}

fn split_fragment(url: &str) -> (&str, Option<&str>) {
    match url.find('#') {
        Some(index) => (&url[..index], Some(&url[index..])),
        None => (url, None),
    }
}

fn rejoin_fragment(mut url: String, fragment: Option<&str>) -> String {
    if let Some(fragment) = fragment {
        url.push_str(fragment);
    }
    url
}
