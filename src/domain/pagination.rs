//! Pagination domain logic centralization.
//!
//! Responsibility:
//! - 페이지 그룹(10개 단위) 계획과 CRAWL_ONLY_PAGES 필터
//! - 리스트 시그니처(첫 상품 href) 비교
//! - URL 쿼리/필터 속성에서 페이지 번호 해석

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use url::Url;

/// Page links the listing UI exposes at once
pub const PAGE_GROUP_SIZE: u32 = 10;

/// Query parameter names the storefront has used for the page index
pub const PAGE_QUERY_KEYS: [&str; 5] = ["page", "pageIndex", "pagingIndex", "pageNum", "p"];

/// Keys of the `data-shp-filter_con` entries that carry the page number
const FILTER_PAGE_KEYS: [&str; 3] = ["pgn", "page", "pageNum"];

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Positive page index in the listing UI
pub type PageNumber = u32;

/// Href of the first product link currently rendered.
///
/// Two different signatures mean the visible list changed, not necessarily
/// to the page that was requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListSignature(pub String);

impl ListSignature {
    /// True only when both reads exist and differ
    pub fn changed(before: Option<&ListSignature>, after: Option<&ListSignature>) -> bool {
        matches!((before, after), (Some(b), Some(a)) if b != a)
    }
}

/// Ten (or fewer) consecutive listing pages written to one workbook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageGroup {
    pub start: PageNumber,
    pub last: PageNumber,
    /// Pages of this group that are actually crawled, ascending
    pub targets: Vec<PageNumber>,
}

impl PageGroup {
    pub fn first_target(&self) -> Option<PageNumber> {
        self.targets.first().copied()
    }
}

/// Splits `start..=last` into groups of ten.
///
/// With `only_pages` the range collapses to the requested min..max and
/// groups without a requested page are dropped.
pub fn plan_page_groups(
    start: PageNumber,
    last: PageNumber,
    only_pages: Option<&BTreeSet<PageNumber>>,
) -> Vec<PageGroup> {
    let (start, last) = match only_pages {
        Some(only) if !only.is_empty() => {
            // BTreeSet is ordered, first/last are min/max
            let min = only.first().copied().unwrap_or(start);
            let max = only.last().copied().unwrap_or(last);
            (min, max)
        }
        _ => (start, last),
    };
    if start == 0 || last < start {
        return Vec::new();
    }

    let mut groups = Vec::new();
    let mut group_start = start;
    while group_start <= last {
        let group_last = group_start.saturating_add(PAGE_GROUP_SIZE - 1).min(last);
        let targets: Vec<PageNumber> = (group_start..=group_last)
            .filter(|p| only_pages.is_none_or(|only| only.is_empty() || only.contains(p)))
            .collect();
        if !targets.is_empty() {
            groups.push(PageGroup {
                start: group_start,
                last: group_last,
                targets,
            });
        }
        match group_start.checked_add(PAGE_GROUP_SIZE) {
            Some(next) => group_start = next,
            None => break,
        }
    }
    groups
}

/// Parses `CRAWL_ONLY_PAGES` style lists: `3, 7;9 12`
pub fn parse_page_list(raw: &str) -> Option<BTreeSet<PageNumber>> {
    let mut pages = BTreeSet::new();
    for part in raw.split(|c: char| c.is_whitespace() || c == ',' || c == ';') {
        if part.is_empty() {
            continue;
        }
        pages.insert(part.parse::<PageNumber>().ok()?);
    }
    (!pages.is_empty()).then_some(pages)
}

/// First run of digits in `text` as a page number
pub fn leading_page_number(text: &str) -> Option<PageNumber> {
    DIGITS.find(text).and_then(|m| m.as_str().parse().ok())
}

/// Label text that is a page number and nothing else.
///
/// Ellipsis and arrow controls never match.
pub fn exact_page_label(text: &str) -> Option<PageNumber> {
    let trimmed = text.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}

/// Page number from the pagination container's `data-shp-filter_con`
/// attribute: a JSON list of `{key, value}` pairs, possibly still
/// HTML-escaped
pub fn page_from_filter_attr(raw: &str) -> Option<PageNumber> {
    let decoded = raw.replace("&quot;", "\"");
    let data: serde_json::Value = serde_json::from_str(&decoded).ok()?;
    data.as_array()?.iter().find_map(|item| {
        let key = item.get("key")?.as_str()?;
        if !FILTER_PAGE_KEYS.contains(&key) {
            return None;
        }
        let value = match item.get("value")? {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        leading_page_number(&value)
    })
}

/// Page number from the first known page query parameter of `url`
pub fn page_from_query(url: &str) -> Option<PageNumber> {
    let parsed = Url::parse(url).ok()?;
    let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
    PAGE_QUERY_KEYS.iter().find_map(|key| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| leading_page_number(v))
    })
}

/// Sets (or with `None` removes) one query parameter, keeping the others in
/// their original order
pub fn with_query_param(url: &str, key: &str, value: Option<&str>) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .into_owned()
        .filter(|(k, _)| k != key)
        .collect();
    if let Some(value) = value {
        pairs.push((key.to_string(), value.to_string()));
    }
    if pairs.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(pairs);
    }
    Some(parsed.to_string())
}

/// How a navigation request was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavigationOutcome {
    /// The reader already reported the target; nothing was clicked
    AlreadyThere,
    /// The reader confirmed the target after clicking
    Confirmed,
    /// Page number unreadable but the visible list changed
    ListChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationReport {
    pub target: PageNumber,
    pub outcome: NavigationOutcome,
    pub group_hops: u32,
    pub clicks: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twenty_three_pages_make_three_groups() {
        let groups = plan_page_groups(1, 23, None);
        let bounds: Vec<(u32, u32)> = groups.iter().map(|g| (g.start, g.last)).collect();
        assert_eq!(bounds, vec![(1, 10), (11, 20), (21, 23)]);
        assert_eq!(groups[2].targets, vec![21, 22, 23]);
    }

    #[test]
    fn only_pages_collapse_range_and_skip_empty_groups() {
        let only = parse_page_list("3, 25").unwrap();
        let groups = plan_page_groups(1, 100, Some(&only));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].start, 3);
        assert_eq!(groups[0].targets, vec![3]);
        assert_eq!((groups[1].start, groups[1].last), (23, 25));
        assert_eq!(groups[1].targets, vec![25]);
    }

    #[test]
    fn inverted_range_plans_nothing() {
        assert!(plan_page_groups(5, 4, None).is_empty());
        assert!(plan_page_groups(0, 4, None).is_empty());
    }

    #[test]
    fn page_list_rejects_garbage() {
        assert_eq!(parse_page_list("1;2 3").unwrap().len(), 3);
        assert!(parse_page_list("1,x").is_none());
        assert!(parse_page_list("  ").is_none());
    }

    #[test]
    fn page_labels_must_be_digits_only() {
        assert_eq!(exact_page_label(" 12 "), Some(12));
        assert_eq!(exact_page_label("12페이지"), None);
        assert_eq!(exact_page_label("..."), None);
        assert_eq!(exact_page_label(""), None);
        assert_eq!(leading_page_number("현재 페이지 7"), Some(7));
    }

    #[test]
    fn filter_attr_reads_pgn_entry() {
        let raw = r#"[{&quot;key&quot;:&quot;sort&quot;,&quot;value&quot;:&quot;RECENT&quot;},{&quot;key&quot;:&quot;pgn&quot;,&quot;value&quot;:&quot;12&quot;}]"#;
        assert_eq!(page_from_filter_attr(raw), Some(12));
        assert_eq!(page_from_filter_attr(r#"[{"key":"page","value":4}]"#), Some(4));
        assert_eq!(page_from_filter_attr(r#"{"key":"pgn"}"#), None);
        assert_eq!(page_from_filter_attr("not json"), None);
    }

    #[test]
    fn query_page_uses_known_keys_in_priority() {
        assert_eq!(
            page_from_query("https://smartstore.naver.com/s/category/ALL?st=RECENT&p=9&page=3"),
            Some(3)
        );
        assert_eq!(page_from_query("https://smartstore.naver.com/s/category/ALL?pageNum=7"), Some(7));
        assert_eq!(page_from_query("https://smartstore.naver.com/s/category/ALL"), None);
    }

    #[test]
    fn query_param_update_keeps_other_pairs() {
        let url = "https://smartstore.naver.com/s/category/ALL?st=RECENT&page=2&size=20";
        assert_eq!(
            with_query_param(url, "page", Some("5")).unwrap(),
            "https://smartstore.naver.com/s/category/ALL?st=RECENT&size=20&page=5"
        );
        assert_eq!(
            with_query_param(url, "page", None).unwrap(),
            "https://smartstore.naver.com/s/category/ALL?st=RECENT&size=20"
        );
    }

    #[test]
    fn signature_change_needs_both_reads() {
        let a = ListSignature("/products/1".into());
        let b = ListSignature("/products/2".into());
        assert!(ListSignature::changed(Some(&a), Some(&b)));
        assert!(!ListSignature::changed(Some(&a), Some(&a)));
        assert!(!ListSignature::changed(None, Some(&b)));
    }
}
