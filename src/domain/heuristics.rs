//! 스토어 UI 문구 기반 텍스트 휴리스틱
//!
//! Option labels, shipping notices, breadcrumb categories and image file
//! names are all parsed here, away from any DOM traversal.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static OPTION_PRICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([+\-]?[\d,]+)원\)").expect("valid regex"));
static FIRST_AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\d,]+").expect("valid regex"));
static BODY_SHIPPING_PATTERNS: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"배송비\s*[:：]?\s*([\d,]+)\s*원").expect("valid regex"),
        Regex::new(r"반품배송비\s*[:：]?\s*([\d,]+)\s*원").expect("valid regex"),
    ]
});

pub const FREE_SHIPPING: &str = "무료배송";

/// Splits `빨강 (+1,000원)` into (`빨강`, 1000); unpriced labels get 0
pub fn parse_option_label(label: &str) -> (String, i64) {
    match OPTION_PRICE.captures(label) {
        Some(caps) => {
            let price = caps[1].replace(',', "").parse::<i64>().unwrap_or(0);
            let name = OPTION_PRICE.replace_all(label, "").trim().to_string();
            (name, price)
        }
        None => (label.trim().to_string(), 0),
    }
}

/// Whitespace-collapsed label used to de-duplicate dropdown choices
pub fn normalize_label(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Shipping fee from a delivery element's text.
///
/// Free shipping reads as 0; otherwise the first amount in the text.
pub fn shipping_fee_from_text(text: &str) -> Option<u64> {
    if text.contains(FREE_SHIPPING) {
        return Some(0);
    }
    FIRST_AMOUNT
        .find_iter(text)
        .map(|m| m.as_str().replace(',', ""))
        .find(|digits| !digits.is_empty())
        .and_then(|digits| digits.parse().ok())
}

/// Shipping fee searched in the whole body text as a last resort
pub fn shipping_fee_from_body(body: &str) -> Option<u64> {
    if body.contains(FREE_SHIPPING) {
        return Some(0);
    }
    BODY_SHIPPING_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(body)
            .and_then(|caps| caps[1].replace(',', "").parse().ok())
    })
}

/// Breadcrumb category such as `생활/건강>공구>전동공구>드릴`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryPath {
    pub segments: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryLevel {
    Small,
    Tiny,
}

impl CategoryPath {
    pub fn parse(raw: &str) -> Self {
        Self {
            segments: raw
                .split('>')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Most specific segment usable for the code lookup.
    ///
    /// The fourth level maps through the tiny table, the third through the
    /// small table; shallower paths have no code.
    pub fn most_specific(&self) -> Option<(CategoryLevel, &str)> {
        if let Some(tiny) = self.segments.get(3) {
            return Some((CategoryLevel::Tiny, tiny.as_str()));
        }
        self.segments
            .get(2)
            .map(|small| (CategoryLevel::Small, small.as_str()))
    }
}

/// Grouping key of an image URL: first three digits of the file name,
/// or its first three characters when it has no digits
pub fn image_prefix(url: &str) -> String {
    let filename = url.rsplit('/').next().unwrap_or(url);
    let digits: String = filename.chars().filter(char::is_ascii_digit).collect();
    let source = if digits.is_empty() { filename } else { digits.as_str() };
    source.chars().take(3).collect()
}

/// Images sharing the plurality prefix versus the rest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageGroups {
    pub common: Vec<String>,
    pub different: Vec<String>,
}

/// Strips query strings, de-duplicates in first-seen order and splits the
/// gallery by the most frequent file-name prefix (earliest prefix wins ties)
pub fn classify_images<I, S>(urls: I) -> ImageGroups
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut unique: Vec<String> = Vec::new();
    for raw in urls {
        let url = raw.as_ref().split('?').next().unwrap_or_default().to_string();
        if url.is_empty() || unique.contains(&url) {
            continue;
        }
        unique.push(url);
    }
    if unique.is_empty() {
        return ImageGroups::default();
    }

    let prefixes: Vec<String> = unique.iter().map(|u| image_prefix(u)).collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for prefix in &prefixes {
        let entry = counts.entry(prefix.as_str()).or_insert(0);
        if *entry == 0 {
            order.push(prefix.as_str());
        }
        *entry += 1;
    }
    let mut winner = order[0];
    for candidate in &order {
        if counts[candidate] > counts[winner] {
            winner = candidate;
        }
    }
    let winner = winner.to_string();

    let mut groups = ImageGroups::default();
    for (url, prefix) in unique.into_iter().zip(prefixes) {
        if prefix == winner {
            groups.common.push(url);
        } else {
            groups.different.push(url);
        }
    }
    groups
}
