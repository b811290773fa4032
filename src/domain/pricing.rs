//! Price text heuristics and re-listing price formulas.
//!
//! Pure functions only: every input is storefront copy or a number already
//! read from the page, so they can be tested against fixture strings.

use once_cell::sync::Lazy;
use regex::Regex;

static WON_AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"([\d,]+)\s*원").expect("valid regex"));

/// Upper bound of the return shipping fee in won
pub const RETURN_FEE_CAP: f64 = 200_000.0;

/// Ad category brackets: inclusive upper bound of the selling price → code
const AD_CATEGORY_BRACKETS: [(u64, u64); 11] = [
    (20_000, 2_903_608),
    (30_000, 2_904_260),
    (40_000, 2_904_261),
    (60_000, 2_904_262),
    (80_000, 2_904_268),
    (100_000, 2_904_272),
    (150_000, 2_904_276),
    (400_000, 2_904_278),
    (600_000, 2_904_279),
    (1_000_000, 2_904_281),
    (9_999_999, 2_904_284),
];

/// Reads the price from a listing card label.
///
/// `12,900원` → `12,900`; bare digits are re-formatted with separators;
/// anything without digits yields `N/A`.
pub fn extract_price_from_text(raw: &str) -> String {
    if let Some(caps) = WON_AMOUNT.captures(raw) {
        return caps[1].replace('\u{200b}', "").trim().to_string();
    }
    match digits_to_u64(raw) {
        Some(value) => format_thousands(value),
        None => "N/A".to_string(),
    }
}

pub fn has_numeric_chars(value: &str) -> bool {
    value.chars().any(|c| c.is_ascii_digit())
}

/// Concatenates every ASCII digit of `raw` and parses the result
pub fn digits_to_u64(raw: &str) -> Option<u64> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Positive price from a JSON value (number or text), `None` otherwise
pub fn normalize_price_value(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => {
            let v = n.as_f64()?;
            (v > 0.0).then_some(v as u64)
        }
        serde_json::Value::String(s) => {
            if s.is_empty() || s == "N/A" {
                return None;
            }
            digits_to_u64(s).filter(|v| *v > 0)
        }
        _ => None,
    }
}

/// Smallest positive option price delta, used when the card price is missing
pub fn price_from_option_deltas(deltas: &[i64]) -> Option<u64> {
    deltas
        .iter()
        .filter(|d| **d > 0)
        .map(|d| *d as u64)
        .min()
}

pub fn format_thousands(value: u64) -> String {
    let raw = value.to_string();
    let mut out = String::with_capacity(raw.len() + raw.len() / 3);
    for (i, ch) in raw.chars().enumerate() {
        if i > 0 && (raw.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Rounds to the nearest hundred won, ties to even hundreds
pub fn round_to_hundred(value: f64) -> u64 {
    ((value / 100.0).round_ties_even() * 100.0).max(0.0) as u64
}

/// Selling price: total minus 1 percent, rounded to the nearest hundred
pub fn selling_price(price: u64, shipping_fee: u64) -> u64 {
    let total = (price + shipping_fee) as f64;
    round_to_hundred(total - 0.01 * total)
}

/// Ad category code for the selling price, `None` past the last bracket
pub fn ad_category_code(selling_price: u64) -> Option<u64> {
    AD_CATEGORY_BRACKETS
        .iter()
        .find(|(upper, _)| selling_price <= *upper)
        .map(|(_, code)| *code)
}

/// Return shipping fee: 25 percent of the total, capped, rounded
pub fn return_shipping_fee(total_price: u64) -> u64 {
    let fee = (total_price as f64 * 0.25).min(RETURN_FEE_CAP);
    round_to_hundred(fee)
}
