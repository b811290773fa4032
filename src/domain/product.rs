//! Product rows captured during one crawl run.
//!
//! A `ProductRecord` is created once per detail visit and never updated in
//! place afterwards; the run keeps them in capture order.

use serde::{Deserialize, Serialize};

/// Summary read from one product card on a listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingCard {
    pub title: String,
    /// Locale formatted price text (`12,900`) or `N/A`
    pub price: String,
    pub url: String,
    /// Last path segment of the product URL
    pub product_code: String,
}

impl ListingCard {
    pub fn new(title: &str, price: String, url: String) -> Self {
        let product_code = product_code_from_url(&url);
        Self {
            title: normalize_title(title),
            price,
            url,
            product_code,
        }
    }
}

/// One option dropdown: its label plus the choices it exposes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionGroup {
    pub category: String,
    pub names: Vec<String>,
    /// Price delta of each choice in won, aligned with `names`
    pub price_deltas: Vec<i64>,
}

/// Sanitized HTML attached 1:1 to a product row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFragment {
    pub html: String,
    pub source: ContentSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentSource {
    /// Cleaned detail-page markup
    Cleaned,
    /// Image-only gallery rebuilt from the raw markup
    FallbackGallery,
}

impl ContentSource {
    pub fn label(self) -> &'static str {
        match self {
            Self::Cleaned => "cleaned",
            Self::FallbackGallery => "fallback_gallery",
        }
    }
}

/// A fully extracted product, one spreadsheet row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub title: String,
    /// Locale formatted price text, thousands separated
    pub price: String,
    pub shipping_fee: u64,
    pub total_price: u64,
    pub main_image: Option<String>,
    pub other_images: Vec<String>,
    pub options: Vec<OptionGroup>,
    pub product_url: String,
    pub category_code: Option<u64>,
    pub content: Option<ContentFragment>,
}

impl ProductRecord {
    pub fn product_code(&self) -> String {
        product_code_from_url(&self.product_url)
    }

    /// Numeric value of the price text, 0 when it carries no digits
    pub fn price_value(&self) -> u64 {
        crate::domain::pricing::digits_to_u64(&self.price).unwrap_or(0)
    }

    pub fn content_html(&self) -> &str {
        self.content.as_ref().map_or("", |c| c.html.as_str())
    }

    /// Every option price delta across all groups, in group order
    pub fn all_option_prices(&self) -> Vec<i64> {
        self.options
            .iter()
            .flat_map(|group| group.price_deltas.iter().copied())
            .collect()
    }
}

pub fn product_code_from_url(url: &str) -> String {
    let trimmed = url.split(['?', '#']).next().unwrap_or(url);
    trimmed
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("N/A")
        .to_string()
}

/// Listing titles carry non-breaking spaces from the storefront markup
pub fn normalize_title(title: &str) -> String {
    title.replace('\u{a0}', " ").trim().to_string()
}
