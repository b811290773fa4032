//! 상품 상세 페이지 수집
//!
//! One visit per product: category, option groups, price fallback,
//! representative and extra images, sanitized detail content and the
//! shipping fee. Missing pieces degrade to empty fields; only a product
//! without any price is rejected.

use serde_json::Value;
use std::collections::HashSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::errors::ExtractionError;
use super::pagination_reader::settle;
use crate::domain::heuristics::{
    CategoryPath, classify_images, normalize_label, parse_option_label, shipping_fee_from_body,
    shipping_fee_from_text,
};
use crate::domain::pricing::{
    digits_to_u64, format_thousands, has_numeric_chars, normalize_price_value,
    price_from_option_deltas,
};
use crate::domain::{ContentFragment, ListingCard, OptionGroup, ProductRecord};
use crate::infrastructure::browser::{BrowserPage, ElementHandle, Locator};
use crate::infrastructure::config::PaginationTiming;
use crate::infrastructure::debug_artifacts::DebugArtifacts;
use crate::infrastructure::parsing::{ContentSanitizer, ProductDetailSelectors, SanitizeOutcome};
use crate::infrastructure::selector_resolver::SelectorResolver;
use crate::infrastructure::spreadsheet::CategoryLookup;

/// Reads `window.__PRELOADED_STATE__` prices; only numbers and strings
/// are passed back
const PRELOADED_PRICE_SCRIPT: &str = r#"
const state = window.__PRELOADED_STATE__;
if (!state || !state.productSimpleView || !state.productSimpleView.product) {
    return null;
}
const product = state.productSimpleView.product;
const wrap = (value) => {
    const type = typeof value;
    return type === "number" || type === "string" ? value : null;
};
return {
    salePrice: wrap(product.salePrice),
    discountedSalePrice: wrap(product.discountedSalePrice),
    price: wrap(product.price)
};
"#;

const PRELOADED_PRICE_KEYS: [&str; 3] = ["salePrice", "discountedSalePrice", "price"];

/// Resize suffix of representative image URLs
const MAIN_IMAGE_SUFFIX: &str = "?type=m510";

/// Dropdowns read per product
const MAX_OPTION_GROUPS: usize = 10;

pub struct ProductDetailExtractor<'a> {
    selectors: &'a ProductDetailSelectors,
    lookup: &'a CategoryLookup,
    timing: &'a PaginationTiming,
    artifacts: &'a DebugArtifacts,
    sanitizer: ContentSanitizer,
}

impl<'a> ProductDetailExtractor<'a> {
    pub fn new(
        selectors: &'a ProductDetailSelectors,
        lookup: &'a CategoryLookup,
        timing: &'a PaginationTiming,
        artifacts: &'a DebugArtifacts,
    ) -> Self {
        Self {
            selectors,
            lookup,
            timing,
            artifacts,
            sanitizer: ContentSanitizer::new(),
        }
    }

    pub fn with_sanitizer(mut self, sanitizer: ContentSanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Opens `card.url` in `page` and reads the full product
    pub async fn extract(
        &self,
        page: &dyn BrowserPage,
        card: &ListingCard,
    ) -> Result<ProductRecord, ExtractionError> {
        info!("🔗 Visiting product {}", card.url);
        page.goto(&card.url).await?;
        if let Err(e) = page.wait_for_load(self.timing.load_timeout).await {
            debug!("load wait for {}: {}", card.url, e);
        }
        let code = card.product_code.as_str();

        let category_code = match self.category(page).await {
            Some(path) => {
                let found = self.lookup.code_for_path(&path);
                if found.is_none() {
                    debug!("[{}] no category code for {:?}", code, path.segments);
                }
                found
            }
            None => None,
        };

        let options = self.options(page, code).await;

        let price = if has_numeric_chars(&card.price) {
            card.price.clone()
        } else {
            let deltas: Vec<i64> = options
                .iter()
                .flat_map(|group| group.price_deltas.iter().copied())
                .collect();
            let fallback = match self.preloaded_price(page).await {
                Some(price) => Some(price),
                None => price_from_option_deltas(&deltas),
            };
            match fallback {
                Some(value) => {
                    info!("[{}] card price missing, using {}", code, value);
                    format_thousands(value)
                }
                None => {
                    warn!("⚠️ No price for {}, skipping product", card.url);
                    return Err(ExtractionError::NoPrice {
                        url: card.url.clone(),
                    });
                }
            }
        };

        let (main_image, other_images) = self.images(page).await;
        let content = self.content(page, code).await;
        let shipping_fee = self.shipping_fee(page).await;
        let total_price = digits_to_u64(&price)
            .unwrap_or(0)
            .saturating_add(shipping_fee);

        Ok(ProductRecord {
            title: card.title.clone(),
            price,
            shipping_fee,
            total_price,
            main_image,
            other_images,
            options,
            product_url: card.url.clone(),
            category_code,
            content,
        })
    }

    /// Breadcrumb from the first script holding a `category` JSON field
    async fn category(&self, page: &dyn BrowserPage) -> Option<CategoryPath> {
        let scripts = SelectorResolver::document(page)
            .find_all(&[self.selectors.category_script.as_str()])
            .await;
        for script in scripts {
            let Ok(text) = page.inner_html(&script).await else {
                continue;
            };
            if !text.contains("category") {
                continue;
            }
            let Ok(data) = serde_json::from_str::<Value>(text.trim()) else {
                continue;
            };
            if let Some(raw) = data.get("category").and_then(Value::as_str) {
                return Some(CategoryPath::parse(raw));
            }
        }
        None
    }

    /// Opens every option dropdown, records its choices and picks one
    /// enabled choice at random so dependent dropdowns unlock
    async fn options(&self, page: &dyn BrowserPage, code: &str) -> Vec<OptionGroup> {
        let resolver = SelectorResolver::document(page);
        let trigger = [self.selectors.option_trigger.as_str()];
        let fallback = [self.selectors.option_trigger_fallback.as_str()];
        let use_fallback = resolver.find_all(&trigger).await.is_empty();

        let mut groups = Vec::new();
        for index in 0..MAX_OPTION_GROUPS {
            let triggers = if use_fallback {
                resolver.find_all(&fallback).await
            } else {
                resolver.find_all(&trigger).await
            };
            let Some(element) = triggers.get(index) else {
                break;
            };

            let category = self.option_category(page, element, index + 1).await;
            if let Err(e) = page.click(element).await {
                warn!("[{}] option dropdown {} click failed: {}", code, category, e);
                continue;
            }
            let Some(listbox) = self.wait_for_listbox(page).await else {
                debug!("[{}] no listbox opened for {}", code, category);
                continue;
            };

            let items = page
                .find_elements(Some(&listbox), &Locator::parse(&self.selectors.option_item))
                .await
                .unwrap_or_default();
            let mut seen = HashSet::new();
            let mut names = Vec::new();
            let mut price_deltas = Vec::new();
            let mut selectable = Vec::new();
            for item in items {
                let Ok(text) = page.inner_text(&item).await else {
                    continue;
                };
                let text = text.trim();
                if text.is_empty() || !seen.insert(normalize_label(text)) {
                    continue;
                }
                let (name, delta) = parse_option_label(text);
                names.push(name);
                price_deltas.push(delta);
                let disabled = matches!(
                    page.attribute(&item, "aria-disabled").await,
                    Ok(Some(value)) if value == "true"
                );
                if !disabled {
                    selectable.push(item);
                }
            }
            if names.is_empty() {
                continue;
            }
            debug!("[{}] option {} has {} choices", code, category, names.len());
            groups.push(OptionGroup {
                category,
                names,
                price_deltas,
            });

            if !selectable.is_empty() {
                let pick = &selectable[fastrand::usize(..selectable.len())];
                if let Err(e) = page.click(pick).await {
                    debug!("[{}] option choice click failed: {}", code, e);
                }
                settle(self.timing.after_click).await;
            }
        }
        groups
    }

    async fn option_category(
        &self,
        page: &dyn BrowserPage,
        element: &ElementHandle,
        ordinal: usize,
    ) -> String {
        let label = match page.attribute(element, "aria-label").await {
            Ok(Some(label)) if !label.trim().is_empty() => label,
            _ => page.inner_text(element).await.unwrap_or_default(),
        };
        let label = label.trim();
        if label.is_empty() || label == "선택" {
            format!("옵션{ordinal}")
        } else {
            label.to_string()
        }
    }

    async fn wait_for_listbox(&self, page: &dyn BrowserPage) -> Option<ElementHandle> {
        let listbox = [self.selectors.option_listbox.as_str()];
        let deadline = Instant::now() + self.timing.ready_timeout;
        loop {
            if let Some(found) = SelectorResolver::document(page).find_first(&listbox).await {
                return Some(found);
            }
            if Instant::now() >= deadline {
                return None;
            }
            settle(self.timing.ready_poll).await;
        }
    }

    async fn preloaded_price(&self, page: &dyn BrowserPage) -> Option<u64> {
        let info = match page.execute(PRELOADED_PRICE_SCRIPT, Vec::new()).await {
            Ok(info) => info,
            Err(e) => {
                debug!("preloaded state price unavailable: {}", e);
                return None;
            }
        };
        PRELOADED_PRICE_KEYS
            .iter()
            .find_map(|key| info.get(key).and_then(normalize_price_value))
    }

    /// Representative image plus the extras sharing its file-name prefix
    async fn images(&self, page: &dyn BrowserPage) -> (Option<String>, Vec<String>) {
        let resolver = SelectorResolver::document(page);
        let mut elements = resolver.find_all(&self.selectors.main_image).await;
        let thumbnails = resolver.find_all(&self.selectors.thumbnails).await;
        if thumbnails.is_empty() {
            elements.extend(
                resolver
                    .find_all(&[self.selectors.any_product_image.as_str()])
                    .await,
            );
        } else {
            elements.extend(thumbnails);
        }

        let mut urls = Vec::new();
        for element in &elements {
            if let Ok(Some(src)) = page.attribute(element, "src").await {
                if !src.trim().is_empty() {
                    urls.push(src.trim().to_string());
                }
            }
        }

        let groups = classify_images(&urls);
        let mut common = groups.common.into_iter();
        match common.next() {
            Some(main) => (
                Some(main.replace(MAIN_IMAGE_SUFFIX, "")),
                common.collect(),
            ),
            None => {
                let fallback = resolver
                    .first_attribute(&self.selectors.image_fallback, "src")
                    .await
                    .map(|src| src.replace(MAIN_IMAGE_SUFFIX, ""));
                (fallback, Vec::new())
            }
        }
    }

    /// Expands the collapsed detail section when a toggle asks for it
    async fn expand_detail_section(&self, page: &dyn BrowserPage) {
        let resolver = SelectorResolver::document(page);
        'search: for (position, selector) in self.selectors.detail_toggle.iter().enumerate() {
            for toggle in resolver.find_all(&[selector.as_str()]).await {
                let collapsed = matches!(
                    page.attribute(&toggle, "aria-expanded").await,
                    Ok(Some(value)) if value == "false"
                );
                let label = page.inner_text(&toggle).await.unwrap_or_default();
                let labelled = self
                    .selectors
                    .detail_toggle_labels
                    .iter()
                    .any(|l| label.contains(l.as_str()))
                    && !label.contains("접기");
                if (position == 0 && collapsed) || labelled {
                    if let Err(e) = page.click(&toggle).await {
                        debug!("detail toggle click failed: {}", e);
                    }
                    settle(self.timing.after_click).await;
                    break 'search;
                }
            }
        }

        let section = [self.selectors.detail_section.as_str()];
        if let Some(section) = resolver.find_first(&section).await {
            if let Err(e) = page.scroll_into_view(&section).await {
                debug!("scroll to detail section failed: {}", e);
            }
        }
    }

    async fn content(&self, page: &dyn BrowserPage, code: &str) -> Option<ContentFragment> {
        self.expand_detail_section(page).await;

        let Some((element, selector)) = SelectorResolver::document(page)
            .find_first_with_selector(&self.selectors.content)
            .await
        else {
            warn!("[CONTENT][{}] detail content not found", code);
            self.artifacts
                .save_snapshot(page, &format!("content_{code}"))
                .await;
            return None;
        };
        debug!("[CONTENT][{}] content matched {}", code, selector);

        let raw = page.inner_html(&element).await.unwrap_or_default();
        if raw.trim().is_empty() {
            warn!("[CONTENT][{}] detail content is empty", code);
            self.artifacts
                .save_snapshot(page, &format!("content_empty_{code}"))
                .await;
            return None;
        }

        match self.sanitizer.sanitize(&raw, code) {
            SanitizeOutcome::Placeholder => None,
            SanitizeOutcome::Empty => {
                warn!("[CONTENT][{}] nothing usable after cleanup", code);
                self.artifacts.save_html(code, &raw, "fallback_failed");
                None
            }
            outcome => {
                let fragment = outcome.into_fragment()?;
                self.artifacts
                    .dump_content(code, &fragment.html, fragment.source.label());
                Some(fragment)
            }
        }
    }

    /// Delivery element text first, then the whole body; 0 when neither
    /// mentions a fee
    async fn shipping_fee(&self, page: &dyn BrowserPage) -> u64 {
        let resolver = SelectorResolver::document(page);
        for selector in &self.selectors.shipping_fee {
            if let Some(fee) = resolver
                .first_text(&[selector.as_str()])
                .await
                .and_then(|text| shipping_fee_from_text(&text))
            {
                return fee;
            }
        }
        if let Some(body) = resolver.find_first(&["body"]).await {
            if let Some(fee) = page
                .inner_text(&body)
                .await
                .ok()
                .and_then(|text| shipping_fee_from_body(&text))
            {
                return fee;
            }
        }
        warn!("⚠️ Shipping fee not found, using 0");
        self.artifacts.save_snapshot(page, "shipping_fee").await;
        0
    }
}
