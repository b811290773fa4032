//! Explicit run context
//!
//! `CrawlContext` carries the read-only inputs of one run; `CrawlSession`
//! adds the browser handles and the mutable state: URLs already visited and
//! the rows captured for the current page group.

use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::errors::NavigationError;
use super::pagination_navigator::{NavigatorConfig, PaginationNavigator};
use super::product_detail_extractor::ProductDetailExtractor;
use super::product_list_extractor::ProductListExtractor;
use crate::domain::{ListingCard, NavigationReport, PageNumber, ProductRecord};
use crate::infrastructure::browser::{BrowserPage, BrowserSession};
use crate::infrastructure::config::{CrawlerSettings, PaginationTiming};
use crate::infrastructure::debug_artifacts::DebugArtifacts;
use crate::infrastructure::parsing::{ContentSanitizer, StorefrontSelectors};
use crate::infrastructure::selector_resolver::SelectorResolver;
use crate::infrastructure::spreadsheet::CategoryLookup;

/// Read-only inputs of one run
pub struct CrawlContext {
    pub settings: CrawlerSettings,
    pub selectors: StorefrontSelectors,
    pub timing: PaginationTiming,
    pub lookup: CategoryLookup,
    pub artifacts: DebugArtifacts,
}

impl CrawlContext {
    pub fn new(settings: CrawlerSettings, lookup: CategoryLookup) -> Self {
        Self {
            artifacts: DebugArtifacts::from_settings(&settings),
            settings,
            selectors: StorefrontSelectors::default(),
            timing: PaginationTiming::default(),
            lookup,
        }
    }

    pub fn with_timing(mut self, timing: PaginationTiming) -> Self {
        self.timing = timing;
        self
    }

    fn product_limit(&self) -> usize {
        self.settings.max_products_per_page as usize
    }

    fn total_limit(&self) -> usize {
        self.settings.max_products_total as usize
    }
}

/// Counters of one listing page
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageCrawlSummary {
    pub cards: usize,
    pub captured: usize,
    pub skipped: usize,
    /// The page repeated a product already seen; crawling of it stopped
    pub hit_duplicate: bool,
}

pub struct CrawlSession<'a, S: BrowserSession> {
    context: &'a CrawlContext,
    browser: &'a S,
    listing: &'a dyn BrowserPage,
    seen_urls: HashSet<String>,
    rows: Vec<ProductRecord>,
    captured_total: usize,
}

impl<'a, S: BrowserSession> CrawlSession<'a, S> {
    pub fn new(context: &'a CrawlContext, browser: &'a S, listing: &'a dyn BrowserPage) -> Self {
        Self {
            context,
            browser,
            listing,
            seen_urls: HashSet::new(),
            rows: Vec::new(),
            captured_total: 0,
        }
    }

    pub fn navigator(&self) -> PaginationNavigator<'a> {
        let context = self.context;
        PaginationNavigator::new(
            self.listing,
            &context.selectors.pagination,
            &context.timing,
            NavigatorConfig::from_settings(&context.settings),
        )
        .with_artifacts(&context.artifacts)
    }

    pub async fn go_to_page(&self, target: PageNumber) -> Result<NavigationReport, NavigationError> {
        self.navigator().go_to_page(target).await
    }

    /// Rows captured since the last call, in capture order
    pub fn take_rows(&mut self) -> Vec<ProductRecord> {
        std::mem::take(&mut self.rows)
    }

    pub fn captured_total(&self) -> usize {
        self.captured_total
    }

    pub fn total_limit_reached(&self) -> bool {
        let limit = self.context.total_limit();
        limit > 0 && self.captured_total >= limit
    }

    /// Visits every card of the listing page on display
    pub async fn crawl_current_page(&mut self) -> PageCrawlSummary {
        let context = self.context;
        let cards = ProductListExtractor::new(self.listing, &context.selectors.product_list)
            .with_artifacts(&context.artifacts)
            .extract_cards(context.product_limit())
            .await;
        let mut summary = PageCrawlSummary {
            cards: cards.len(),
            ..PageCrawlSummary::default()
        };

        for card in &cards {
            if self.total_limit_reached() {
                info!("🛑 Reached MAX_PRODUCTS_TOTAL ({})", context.total_limit());
                break;
            }
            if !self.seen_urls.insert(card.url.clone()) {
                warn!("⚠️ Product {} seen before, stopping this page", card.url);
                summary.hit_duplicate = true;
                break;
            }
            match self.visit_product(card).await {
                Some(record) => {
                    self.rows.push(record);
                    self.captured_total += 1;
                    summary.captured += 1;
                }
                None => summary.skipped += 1,
            }
        }
        summary
    }

    /// Extracts one product in its own tab; the tab is closed either way
    async fn visit_product(&self, card: &ListingCard) -> Option<ProductRecord> {
        let context = self.context;
        let tab = match self.browser.new_page().await {
            Ok(tab) => tab,
            Err(e) => {
                warn!("⚠️ Could not open a tab for {}: {}", card.url, e);
                return None;
            }
        };
        let sanitizer = ContentSanitizer::new().with_document_wrap(context.settings.wrap_content_html);
        let extractor = ProductDetailExtractor::new(
            &context.selectors.product_detail,
            &context.lookup,
            &context.timing,
            &context.artifacts,
        )
        .with_sanitizer(sanitizer);

        let result = extractor.extract(&tab, card).await;
        if let Err(e) = tab.close().await {
            debug!("closing product tab failed: {}", e);
        }
        match result {
            Ok(record) => {
                info!(
                    "✅ {} | {} | shipping {} | total {}",
                    record.title, record.price, record.shipping_fee, record.total_price
                );
                Some(record)
            }
            Err(e) => {
                warn!("⚠️ Skipping {}: {}", card.url, e);
                None
            }
        }
    }

    /// Opens the first product of the page and checks where it lands.
    /// Leaves the listing page on the product.
    pub async fn verify_first_product(&self) -> bool {
        let context = self.context;
        let page = self.listing;
        let signature = [context.selectors.pagination.list_signature.as_str()];
        let Some(link) = SelectorResolver::document(page).find_first(&signature).await else {
            warn!("⚠️ VERIFY: no product link on the page");
            return false;
        };
        if let Err(e) = page.click(&link).await {
            warn!("⚠️ VERIFY: click failed: {}", e);
            return false;
        }
        if let Err(e) = page.wait_for_load(context.timing.load_timeout).await {
            debug!("load wait after verify click: {}", e);
        }

        let final_url = page.current_url().await.unwrap_or_default();
        let url_ok = context
            .settings
            .verify_first_product_url
            .as_deref()
            .is_none_or(|expected| final_url.contains(expected));

        let name_ok = match context.settings.verify_first_product_name.as_deref() {
            None => true,
            Some(expected) => {
                let body = match SelectorResolver::document(page).find_first(&["body"]).await {
                    Some(body) => page.inner_text(&body).await.unwrap_or_default(),
                    None => String::new(),
                };
                body.contains(expected)
            }
        };
        info!(
            "VERIFY_RESULT: url={} url_ok={} name_ok={}",
            final_url, url_ok, name_ok
        );
        url_ok && name_ok
    }
}
