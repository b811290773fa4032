//! Listing page product cards
//!
//! Reads title, price and product URL from every card of the current
//! listing page, in display order.

use tracing::{debug, info, warn};

use crate::domain::ListingCard;
use crate::domain::pricing::extract_price_from_text;
use crate::infrastructure::browser::{BrowserPage, ElementHandle};
use crate::infrastructure::debug_artifacts::DebugArtifacts;
use crate::infrastructure::parsing::ProductListSelectors;
use crate::infrastructure::selector_resolver::SelectorResolver;

pub struct ProductListExtractor<'a> {
    page: &'a dyn BrowserPage,
    selectors: &'a ProductListSelectors,
    artifacts: Option<&'a DebugArtifacts>,
}

impl<'a> ProductListExtractor<'a> {
    pub fn new(page: &'a dyn BrowserPage, selectors: &'a ProductListSelectors) -> Self {
        Self {
            page,
            selectors,
            artifacts: None,
        }
    }

    pub fn with_artifacts(mut self, artifacts: &'a DebugArtifacts) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Cards of the current page; `limit` 0 means all of them.
    ///
    /// Cards without a product link are skipped. An empty page saves an
    /// HTML snapshot for inspection.
    pub async fn extract_cards(&self, limit: usize) -> Vec<ListingCard> {
        let mut elements = SelectorResolver::document(self.page)
            .find_all(&self.selectors.product_card)
            .await;
        if elements.is_empty() {
            warn!("⚠️ No product cards found on the listing page");
            if let Some(artifacts) = self.artifacts {
                artifacts.save_snapshot(self.page, "product_list").await;
            }
            return Vec::new();
        }
        info!("📦 Found {} product cards", elements.len());
        if limit > 0 && elements.len() > limit {
            elements.truncate(limit);
        }

        let mut cards = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            match self.read_card(element).await {
                Some(card) => cards.push(card),
                None => debug!("card {} has no product link, skipped", index + 1),
            }
        }
        cards
    }

    async fn read_card(&self, element: &ElementHandle) -> Option<ListingCard> {
        let scoped = SelectorResolver::within(self.page, element);
        let href = scoped
            .first_attribute(&self.selectors.product_link, "href")
            .await?;
        let card_text = self.page.inner_text(element).await.unwrap_or_default();

        let title = match scoped.first_text(&self.selectors.title).await {
            Some(title) => title,
            None => card_text.lines().next().unwrap_or_default().trim().to_string(),
        };
        let price_text = scoped
            .first_text(&self.selectors.price)
            .await
            .unwrap_or(card_text);

        Some(ListingCard::new(
            &title,
            extract_price_from_text(&price_text),
            self.absolute_url(&href),
        ))
    }

    fn absolute_url(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            return href.to_string();
        }
        match url::Url::parse(&self.selectors.base_url).and_then(|base| base.join(href)) {
            Ok(joined) => joined.to_string(),
            Err(_) => format!("{}{}", self.selectors.base_url.trim_end_matches('/'), href),
        }
    }
}
