//! Pagination bar reading
//!
//! Everything the navigator needs to know about the listing page is read
//! here: the current page, the numbered links on display and the list
//! signature used to notice that the product grid re-rendered.

use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::domain::pagination::{
    ListSignature, PageNumber, exact_page_label, leading_page_number, page_from_filter_attr,
    page_from_query,
};
use crate::infrastructure::browser::{BrowserPage, ElementHandle};
use crate::infrastructure::config::PaginationTiming;
use crate::infrastructure::parsing::PaginationSelectors;
use crate::infrastructure::selector_resolver::SelectorResolver;

pub(crate) async fn settle(duration: Duration) {
    if !duration.is_zero() {
        sleep(duration).await;
    }
}

#[derive(Clone, Copy)]
pub struct PaginationReader<'a> {
    page: &'a dyn BrowserPage,
    selectors: &'a PaginationSelectors,
    timing: &'a PaginationTiming,
}

impl<'a> PaginationReader<'a> {
    pub fn new(
        page: &'a dyn BrowserPage,
        selectors: &'a PaginationSelectors,
        timing: &'a PaginationTiming,
    ) -> Self {
        Self {
            page,
            selectors,
            timing,
        }
    }

    pub fn page(&self) -> &'a dyn BrowserPage {
        self.page
    }

    pub fn selectors(&self) -> &'a PaginationSelectors {
        self.selectors
    }

    pub async fn container(&self) -> Option<ElementHandle> {
        SelectorResolver::document(self.page)
            .find_first(&self.selectors.container)
            .await
    }

    /// Brings the pagination bar into the viewport so it renders
    pub async fn scroll_to_pagination(&self) {
        if let Err(e) = self.page.scroll_to_bottom().await {
            debug!("scroll to bottom failed: {}", e);
        }
        if let Some(container) = self.container().await {
            if let Err(e) = self.page.scroll_into_view(&container).await {
                debug!("scroll to pagination failed: {}", e);
            }
        }
        settle(self.timing.scroll_settle).await;
    }

    /// Polls until the container holds at least one link or button.
    /// Checks at least once, even with a zero timeout.
    pub async fn wait_until_ready(&self) -> bool {
        let deadline = Instant::now() + self.timing.ready_timeout;
        loop {
            if let Some(container) = self.container().await {
                let marker = [self.selectors.ready_marker.as_str()];
                let ready = !SelectorResolver::within(self.page, &container)
                    .find_all(&marker)
                    .await
                    .is_empty();
                if ready {
                    return true;
                }
            }
            if Instant::now() >= deadline {
                debug!("pagination not ready after {:?}", self.timing.ready_timeout);
                return false;
            }
            settle(self.timing.ready_poll).await;
        }
    }

    /// Current page, strongest signal first: the container's filter
    /// attribute, its current item, a document wide current marker, then
    /// the URL query
    pub async fn current_page(&self) -> Option<PageNumber> {
        if let Some(container) = self.container().await {
            if let Ok(Some(raw)) = self
                .page
                .attribute(&container, &self.selectors.filter_attribute)
                .await
            {
                if let Some(page) = page_from_filter_attr(&raw) {
                    return Some(page);
                }
            }
            let current = [self.selectors.container_current.as_str()];
            if let Some(page) = SelectorResolver::within(self.page, &container)
                .first_text(&current)
                .await
                .and_then(|text| leading_page_number(&text))
            {
                return Some(page);
            }
        }

        if let Some(page) = SelectorResolver::document(self.page)
            .first_text(&self.selectors.document_current)
            .await
            .and_then(|text| leading_page_number(&text))
        {
            return Some(page);
        }

        self.page
            .current_url()
            .await
            .ok()
            .and_then(|url| page_from_query(&url))
    }

    pub async fn list_signature(&self) -> Option<ListSignature> {
        let selector = [self.selectors.list_signature.as_str()];
        SelectorResolver::document(self.page)
            .first_attribute(&selector, "href")
            .await
            .map(ListSignature)
    }

    /// Polls the list signature until it differs from `before`
    pub async fn wait_for_signature_change(&self, before: Option<&ListSignature>) -> bool {
        for _ in 0..self.timing.signature_polls.max(1) {
            let now = self.list_signature().await;
            if ListSignature::changed(before, now.as_ref()) {
                return true;
            }
            settle(self.timing.signature_poll).await;
        }
        false
    }

    /// Numbered links on display, first hit per page number.
    ///
    /// Links inside the container win; the document wide selectors are only
    /// consulted when the container has none.
    pub async fn visible_page_links(&self) -> Vec<(PageNumber, ElementHandle)> {
        if let Some(container) = self.container().await {
            let scoped = SelectorResolver::within(self.page, &container);
            let links = self.numbered(scoped, &self.selectors.container_links).await;
            if !links.is_empty() {
                return links;
            }
        }
        let document = SelectorResolver::document(self.page);
        self.numbered(document, &self.selectors.document_links).await
    }

    async fn numbered(
        &self,
        resolver: SelectorResolver<'_>,
        selectors: &[String],
    ) -> Vec<(PageNumber, ElementHandle)> {
        for selector in selectors {
            let mut links: Vec<(PageNumber, ElementHandle)> = Vec::new();
            for element in resolver.find_all(&[selector.as_str()]).await {
                let Ok(text) = self.page.inner_text(&element).await else {
                    continue;
                };
                if let Some(page) = exact_page_label(&text) {
                    if !links.iter().any(|(seen, _)| *seen == page) {
                        links.push((page, element));
                    }
                }
            }
            if !links.is_empty() {
                return links;
            }
        }
        Vec::new()
    }

    pub async fn page_labels(&self) -> Vec<PageNumber> {
        self.visible_page_links()
            .await
            .into_iter()
            .map(|(page, _)| page)
            .collect()
    }

    pub async fn find_page_link(&self, target: PageNumber) -> Option<ElementHandle> {
        self.visible_page_links()
            .await
            .into_iter()
            .find(|(page, _)| *page == target)
            .map(|(_, element)| element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeStorefront, PaginationMarkers, StaticPage, open_listing};
    use std::sync::Arc;

    fn fixtures() -> (PaginationSelectors, PaginationTiming) {
        (PaginationSelectors::default(), PaginationTiming::immediate())
    }

    #[tokio::test]
    async fn reads_page_from_filter_attribute_first() {
        let storefront = Arc::new(FakeStorefront::new(23, 3));
        let page = open_listing(&storefront, 14).await;
        let (selectors, timing) = fixtures();
        let reader = PaginationReader::new(&page, &selectors, &timing);

        assert!(reader.wait_until_ready().await);
        assert_eq!(reader.current_page().await, Some(14));
        assert_eq!(reader.page_labels().await, (11..=20).collect::<Vec<_>>());
        assert!(reader.find_page_link(17).await.is_some());
        assert!(reader.find_page_link(21).await.is_none());
    }

    #[tokio::test]
    async fn falls_back_to_aria_current_then_query() {
        let markers = PaginationMarkers {
            filter_attr: false,
            aria_current: true,
            page_in_url: false,
        };
        let storefront = Arc::new(FakeStorefront::new(5, 2).with_markers(markers));
        let page = open_listing(&storefront, 4).await;
        let (selectors, timing) = fixtures();
        let reader = PaginationReader::new(&page, &selectors, &timing);
        assert_eq!(reader.current_page().await, Some(4));

        let bare = StaticPage::with_url(
            "<ul><li>no pagination</li></ul>",
            "https://smartstore.naver.com/shop/category/ALL?pageIndex=7",
        );
        let reader = PaginationReader::new(&bare, &selectors, &timing);
        assert_eq!(reader.current_page().await, Some(7));
        assert!(!reader.wait_until_ready().await);
    }

    #[tokio::test]
    async fn signature_tracks_first_product_link() {
        let storefront = Arc::new(FakeStorefront::new(3, 2));
        let page = open_listing(&storefront, 1).await;
        let (selectors, timing) = fixtures();
        let reader = PaginationReader::new(&page, &selectors, &timing);

        let before = reader.list_signature().await;
        assert_eq!(
            before.as_ref().map(|s| s.0.as_str()),
            Some("/fakeshop/products/1000")
        );
        assert!(!reader.wait_for_signature_change(before.as_ref()).await);

        let link = reader.find_page_link(2).await.unwrap();
        page.click(&link).await.unwrap();
        assert!(reader.wait_for_signature_change(before.as_ref()).await);
    }
}
