//! Ordered selector fallback
//!
//! Storefront markup drifts, so every lookup carries a list of selectors,
//! most specific first. A selector that errors or matches nothing is logged
//! at debug level and the next one is tried; exhaustion is `None`/empty,
//! never an error.

use tracing::debug;

use super::browser::{BrowserPage, ElementHandle, Locator};

#[derive(Clone, Copy)]
pub struct SelectorResolver<'a> {
    page: &'a dyn BrowserPage,
    scope: Option<&'a ElementHandle>,
}

impl<'a> SelectorResolver<'a> {
    /// Queries against the whole document
    pub fn document(page: &'a dyn BrowserPage) -> Self {
        Self { page, scope: None }
    }

    /// Queries below `scope`
    pub fn within(page: &'a dyn BrowserPage, scope: &'a ElementHandle) -> Self {
        Self {
            page,
            scope: Some(scope),
        }
    }

    pub fn page(&self) -> &'a dyn BrowserPage {
        self.page
    }

    async fn query(&self, selector: &str) -> Vec<ElementHandle> {
        let locator = Locator::parse(selector);
        match self.page.find_elements(self.scope, &locator).await {
            Ok(found) => {
                if found.is_empty() {
                    debug!("selector miss: {}", locator);
                }
                found
            }
            Err(e) => {
                debug!("selector skipped: {} ({})", locator, e);
                Vec::new()
            }
        }
    }

    /// First element of the first selector that matches
    pub async fn find_first<S>(&self, selectors: &[S]) -> Option<ElementHandle>
    where
        S: AsRef<str> + Sync,
    {
        self.find_first_with_selector(selectors)
            .await
            .map(|(element, _)| element)
    }

    /// Same as `find_first`, also naming the selector that hit
    pub async fn find_first_with_selector<S>(
        &self,
        selectors: &[S],
    ) -> Option<(ElementHandle, String)>
    where
        S: AsRef<str> + Sync,
    {
        for selector in selectors {
            let selector = selector.as_ref();
            if let Some(element) = self.query(selector).await.into_iter().next() {
                return Some((element, selector.to_string()));
            }
        }
        None
    }

    /// All matches of the first selector with a non-empty result
    pub async fn find_all<S>(&self, selectors: &[S]) -> Vec<ElementHandle>
    where
        S: AsRef<str> + Sync,
    {
        for selector in selectors {
            let found = self.query(selector.as_ref()).await;
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    /// Trimmed text of the first match whose text is not blank
    pub async fn first_text<S>(&self, selectors: &[S]) -> Option<String>
    where
        S: AsRef<str> + Sync,
    {
        for selector in selectors {
            let selector = selector.as_ref();
            for element in self.query(selector).await {
                match self.page.inner_text(&element).await {
                    Ok(text) if !text.trim().is_empty() => return Some(text.trim().to_string()),
                    Ok(_) => {}
                    Err(e) => debug!("text read failed for {}: {}", selector, e),
                }
            }
        }
        None
    }

    /// First non-blank value of `attribute` among the matches
    pub async fn first_attribute<S>(&self, selectors: &[S], attribute: &str) -> Option<String>
    where
        S: AsRef<str> + Sync,
    {
        for selector in selectors {
            for element in self.query(selector.as_ref()).await {
                if let Ok(Some(value)) = self.page.attribute(&element, attribute).await {
                    if !value.trim().is_empty() {
                        return Some(value.trim().to_string());
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StaticPage;

    const HTML: &str = r#"
        <div id="list">
            <a class="card" href="/products/1"><strong>First</strong></a>
            <a class="card" href="/products/2"><strong> </strong></a>
        </div>
        <span data-testid="PRODUCT_CARD_PRICE">12,000원</span>
    "#;

    #[tokio::test]
    async fn first_hit_wins_and_misses_fall_through() {
        let page = StaticPage::new(HTML);
        let resolver = SelectorResolver::document(&page);

        let (_, selector) = resolver
            .find_first_with_selector(&["div.missing", "[[broken", "a.card"])
            .await
            .unwrap();
        assert_eq!(selector, "a.card");
        assert_eq!(resolver.find_all(&["nav a", "a.card"]).await.len(), 2);
        assert!(resolver.find_first(&["table", "xpath=//table"]).await.is_none());
    }

    #[tokio::test]
    async fn scoped_queries_stay_inside_scope() {
        let page = StaticPage::new(HTML);
        let list = SelectorResolver::document(&page).find_first(&["#list"]).await.unwrap();
        let scoped = SelectorResolver::within(&page, &list);

        assert!(scoped.find_first(&["[data-testid='PRODUCT_CARD_PRICE']"]).await.is_none());
        assert_eq!(scoped.first_text(&["strong"]).await.as_deref(), Some("First"));
        assert_eq!(
            scoped.first_attribute(&["a.card"], "href").await.as_deref(),
            Some("/products/1")
        );
    }
}
