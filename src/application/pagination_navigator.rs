//! Pagination state machine
//!
//! Moves the listing page to a target page number. The bar shows ten pages
//! at a time, so navigation is two phases: hop groups with the arrow
//! controls until the target label is visible, then click it. When the page
//! number cannot be read back, a changed product list is accepted as
//! success. Stepping one page at a time is the last resort.

use std::fmt;
use tracing::{debug, info, warn};

use super::errors::NavigationError;
use super::pagination_reader::{PaginationReader, settle};
use crate::domain::pagination::{
    NavigationOutcome, NavigationReport, PAGE_QUERY_KEYS, PageNumber, with_query_param,
};
use crate::infrastructure::browser::{BrowserPage, ElementHandle};
use crate::infrastructure::config::{CrawlerSettings, PaginationStrategy, PaginationTiming};
use crate::infrastructure::debug_artifacts::DebugArtifacts;
use crate::infrastructure::parsing::PaginationSelectors;
use crate::infrastructure::selector_resolver::SelectorResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Next => f.write_str("next"),
            Self::Prev => f.write_str("prev"),
        }
    }
}

/// Run settings the navigator depends on
#[derive(Debug, Clone)]
pub struct NavigatorConfig {
    pub strategy: PaginationStrategy,
    pub max_group_hops: u32,
    /// Try `?page=N` style URLs before stepping
    pub page_jump_by_query: bool,
    pub listing_url: String,
}

impl NavigatorConfig {
    pub fn from_settings(settings: &CrawlerSettings) -> Self {
        Self {
            strategy: settings.pagination_strategy,
            max_group_hops: settings.max_group_hops,
            page_jump_by_query: settings.page_jump_by_query,
            listing_url: settings.listing_url.clone(),
        }
    }
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self::from_settings(&CrawlerSettings::default())
    }
}

/// Clicks spent on one request
#[derive(Debug, Default)]
struct Progress {
    clicks: u32,
    group_hops: u32,
}

impl Progress {
    fn report(&self, target: PageNumber, outcome: NavigationOutcome) -> NavigationReport {
        NavigationReport {
            target,
            outcome,
            group_hops: self.group_hops,
            clicks: self.clicks,
        }
    }
}

pub struct PaginationNavigator<'a> {
    reader: PaginationReader<'a>,
    timing: &'a PaginationTiming,
    config: NavigatorConfig,
    artifacts: Option<&'a DebugArtifacts>,
}

impl<'a> PaginationNavigator<'a> {
    pub fn new(
        page: &'a dyn BrowserPage,
        selectors: &'a PaginationSelectors,
        timing: &'a PaginationTiming,
        config: NavigatorConfig,
    ) -> Self {
        Self {
            reader: PaginationReader::new(page, selectors, timing),
            timing,
            config,
            artifacts: None,
        }
    }

    pub fn with_artifacts(mut self, artifacts: &'a DebugArtifacts) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn reader(&self) -> &PaginationReader<'a> {
        &self.reader
    }

    fn page(&self) -> &'a dyn BrowserPage {
        self.reader.page()
    }

    /// Navigates to `target`.
    ///
    /// Calling it again for the page already on display clicks nothing.
    pub async fn go_to_page(&self, target: PageNumber) -> Result<NavigationReport, NavigationError> {
        if target == 0 {
            return Err(NavigationError::InvalidTarget(target));
        }
        let mut progress = Progress::default();

        self.reader.scroll_to_pagination().await;
        self.reader.wait_until_ready().await;
        self.shot("detect").await;

        let current = self.reader.current_page().await;
        info!("🔍 Pagination: current page {:?}, target {}", current, target);
        if current == Some(target) {
            return Ok(progress.report(target, NavigationOutcome::AlreadyThere));
        }

        if self.config.strategy == PaginationStrategy::NextOnly {
            return self.next_only(target, current, &mut progress).await;
        }

        self.ensure_group(target, &mut progress).await?;
        if self.reader.current_page().await == Some(target) {
            return Ok(progress.report(target, NavigationOutcome::Confirmed));
        }

        if let Some(report) = self.click_page_link(target, &mut progress).await {
            return Ok(report);
        }

        if self.config.page_jump_by_query {
            if let Some(report) = self.jump_by_query(target, &progress).await {
                return Ok(report);
            }
        }

        self.step_towards(target, &mut progress).await
    }

    /// Direct clicks on the numbered link
    async fn click_page_link(
        &self,
        target: PageNumber,
        progress: &mut Progress,
    ) -> Option<NavigationReport> {
        for attempt in 1..=self.timing.direct_click_attempts {
            let Some(link) = self.reader.find_page_link(target).await else {
                debug!("page link {} not visible (attempt {})", target, attempt);
                return None;
            };
            let before = self.reader.list_signature().await;
            if let Err(e) = self.click(&link, progress).await {
                warn!("⚠️ Click on page {} failed (attempt {}): {}", target, attempt, e);
                self.reader.scroll_to_pagination().await;
                continue;
            }
            self.shot(&format!("after_click_{target}")).await;

            let read = self.reader.current_page().await;
            if read == Some(target) {
                info!("✅ Moved to page {} by direct click", target);
                return Some(progress.report(target, NavigationOutcome::Confirmed));
            }
            if read.is_none() && self.reader.wait_for_signature_change(before.as_ref()).await {
                info!("✅ Page {} unreadable but the list changed", target);
                return Some(progress.report(target, NavigationOutcome::ListChanged));
            }
            debug!("after clicking {} the page reads {:?}", target, read);
            self.reader.scroll_to_pagination().await;
        }
        None
    }

    async fn jump_by_query(
        &self,
        target: PageNumber,
        progress: &Progress,
    ) -> Option<NavigationReport> {
        let value = target.to_string();
        for key in PAGE_QUERY_KEYS {
            let Some(url) = with_query_param(&self.config.listing_url, key, Some(&value)) else {
                continue;
            };
            debug!("query jump to {}", url);
            if let Err(e) = self.page().goto(&url).await {
                warn!("⚠️ Query jump via '{}' failed: {}", key, e);
                continue;
            }
            if let Err(e) = self.page().wait_for_load(self.timing.load_timeout).await {
                debug!("load wait after query jump: {}", e);
            }
            self.reader.scroll_to_pagination().await;
            self.reader.wait_until_ready().await;
            if self.reader.current_page().await == Some(target) {
                info!("✅ Moved to page {} via ?{}=", target, key);
                return Some(progress.report(target, NavigationOutcome::Confirmed));
            }
        }
        None
    }

    /// Hops groups until `target` is among the visible labels. A missing
    /// or unclickable arrow control ends the hopping without failing.
    async fn ensure_group(
        &self,
        target: PageNumber,
        progress: &mut Progress,
    ) -> Result<(), NavigationError> {
        for hop in 1..=self.config.max_group_hops {
            let labels = self.reader.page_labels().await;
            if labels.contains(&target) {
                return Ok(());
            }
            let direction = match (labels.iter().min(), labels.iter().max()) {
                (Some(&min), Some(&max)) => {
                    if target > max {
                        Direction::Next
                    } else if target < min {
                        Direction::Prev
                    } else {
                        return Ok(());
                    }
                }
                _ => match self.reader.current_page().await {
                    Some(current) if current > target => Direction::Prev,
                    _ => Direction::Next,
                },
            };

            let Some(control) = self.find_control(direction).await else {
                warn!("⚠️ No {} control, staying in the current group", direction);
                return Ok(());
            };
            let before = self.reader.list_signature().await;
            if let Err(e) = self.click(&control, progress).await {
                warn!(
                    "⚠️ Group hop {} ({}) failed, staying in the current group: {}",
                    hop, direction, e
                );
                return Ok(());
            }
            progress.group_hops += 1;
            info!("⏩ Group hop {} ({}) toward page {}", hop, direction, target);

            if !self.reader.wait_for_signature_change(before.as_ref()).await {
                debug!("list unchanged after group hop {}", hop);
            }
            self.reader.scroll_to_pagination().await;
            self.reader.wait_until_ready().await;
            self.shot(&format!("group_hop_{hop}")).await;
        }
        warn!(
            "⚠️ Group hop limit ({}) reached toward page {}",
            self.config.max_group_hops, target
        );
        Ok(())
    }

    /// One page at a time, adjacent link first, arrow otherwise
    async fn step_towards(
        &self,
        target: PageNumber,
        progress: &mut Progress,
    ) -> Result<NavigationReport, NavigationError> {
        let Some(mut current) = self.reader.current_page().await else {
            return Err(NavigationError::PageUnreadable { target });
        };
        let budget = self.timing.step_budget(current, target);
        info!("🚶 Stepping from page {} to {} (budget {})", current, target, budget);

        for _ in 0..budget {
            if current == target {
                return Ok(progress.report(target, NavigationOutcome::Confirmed));
            }
            let (direction, adjacent) = if target > current {
                (Direction::Next, current + 1)
            } else {
                (Direction::Prev, current - 1)
            };
            let control = match self.reader.find_page_link(adjacent).await {
                Some(link) => link,
                None => self.find_control(direction).await.ok_or_else(|| {
                    NavigationError::NoControl {
                        target,
                        direction: direction.to_string(),
                    }
                })?,
            };
            let before = self.reader.list_signature().await;
            self.click(&control, progress).await?;
            self.reader.wait_for_signature_change(before.as_ref()).await;
            self.reader.scroll_to_pagination().await;
            current = self
                .reader
                .current_page()
                .await
                .ok_or(NavigationError::PageUnreadable { target })?;
        }

        if current == target {
            return Ok(progress.report(target, NavigationOutcome::Confirmed));
        }
        Err(NavigationError::BudgetExhausted {
            target,
            budget,
            last: Some(current),
        })
    }

    /// `next_only` strategy: click "next" until the target is reached.
    /// An unreadable page counts as one step forward.
    async fn next_only(
        &self,
        target: PageNumber,
        current: Option<PageNumber>,
        progress: &mut Progress,
    ) -> Result<NavigationReport, NavigationError> {
        let mut exact = current.is_some();
        let mut current = current.unwrap_or(1);
        if current > target {
            return Err(NavigationError::Unreachable { target, current });
        }
        let budget = self.timing.step_budget(current, target);

        for _ in 0..budget {
            if current >= target {
                break;
            }
            let control = self.find_control(Direction::Next).await.ok_or_else(|| {
                NavigationError::NoControl {
                    target,
                    direction: Direction::Next.to_string(),
                }
            })?;
            let before = self.reader.list_signature().await;
            self.click(&control, progress).await?;
            self.reader.wait_for_signature_change(before.as_ref()).await;
            self.reader.scroll_to_pagination().await;
            match self.reader.current_page().await {
                Some(page) => {
                    current = page;
                    exact = true;
                }
                None => {
                    current += 1;
                    exact = false;
                }
            }
        }

        match (current == target, exact) {
            (true, true) => Ok(progress.report(target, NavigationOutcome::Confirmed)),
            _ if current < target => Err(NavigationError::BudgetExhausted {
                target,
                budget,
                last: Some(current),
            }),
            (_, true) => Err(NavigationError::Unreachable { target, current }),
            (_, false) => Ok(progress.report(target, NavigationOutcome::ListChanged)),
        }
    }

    /// Arrow control lookup: accessible labels, container arrows, the
    /// container's outermost button, then the document level fallback
    pub async fn find_control(&self, direction: Direction) -> Option<ElementHandle> {
        let page = self.page();
        let selectors = self.reader.selectors();
        let (labels, glyphs, opposite, fallback) = match direction {
            Direction::Next => (
                &selectors.next_labels,
                &selectors.next_glyphs,
                &selectors.prev_labels,
                &selectors.document_next,
            ),
            Direction::Prev => (
                &selectors.prev_labels,
                &selectors.prev_glyphs,
                &selectors.next_labels,
                &selectors.document_prev,
            ),
        };
        let document = SelectorResolver::document(page);

        for element in document.find_all(&[selectors.labelled_buttons.as_str()]).await {
            if self.is_hidden(&element).await {
                continue;
            }
            let aria = page
                .attribute(&element, "aria-label")
                .await
                .ok()
                .flatten()
                .unwrap_or_default();
            let text = page.inner_text(&element).await.unwrap_or_default();
            if labels
                .iter()
                .any(|label| aria.trim() == label.as_str() || text.trim() == label.as_str())
            {
                return Some(element);
            }
        }

        if let Some(container) = self.reader.container().await {
            let scoped = SelectorResolver::within(page, &container);
            let mut visible = Vec::new();
            for element in scoped.find_all(&[selectors.container_buttons.as_str()]).await {
                if self.is_hidden(&element).await {
                    continue;
                }
                let text = page.inner_text(&element).await.unwrap_or_default();
                let text = text.trim().to_string();
                let primary = labels.first().map_or("", String::as_str);
                if (!primary.is_empty() && text.contains(primary)) || glyphs.contains(&text) {
                    return Some(element);
                }
                visible.push((element, text));
            }

            let structural = match direction {
                Direction::Next => visible.last(),
                Direction::Prev => visible.first(),
            };
            if let Some((element, text)) = structural {
                let points_away = opposite.iter().any(|label| text.contains(label.as_str()));
                if !points_away {
                    debug!("using structural {} control", direction);
                    return Some(element.clone());
                }
            }
        }

        document.find_first(&[fallback.as_str()]).await
    }

    async fn is_hidden(&self, element: &ElementHandle) -> bool {
        matches!(
            self.page().attribute(element, "aria-hidden").await,
            Ok(Some(value)) if value == "true"
        )
    }

    async fn click(
        &self,
        element: &ElementHandle,
        progress: &mut Progress,
    ) -> Result<(), NavigationError> {
        let page = self.page();
        if let Err(e) = page.scroll_into_view(element).await {
            debug!("scroll into view before click failed: {}", e);
        }
        settle(self.timing.link_settle).await;
        page.click(element).await?;
        progress.clicks += 1;
        if let Err(e) = page.wait_for_load(self.timing.load_timeout).await {
            debug!("load wait after click: {}", e);
        }
        settle(self.timing.after_click).await;
        Ok(())
    }

    async fn shot(&self, label: &str) {
        if let Some(artifacts) = self.artifacts {
            artifacts.pagination_shot(self.page(), label).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeStorefront, PaginationMarkers, open_listing};
    use std::sync::Arc;

    struct Fixture {
        selectors: PaginationSelectors,
        timing: PaginationTiming,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                selectors: PaginationSelectors::default(),
                timing: PaginationTiming::immediate(),
            }
        }

        fn navigator<'a>(
            &'a self,
            page: &'a dyn BrowserPage,
            config: NavigatorConfig,
        ) -> PaginationNavigator<'a> {
            PaginationNavigator::new(page, &self.selectors, &self.timing, config)
        }
    }

    fn config() -> NavigatorConfig {
        NavigatorConfig {
            listing_url: FakeStorefront::LISTING_URL.to_string(),
            ..NavigatorConfig::default()
        }
    }

    #[tokio::test]
    async fn target_in_current_group_needs_no_hop() {
        let storefront = Arc::new(FakeStorefront::new(23, 2));
        let page = open_listing(&storefront, 1).await;
        let fixture = Fixture::new();

        let report = fixture.navigator(&page, config()).go_to_page(7).await.unwrap();
        assert_eq!(report.outcome, NavigationOutcome::Confirmed);
        assert_eq!(report.group_hops, 0);
        assert_eq!(report.clicks, 1);
        assert_eq!(storefront.current_page(), 7);
    }

    #[tokio::test]
    async fn hops_groups_forward_and_back() {
        let storefront = Arc::new(FakeStorefront::new(23, 2));
        let page = open_listing(&storefront, 1).await;
        let fixture = Fixture::new();
        let navigator = fixture.navigator(&page, config());

        let report = navigator.go_to_page(23).await.unwrap();
        assert_eq!(report.outcome, NavigationOutcome::Confirmed);
        assert_eq!(report.group_hops, 2);
        assert_eq!(storefront.current_page(), 23);

        let report = navigator.go_to_page(5).await.unwrap();
        assert_eq!(report.group_hops, 2);
        assert_eq!(storefront.current_page(), 5);
    }

    #[tokio::test]
    async fn hop_limit_leaves_the_rest_to_stepping() {
        let storefront = Arc::new(FakeStorefront::new(23, 2));
        let page = open_listing(&storefront, 1).await;
        let fixture = Fixture::new();
        let config = NavigatorConfig {
            max_group_hops: 1,
            ..config()
        };

        let report = fixture.navigator(&page, config).go_to_page(23).await.unwrap();
        assert_eq!(report.outcome, NavigationOutcome::Confirmed);
        assert_eq!(report.group_hops, 1);
        assert_eq!(storefront.current_page(), 23);
        // one hop, 11 -> 20 by links, one arrow into the last group, then 21 -> 23
        assert_eq!(report.clicks, 1 + 9 + 1 + 2);
    }

    #[tokio::test]
    async fn failed_group_hop_falls_back_to_query_jump() {
        let markers = PaginationMarkers {
            page_in_url: true,
            ..PaginationMarkers::default()
        };
        let mut storefront = FakeStorefront::new(23, 2).with_markers(markers);
        storefront.unclickable_labels = vec!["다음".to_string()];
        let storefront = Arc::new(storefront);
        let page = open_listing(&storefront, 1).await;
        let fixture = Fixture::new();
        let config = NavigatorConfig {
            page_jump_by_query: true,
            ..config()
        };

        let report = fixture.navigator(&page, config).go_to_page(23).await.unwrap();
        assert_eq!(report.outcome, NavigationOutcome::Confirmed);
        assert_eq!(report.group_hops, 0);
        assert_eq!(report.clicks, 0);
        assert_eq!(storefront.current_page(), 23);
    }

    #[tokio::test]
    async fn failed_group_hop_without_fallback_reports_the_click_error() {
        let mut storefront = FakeStorefront::new(23, 2);
        storefront.unclickable_labels = vec!["다음".to_string()];
        let storefront = Arc::new(storefront);
        let page = open_listing(&storefront, 1).await;
        let fixture = Fixture::new();

        let err = fixture.navigator(&page, config()).go_to_page(23).await.unwrap_err();
        assert!(matches!(err, NavigationError::Browser(_)));
        // stepping got as far as the last link of the first group
        assert_eq!(storefront.current_page(), 10);
    }

    #[tokio::test]
    async fn repeated_request_clicks_nothing() {
        let storefront = Arc::new(FakeStorefront::new(23, 2));
        let page = open_listing(&storefront, 1).await;
        let fixture = Fixture::new();
        let navigator = fixture.navigator(&page, config());

        navigator.go_to_page(12).await.unwrap();
        let clicks = page.click_count();
        let report = navigator.go_to_page(12).await.unwrap();
        assert_eq!(report.outcome, NavigationOutcome::AlreadyThere);
        assert_eq!(report.clicks, 0);
        assert_eq!(page.click_count(), clicks);
    }

    #[tokio::test]
    async fn unreadable_page_accepts_changed_list() {
        let markers = PaginationMarkers {
            filter_attr: false,
            aria_current: false,
            page_in_url: false,
        };
        let storefront = Arc::new(FakeStorefront::new(8, 2).with_markers(markers));
        let page = open_listing(&storefront, 1).await;
        let fixture = Fixture::new();

        let report = fixture.navigator(&page, config()).go_to_page(3).await.unwrap();
        assert_eq!(report.outcome, NavigationOutcome::ListChanged);
        assert_eq!(storefront.current_page(), 3);
    }

    #[tokio::test]
    async fn next_only_strategy_clicks_next() {
        let storefront = Arc::new(FakeStorefront::new(23, 2));
        let page = open_listing(&storefront, 1).await;
        let fixture = Fixture::new();
        let config = NavigatorConfig {
            strategy: PaginationStrategy::NextOnly,
            ..config()
        };
        let navigator = fixture.navigator(&page, config);

        let report = navigator.go_to_page(11).await.unwrap();
        assert_eq!(report.outcome, NavigationOutcome::Confirmed);
        assert_eq!(report.clicks, 1);

        let err = navigator.go_to_page(2).await.unwrap_err();
        assert!(matches!(
            err,
            NavigationError::Unreachable {
                target: 2,
                current: 11
            }
        ));
    }

    #[tokio::test]
    async fn query_jump_when_bar_has_no_usable_links() {
        let markers = PaginationMarkers {
            page_in_url: true,
            ..PaginationMarkers::default()
        };
        let storefront = Arc::new(FakeStorefront::new(30, 2).with_markers(markers));
        let page = open_listing(&storefront, 1).await;
        let mut fixture = Fixture::new();
        let nothing = vec!["em".to_string()];
        fixture.selectors.container_links = nothing.clone();
        fixture.selectors.document_links = nothing;
        fixture.selectors.labelled_buttons = "em".to_string();
        fixture.selectors.container_buttons = "em".to_string();
        fixture.selectors.document_next = "em".to_string();
        fixture.selectors.document_prev = "em".to_string();
        let config = NavigatorConfig {
            page_jump_by_query: true,
            ..config()
        };

        let report = fixture.navigator(&page, config).go_to_page(15).await.unwrap();
        assert_eq!(report.outcome, NavigationOutcome::Confirmed);
        assert_eq!(report.clicks, 0);
        assert_eq!(storefront.current_page(), 15);
    }

    #[tokio::test]
    async fn page_zero_is_rejected() {
        let storefront = Arc::new(FakeStorefront::new(3, 1));
        let page = open_listing(&storefront, 1).await;
        let fixture = Fixture::new();
        let err = fixture.navigator(&page, config()).go_to_page(0).await.unwrap_err();
        assert!(matches!(err, NavigationError::InvalidTarget(0)));
    }

    #[tokio::test]
    async fn finds_arrow_controls_by_label() {
        let storefront = Arc::new(FakeStorefront::new(23, 1));
        let page = open_listing(&storefront, 12).await;
        let fixture = Fixture::new();
        let navigator = fixture.navigator(&page, config());

        let next = navigator.find_control(Direction::Next).await.unwrap();
        let prev = navigator.find_control(Direction::Prev).await.unwrap();
        assert_ne!(next, prev);
        assert_eq!(page.inner_text(&next).await.unwrap(), "다음");
        assert_eq!(page.inner_text(&prev).await.unwrap(), "이전");
    }
}
