//! Test utilities for the crawler
//!
//! `StaticPage` answers `BrowserPage` calls from an HTML string parsed with
//! `scraper`, so extractors and the pagination state machine can be tested
//! without a browser. Element handles are document-order indexes and stay
//! valid as long as the markup does not change.
//!
//! `FakeStorefront` renders a paginated listing that reacts to clicks the
//! way the real storefront does: numbered links jump to their page, the
//! arrow controls move one page group.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::domain::pagination::{PAGE_GROUP_SIZE, PageNumber, exact_page_label, page_from_query};
use crate::infrastructure::browser::{BrowserPage, BrowserSession, ElementHandle, Locator};
use crate::infrastructure::errors::BrowserError;

pub const STORE_ORIGIN: &str = "https://smartstore.naver.com";

/// What a click landed on, as seen by a `PageRouter`
#[derive(Debug, Clone)]
pub struct ClickedElement {
    pub tag: String,
    pub attrs: HashMap<String, String>,
    pub text: String,
}

impl ClickedElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

/// Backs a `StaticPage` with behaviour
pub trait PageRouter: Send + Sync {
    /// Markup served for `url`
    fn navigate(&self, url: &str) -> Option<String>;

    /// New `(url, markup)` when the click changes the document
    fn click(&self, current_url: &str, clicked: &ClickedElement) -> Option<(String, String)>;

    /// Result of `execute`
    fn script(&self, _url: &str, _script: &str) -> Value {
        Value::Null
    }

    /// Error a click on `clicked` fails with, if any
    fn refuse_click(&self, _clicked: &ClickedElement) -> Option<BrowserError> {
        None
    }
}

struct PageState {
    url: String,
    html: String,
}

pub struct StaticPage {
    state: Mutex<PageState>,
    router: Option<Arc<dyn PageRouter>>,
    clicks: AtomicU32,
    gotos: Mutex<Vec<String>>,
}

impl StaticPage {
    pub fn new(html: &str) -> Self {
        Self::with_url(html, "https://smartstore.naver.com/")
    }

    pub fn with_url(html: &str, url: &str) -> Self {
        Self {
            state: Mutex::new(PageState {
                url: url.to_string(),
                html: html.to_string(),
            }),
            router: None,
            clicks: AtomicU32::new(0),
            gotos: Mutex::new(Vec::new()),
        }
    }

    pub fn routed(router: Arc<dyn PageRouter>) -> Self {
        let mut page = Self::with_url("<html><body></body></html>", "about:blank");
        page.router = Some(router);
        page
    }

    pub fn click_count(&self) -> u32 {
        self.clicks.load(Ordering::SeqCst)
    }

    pub fn visited(&self) -> Vec<String> {
        self.gotos.lock().unwrap().clone()
    }

    fn snapshot(&self) -> (String, String) {
        let state = self.state.lock().unwrap();
        (state.url.clone(), state.html.clone())
    }

    fn replace(&self, url: String, html: String) {
        let mut state = self.state.lock().unwrap();
        state.url = url;
        state.html = html;
    }

    /// Runs `f` on the element behind `handle`
    fn with_element<T>(
        &self,
        handle: &ElementHandle,
        f: impl FnOnce(ElementRef<'_>) -> T,
    ) -> Result<T, BrowserError> {
        let (_, html) = self.snapshot();
        let document = Html::parse_document(&html);
        let index = handle_index(handle)?;
        let element = all_elements(&document)
            .into_iter()
            .nth(index)
            .ok_or_else(|| BrowserError::NoSuchElement {
                handle: handle.to_string(),
            })?;
        Ok(f(element))
    }
}

fn handle_index(handle: &ElementHandle) -> Result<usize, BrowserError> {
    handle
        .id()
        .strip_prefix('n')
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| BrowserError::NoSuchElement {
            handle: handle.to_string(),
        })
}

fn all_elements(document: &Html) -> Vec<ElementRef<'_>> {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect()
}

fn collapsed_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl BrowserPage for StaticPage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.gotos.lock().unwrap().push(url.to_string());
        match &self.router {
            Some(router) => {
                let html = router
                    .navigate(url)
                    .ok_or_else(|| BrowserError::transport(format!("no route for {url}")))?;
                self.replace(url.to_string(), html);
            }
            None => self.state.lock().unwrap().url = url.to_string(),
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.snapshot().0)
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.snapshot().1)
    }

    async fn find_elements(
        &self,
        scope: Option<&ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, BrowserError> {
        let Locator::Css(css) = locator else {
            return Err(BrowserError::UnsupportedLocator {
                locator: locator.to_string(),
            });
        };
        let selector =
            Selector::parse(css).map_err(|e| BrowserError::invalid_selector(css, format!("{e:?}")))?;
        let (_, html) = self.snapshot();
        let document = Html::parse_document(&html);
        let elements = all_elements(&document);
        let positions: HashMap<_, usize> = elements
            .iter()
            .enumerate()
            .map(|(i, el)| (el.id(), i))
            .collect();

        let matched: Vec<ElementRef<'_>> = match scope {
            Some(handle) => {
                let root = *elements.get(handle_index(handle)?).ok_or_else(|| {
                    BrowserError::NoSuchElement {
                        handle: handle.to_string(),
                    }
                })?;
                root.select(&selector).filter(|el| el.id() != root.id()).collect()
            }
            None => document.select(&selector).collect(),
        };
        Ok(matched
            .into_iter()
            .filter_map(|el| positions.get(&el.id()))
            .map(|i| ElementHandle(format!("n{i}")))
            .collect())
    }

    async fn inner_text(&self, element: &ElementHandle) -> Result<String, BrowserError> {
        self.with_element(element, collapsed_text)
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        self.with_element(element, |el| el.value().attr(name).map(str::to_string))
    }

    async fn inner_html(&self, element: &ElementHandle) -> Result<String, BrowserError> {
        self.with_element(element, |el| el.inner_html())
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        let clicked = self.with_element(element, |el| ClickedElement {
            tag: el.value().name().to_string(),
            attrs: el
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            text: collapsed_text(el),
        })?;
        if let Some(err) = self.router.as_ref().and_then(|r| r.refuse_click(&clicked)) {
            return Err(err);
        }
        self.clicks.fetch_add(1, Ordering::SeqCst);
        if let Some(router) = &self.router {
            let (url, _) = self.snapshot();
            if let Some((next_url, html)) = router.click(&url, &clicked) {
                self.replace(next_url, html);
            }
        }
        Ok(())
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        self.with_element(element, |_| ())
    }

    async fn scroll_to_bottom(&self) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn execute(&self, script: &str, _args: Vec<Value>) -> Result<Value, BrowserError> {
        let (url, _) = self.snapshot();
        Ok(self
            .router
            .as_ref()
            .map_or(Value::Null, |router| router.script(&url, script)))
    }

    async fn wait_for_load(&self, _timeout: Duration) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        Ok(())
    }
}

/// Which DOM signals the fake listing exposes for the current page
#[derive(Debug, Clone, Copy)]
pub struct PaginationMarkers {
    pub filter_attr: bool,
    pub aria_current: bool,
    /// Whether `?page=` in the URL is honoured on navigation and reflected
    pub page_in_url: bool,
}

impl Default for PaginationMarkers {
    fn default() -> Self {
        Self {
            filter_attr: true,
            aria_current: true,
            page_in_url: false,
        }
    }
}

/// A storefront category with `total_pages` listing pages
pub struct FakeStorefront {
    pub total_pages: PageNumber,
    pub products_per_page: u32,
    pub markers: PaginationMarkers,
    /// Product ids rendered without a price on the card
    pub priceless_cards: Vec<u64>,
    /// `(id, salePrice)` answered by the preloaded-state script
    pub preloaded_prices: Vec<(u64, u64)>,
    /// Detail pages rendered without an option dropdown
    pub products_without_options: Vec<u64>,
    /// Controls whose clicks are intercepted, matched on their text
    pub unclickable_labels: Vec<String>,
    current: Mutex<PageNumber>,
}

impl FakeStorefront {
    pub const LISTING_URL: &'static str =
        "https://smartstore.naver.com/fakeshop/category/ALL?st=RECENT&dt=BIG_IMAGE&size=20";

    pub fn new(total_pages: PageNumber, products_per_page: u32) -> Self {
        Self {
            total_pages,
            products_per_page,
            markers: PaginationMarkers::default(),
            priceless_cards: Vec::new(),
            preloaded_prices: Vec::new(),
            products_without_options: Vec::new(),
            unclickable_labels: Vec::new(),
            current: Mutex::new(1),
        }
    }

    pub fn with_markers(mut self, markers: PaginationMarkers) -> Self {
        self.markers = markers;
        self
    }

    pub fn current_page(&self) -> PageNumber {
        *self.current.lock().unwrap()
    }

    pub fn product_id(&self, page: PageNumber, index: u32) -> u64 {
        1000 + u64::from(page - 1) * u64::from(self.products_per_page) + u64::from(index)
    }

    pub fn product_url(id: u64) -> String {
        format!("{STORE_ORIGIN}/fakeshop/products/{id}")
    }

    fn listing_url(&self, page: PageNumber) -> String {
        if self.markers.page_in_url {
            format!("{}&page={page}", Self::LISTING_URL)
        } else {
            Self::LISTING_URL.to_string()
        }
    }

    pub fn render_listing(&self, page: PageNumber) -> String {
        let mut cards = String::new();
        for index in 0..self.products_per_page {
            let id = self.product_id(page, index);
            let price = if self.priceless_cards.contains(&id) {
                "가격문의".to_string()
            } else {
                format!("{},900원", 10 + id % 50)
            };
            cards.push_str(&format!(
                r#"<li data-testid="PRODUCT_CARD"><a href="/fakeshop/products/{id}" role="link"><strong aria-hidden="false">상품&nbsp;{id}</strong></a><span data-testid="PRODUCT_CARD_PRICE">{price}</span></li>"#
            ));
        }

        let group_start = (page - 1) / PAGE_GROUP_SIZE * PAGE_GROUP_SIZE + 1;
        let group_last = (group_start + PAGE_GROUP_SIZE - 1).min(self.total_pages);
        let mut controls = String::new();
        if group_start > 1 {
            controls.push_str(r##"<a role="button" aria-hidden="false" href="#">이전</a>"##);
        }
        for n in group_start..=group_last {
            let current = if self.markers.aria_current {
                format!(r#" aria-current="{}""#, n == page)
            } else {
                String::new()
            };
            controls.push_str(&format!(r##"<a role="menuitem"{current} href="#">{n}</a>"##));
        }
        if group_last < self.total_pages {
            controls.push_str(r##"<a role="button" aria-hidden="false" href="#">다음</a>"##);
        }
        let filter = if self.markers.filter_attr {
            format!(r#" data-shp-filter_con='[{{"key":"pgn","value":"{page}"}}]'"#)
        } else {
            String::new()
        };

        format!(
            r#"<html><head><title>fakeshop</title></head><body>
<ul class="product_list">{cards}</ul>
<div data-shp-area="list.pgn" role="menubar"{filter}>{controls}</div>
</body></html>"#
        )
    }

    pub fn render_detail(&self, id: u64) -> String {
        let options = if self.products_without_options.contains(&id) {
            String::new()
        } else {
            r#"<a role="button" data-shp-area="pcs.optselect" aria-haspopup="listbox">색상</a>
<ul role="listbox"><li role="option">블랙</li><li role="option">화이트 (+1,000원)</li><li role="option" aria-disabled="true">레드 (+2,000원)</li></ul>"#
                .to_string()
        };
        format!(
            r#"<html><head>
<script type="application/ld+json">{{"category":"생활/건강>주방용품>조리도구>뒤집개"}}</script>
</head><body>
<div id="content">
  <h3>상품 {id}</h3>
  <img alt="대표이미지" src="https://shop-phinf.pstatic.net/20240101_{id}/{id}_main.jpg?type=m510">
  <img alt="추가이미지1" src="https://shop-phinf.pstatic.net/20240101_{id}/{id}_1.jpg?type=m510">
  <img alt="추가이미지2" src="https://shop-phinf.pstatic.net/20240101_{id}/{id}_2.jpg">
  {options}
</div>
<div class="delivery_info"><span>배송비</span><span>3,000원</span></div>
<div id="INTRODUCE"><div class="se-main-container">
  <p class="se-text">상세 설명 {id}</p>
  <img data-src="https://shop-phinf.pstatic.net/detail_{id}.jpg" src="">
</div></div>
</body></html>"#
        )
    }

    fn set_page(&self, page: PageNumber) -> (String, String) {
        *self.current.lock().unwrap() = page;
        (self.listing_url(page), self.render_listing(page))
    }
}

impl PageRouter for FakeStorefront {
    fn navigate(&self, url: &str) -> Option<String> {
        if let Some(id) = product_id_in(url) {
            return Some(self.render_detail(id));
        }
        let mut page = self.current_page();
        if self.markers.page_in_url {
            if let Some(requested) = page_from_query(url) {
                page = requested.clamp(1, self.total_pages);
            }
        }
        Some(self.set_page(page).1)
    }

    fn click(&self, _current_url: &str, clicked: &ClickedElement) -> Option<(String, String)> {
        if let Some(href) = clicked.attr("href").filter(|h| h.contains("/products/")) {
            let url = if href.starts_with('/') {
                format!("{STORE_ORIGIN}{href}")
            } else {
                href.to_string()
            };
            let html = self.navigate(&url)?;
            return Some((url, html));
        }

        let page = self.current_page();
        let group_start = (page - 1) / PAGE_GROUP_SIZE * PAGE_GROUP_SIZE + 1;
        if clicked.attr("role") == Some("menuitem") {
            let target = exact_page_label(&clicked.text)?;
            return (target != page).then(|| self.set_page(target));
        }
        if clicked.text.contains("다음") {
            let next = group_start + PAGE_GROUP_SIZE;
            return (next <= self.total_pages).then(|| self.set_page(next));
        }
        if clicked.text.contains("이전") {
            return (group_start > 1).then(|| self.set_page(group_start - PAGE_GROUP_SIZE));
        }
        None
    }

    fn refuse_click(&self, clicked: &ClickedElement) -> Option<BrowserError> {
        self.unclickable_labels
            .iter()
            .any(|label| clicked.text.contains(label.as_str()))
            .then(|| {
                BrowserError::protocol("click", "element click intercepted", &clicked.text)
            })
    }

    fn script(&self, url: &str, script: &str) -> Value {
        if !script.contains("__PRELOADED_STATE__") {
            return Value::Null;
        }
        product_id_in(url)
            .and_then(|id| self.preloaded_prices.iter().find(|(pid, _)| *pid == id))
            .map_or(Value::Null, |(_, price)| {
                serde_json::json!({ "salePrice": price, "discountedSalePrice": null, "price": null })
            })
    }
}

fn product_id_in(url: &str) -> Option<u64> {
    url.split("/products/")
        .nth(1)
        .and_then(|rest| rest.split(['?', '#', '/']).next())
        .and_then(|id| id.parse::<u64>().ok())
}

/// Session handing out routed `StaticPage`s over one storefront
pub struct FakeSession {
    pub storefront: Arc<FakeStorefront>,
    pages_opened: AtomicU32,
    shut_down: AtomicBool,
}

impl FakeSession {
    pub fn new(storefront: FakeStorefront) -> Self {
        Self {
            storefront: Arc::new(storefront),
            pages_opened: AtomicU32::new(0),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn pages_opened(&self) -> u32 {
        self.pages_opened.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    type Page = StaticPage;

    async fn new_page(&self) -> Result<StaticPage, BrowserError> {
        self.pages_opened.fetch_add(1, Ordering::SeqCst);
        let router: Arc<dyn PageRouter> = self.storefront.clone();
        Ok(StaticPage::routed(router))
    }

    async fn shutdown(&self) -> Result<(), BrowserError> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Listing page already opened on `page` of `storefront`
pub async fn open_listing(storefront: &Arc<FakeStorefront>, page: PageNumber) -> StaticPage {
    *storefront.current.lock().unwrap() = page;
    let router: Arc<dyn PageRouter> = storefront.clone();
    let browser_page = StaticPage::routed(router);
    browser_page
        .goto(FakeStorefront::LISTING_URL)
        .await
        .expect("fake listing route");
    browser_page
}
