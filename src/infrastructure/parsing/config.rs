//! Storefront selector configuration
//!
//! Centralized fallback lists for every DOM lookup. Order matters: earlier
//! entries are the most specific and are tried first. Entries prefixed with
//! `xpath=` are XPath expressions.

use serde::{Deserialize, Serialize};

/// All selector lists used against the storefront
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorefrontSelectors {
    pub pagination: PaginationSelectors,
    pub product_list: ProductListSelectors,
    pub product_detail: ProductDetailSelectors,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Pagination bar lookups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationSelectors {
    /// Pagination container candidates
    pub container: Vec<String>,

    /// Container children that prove the bar finished rendering
    pub ready_marker: String,

    /// Attribute holding the `{key, value}` filter JSON
    pub filter_attribute: String,

    /// Current item inside the container
    pub container_current: String,

    /// Document wide current-item markers (weaker signal)
    pub document_current: Vec<String>,

    /// Numbered link candidates inside the container
    pub container_links: Vec<String>,

    /// Document wide numbered links, tried when the container has none
    pub document_links: Vec<String>,

    /// Generic button lookup used for accessible-label matching
    pub labelled_buttons: String,

    /// Arrow controls inside the container
    pub container_buttons: String,

    /// Document level structural fallback for next / prev
    pub document_next: String,
    pub document_prev: String,

    /// Accessible labels of the arrow controls
    pub next_labels: Vec<String>,
    pub prev_labels: Vec<String>,

    /// Glyph-only arrow labels
    pub next_glyphs: Vec<String>,
    pub prev_glyphs: Vec<String>,

    /// First product link; its href is the list signature
    pub list_signature: String,
}

impl Default for PaginationSelectors {
    fn default() -> Self {
        Self {
            container: owned(&[
                "div[data-shp-area='list.pgn'][role='menubar']",
                "div[data-shp-contents-type='pgn'][role='menubar']",
                "div[data-shp-area-id='pgn'][role='menubar']",
                "nav[aria-label*='페이지']",
                "nav[aria-label*='pagination']",
                "nav[role='navigation']",
                "div[class*='Pagination']",
                "div[class*='paginate']",
                "div[class*='paging']",
            ]),
            ready_marker: "a[role='menuitem'],a[role='button']".to_string(),
            filter_attribute: "data-shp-filter_con".to_string(),
            container_current: "a[role='menuitem'][aria-current='true']".to_string(),
            document_current: owned(&[
                "a[aria-current=\"true\"]",
                "button[aria-current=\"true\"]",
                "[aria-current=\"page\"]",
            ]),
            container_links: owned(&["a", "button", "span", "li"]),
            document_links: owned(&["a[role=\"menuitem\"]", "a", "button"]),
            labelled_buttons: "button,[role='button']".to_string(),
            container_buttons: "a[role='button'],button[role='button']".to_string(),
            document_next: "a[role=\"button\"][aria-hidden=\"false\"]:last-child".to_string(),
            document_prev: "a[role=\"button\"][aria-hidden=\"false\"]:first-child".to_string(),
            next_labels: owned(&["다음", "다음 페이지", "다음페이지", ">"]),
            prev_labels: owned(&["이전", "이전 페이지", "이전페이지", "<"]),
            next_glyphs: owned(&["›", ">", "»"]),
            prev_glyphs: owned(&["‹", "<", "«"]),
            list_signature: "a[href*='/products/']".to_string(),
        }
    }
}

/// Product card lookups on a listing page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductListSelectors {
    /// Selectors for product cards - multiple fallbacks
    pub product_card: Vec<String>,

    /// Title inside a card
    pub title: Vec<String>,

    /// Price inside a card
    pub price: Vec<String>,

    /// Product link inside a card
    pub product_link: Vec<String>,

    /// Origin joined to relative hrefs
    pub base_url: String,
}

impl Default for ProductListSelectors {
    fn default() -> Self {
        Self {
            product_card: owned(&[
                "[data-testid='PRODUCT_CARD']",
                "li:has(a[href*='/products/'])",
                "div:has(a[href*='/products/'])",
                "li[class*='flu7YgFW2k']",
            ]),
            title: owned(&[
                "strong[aria-hidden='false']",
                "[data-testid='PRODUCT_CARD_TITLE']",
                "a[href*='/products/'] strong",
                "span[class*='ProductCard__Title']",
                "strong._26YxgX-Nu5",
            ]),
            price: owned(&["[data-testid='PRODUCT_CARD_PRICE']", "span._2DywKu0J_8"]),
            product_link: owned(&[
                "a[href*='/products/'][role='link']",
                "a[href*='/products/']",
                "a._2id8yXpK_k",
            ]),
            base_url: "https://smartstore.naver.com".to_string(),
        }
    }
}

/// Product detail page lookups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDetailSelectors {
    /// Scripts scanned for the embedded category JSON
    pub category_script: String,

    /// Option dropdown triggers, then the generic listbox fallback
    pub option_trigger: String,
    pub option_trigger_fallback: String,
    pub option_listbox: String,
    pub option_item: String,

    /// Representative image candidates
    pub main_image: Vec<String>,

    /// Additional image candidates
    pub thumbnails: Vec<String>,

    /// Last resort image lookups
    pub any_product_image: String,
    pub image_fallback: Vec<String>,

    /// Shipping fee holders
    pub shipping_fee: Vec<String>,

    /// "상세정보 펼치기" toggle
    pub detail_toggle: Vec<String>,
    pub detail_toggle_labels: Vec<String>,

    /// Detail section scrolled into view before reading content
    pub detail_section: String,

    /// Rich-text content container, most specific first
    pub content: Vec<String>,
}

impl Default for ProductDetailSelectors {
    fn default() -> Self {
        Self {
            category_script: "script".to_string(),
            option_trigger: "[data-shp-area$=\"optselect\"]".to_string(),
            option_trigger_fallback:
                "a[role=\"button\"][aria-haspopup=\"listbox\"], button[aria-haspopup=\"listbox\"]"
                    .to_string(),
            option_listbox: "ul[role=\"listbox\"]".to_string(),
            option_item: "[role='option'], a, li".to_string(),
            main_image: owned(&[
                "img[alt='대표이미지']",
                "img[alt*='대표'][src*='shop-phinf']",
                "div[id='content'] img[src*='shop-phinf']",
            ]),
            thumbnails: owned(&[
                "img[alt^='추가이미지']",
                "button[aria-label^='썸네일'] img",
                "ul[class*='thumbnail'] img",
            ]),
            any_product_image: "img[src*='shop-phinf']".to_string(),
            image_fallback: owned(&[
                "xpath=//*[@id=\"content\"]//img[contains(@src,\"shop-phinf\")]",
                "xpath=//*[@id=\"content\"]/div/div[2]/div[1]/div[1]/div[1]/img",
            ]),
            shipping_fee: owned(&[
                "xpath=//*[contains(@class,'delivery') and contains(text(),'원')]",
                "xpath=//span[contains(text(),'배송비')]/following-sibling::*[1]",
                "xpath=//*[contains(text(),'배송비') and contains(text(),'원')]",
                "xpath=//*[contains(text(),'반품배송비') and contains(text(),'원')]",
            ]),
            detail_toggle: owned(&["button[data-resize-on-click='true']", "button"]),
            detail_toggle_labels: owned(&["상세정보 펼치기", "상세정보 더보기"]),
            detail_section: "#INTRODUCE".to_string(),
            content: owned(&[
                "#INTRODUCE > div > div.LXGzUhHJC2.EtTm8LLHdw.Uea3oKmnaJ > div > div > div > div > div > div > div",
                "#INTRODUCE > div > div.LXGzUhHJC2.EtTm8LLHdw > div > div > div > div > div > div > div",
                "#INTRODUCE .detail_viewer",
                "#INTRODUCE [data-component-id]",
                "#INTRODUCE .se-main-container",
                "#INTRODUCE",
                "[data-name=\"INTRODUCE\"][role=\"tabpanel\"]",
                "xpath=//*[@id=\"INTRODUCE\"]//div[contains(@data-component-id,\"INTRODUCE\")]//div[contains(@class,\"se_component\")]//div[last()]",
                "xpath=//*[@id=\"INTRODUCE\"]//div[contains(@class,\"se-main-container\")]",
                "xpath=//*[@id=\"INTRODUCE\"]/div/div[4]",
            ]),
        }
    }
}
