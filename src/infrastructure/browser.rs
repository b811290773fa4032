//! Browser automation seam
//!
//! The crawl logic only talks to these traits. `WebDriverSession` drives a
//! real browser; tests answer the same calls from static HTML.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use super::errors::BrowserError;

/// CSS selector, or XPath when written with the `xpath=` prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().strip_prefix("xpath=") {
            Some(xpath) => Self::XPath(xpath.trim().to_string()),
            None => Self::Css(raw.trim().to_string()),
        }
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Css(s) | Self::XPath(s) => s,
        }
    }
}

impl From<&str> for Locator {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "{s}"),
            Self::XPath(s) => write!(f, "xpath={s}"),
        }
    }
}

/// Opaque reference to an element of the current document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One browser tab
#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Serialized DOM of the whole document
    async fn content(&self) -> Result<String, BrowserError>;

    /// Elements matching `locator`, inside `scope` when given
    async fn find_elements(
        &self,
        scope: Option<&ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, BrowserError>;

    /// Rendered text
    async fn inner_text(&self, element: &ElementHandle) -> Result<String, BrowserError>;

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError>;

    async fn inner_html(&self, element: &ElementHandle) -> Result<String, BrowserError>;

    async fn click(&self, element: &ElementHandle) -> Result<(), BrowserError>;

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<(), BrowserError>;

    async fn scroll_to_bottom(&self) -> Result<(), BrowserError>;

    /// Runs a synchronous script and returns its JSON result
    async fn execute(
        &self,
        script: &str,
        args: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, BrowserError>;

    /// Waits until the document looks idle, giving up quietly at `timeout`
    async fn wait_for_load(&self, timeout: Duration) -> Result<(), BrowserError>;

    /// PNG of the viewport
    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    type Page: BrowserPage;

    /// Opens a fresh tab
    async fn new_page(&self) -> Result<Self::Page, BrowserError>;

    async fn shutdown(&self) -> Result<(), BrowserError>;
}
