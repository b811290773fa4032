//! Application error types
//!
//! Navigation and extraction failures are recoverable: the runner logs them
//! and skips the page or product. `CrawlError` ends the run.

use thiserror::Error;

use crate::domain::PageNumber;
use crate::infrastructure::{BrowserError, ConfigError, SpreadsheetError};

#[derive(Error, Debug)]
pub enum NavigationError {
    #[error("Page {0} is not a valid target")]
    InvalidTarget(PageNumber),

    #[error("Current page could not be read while heading to page {target}")]
    PageUnreadable { target: PageNumber },

    #[error("No {direction} control found while heading to page {target}")]
    NoControl {
        target: PageNumber,
        direction: String,
    },

    #[error("Gave up on page {target} after {budget} steps (last read: {last:?})")]
    BudgetExhausted {
        target: PageNumber,
        budget: u32,
        last: Option<PageNumber>,
    },

    #[error("Page {target} is behind the current page {current}")]
    Unreachable {
        target: PageNumber,
        current: PageNumber,
    },

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("No price could be determined for {url}")]
    NoPrice { url: String },

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Spreadsheet(#[from] SpreadsheetError),

    #[error("Browser session failed: {0}")]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Navigation(#[from] NavigationError),
}
