//! Smartstore relister
//!
//! Crawls a Naver smartstore category listing through a WebDriver browser
//! session, visits every product page and writes the products into the
//! bulk-upload workbook template, one workbook per group of ten pages.

pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
mod test_utils;

pub use application::{CrawlRunner, RunSummary};
pub use infrastructure::config::CrawlerSettings;
