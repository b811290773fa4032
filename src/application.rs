//! Application layer module
//!
//! Crawl use cases built on the browser seam: reading and driving the
//! pagination bar, extracting listing cards and product details, and the
//! run loop that turns pages into workbooks.

pub mod crawl_runner;
pub mod crawl_session;
pub mod errors;
pub mod pagination_navigator;
pub mod pagination_reader;
pub mod product_detail_extractor;
pub mod product_list_extractor;

pub use crawl_runner::{CrawlRunner, RunSummary};
pub use crawl_session::{CrawlContext, CrawlSession, PageCrawlSummary};
pub use errors::{CrawlError, ExtractionError, NavigationError};
pub use pagination_navigator::{Direction, NavigatorConfig, PaginationNavigator};
pub use pagination_reader::PaginationReader;
pub use product_detail_extractor::ProductDetailExtractor;
pub use product_list_extractor::ProductListExtractor;
