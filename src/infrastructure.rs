//! Infrastructure layer for the browser, configuration, logging and files
//!
//! This module provides the WebDriver client, selector fallback, content
//! parsing, workbook output and the ambient configuration/logging stack.

pub mod browser;
pub mod cdp_endpoint;
pub mod config; // Settings loaded from file + environment
pub mod debug_artifacts;
pub mod errors;
pub mod logging; // Logging infrastructure
pub mod parsing;
pub mod selector_resolver;
pub mod spreadsheet;
pub mod webdriver;

// Re-export commonly used items
pub use browser::{BrowserPage, BrowserSession, ElementHandle, Locator};
pub use config::{
    BrowserEngine, ConfigError, CrawlerSettings, LoggingConfig, PaginationStrategy,
    PaginationTiming,
};
pub use debug_artifacts::DebugArtifacts;
pub use errors::{BrowserError, SpreadsheetError};
pub use logging::{get_log_directory, init_logging, init_logging_with_config, log_system_info};
pub use parsing::{ContentSanitizer, SanitizeOutcome, StorefrontSelectors};
pub use selector_resolver::SelectorResolver;
pub use spreadsheet::{CategoryLookup, WorkbookWriter};
pub use webdriver::{WebDriverConfig, WebDriverPage, WebDriverSession};
