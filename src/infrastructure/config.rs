//! Configuration infrastructure
//!
//! Settings come from three layers, later ones winning:
//! 1. Built-in defaults (`CrawlerSettings::default`)
//! 2. Optional `relister.toml` next to the working directory
//! 3. Process environment variables (`MAX_PRODUCTS_PER_PAGE`, `LISTING_URL`, ...)
//!
//! Environment values that are empty are ignored so a blank `.env` line
//! never overrides a file value.

#![allow(clippy::struct_excessive_bools)]

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::domain::pagination::{PageNumber, parse_page_list};

/// Default config file name looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "relister.toml";

/// Environment variables mapped onto `CrawlerSettings` fields
pub const ENV_KEYS: &[&str] = &[
    "LISTING_URL",
    "START_PAGE",
    "LAST_PAGE",
    "CRAWL_ONLY_PAGES",
    "MAX_PRODUCTS_PER_PAGE",
    "MAX_PRODUCTS_TOTAL",
    "CRAWLER_DRY_RUN",
    "WRAP_CONTENT_HTML",
    "DUMP_CONTENT_HTML",
    "PAGE_JUMP_BY_QUERY",
    "PAGINATION_STRATEGY",
    "BROWSER_ENGINE",
    "BROWSER_HEADLESS",
    "WEBDRIVER_URL",
    "CDP_CONNECT_URL",
    "CATEGORY_LOOKUP_PATH",
    "TEMPLATE_PATH",
    "OUTPUT_DIR",
    "DEBUG_DIR",
    "WORKBOOK_PREFIX",
    "SELLER_CONTACT",
    "VERIFY_TARGET_PAGE",
    "VERIFY_FIRST_PRODUCT_URL",
    "VERIFY_FIRST_PRODUCT_NAME",
    "LOG_LEVEL",
    "MAX_GROUP_HOPS",
    "PAGINATION_DEBUG_SHOTS",
];

mod defaults {
    pub const LISTING_URL: &str =
        "https://smartstore.naver.com/joypapa_/category/ALL?st=RECENT&dt=BIG_IMAGE&size=20";
    pub const WEBDRIVER_URL: &str = "http://127.0.0.1:9515";
    pub const TEMPLATE_PATH: &str = "output/ExcelSaveTemplate_230109.xlsx";
    pub const CATEGORY_FILE: &str = "naver_category.xlsx";
    pub const DEBUG_DIR: &str = "debug";
    pub const WORKBOOK_PREFIX: &str = "dolce";
    pub const LOG_LEVEL: &str = "info";
    pub const MAX_GROUP_HOPS: u32 = 20;
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

impl ConfigError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// `auto` uses numbered links with fallbacks; `next_only` only clicks "next"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationStrategy {
    #[default]
    Auto,
    NextOnly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserEngine {
    #[default]
    #[serde(alias = "chromium")]
    Chrome,
    Firefox,
    #[serde(alias = "msedge")]
    Edge,
}

/// Every knob of one crawl run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerSettings {
    /// Category listing URL; its page query parameter is ignored
    pub listing_url: String,
    pub start_page: PageNumber,
    pub last_page: PageNumber,
    /// Comma/space separated page numbers, narrows the run for debugging
    pub crawl_only_pages: Option<String>,
    /// 0 = unlimited
    pub max_products_per_page: u32,
    /// 0 = unlimited
    pub max_products_total: u32,
    pub crawler_dry_run: bool,
    pub wrap_content_html: bool,
    pub dump_content_html: bool,
    pub page_jump_by_query: bool,
    pub pagination_strategy: PaginationStrategy,
    pub pagination_debug_shots: bool,
    pub max_group_hops: u32,
    pub browser_engine: BrowserEngine,
    pub browser_headless: bool,
    pub webdriver_url: String,
    /// Remote-debugging endpoint of an already running Chrome
    pub cdp_connect_url: Option<String>,
    pub category_lookup_path: Option<PathBuf>,
    pub template_path: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub debug_dir: PathBuf,
    pub workbook_prefix: String,
    /// Seller phone number written to column AZ
    pub seller_contact: String,
    pub verify_target_page: Option<PageNumber>,
    pub verify_first_product_url: Option<String>,
    pub verify_first_product_name: Option<String>,
    pub log_level: String,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            listing_url: defaults::LISTING_URL.to_string(),
            start_page: 1,
            last_page: 1,
            crawl_only_pages: None,
            max_products_per_page: 0,
            max_products_total: 0,
            crawler_dry_run: false,
            wrap_content_html: false,
            dump_content_html: false,
            page_jump_by_query: false,
            pagination_strategy: PaginationStrategy::Auto,
            pagination_debug_shots: false,
            max_group_hops: defaults::MAX_GROUP_HOPS,
            browser_engine: BrowserEngine::Chrome,
            browser_headless: false,
            webdriver_url: defaults::WEBDRIVER_URL.to_string(),
            cdp_connect_url: None,
            category_lookup_path: None,
            template_path: PathBuf::from(defaults::TEMPLATE_PATH),
            output_dir: None,
            debug_dir: PathBuf::from(defaults::DEBUG_DIR),
            workbook_prefix: defaults::WORKBOOK_PREFIX.to_string(),
            seller_contact: String::new(),
            verify_target_page: None,
            verify_first_product_url: None,
            verify_first_product_name: None,
            log_level: defaults::LOG_LEVEL.to_string(),
        }
    }
}

impl CrawlerSettings {
    /// Loads file + process environment
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_from(config_file, std::env::vars())
    }

    /// Loads file + the given variables; used directly by tests
    pub fn load_from<I>(config_file: Option<&Path>, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let file_source = match config_file {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file_source)
            .add_source(config::Environment::default().source(Some(env_overrides(vars))))
            .build()?;

        let loaded: Self = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_page == 0 {
            return Err(ConfigError::validation("START_PAGE must be 1 or greater"));
        }
        if self.last_page < self.start_page {
            return Err(ConfigError::validation(format!(
                "LAST_PAGE ({}) is before START_PAGE ({})",
                self.last_page, self.start_page
            )));
        }
        if url::Url::parse(&self.listing_url).is_err() {
            return Err(ConfigError::validation(format!(
                "LISTING_URL is not a valid URL: {}",
                self.listing_url
            )));
        }
        if let Some(raw) = self.crawl_only_pages.as_deref() {
            if !raw.trim().is_empty() && parse_page_list(raw).is_none() {
                return Err(ConfigError::validation(format!(
                    "CRAWL_ONLY_PAGES must list page numbers: {raw}"
                )));
            }
        }
        Ok(())
    }

    /// Requested subset of pages, `None` when the whole range is crawled
    pub fn only_pages(&self) -> Option<BTreeSet<PageNumber>> {
        self.crawl_only_pages.as_deref().and_then(parse_page_list)
    }

    /// Shop slug: first path segment of the listing URL (`joypapa_`)
    pub fn shop_name(&self) -> String {
        self.listing_path_segment(0).unwrap_or_else(|| "shop".to_string())
    }

    /// Category id: third path segment of the listing URL (`ALL`)
    pub fn category_segment(&self) -> String {
        self.listing_path_segment(2).unwrap_or_else(|| "ALL".to_string())
    }

    fn listing_path_segment(&self, index: usize) -> Option<String> {
        let parsed = url::Url::parse(&self.listing_url).ok()?;
        let segment = parsed.path_segments()?.nth(index)?;
        (!segment.is_empty()).then(|| segment.to_string())
    }

    /// Category lookup workbook: configured path, else the working
    /// directory, its parent, then the user config directory
    pub fn resolve_category_path(&self) -> PathBuf {
        if let Some(path) = &self.category_lookup_path {
            return path.clone();
        }
        let mut candidates = vec![
            PathBuf::from(defaults::CATEGORY_FILE),
            PathBuf::from("..").join(defaults::CATEGORY_FILE),
        ];
        if let Some(dir) = app_config_dir() {
            candidates.push(dir.join(defaults::CATEGORY_FILE));
        }
        candidates
            .iter()
            .find(|p| p.exists())
            .cloned()
            .unwrap_or_else(|| candidates[0].clone())
    }

    /// Workbook output folder: configured, else `~/Desktop/excel_output`
    pub fn resolve_output_dir(&self) -> PathBuf {
        if let Some(dir) = &self.output_dir {
            return dir.clone();
        }
        dirs::desktop_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join("Desktop")))
            .map_or_else(|| PathBuf::from("excel_output"), |d| d.join("excel_output"))
    }

    pub fn content_dump_dir(&self) -> PathBuf {
        self.debug_dir.join("content_outputs")
    }

    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            log_dir: Some(self.debug_dir.join("logs")),
            ..LoggingConfig::default()
        }
    }
}

/// `~/.config/smartstore-relister`
pub fn app_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("smartstore-relister"))
}

/// Known keys only, lower-cased, blank values dropped
fn env_overrides<I>(vars: I) -> config::Map<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter(|(key, value)| ENV_KEYS.contains(&key.as_str()) && !value.trim().is_empty())
        .map(|(key, value)| (key.to_lowercase(), value.trim().to_string()))
        .collect()
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted file logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Directory of the run log; `None` = `logs/` next to the executable
    pub log_dir: Option<PathBuf>,

    /// Number of rotated run logs to keep
    pub max_files: u32,

    /// Module-specific log level filters applied below TRACE
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: true,
            log_dir: None,
            max_files: 10,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("fantoccini".to_string(), "info".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("hyper_util".to_string(), "warn".to_string());
                filters.insert("h2".to_string(), "warn".to_string());
                filters.insert("html5ever".to_string(), "warn".to_string());
                filters.insert("selectors".to_string(), "warn".to_string());
                filters
            },
        }
    }
}

/// Delays and budgets of the pagination state machine
#[derive(Debug, Clone)]
pub struct PaginationTiming {
    /// Pause after scrolling the pagination bar into view
    pub scroll_settle: Duration,
    /// Pause after scrolling a page link into view, before clicking
    pub link_settle: Duration,
    /// Pause after every pagination click
    pub after_click: Duration,
    /// Interval between list-signature polls
    pub signature_poll: Duration,
    /// Polls before a list change is given up on
    pub signature_polls: u32,
    pub ready_timeout: Duration,
    pub ready_poll: Duration,
    /// Network-idle wait per click
    pub load_timeout: Duration,
    /// Numbered-link clicks before falling back to stepping
    pub direct_click_attempts: u32,
    /// Extra clicks allowed beyond `|target - current|` when stepping
    pub step_headroom: u32,
    /// Hard cap of stepping clicks
    pub step_cap: u32,
}

impl Default for PaginationTiming {
    fn default() -> Self {
        Self {
            scroll_settle: Duration::from_millis(800),
            link_settle: Duration::from_millis(300),
            after_click: Duration::from_secs(1),
            signature_poll: Duration::from_millis(500),
            signature_polls: 10,
            ready_timeout: Duration::from_secs(8),
            ready_poll: Duration::from_millis(300),
            load_timeout: Duration::from_secs(10),
            direct_click_attempts: 3,
            step_headroom: 20,
            step_cap: 200,
        }
    }
}

impl PaginationTiming {
    /// Zero delays, same budgets; for in-memory pages
    pub fn immediate() -> Self {
        Self {
            scroll_settle: Duration::ZERO,
            link_settle: Duration::ZERO,
            after_click: Duration::ZERO,
            signature_poll: Duration::ZERO,
            signature_polls: 2,
            ready_timeout: Duration::ZERO,
            ready_poll: Duration::ZERO,
            load_timeout: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Stepping budget for a known distance
    pub fn step_budget(&self, current: PageNumber, target: PageNumber) -> u32 {
        current
            .abs_diff(target)
            .saturating_add(self.step_headroom)
            .min(self.step_cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn defaults_are_unlimited_single_page() {
        let settings = CrawlerSettings::load_from(None, Vec::new()).unwrap();
        assert_eq!(settings.start_page, 1);
        assert_eq!(settings.last_page, 1);
        assert_eq!(settings.max_products_per_page, 0);
        assert_eq!(settings.pagination_strategy, PaginationStrategy::Auto);
        assert_eq!(settings.shop_name(), "joypapa_");
        assert_eq!(settings.category_segment(), "ALL");
    }

    #[test]
    fn environment_overrides_and_blank_values_are_ignored() {
        let settings = CrawlerSettings::load_from(
            None,
            vars(&[
                ("START_PAGE", "11"),
                ("LAST_PAGE", "23"),
                ("CRAWLER_DRY_RUN", "1"),
                ("PAGINATION_STRATEGY", "next_only"),
                ("BROWSER_ENGINE", "firefox"),
                ("VERIFY_TARGET_PAGE", ""),
                ("CRAWL_ONLY_PAGES", "12, 15"),
                ("UNRELATED", "x"),
            ]),
        )
        .unwrap();
        assert_eq!((settings.start_page, settings.last_page), (11, 23));
        assert!(settings.crawler_dry_run);
        assert_eq!(settings.pagination_strategy, PaginationStrategy::NextOnly);
        assert_eq!(settings.browser_engine, BrowserEngine::Firefox);
        assert_eq!(settings.verify_target_page, None);
        assert_eq!(settings.only_pages().unwrap().into_iter().collect::<Vec<_>>(), vec![12, 15]);
    }

    #[test]
    fn file_values_sit_under_environment() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "start_page = 3\nlast_page = 9\nworkbook_prefix = \"shop\"").unwrap();
        let settings =
            CrawlerSettings::load_from(Some(file.path()), vars(&[("LAST_PAGE", "5")])).unwrap();
        assert_eq!(settings.start_page, 3);
        assert_eq!(settings.last_page, 5);
        assert_eq!(settings.workbook_prefix, "shop");
    }

    #[test]
    fn inverted_page_range_is_rejected() {
        let err = CrawlerSettings::load_from(None, vars(&[("START_PAGE", "5"), ("LAST_PAGE", "2")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn step_budget_is_capped() {
        let timing = PaginationTiming::default();
        assert_eq!(timing.step_budget(3, 8), 25);
        assert_eq!(timing.step_budget(1, 900), 200);
        assert_eq!(timing.step_budget(1, PageNumber::MAX), 200);

        let uncapped = PaginationTiming {
            step_cap: u32::MAX,
            ..PaginationTiming::default()
        };
        assert_eq!(uncapped.step_budget(PageNumber::MAX, 1), u32::MAX);
    }
}
