//! Crawl run orchestration
//!
//! Plans the page groups, drives the listing page through them and writes
//! one workbook (plus its summary) per group. A page or group that cannot
//! be reached is logged and skipped; configuration, lookup and workbook
//! failures end the run. The browser session is shut down on every exit
//! path once it exists.

use std::path::PathBuf;
use tracing::{info, warn};

use super::crawl_session::{CrawlContext, CrawlSession};
use super::errors::CrawlError;
use crate::domain::pagination::{PageGroup, PageNumber, plan_page_groups, with_query_param};
use crate::infrastructure::browser::{BrowserPage, BrowserSession};
use crate::infrastructure::cdp_endpoint::{debugger_address, default_cdp_host, normalize_cdp_url};
use crate::infrastructure::config::CrawlerSettings;
use crate::infrastructure::errors::SpreadsheetError;
use crate::infrastructure::spreadsheet::{
    CategoryLookup, WorkbookWriter, group_workbook_path, summary_workbook_path,
};
use crate::infrastructure::webdriver::{WebDriverConfig, WebDriverSession};

/// What one run produced
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub dry_run: bool,
    pub groups_planned: usize,
    /// Group workbooks written, summary workbooks not included
    pub workbooks: Vec<PathBuf>,
    pub products: usize,
    pub skipped_pages: Vec<PageNumber>,
    /// Start page of every group that was skipped
    pub skipped_groups: Vec<PageNumber>,
    /// Verification result when `VERIFY_TARGET_PAGE` was reached
    pub verified: Option<bool>,
}

pub struct CrawlRunner {
    context: CrawlContext,
}

impl CrawlRunner {
    pub fn new(context: CrawlContext) -> Self {
        Self { context }
    }

    /// Validates the settings and loads the category lookup; both are
    /// fatal when they fail
    pub fn from_settings(settings: CrawlerSettings) -> Result<Self, CrawlError> {
        settings.validate()?;
        let lookup_path = settings.resolve_category_path();
        let lookup = CategoryLookup::load(&lookup_path)?;
        if lookup.is_empty() {
            warn!("⚠️ Category lookup {:?} holds no codes", lookup_path);
        }
        Ok(Self::new(CrawlContext::new(settings, lookup)))
    }

    pub fn context(&self) -> &CrawlContext {
        &self.context
    }

    pub fn plan(&self) -> Vec<PageGroup> {
        let settings = &self.context.settings;
        plan_page_groups(
            settings.start_page,
            settings.last_page,
            settings.only_pages().as_ref(),
        )
    }

    fn writer(&self) -> WorkbookWriter {
        let settings = &self.context.settings;
        WorkbookWriter::new(&settings.template_path, &settings.seller_contact)
    }

    /// Connects a WebDriver session and crawls; a dry run stops after the
    /// checks and the plan
    pub async fn run(&self) -> Result<RunSummary, CrawlError> {
        let plan = self.plan();
        let settings = &self.context.settings;
        info!(
            "🗂️ Planned {} page groups for pages {}-{}",
            plan.len(),
            settings.start_page,
            settings.last_page
        );
        if settings.crawler_dry_run {
            for group in &plan {
                info!("  group {}-{}: pages {:?}", group.start, group.last, group.targets);
            }
            info!("✅ CRAWLER_DRY_RUN: configuration and category lookup are valid");
            return Ok(RunSummary {
                dry_run: true,
                groups_planned: plan.len(),
                ..RunSummary::default()
            });
        }
        if !settings.template_path.exists() {
            return Err(SpreadsheetError::NotFound {
                path: settings.template_path.display().to_string(),
            }
            .into());
        }

        let browser = WebDriverSession::connect(&webdriver_config(settings)).await?;
        self.run_with(&browser).await
    }

    /// Crawls with an already connected browser and shuts it down afterwards
    pub async fn run_with<S: BrowserSession>(&self, browser: &S) -> Result<RunSummary, CrawlError> {
        let result = match browser.new_page().await {
            Ok(listing) => {
                let result = self.crawl(browser, &listing).await;
                if let Err(e) = listing.close().await {
                    warn!("⚠️ Failed to close the listing page: {}", e);
                }
                result
            }
            Err(e) => Err(e.into()),
        };
        if let Err(e) = browser.shutdown().await {
            warn!("⚠️ Failed to shut down the browser session: {}", e);
        }
        result
    }

    async fn crawl<S: BrowserSession>(
        &self,
        browser: &S,
        listing: &S::Page,
    ) -> Result<RunSummary, CrawlError> {
        let context = &self.context;
        let settings = &context.settings;
        let plan = self.plan();
        let mut summary = RunSummary {
            groups_planned: plan.len(),
            ..RunSummary::default()
        };

        let start_url = with_query_param(&settings.listing_url, "page", None)
            .unwrap_or_else(|| settings.listing_url.clone());
        info!("🚀 Opening listing {}", start_url);
        listing.goto(&start_url).await?;
        if let Err(e) = listing.wait_for_load(context.timing.load_timeout).await {
            warn!("⚠️ Listing load wait failed: {}", e);
        }

        let mut session = CrawlSession::new(context, browser, listing);
        let writer = self.writer();
        let output_dir = settings.resolve_output_dir();
        let (shop, category) = (settings.shop_name(), settings.category_segment());

        'groups: for group in &plan {
            let Some(first) = group.first_target() else {
                continue;
            };
            info!(
                "📚 Page group {}-{} ({} pages)",
                group.start,
                group.last,
                group.targets.len()
            );
            if let Err(e) = session.go_to_page(first).await {
                warn!(
                    "⚠️ Could not reach page {}, skipping group {}-{}: {}",
                    first, group.start, group.last, e
                );
                summary.skipped_groups.push(group.start);
                continue;
            }

            for &page in &group.targets {
                if let Err(e) = session.go_to_page(page).await {
                    warn!("⚠️ Could not reach page {}, skipping it: {}", page, e);
                    summary.skipped_pages.push(page);
                    continue;
                }
                if settings.verify_target_page == Some(page) {
                    summary.verified = Some(session.verify_first_product().await);
                    break 'groups;
                }
                let page_summary = session.crawl_current_page().await;
                info!(
                    "📄 Page {} done: {} captured, {} skipped of {} cards",
                    page, page_summary.captured, page_summary.skipped, page_summary.cards
                );
                if session.total_limit_reached() {
                    break;
                }
            }

            let rows = session.take_rows();
            let path = group_workbook_path(
                &output_dir,
                &settings.workbook_prefix,
                &shop,
                &category,
                group.start,
                group.last,
            );
            writer.prepare(&path)?;
            writer.write_rows(&path, &rows)?;
            writer.write_summary(&summary_workbook_path(&path), &rows)?;
            summary.products += rows.len();
            summary.workbooks.push(path);

            if session.total_limit_reached() {
                info!("🛑 Product limit reached after {} products", session.captured_total());
                break;
            }
        }

        info!(
            "🏁 Run finished: {} products in {} workbooks",
            summary.products,
            summary.workbooks.len()
        );
        Ok(summary)
    }
}

/// Session settings; a configured CDP endpoint attaches to a running browser
pub fn webdriver_config(settings: &CrawlerSettings) -> WebDriverConfig {
    let mut config = WebDriverConfig::new(&settings.webdriver_url, settings.browser_engine);
    config.headless = settings.browser_headless;
    config.debugger_address = settings
        .cdp_connect_url
        .as_deref()
        .and_then(|raw| normalize_cdp_url(raw, &default_cdp_host()))
        .map(|normalized| debugger_address(&normalized).to_string());
    config
}
