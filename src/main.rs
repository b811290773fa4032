use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};

use smartstore_relister_lib::domain::PageNumber;
use smartstore_relister_lib::infrastructure::logging::{init_logging_with_config, log_system_info};
use smartstore_relister_lib::{CrawlRunner, CrawlerSettings};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Path to configuration file (defaults to ./relister.toml when present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// First listing page to crawl
    #[arg(long, value_name = "PAGE")]
    start_page: Option<PageNumber>,

    /// Last listing page to crawl
    #[arg(long, value_name = "PAGE")]
    last_page: Option<PageNumber>,

    /// Only these pages, e.g. "3,5,12"
    #[arg(long, value_name = "PAGES")]
    only_pages: Option<String>,

    /// Validate configuration and category lookup, print the plan, then exit
    #[arg(long)]
    dry_run: bool,
}

impl CliArgs {
    fn apply(&self, settings: &mut CrawlerSettings) {
        if let Some(page) = self.start_page {
            settings.start_page = page;
        }
        if let Some(page) = self.last_page {
            settings.last_page = page;
        }
        if let Some(pages) = &self.only_pages {
            settings.crawl_only_pages = Some(pages.clone());
        }
        if self.dry_run {
            settings.crawler_dry_run = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let mut settings = CrawlerSettings::load(args.config.as_deref())
        .context("Failed to load crawler settings")?;
    args.apply(&mut settings);

    init_logging_with_config(settings.logging())?;
    log_system_info();
    info!("🚀 Crawling {}", settings.listing_url);

    let summary = match CrawlRunner::from_settings(settings) {
        Ok(runner) => runner.run().await,
        Err(e) => Err(e),
    }
    .inspect_err(|e| error!("❌ Run aborted: {}", e))?;

    if summary.dry_run {
        info!("✅ Dry run: {} page groups planned", summary.groups_planned);
        return Ok(());
    }
    if let Some(verified) = summary.verified {
        info!("VERIFY: {}", if verified { "passed" } else { "failed" });
    }
    if !summary.skipped_pages.is_empty() {
        warn!("⚠️ Skipped pages: {:?}", summary.skipped_pages);
    }
    if !summary.skipped_groups.is_empty() {
        warn!("⚠️ Skipped groups starting at: {:?}", summary.skipped_groups);
    }
    for path in &summary.workbooks {
        info!("📄 {}", path.display());
    }
    info!(
        "🏁 {} products written to {} workbooks",
        summary.products,
        summary.workbooks.len()
    );
    Ok(())
}
