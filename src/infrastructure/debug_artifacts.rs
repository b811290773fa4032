//! Post-mortem artifacts
//!
//! HTML snapshots, content dumps and pagination screenshots written next to
//! the run log. Writing them never fails the caller: errors are logged and
//! swallowed.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::browser::BrowserPage;
use super::config::CrawlerSettings;

#[derive(Debug, Clone)]
pub struct DebugArtifacts {
    dir: PathBuf,
    content_dir: PathBuf,
    dump_content: bool,
    pagination_shots: bool,
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

impl DebugArtifacts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            content_dir: dir.join("content_outputs"),
            dir,
            dump_content: false,
            pagination_shots: false,
        }
    }

    pub fn from_settings(settings: &CrawlerSettings) -> Self {
        Self {
            dir: settings.debug_dir.clone(),
            content_dir: settings.content_dump_dir(),
            dump_content: settings.dump_content_html,
            pagination_shots: settings.pagination_debug_shots,
        }
    }

    pub fn with_content_dumps(mut self, enabled: bool) -> Self {
        self.dump_content = enabled;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write(&self, dir: &Path, name: &str, bytes: &[u8]) -> Option<PathBuf> {
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("Failed to create debug directory {:?}: {}", dir, e);
            return None;
        }
        let path = dir.join(name);
        match std::fs::write(&path, bytes) {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("Failed to write debug artifact {:?}: {}", path, e);
                None
            }
        }
    }

    /// Current page markup as `<prefix>_<timestamp>.html`
    pub async fn save_snapshot(&self, page: &dyn BrowserPage, prefix: &str) -> Option<PathBuf> {
        let html = match page.content().await {
            Ok(html) => html,
            Err(e) => {
                warn!("Failed to read page for snapshot {}: {}", prefix, e);
                return None;
            }
        };
        let saved = self.write(&self.dir, &format!("{prefix}_{}.html", timestamp()), html.as_bytes());
        if let Some(path) = &saved {
            info!("Saved debug snapshot: {:?}", path);
        }
        saved
    }

    /// Raw fragment of one product as `<code>_<suffix>_<timestamp>.html`
    pub fn save_html(&self, product_code: &str, html: &str, suffix: &str) -> Option<PathBuf> {
        let name = format!("{product_code}_{suffix}_{}.html", timestamp());
        let saved = self.write(&self.dir, &name, html.as_bytes());
        if let Some(path) = &saved {
            info!("[CONTENT][{}] Saved debug HTML: {:?}", product_code, path);
        }
        saved
    }

    /// Final content of one product, only with `DUMP_CONTENT_HTML`
    pub fn dump_content(&self, product_code: &str, html: &str, label: &str) -> Option<PathBuf> {
        if !self.dump_content || html.is_empty() {
            return None;
        }
        let name = format!("{product_code}_{label}_{}.html", timestamp());
        let saved = self.write(&self.content_dir, &name, html.as_bytes());
        if let Some(path) = &saved {
            info!("[CONTENT][{}] Saved content output ({}): {:?}", product_code, label, path);
        }
        saved
    }

    /// Screenshot of a pagination step, only with `PAGINATION_DEBUG_SHOTS`
    pub async fn pagination_shot(&self, page: &dyn BrowserPage, label: &str) -> Option<PathBuf> {
        if !self.pagination_shots {
            return None;
        }
        match page.screenshot().await {
            Ok(png) => self.write(&self.dir, &format!("pagination_{}_{label}.png", timestamp()), &png),
            Err(e) => {
                warn!("Failed to take screenshot({}): {}", label, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StaticPage;

    #[tokio::test]
    async fn snapshot_and_html_land_in_debug_dir() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = DebugArtifacts::new(dir.path());
        let page = StaticPage::new("<p>listing</p>");

        let snapshot = artifacts.save_snapshot(&page, "product_list").await.unwrap();
        assert!(snapshot.file_name().unwrap().to_string_lossy().starts_with("product_list_"));
        assert!(std::fs::read_to_string(&snapshot).unwrap().contains("listing"));

        let raw = artifacts.save_html("123", "<div></div>", "fallback_failed").unwrap();
        assert!(raw.to_string_lossy().contains("123_fallback_failed_"));
    }

    #[test]
    fn content_dump_requires_flag() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = DebugArtifacts::new(dir.path());
        assert!(artifacts.dump_content("1", "<p>x</p>", "cleaned").is_none());

        let artifacts = artifacts.with_content_dumps(true);
        let dumped = artifacts.dump_content("1", "<p>x</p>", "cleaned").unwrap();
        assert!(dumped.starts_with(dir.path().join("content_outputs")));
    }
}
