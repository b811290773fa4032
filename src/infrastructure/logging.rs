//! Logging system configuration and initialization
//!
//! This module provides the run logging setup:
//! - Console output plus a run log file (replaces the tee'd stdout log)
//! - RUST_LOG override, otherwise the configured level with noisy
//!   dependency targets clamped
//! - KST (Korea Standard Time) timestamps
//! - The previous run log is renamed with its timestamp before a new run

#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow};
use chrono::{FixedOffset, Offset, Utc};
use lazy_static::lazy_static;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

/// Current run log; older runs are renamed `run.<timestamp>.log`
pub const RUN_LOG_FILE: &str = "run.log";

const KST_OFFSET_SECS: i32 = 9 * 3600;

// Global guard to keep the log file writer alive
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> =
        Mutex::new(Vec::new());
}

fn kst() -> FixedOffset {
    // 9h is always in range
    FixedOffset::east_opt(KST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Custom time formatter for KST (Korea Standard Time, UTC+9)
struct KstTimeFormatter;

impl FormatTime for KstTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        let kst_time = Utc::now().with_timezone(&kst());
        write!(w, "{}", kst_time.format("%Y-%m-%d %H:%M:%S%.3f %Z"))
    }
}

/// Get the log directory relative to the executable location
pub fn get_log_directory() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    exe_dir.join("logs")
}

/// Timestamped name for a rotated log: `run.20240101T09:30:00.log`
pub fn rotated_log_name(log_file_name: &str, modified: chrono::DateTime<Utc>) -> String {
    let file_stem = log_file_name.trim_end_matches(".log");
    format!(
        "{}.{}.log",
        file_stem,
        modified.with_timezone(&kst()).format("%Y%m%dT%H:%M:%S")
    )
}

/// Rotate existing log file by renaming it with timestamp
fn rotate_existing_log_file(log_dir: &Path, log_file_name: &str) -> Result<Option<String>> {
    let log_file_path = log_dir.join(log_file_name);
    if !log_file_path.exists() {
        return Ok(None);
    }

    let metadata = std::fs::metadata(&log_file_path)
        .map_err(|e| anyhow!("Failed to get log file metadata: {}", e))?;
    let file_time = metadata
        .modified()
        .or_else(|_| metadata.created())
        .unwrap_or_else(|_| std::time::SystemTime::now());

    let timestamped_name = rotated_log_name(log_file_name, file_time.into());
    let timestamped_path = log_dir.join(&timestamped_name);
    std::fs::rename(&log_file_path, &timestamped_path).map_err(|e| {
        anyhow!(
            "Failed to rotate log file {} to {}: {}",
            log_file_path.display(),
            timestamped_path.display(),
            e
        )
    })?;

    Ok(Some(timestamped_name))
}

/// Initialize the logging system with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(LoggingConfig::default())
}

fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = EnvFilter::new(&config.level);

        // Dependency chatter only shows on TRACE
        if !config.level.to_lowercase().contains("trace") {
            for (module, level) in &config.module_filters {
                match format!("{}={}", module, level).parse() {
                    Ok(directive) => filter = filter.add_directive(directive),
                    Err(e) => eprintln!("Ignoring log filter {}={}: {}", module, level, e),
                }
            }
        }
        filter
    })
}

type ConsoleLayer<S> = fmt::Layer<
    S,
    fmt::format::DefaultFields,
    fmt::format::Format<fmt::format::Full, KstTimeFormatter>,
    fn() -> std::io::Stdout,
>;

/// Stdout layer; built per subscriber stack since the layer type depends on it
fn console_layer<S>(enabled: bool) -> Option<ConsoleLayer<S>> {
    enabled.then(|| {
        fmt::Layer::new()
            .with_writer(std::io::stdout as fn() -> std::io::Stdout)
            .with_timer(KstTimeFormatter)
            .with_target(false)
    })
}

/// Initialize logging with custom configuration
///
/// # Environment Variable Override
/// ```bash
/// # WebDriver wire traffic
/// RUST_LOG="debug,fantoccini=debug" smartstore-relister
///
/// # Selector misses of the resolver only
/// RUST_LOG="info,smartstore_relister_lib::infrastructure::selector_resolver=debug" smartstore-relister
/// ```
pub fn init_logging_with_config(config: LoggingConfig) -> Result<()> {
    let log_dir = config.log_dir.clone().unwrap_or_else(get_log_directory);

    let rotated = if config.file_output {
        std::fs::create_dir_all(&log_dir)
            .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;
        let rotated = rotate_existing_log_file(&log_dir, RUN_LOG_FILE)?;
        cleanup_old_logs(&log_dir, config.max_files)?;
        rotated
    } else {
        None
    };

    let registry = Registry::default().with(build_env_filter(&config));

    match (config.file_output, config.json_format) {
        (true, json) => {
            let file_appender = rolling::never(&log_dir, RUN_LOG_FILE);
            let (file_writer, file_guard) = non_blocking(file_appender);

            // Store the guard globally to prevent it from being dropped
            LOG_GUARDS
                .lock()
                .map_err(|_| anyhow!("log guard registry poisoned"))?
                .push(file_guard);

            if json {
                let file_layer = fmt::Layer::new()
                    .json()
                    .with_writer(file_writer)
                    .with_timer(KstTimeFormatter)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false);
                registry
                    .with(file_layer)
                    .with(console_layer(config.console_output))
                    .try_init()?;
            } else {
                // File layer with minimal formatting (time + level + message only)
                let file_layer = fmt::Layer::new()
                    .with_writer(file_writer)
                    .with_timer(KstTimeFormatter)
                    .with_target(false)
                    .with_ansi(false);
                registry
                    .with(file_layer)
                    .with(console_layer(config.console_output))
                    .try_init()?;
            }
        }
        (false, _) => {
            if !config.console_output {
                return Err(anyhow!("No logging output configured"));
            }
            registry.with(console_layer(true)).try_init()?;
        }
    }

    info!("Logging system initialized");
    info!("Log directory: {:?}", log_dir);
    info!("Log level: {}", config.level);
    if let Some(name) = rotated {
        info!("Rotated previous run log to: {}", name);
    }

    Ok(())
}

/// Log system information for diagnostics
pub fn log_system_info() {
    info!("=== smartstore-relister ===");
    info!("Application version: {}", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {}", std::env::consts::OS);
    info!("Architecture: {}", std::env::consts::ARCH);
    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {:?}", current_dir);
    }
    info!("===========================");
}

/// Keeps the newest `max_files` rotated run logs
fn cleanup_old_logs(log_dir: &Path, max_files: u32) -> Result<()> {
    let mut log_files = Vec::new();

    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_rotated = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".log") && n != RUN_LOG_FILE);
        if !is_rotated {
            continue;
        }
        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            log_files.push((path, modified));
        }
    }

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.iter().skip(max_files as usize) {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove old log file {:?}: {}", path, e);
        }
    }
    Ok(())
}
