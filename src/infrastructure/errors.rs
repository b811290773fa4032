//! Infrastructure error types
//!
//! Browser and spreadsheet failures. Most browser errors are downgraded by
//! the caller into a skipped selector or an empty field; only session
//! creation failures end a run.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum BrowserError {
    #[error("WebDriver transport failed: {message}")]
    Transport { message: String },

    #[error("WebDriver {command} returned {error}: {message}")]
    Protocol {
        command: String,
        error: String,
        message: String,
    },

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Locator kind not supported by this page: {locator}")]
    UnsupportedLocator { locator: String },

    #[error("No such element: {handle}")]
    NoSuchElement { handle: String },

    #[error("Timed out after {waited_ms}ms waiting for {what}")]
    Timeout { what: String, waited_ms: u64 },
}

impl BrowserError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn protocol(command: &str, error: &str, message: &str) -> Self {
        Self::Protocol {
            command: command.to_string(),
            error: error.to_string(),
            message: message.to_string(),
        }
    }

    pub fn invalid_selector(selector: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn timeout(what: &str, waited: std::time::Duration) -> Self {
        Self::Timeout {
            what: what.to_string(),
            waited_ms: waited.as_millis() as u64,
        }
    }

    /// Stale or missing elements are expected while the listing re-renders
    pub fn is_stale_element(&self) -> bool {
        match self {
            Self::NoSuchElement { .. } => true,
            Self::Protocol { error, .. } => {
                error == "stale element reference" || error == "no such element"
            }
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Workbook not found: {path}")]
    NotFound { path: String },

    #[error("Failed to read workbook {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to write workbook {path}: {message}")]
    Write { path: String, message: String },

    #[error("Sheet '{sheet}' missing in {path}")]
    SheetMissing { sheet: String, path: String },

    #[error("Template copy failed: {0}")]
    Io(#[from] std::io::Error),
}

impl SpreadsheetError {
    pub fn read(path: &std::path::Path, message: impl std::fmt::Display) -> Self {
        Self::Read {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    pub fn write(path: &std::path::Path, message: impl std::fmt::Display) -> Self {
        Self::Write {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_element_detection() {
        assert!(BrowserError::protocol("click", "stale element reference", "gone").is_stale_element());
        assert!(
            BrowserError::NoSuchElement {
                handle: "e1".into()
            }
            .is_stale_element()
        );
        assert!(!BrowserError::transport("refused").is_stale_element());
    }

    #[test]
    fn timeout_message_reports_millis() {
        let err = BrowserError::timeout("network idle", std::time::Duration::from_millis(1500));
        assert_eq!(err.to_string(), "Timed out after 1500ms waiting for network idle");
    }
}
