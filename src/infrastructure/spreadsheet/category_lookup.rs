//! Category name to numeric code table

use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::domain::heuristics::{CategoryLevel, CategoryPath};
use crate::infrastructure::errors::SpreadsheetError;

/// Codes keyed by small (column D) and tiny (column E) category names
#[derive(Debug, Clone, Default)]
pub struct CategoryLookup {
    small: HashMap<String, u64>,
    tiny: HashMap<String, u64>,
}

fn parse_code(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    raw.parse::<u64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v > 0.0 && v.fract() == 0.0)
            .map(|v| v as u64)
    })
}

impl CategoryLookup {
    /// Reads the first sheet: code in column A, names in columns D and E.
    /// Rows without a numeric code are skipped; later rows win.
    pub fn load(path: &Path) -> Result<Self, SpreadsheetError> {
        if !path.exists() {
            return Err(SpreadsheetError::NotFound {
                path: path.display().to_string(),
            });
        }
        let book = umya_spreadsheet::reader::xlsx::read(path)
            .map_err(|e| SpreadsheetError::read(path, e))?;
        let sheet = book
            .get_sheet(&0)
            .ok_or_else(|| SpreadsheetError::read(path, "workbook has no sheets"))?;

        let rows = (1..=sheet.get_highest_row()).map(|row| {
            (
                sheet.get_value(format!("A{row}").as_str()),
                sheet.get_value(format!("D{row}").as_str()),
                sheet.get_value(format!("E{row}").as_str()),
            )
        });
        let lookup = Self::from_rows(rows);
        info!(
            "Loaded category lookup {:?}: {} small, {} tiny categories",
            path,
            lookup.small.len(),
            lookup.tiny.len()
        );
        Ok(lookup)
    }

    /// Builds the table from `(code, small, tiny)` cell texts
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, String, String)>,
    {
        let mut lookup = Self::default();
        for (code, small, tiny) in rows {
            let Some(code) = parse_code(&code) else {
                continue;
            };
            let small = small.trim();
            if !small.is_empty() {
                lookup.small.insert(small.to_string(), code);
            }
            let tiny = tiny.trim();
            if !tiny.is_empty() {
                lookup.tiny.insert(tiny.to_string(), code);
            }
        }
        lookup
    }

    pub fn is_empty(&self) -> bool {
        self.small.is_empty() && self.tiny.is_empty()
    }

    pub fn code_for(&self, level: CategoryLevel, name: &str) -> Option<u64> {
        match level {
            CategoryLevel::Small => self.small.get(name).copied(),
            CategoryLevel::Tiny => self.tiny.get(name).copied(),
        }
    }

    /// Code of the most specific segment of a breadcrumb path
    pub fn code_for_path(&self, path: &CategoryPath) -> Option<u64> {
        let (level, name) = path.most_specific()?;
        let code = self.code_for(level, name);
        debug!("Smallest category ({:?}) {} -> {:?}", level, name, code);
        code
    }
}
