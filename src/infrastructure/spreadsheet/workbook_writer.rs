//! Bulk-upload workbook output
//!
//! Rows are written into a copy of the upload template, one product per row
//! starting at row 3 of the `일괄등록` sheet.

use std::path::{Path, PathBuf};
use tracing::{info, warn};
use umya_spreadsheet::{Spreadsheet, Worksheet};

use crate::domain::pagination::PageNumber;
use crate::domain::pricing::{ad_category_code, return_shipping_fee, selling_price};
use crate::domain::product::ProductRecord;
use crate::infrastructure::errors::SpreadsheetError;

pub const BULK_SHEET: &str = "일괄등록";
pub const FIRST_DATA_ROW: u32 = 3;

const OPTION_KIND: &str = "조합형";
const OPTION_STOCK: &str = "99";
const SEE_DETAIL_PAGE: &str = "상세페이지 참조";
const ORIGIN_CODE: &str = "0200037";
const IMPORTER: &str = "구매대행";
const NOTICE_IN_CONTENT: &str = "본문 안내문 참조";

const SUMMARY_HEADERS: [(&str, &str); 5] = [
    ("A", "Product_URL"),
    ("B", "Numbering"),
    ("C", "Product_Title"),
    ("D", "Product_Price"),
    ("E", "Shipping_Fee"),
];

/// `<prefix>_<shop>_<category>_<first>_<last>.xlsx`
pub fn group_workbook_path(
    output_dir: &Path,
    prefix: &str,
    shop: &str,
    category: &str,
    first: PageNumber,
    last: PageNumber,
) -> PathBuf {
    output_dir.join(format!("{prefix}_{shop}_{category}_{first}_{last}.xlsx"))
}

/// Summary workbook next to the group workbook
pub fn summary_workbook_path(group_path: &Path) -> PathBuf {
    let stem = group_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    group_path.with_file_name(format!("{stem}_second.xlsx"))
}

/// Numeric product codes are doubled; anything else gets a random code
pub fn selling_code(product_code: &str) -> String {
    product_code
        .parse::<u64>()
        .ok()
        .and_then(|code| code.checked_mul(2))
        .map(|code| code.to_string())
        .unwrap_or_else(|| format!("{}R", fastrand::u32(10_000_000..=99_999_999)))
}

fn set_text(sheet: &mut Worksheet, column: &str, row: u32, value: &str) {
    sheet
        .get_cell_mut(format!("{column}{row}").as_str())
        .set_value(value);
}

fn set_number(sheet: &mut Worksheet, column: &str, row: u32, value: u64) {
    sheet
        .get_cell_mut(format!("{column}{row}").as_str())
        .set_value_number(value as f64);
}

fn join_lines<I>(lines: I) -> String
where
    I: IntoIterator<Item = String>,
{
    lines.into_iter().collect::<Vec<_>>().join("\n")
}

/// Fills one template row
fn fill_row(sheet: &mut Worksheet, row: u32, record: &ProductRecord, seller_contact: &str) {
    set_text(sheet, "A", row, &selling_code(&record.product_code()));
    if let Some(code) = record.category_code {
        set_number(sheet, "B", row, code);
    }
    set_text(sheet, "C", row, &record.title);

    let price = selling_price(record.price_value(), record.shipping_fee);
    set_number(sheet, "E", row, price);
    set_text(sheet, "H", row, OPTION_KIND);

    set_text(
        sheet,
        "I",
        row,
        &join_lines(record.options.iter().map(|g| g.category.clone())),
    );
    set_text(
        sheet,
        "J",
        row,
        &join_lines(record.options.iter().map(|g| g.names.join(", "))),
    );
    set_text(
        sheet,
        "K",
        row,
        &join_lines(record.options.iter().map(|g| {
            g.price_deltas
                .iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        })),
    );
    let option_prices = record.all_option_prices().len();
    let stock = if option_prices == 0 {
        OPTION_STOCK.to_string()
    } else {
        vec![OPTION_STOCK; option_prices].join(", ")
    };
    set_text(sheet, "L", row, &stock);

    set_text(sheet, "R", row, record.main_image.as_deref().unwrap_or_default());
    set_text(sheet, "S", row, &record.other_images.join("\n"));
    set_text(sheet, "T", row, record.content_html());

    set_text(sheet, "U", row, SEE_DETAIL_PAGE);
    set_text(sheet, "V", row, SEE_DETAIL_PAGE);
    set_text(sheet, "Y", row, ORIGIN_CODE);
    set_text(sheet, "Z", row, IMPORTER);
    set_text(sheet, "AZ", row, seller_contact);
    set_text(sheet, "BA", row, NOTICE_IN_CONTENT);

    match ad_category_code(price) {
        Some(code) => set_number(sheet, "AD", row, code),
        None => warn!("Selling price {} is outside the ad category brackets", price),
    }

    let return_fee = return_shipping_fee(record.total_price);
    set_number(sheet, "AP", row, return_fee);
    set_number(sheet, "AQ", row, return_fee * 2);
}

/// Removes every row from the first one without a selling code
fn trim_trailing_rows(sheet: &mut Worksheet) {
    let highest = sheet.get_highest_row();
    let first_blank = (FIRST_DATA_ROW..=highest)
        .find(|row| sheet.get_value(format!("A{row}").as_str()).trim().is_empty());
    if let Some(row) = first_blank {
        sheet.remove_row(&row, &(highest - row + 1));
    }
}

#[derive(Debug, Clone)]
pub struct WorkbookWriter {
    template: PathBuf,
    seller_contact: String,
}

impl WorkbookWriter {
    pub fn new(template: impl Into<PathBuf>, seller_contact: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            seller_contact: seller_contact.into(),
        }
    }

    pub fn template(&self) -> &Path {
        &self.template
    }

    /// Copies the template to `dest`, creating parent directories
    pub fn prepare(&self, dest: &Path) -> Result<(), SpreadsheetError> {
        if !self.template.exists() {
            return Err(SpreadsheetError::NotFound {
                path: self.template.display().to_string(),
            });
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&self.template, dest)?;
        Ok(())
    }

    fn open(path: &Path) -> Result<Spreadsheet, SpreadsheetError> {
        umya_spreadsheet::reader::xlsx::read(path).map_err(|e| SpreadsheetError::read(path, e))
    }

    /// Writes `records` into the prepared workbook at `dest`
    pub fn write_rows(&self, dest: &Path, records: &[ProductRecord]) -> Result<usize, SpreadsheetError> {
        let mut book = Self::open(dest)?;
        let sheet = book
            .get_sheet_by_name_mut(BULK_SHEET)
            .ok_or_else(|| SpreadsheetError::SheetMissing {
                sheet: BULK_SHEET.to_string(),
                path: dest.display().to_string(),
            })?;

        if records.is_empty() {
            info!("No rows to write; template kept as is: {:?}", dest);
            return Ok(0);
        }

        for (offset, record) in records.iter().enumerate() {
            fill_row(sheet, FIRST_DATA_ROW + offset as u32, record, &self.seller_contact);
        }
        trim_trailing_rows(sheet);

        umya_spreadsheet::writer::xlsx::write(&book, dest)
            .map_err(|e| SpreadsheetError::write(dest, e))?;
        info!("Excel file saved to {:?} ({} rows)", dest, records.len());
        Ok(records.len())
    }

    /// Summary workbook: URL, running number, title, price and shipping fee
    pub fn write_summary(&self, path: &Path, records: &[ProductRecord]) -> Result<(), SpreadsheetError> {
        let mut book = umya_spreadsheet::new_file();
        let sheet = book
            .get_sheet_by_name_mut("Sheet1")
            .ok_or_else(|| SpreadsheetError::write(path, "new workbook has no sheet"))?;

        for (column, header) in SUMMARY_HEADERS {
            set_text(sheet, column, 1, header);
        }
        for (offset, record) in records.iter().enumerate() {
            let row = offset as u32 + 2;
            set_text(sheet, "A", row, &record.product_url);
            set_number(sheet, "B", row, offset as u64 + 1);
            set_text(sheet, "C", row, &record.title);
            set_text(sheet, "D", row, &record.price);
            set_number(sheet, "E", row, record.shipping_fee);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        umya_spreadsheet::writer::xlsx::write(&book, path)
            .map_err(|e| SpreadsheetError::write(path, e))?;
        Ok(())
    }
}
