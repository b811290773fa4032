//! Workbook input and output
//!
//! The category lookup is read once per run; every page group gets a copy
//! of the bulk-upload template filled with its rows plus a small summary
//! workbook.

pub mod category_lookup;
pub mod workbook_writer;

pub use category_lookup::CategoryLookup;
pub use workbook_writer::{
    group_workbook_path, selling_code, summary_workbook_path, WorkbookWriter, BULK_SHEET,
    FIRST_DATA_ROW,
};
