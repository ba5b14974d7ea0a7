//! `tagkit_io_xlsx` v1:
//! Spreadsheet IO kernel for the price-tag pipeline.
//!
//! Architecture:
//! - `conf`   : constants and default presets
//! - `spec`   : specs/models/options
//! - `util`   : pure helper functions
//! - `reader` : workbook / IPC readers producing Polars frames
//! - `writer` : pure-Rust workbook writer kernel
pub mod conf;
pub mod reader;
pub mod spec;
pub mod util;
pub mod writer;

pub use conf::{N_LEN_EXCEL_SHEET_NAME_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL};
pub use reader::{
    derive_cell_value_from_any_value, derive_dataframe_from_ipc_bytes, derive_rows_from_dataframe,
    read_spreadsheet_to_dataframe,
};
pub use spec::{
    EnumCellValue, SpecAutofitCellsPolicy, SpecCellFormat, SpecSheetReadOptions, SpecXlsxReport,
    SpecXlsxWriteOptions,
};
pub use util::{
    convert_data_to_text, convert_excel_serial_to_iso, sanitize_sheet_name,
    validate_unique_columns,
};
pub use writer::XlsxWriter;
