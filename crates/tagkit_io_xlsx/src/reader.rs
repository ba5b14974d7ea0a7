//! Readers that turn input workbooks or IPC payloads into Polars frames.
//!
//! Every column is materialized as nullable text so downstream normalization
//! sees exactly what the operator typed, independent of workbook cell types.

use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use polars::prelude::{AnyValue, Column, DataFrame, IpcReader, SerReader};

use crate::spec::{EnumCellValue, SpecSheetReadOptions};
use crate::util::{convert_data_to_text, derive_header_names, validate_unique_columns};

/// Read one worksheet of an `.xlsx`/`.xls`/`.ods` workbook into a text frame.
///
/// The first row is the header. Rows that are blank in every column are skipped.
pub fn read_spreadsheet_to_dataframe(
    path_file_in: &Path,
    options: &SpecSheetReadOptions,
) -> Result<DataFrame, String> {
    let mut workbook = open_workbook_auto(path_file_in).map_err(|err| {
        format!("Failed to open workbook {}: {err}", path_file_in.display())
    })?;

    let sheet_name = match &options.sheet_name {
        Some(name) => name.clone(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| format!("Workbook has no sheets: {}", path_file_in.display()))?,
    };
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|err| format!("Failed to read sheet {sheet_name:?}: {err}"))?;

    let mut iter_rows = range.rows();
    let Some(l_header_row) = iter_rows.next() else {
        return Ok(DataFrame::empty());
    };
    let l_colnames = derive_header_names(l_header_row, options.if_trim_header);
    validate_unique_columns(&l_colnames)?;

    let l_body: Vec<&[Data]> = iter_rows
        .filter(|row| row.iter().any(|cell| convert_data_to_text(cell).is_some()))
        .collect();
    tracing::debug!(
        sheet = %sheet_name,
        n_cols = l_colnames.len(),
        n_rows = l_body.len(),
        "read worksheet"
    );

    derive_dataframe_from_text_grid(&l_colnames, &l_body)
}

fn derive_dataframe_from_text_grid(
    l_colnames: &[String],
    l_body: &[&[Data]],
) -> Result<DataFrame, String> {
    let l_columns: Vec<Column> = l_colnames
        .iter()
        .enumerate()
        .map(|(n_idx_col, c_name)| {
            let l_values: Vec<Option<String>> = l_body
                .iter()
                .map(|row| row.get(n_idx_col).and_then(convert_data_to_text))
                .collect();
            Column::new(c_name.as_str().into(), l_values)
        })
        .collect();

    DataFrame::new(l_columns).map_err(|err| format!("Failed to build DataFrame: {err}"))
}

/// Decode Polars IPC bytes into a frame.
pub fn derive_dataframe_from_ipc_bytes(v_ipc_df: &[u8]) -> Result<DataFrame, String> {
    IpcReader::new(Cursor::new(v_ipc_df))
        .finish()
        .map_err(|err| format!("Failed to read IPC DataFrame bytes: {err}"))
}

/// Convert one Polars scalar into the kernel's cell value.
pub fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::Boolean(val) => {
            EnumCellValue::String(if val { "True" } else { "False" }.to_string())
        }
        AnyValue::UInt8(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt16(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt32(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int8(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int16(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float64(val) => EnumCellValue::Number(val),
        _ => EnumCellValue::String(value.to_string()),
    }
}

/// Return column names plus a row-major grid of cell values.
pub fn derive_rows_from_dataframe(
    df: &DataFrame,
) -> Result<(Vec<String>, Vec<Vec<EnumCellValue>>), String> {
    let l_colnames: Vec<String> = df
        .get_column_names_str()
        .into_iter()
        .map(ToString::to_string)
        .collect();
    let l_cols = df.get_columns();

    let mut l_rows = Vec::with_capacity(df.height());
    for n_idx_row in 0..df.height() {
        let mut l_row = Vec::with_capacity(l_cols.len());
        for col in l_cols {
            let value = col
                .get(n_idx_row)
                .map_err(|err| format!("Failed to access cell value: {err}"))?;
            l_row.push(derive_cell_value_from_any_value(value));
        }
        l_rows.push(l_row);
    }

    Ok((l_colnames, l_rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{IpcWriter, SerWriter};

    fn build_frame() -> DataFrame {
        DataFrame::new(vec![
            Column::new(
                "Product Name*".into(),
                vec![Some("Blue Dream by Acme - 3.5g".to_string()), None],
            ),
            Column::new("Weight*".into(), vec![Some(3.5f64), Some(1.0)]),
        ])
        .expect("frame")
    }

    #[test]
    fn test_derive_rows_from_dataframe_keeps_nulls_and_numbers() {
        let df = build_frame();
        let (l_cols, l_rows) = derive_rows_from_dataframe(&df).expect("rows");
        assert_eq!(l_cols, vec!["Product Name*", "Weight*"]);
        assert_eq!(l_rows.len(), 2);
        assert_eq!(
            l_rows[0][0],
            EnumCellValue::String("Blue Dream by Acme - 3.5g".to_string())
        );
        assert_eq!(l_rows[1][0], EnumCellValue::None);
        assert_eq!(l_rows[1][1], EnumCellValue::Number(1.0));
    }

    #[test]
    fn test_ipc_bytes_roundtrip_through_reader() {
        let mut df = build_frame();
        let mut v_buf: Vec<u8> = Vec::new();
        IpcWriter::new(&mut v_buf).finish(&mut df).expect("ipc write");

        let df_read = derive_dataframe_from_ipc_bytes(&v_buf).expect("ipc read");
        assert_eq!(df_read.shape(), (2, 2));
    }

    #[test]
    fn test_read_spreadsheet_rejects_missing_file() {
        let err = read_spreadsheet_to_dataframe(
            Path::new("/nonexistent/input.xlsx"),
            &SpecSheetReadOptions::default(),
        )
        .expect_err("missing file must fail");
        assert!(err.contains("Failed to open workbook"));
    }
}
