//! XLSX writer kernel that exports frames as formatted worksheets.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use polars::prelude::DataFrame;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};

use crate::conf::{N_LEN_EXCEL_SHEET_NAME_MAX, N_NROWS_EXCEL_MAX, derive_default_xlsx_formats};
use crate::reader::derive_cell_value_from_any_value;
use crate::spec::{EnumCellValue, SpecCellFormat, SpecXlsxReport, SpecXlsxWriteOptions};
use crate::util::{estimate_width_len, sanitize_sheet_name, validate_unique_columns};

/// Stateful workbook writer.
pub struct XlsxWriter {
    path_file_out: PathBuf,
    workbook: Workbook,
    fmt_text: SpecCellFormat,
    fmt_integer: SpecCellFormat,
    fmt_decimal: SpecCellFormat,
    fmt_header: SpecCellFormat,
    write_options: SpecXlsxWriteOptions,
    set_sheet_names_existing: BTreeSet<String>,
    l_reports: Vec<SpecXlsxReport>,
    if_closed: bool,
}

impl XlsxWriter {
    /// Create writer bound to output path using named format presets.
    ///
    /// Missing preset keys fall back to [`derive_default_xlsx_formats`].
    /// The workbook is buffered in memory until [`Self::close`] is called.
    pub fn new(
        path_file_out: PathBuf,
        dict_fmt: &BTreeMap<String, SpecCellFormat>,
        write_options: SpecXlsxWriteOptions,
    ) -> Self {
        let dict_fmt_default = derive_default_xlsx_formats();
        let pick = |key: &str| {
            dict_fmt
                .get(key)
                .or_else(|| dict_fmt_default.get(key))
                .cloned()
                .unwrap_or_default()
        };

        Self {
            path_file_out,
            workbook: Workbook::new(),
            fmt_text: pick("text"),
            fmt_integer: pick("integer"),
            fmt_decimal: pick("decimal"),
            fmt_header: pick("header"),
            write_options,
            set_sheet_names_existing: BTreeSet::new(),
            l_reports: Vec::new(),
            if_closed: false,
        }
    }

    /// Return immutable snapshot of per-sheet write reports.
    pub fn report(&self) -> Vec<SpecXlsxReport> {
        self.l_reports.clone()
    }

    /// Flush workbook to disk. Idempotent.
    pub fn close(&mut self) -> Result<(), String> {
        if self.if_closed {
            return Ok(());
        }
        self.workbook
            .save(&self.path_file_out)
            .map_err(derive_xlsx_error_text)?;
        self.if_closed = true;
        tracing::debug!(path = %self.path_file_out.display(), "workbook saved");
        Ok(())
    }

    /// Write one sheet: bold header row, typed body, frozen header and autofit widths.
    pub fn write_sheet_from_dataframe(
        &mut self,
        df_data: &DataFrame,
        sheet_name: &str,
    ) -> Result<(), String> {
        if self.if_closed {
            return Err("Cannot write after close().".to_string());
        }

        let l_colnames: Vec<String> = df_data
            .get_column_names_str()
            .into_iter()
            .map(ToString::to_string)
            .collect();
        validate_unique_columns(&l_colnames)?;

        let sheet_name_unique =
            self.derive_unique_sheet_name(&sanitize_sheet_name(sheet_name, "_"));
        let mut report = SpecXlsxReport {
            sheet_name: sheet_name_unique.clone(),
            ..Default::default()
        };

        let n_rows_max = N_NROWS_EXCEL_MAX - 1;
        let n_rows_write = if df_data.height() > n_rows_max {
            report.warn(format!(
                "Sheet {sheet_name_unique:?} truncated to {n_rows_max} rows (input has {}).",
                df_data.height()
            ));
            n_rows_max
        } else {
            df_data.height()
        };

        let set_cols_idx_integer: BTreeSet<usize> = df_data
            .get_columns()
            .iter()
            .enumerate()
            .filter(|(_, col)| col.dtype().is_integer())
            .map(|(n_idx, _)| n_idx)
            .collect();
        let set_cols_idx_numeric: BTreeSet<usize> = if self.write_options.infer_numeric_cols {
            df_data
                .get_columns()
                .iter()
                .enumerate()
                .filter(|(_, col)| col.dtype().is_numeric())
                .map(|(n_idx, _)| n_idx)
                .collect()
        } else {
            BTreeSet::new()
        };

        let fmt_header = derive_rust_xlsx_format(&self.fmt_header);
        let l_fmt_by_col: Vec<Format> = (0..l_colnames.len())
            .map(|n_idx| {
                let spec_fmt = if set_cols_idx_integer.contains(&n_idx) {
                    &self.fmt_integer
                } else if set_cols_idx_numeric.contains(&n_idx) {
                    &self.fmt_decimal
                } else {
                    &self.fmt_text
                };
                derive_rust_xlsx_format(spec_fmt)
            })
            .collect();

        let policy_autofit = self.write_options.policy_autofit.clone();
        let if_freeze_header = self.write_options.if_freeze_header;
        let worksheet = self.workbook.add_worksheet();
        worksheet
            .set_name(&sheet_name_unique)
            .map_err(derive_xlsx_error_text)?;

        let mut l_width_by_col = vec![0usize; l_colnames.len()];
        for (n_idx_col, c_name) in l_colnames.iter().enumerate() {
            l_width_by_col[n_idx_col] =
                estimate_width_len(&EnumCellValue::String(c_name.clone()));
            worksheet
                .write_string_with_format(0, cast_col_num(n_idx_col)?, c_name, &fmt_header)
                .map_err(derive_xlsx_error_text)?;
        }
        if if_freeze_header {
            worksheet
                .set_freeze_panes(1, 0)
                .map_err(derive_xlsx_error_text)?;
        }

        let n_rows_autofit = policy_autofit.height_body_inferred_max.unwrap_or(n_rows_write);
        for (n_idx_col, col) in df_data.get_columns().iter().enumerate() {
            let if_is_numeric_col = set_cols_idx_numeric.contains(&n_idx_col);
            for n_idx_row in 0..n_rows_write {
                let value_raw = derive_cell_value_from_any_value(
                    col.get(n_idx_row)
                        .map_err(|err| format!("Failed to access cell value: {err}"))?,
                );
                let value = convert_cell_value(&value_raw, if_is_numeric_col);
                if n_idx_row < n_rows_autofit {
                    l_width_by_col[n_idx_col] =
                        usize::max(l_width_by_col[n_idx_col], estimate_width_len(&value));
                }
                write_cell_with_format(
                    worksheet,
                    n_idx_row + 1,
                    n_idx_col,
                    &value,
                    &l_fmt_by_col[n_idx_col],
                )?;
            }
        }

        let n_min = usize::max(1, policy_autofit.width_cell_min);
        let n_max = usize::min(255, usize::max(n_min, policy_autofit.width_cell_max));
        for (n_idx_col, n_width_recorded) in l_width_by_col.iter().enumerate() {
            let n_width_final = usize::min(
                n_max,
                usize::max(n_min, n_width_recorded + policy_autofit.width_cell_padding),
            );
            worksheet
                .set_column_width(cast_col_num(n_idx_col)?, n_width_final as f64)
                .map_err(derive_xlsx_error_text)?;
        }

        report.n_rows_written = n_rows_write;
        self.l_reports.push(report);
        Ok(())
    }

    fn derive_unique_sheet_name(&mut self, name: &str) -> String {
        if !self.set_sheet_names_existing.contains(name) {
            self.set_sheet_names_existing.insert(name.to_string());
            return name.to_string();
        }

        let base_name: String = name
            .chars()
            .take(usize::max(1, N_LEN_EXCEL_SHEET_NAME_MAX - 3))
            .collect();

        let mut n_idx = 2usize;
        loop {
            let candidate: String = format!("{base_name}__{n_idx}")
                .chars()
                .take(N_LEN_EXCEL_SHEET_NAME_MAX)
                .collect();
            if !self.set_sheet_names_existing.contains(&candidate) {
                self.set_sheet_names_existing.insert(candidate.clone());
                return candidate;
            }
            n_idx += 1;
        }
    }
}

/// Normalize a cell for writing: numeric columns keep numbers, NaN/Inf become blank.
fn convert_cell_value(value: &EnumCellValue, if_is_numeric_col: bool) -> EnumCellValue {
    match value {
        EnumCellValue::Number(n) if !n.is_finite() => EnumCellValue::None,
        EnumCellValue::Number(n) if !if_is_numeric_col => EnumCellValue::String(n.to_string()),
        EnumCellValue::String(s) if if_is_numeric_col => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => EnumCellValue::Number(v),
            _ => EnumCellValue::String(s.clone()),
        },
        _ => value.clone(),
    }
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    format: &Format,
) -> Result<(), String> {
    match value {
        EnumCellValue::None => {
            worksheet
                .write_blank(cast_row_num(row_idx)?, cast_col_num(col_idx)?, format)
                .map_err(derive_xlsx_error_text)?;
        }
        EnumCellValue::String(val) => {
            worksheet
                .write_string_with_format(
                    cast_row_num(row_idx)?,
                    cast_col_num(col_idx)?,
                    val,
                    format,
                )
                .map_err(derive_xlsx_error_text)?;
        }
        EnumCellValue::Number(val) => {
            worksheet
                .write_number_with_format(
                    cast_row_num(row_idx)?,
                    cast_col_num(col_idx)?,
                    *val,
                    format,
                )
                .map_err(derive_xlsx_error_text)?;
        }
    }
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }
    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    match align.trim().to_ascii_lowercase().as_str() {
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

fn cast_row_num(value: usize) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("row index overflow: {value}"))
}

fn cast_col_num(value: usize) -> Result<u16, String> {
    u16::try_from(value).map_err(|_| format!("column index overflow: {value}"))
}

fn derive_xlsx_error_text(err: XlsxError) -> String {
    format!("xlsx write error: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{derive_rows_from_dataframe, read_spreadsheet_to_dataframe};
    use crate::spec::SpecSheetReadOptions;
    use polars::prelude::Column;

    #[test]
    fn test_convert_cell_value_parses_numeric_columns() {
        assert_eq!(
            convert_cell_value(&EnumCellValue::String("3.5".to_string()), true),
            EnumCellValue::Number(3.5)
        );
        assert_eq!(
            convert_cell_value(&EnumCellValue::String("3.5".to_string()), false),
            EnumCellValue::String("3.5".to_string())
        );
        assert_eq!(
            convert_cell_value(&EnumCellValue::Number(f64::NAN), true),
            EnumCellValue::None
        );
    }

    #[test]
    fn test_write_then_read_back_sheet() {
        let dir_tmp = tempfile::tempdir().expect("tempdir");
        let path_out = dir_tmp.path().join("records.xlsx");

        let df = DataFrame::new(vec![
            Column::new(
                "Product Name*".into(),
                vec![Some("Blue Dream".to_string()), Some("Gelato".to_string())],
            ),
            Column::new("Weight*".into(), vec![Some(3.5f64), None]),
        ])
        .expect("frame");

        let mut writer = XlsxWriter::new(
            path_out.clone(),
            &derive_default_xlsx_formats(),
            SpecXlsxWriteOptions::default(),
        );
        writer
            .write_sheet_from_dataframe(&df, "tags/all")
            .expect("write");
        writer.close().expect("close");
        writer.close().expect("close is idempotent");

        let l_reports = writer.report();
        assert_eq!(l_reports.len(), 1);
        assert_eq!(l_reports[0].sheet_name, "tags_all");
        assert_eq!(l_reports[0].n_rows_written, 2);

        let df_read = read_spreadsheet_to_dataframe(
            &path_out,
            &SpecSheetReadOptions {
                if_trim_header: true,
                ..Default::default()
            },
        )
        .expect("read back");
        let (l_cols, l_rows) = derive_rows_from_dataframe(&df_read).expect("rows");
        assert_eq!(l_cols, vec!["Product Name*", "Weight*"]);
        assert_eq!(l_rows[0][1], EnumCellValue::String("3.5".to_string()));
        assert_eq!(l_rows[1][1], EnumCellValue::None);
    }

    #[test]
    fn test_duplicate_sheet_names_get_suffix() {
        let dir_tmp = tempfile::tempdir().expect("tempdir");
        let df = DataFrame::new(vec![Column::new("a".into(), vec![Some(1i64)])]).expect("frame");
        let mut writer = XlsxWriter::new(
            dir_tmp.path().join("dup.xlsx"),
            &BTreeMap::new(),
            SpecXlsxWriteOptions::default(),
        );
        writer.write_sheet_from_dataframe(&df, "tags").expect("first");
        writer.write_sheet_from_dataframe(&df, "tags").expect("second");
        let l_names: Vec<String> = writer.report().into_iter().map(|r| r.sheet_name).collect();
        assert_eq!(l_names, vec!["tags".to_string(), "tags__2".to_string()]);
    }
}
