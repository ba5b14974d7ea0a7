//! Stateless helper utilities used by the reader and writer kernels.

use std::collections::{BTreeMap, BTreeSet};

use calamine::Data;
use chrono::{Duration, NaiveDate};

use crate::conf::{
    C_PREFIX_UNNAMED_COLUMN, N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_EPOCH_YMD, TUP_EXCEL_ILLEGAL,
};
use crate::spec::EnumCellValue;

////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

/// Convert one workbook cell into display text; blank cells yield `None`.
///
/// Integral floats drop their decimals, booleans render as `True`/`False`
/// and date cells render as ISO text.
pub fn convert_data_to_text(value: &Data) -> Option<String> {
    match value {
        Data::Empty => None,
        Data::String(val) => {
            if val.is_empty() {
                None
            } else {
                Some(val.clone())
            }
        }
        Data::Float(val) => Some(EnumCellValue::Number(*val).to_text()),
        Data::Int(val) => Some(val.to_string()),
        Data::Bool(val) => Some(if *val { "True" } else { "False" }.to_string()),
        Data::DateTime(val) => Some(convert_excel_serial_to_iso(val.as_f64())),
        Data::DateTimeIso(val) => Some(val.clone()),
        Data::DurationIso(val) => Some(val.clone()),
        Data::Error(err) => Some(format!("#{err:?}")),
    }
}

/// Convert an Excel 1900-system serial to `YYYY-MM-DD` (plus time when non-zero).
pub fn convert_excel_serial_to_iso(serial: f64) -> String {
    if !serial.is_finite() || serial < 0.0 {
        return serial.to_string();
    }
    let (n_year, n_month, n_day) = TUP_EXCEL_EPOCH_YMD;
    let Some(date_base) = NaiveDate::from_ymd_opt(n_year, n_month, n_day) else {
        return serial.to_string();
    };
    let Some(dt_base) = date_base.and_hms_opt(0, 0, 0) else {
        return serial.to_string();
    };

    let n_days = serial.floor() as i64;
    let n_secs = ((serial - serial.floor()) * 86_400.0).round() as i64;
    let delta = Duration::days(n_days) + Duration::seconds(n_secs);
    let Some(dt_value) = dt_base.checked_add_signed(delta) else {
        return serial.to_string();
    };

    if n_secs == 0 {
        dt_value.format("%Y-%m-%d").to_string()
    } else {
        dt_value.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region HeaderUtils

/// Validate that `columns` has no duplicated names.
pub fn validate_unique_columns(columns: &[String]) -> Result<(), String> {
    if columns.len() == columns.iter().collect::<BTreeSet<_>>().len() {
        return Ok(());
    }

    let mut dict_pos: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (n_idx, c_name) in columns.iter().enumerate() {
        dict_pos.entry(c_name).or_default().push(n_idx);
    }

    let c_msg = dict_pos
        .iter()
        .filter_map(|(c_name, l_pos)| {
            if l_pos.len() > 1 {
                Some(format!("{c_name:?} x{} at indices {:?}", l_pos.len(), l_pos))
            } else {
                None
            }
        })
        .collect::<Vec<_>>()
        .join("; ");

    Err(format!("Duplicate column names detected: {c_msg}"))
}

/// Derive header names from the first sheet row, naming blank cells `Unnamed: <idx>`.
pub fn derive_header_names(row: &[Data], if_trim: bool) -> Vec<String> {
    row.iter()
        .enumerate()
        .map(|(n_idx, cell)| {
            let c_name = convert_data_to_text(cell).unwrap_or_default();
            let c_name = if if_trim {
                c_name.trim().to_string()
            } else {
                c_name
            };
            if c_name.is_empty() {
                format!("{C_PREFIX_UNNAMED_COLUMN}{n_idx}")
            } else {
                c_name
            }
        })
        .collect()
}

/// Sanitize a sheet name against Excel's illegal characters and length limit.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WidthEstimation

/// Estimate displayed width units for one cell value.
pub fn estimate_width_len(value: &EnumCellValue) -> usize {
    match value {
        EnumCellValue::None => 0,
        EnumCellValue::String(s) => estimate_unicode_string_width(s),
        EnumCellValue::Number(_) => value.to_text().len(),
    }
}

fn estimate_unicode_string_width(s: &str) -> usize {
    let n_widest = s
        .lines()
        .map(|line| {
            let n_ascii = line.chars().filter(|chr| chr.is_ascii()).count();
            let n_non_ascii = line.chars().count().saturating_sub(n_ascii);
            n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
        })
        .max();
    n_widest.unwrap_or(0)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
