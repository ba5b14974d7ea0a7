//! Spreadsheet ingestion: raw frames to normalized, de-duplicated records.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use polars::prelude::{Column, DataFrame};
use tagkit_io_xlsx::{
    SpecSheetReadOptions, SpecXlsxWriteOptions, XlsxWriter, derive_dataframe_from_ipc_bytes,
    derive_rows_from_dataframe, read_spreadsheet_to_dataframe,
};

use crate::conf::{
    C_COL_COMBINED_WEIGHT, C_COL_DESCRIPTION, C_COL_DOH, C_COL_LINEAGE, C_COL_PRICE,
    C_COL_PRODUCT_BRAND, C_COL_PRODUCT_NAME, C_COL_PRODUCT_STRAIN, C_COL_PRODUCT_TYPE,
    C_COL_RATIO, C_COL_UNITS, C_COL_VENDOR, C_COL_WEIGHT, N_NCOLS_INPUT_MAX, TUP_COLUMN_ALIASES,
    TUP_SAMPLE_PRODUCT_TYPES,
};
use crate::normalize::{derive_combined_weight, format_weight, normalize_row};
use crate::spec::{LabelError, SpecLabelRecord, SpecRawRow};

/// Sheet written by [`export_records_to_xlsx`].
const C_SHEET_EXPORT: &str = "Labels";

////////////////////////////////////////////////////////////////////////////////
// #region Read

/// Read the first (or named) worksheet into an all-text frame.
pub fn read_spreadsheet(path: &Path, sheet_name: Option<&str>) -> Result<DataFrame, LabelError> {
    if path.as_os_str().is_empty() {
        return Err(LabelError::Input("No input file was given.".to_string()));
    }
    let options = SpecSheetReadOptions {
        sheet_name: sheet_name.map(ToString::to_string),
        if_trim_header: true,
    };
    read_spreadsheet_to_dataframe(path, &options).map_err(LabelError::Input)
}

/// Load and normalize every record of a workbook.
pub fn load_records(path: &Path, sheet_name: Option<&str>) -> Result<Vec<SpecLabelRecord>, LabelError> {
    let df = read_spreadsheet(path, sheet_name)?;
    load_records_from_dataframe(&df)
}

/// Decode Polars IPC bytes and load their records.
pub fn load_records_from_ipc_bytes(v_ipc_df: &[u8]) -> Result<Vec<SpecLabelRecord>, LabelError> {
    let df = derive_dataframe_from_ipc_bytes(v_ipc_df).map_err(LabelError::Input)?;
    load_records_from_dataframe(&df)
}

/// Turn a raw inventory frame into normalized records.
///
/// Columns past the 41st are dropped and header aliases renamed. Exact
/// duplicate rows and sample product types are removed before normalization;
/// rows whose description repeats an earlier one are removed after it.
pub fn load_records_from_dataframe(df: &DataFrame) -> Result<Vec<SpecLabelRecord>, LabelError> {
    let (mut l_colnames, l_rows) = derive_rows_from_dataframe(df).map_err(LabelError::Input)?;
    l_colnames.truncate(N_NCOLS_INPUT_MAX);
    if !l_colnames.iter().any(|name| name == C_COL_PRODUCT_NAME) {
        return Err(LabelError::Input(format!(
            "Missing required column {C_COL_PRODUCT_NAME:?}."
        )));
    }
    for name in &mut l_colnames {
        if let Some((_, c_target)) = TUP_COLUMN_ALIASES
            .iter()
            .find(|(c_alias, _)| name.as_str() == *c_alias)
        {
            *name = c_target.to_string();
        }
    }

    let n_rows_in = l_rows.len();
    let mut set_seen_rows: HashSet<Vec<String>> = HashSet::new();
    let mut n_duplicates = 0usize;
    let mut n_samples = 0usize;
    let mut l_raw: Vec<SpecRawRow> = Vec::with_capacity(n_rows_in);
    for row in l_rows {
        let l_texts: Vec<String> = row
            .iter()
            .take(l_colnames.len())
            .map(|value| value.to_text())
            .collect();
        if !set_seen_rows.insert(l_texts.clone()) {
            n_duplicates += 1;
            continue;
        }
        let mut raw = SpecRawRow::default();
        for (name, c_text) in l_colnames.iter().zip(l_texts) {
            // First occurrence wins when an alias collides with a real column.
            raw.values.entry(name.clone()).or_insert(c_text);
        }
        let c_type = raw.get(C_COL_PRODUCT_TYPE).unwrap_or_default().trim();
        if TUP_SAMPLE_PRODUCT_TYPES.contains(&c_type) {
            n_samples += 1;
            continue;
        }
        l_raw.push(raw);
    }

    let mut set_descriptions: HashSet<String> = HashSet::new();
    let l_records: Vec<SpecLabelRecord> = l_raw
        .iter()
        .map(normalize_row)
        .filter(|record| set_descriptions.insert(record.description.clone()))
        .collect();

    tracing::info!(
        "Loaded {} records from {n_rows_in} rows ({n_duplicates} duplicate rows, {n_samples} sample rows, {} repeated descriptions dropped).",
        l_records.len(),
        n_rows_in - n_duplicates - n_samples - l_records.len()
    );
    Ok(l_records)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FilterOptions

/// Unique dropdown values per filter, sorted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecFilterOptions {
    pub product_types: Vec<String>,
    pub lineages: Vec<String>,
    pub brands: Vec<String>,
    pub vendors: Vec<String>,
    /// Combined weights (`3.5g`), sorted by numeric value.
    pub weights: Vec<String>,
    pub strains: Vec<String>,
}

fn collect_unique_sorted<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .map(str::trim)
        .filter(|val| !val.is_empty())
        .map(ToString::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn parse_leading_number(text: &str) -> Option<f64> {
    let c_num: String = text
        .chars()
        .take_while(|chr| chr.is_ascii_digit() || *chr == '.')
        .collect();
    c_num.parse().ok()
}

/// Dropdown values of each filter over `records`.
pub fn derive_filter_options(records: &[SpecLabelRecord]) -> SpecFilterOptions {
    let l_combined: Vec<String> = records
        .iter()
        .map(|record| derive_combined_weight(record.weight, &record.units))
        .collect();
    let mut weights = collect_unique_sorted(l_combined.iter().map(String::as_str));
    weights.sort_by(|a, b| {
        let key = |text: &str| parse_leading_number(text).unwrap_or(f64::INFINITY);
        key(a).total_cmp(&key(b)).then_with(|| a.cmp(b))
    });

    SpecFilterOptions {
        product_types: collect_unique_sorted(records.iter().map(|r| r.product_type.as_str())),
        lineages: collect_unique_sorted(records.iter().map(|r| r.lineage.as_str())),
        brands: collect_unique_sorted(records.iter().map(|r| r.product_brand.as_str())),
        vendors: collect_unique_sorted(records.iter().map(|r| r.vendor.as_str())),
        weights,
        strains: collect_unique_sorted(records.iter().map(|r| r.product_strain.as_str())),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Export

fn derive_text_column(
    name: &str,
    records: &[SpecLabelRecord],
    f: impl Fn(&SpecLabelRecord) -> String,
) -> Column {
    let l_values: Vec<String> = records.iter().map(f).collect();
    Column::new(name.into(), l_values)
}

/// Normalized records as an all-text frame with the export columns.
pub fn derive_dataframe_from_records(records: &[SpecLabelRecord]) -> Result<DataFrame, String> {
    let l_columns = vec![
        derive_text_column(C_COL_PRODUCT_NAME, records, |r| r.product_name.clone()),
        derive_text_column(C_COL_DESCRIPTION, records, |r| r.description.clone()),
        derive_text_column(C_COL_PRODUCT_TYPE, records, |r| r.product_type.clone()),
        derive_text_column(C_COL_LINEAGE, records, |r| r.lineage.to_string()),
        derive_text_column(C_COL_PRODUCT_STRAIN, records, |r| r.product_strain.to_string()),
        derive_text_column(C_COL_PRODUCT_BRAND, records, |r| r.product_brand.clone()),
        derive_text_column(C_COL_VENDOR, records, |r| r.vendor.clone()),
        derive_text_column(C_COL_PRICE, records, |r| r.price.clone()),
        derive_text_column(C_COL_WEIGHT, records, |r| {
            r.weight.map(format_weight).unwrap_or_default()
        }),
        derive_text_column(C_COL_UNITS, records, |r| r.units.clone()),
        derive_text_column(C_COL_COMBINED_WEIGHT, records, |r| {
            derive_combined_weight(r.weight, &r.units)
        }),
        derive_text_column(C_COL_RATIO, records, |r| r.ratio.clone()),
        derive_text_column(C_COL_DOH, records, |r| r.doh.clone()),
    ];
    DataFrame::new(l_columns).map_err(|err| format!("Failed to build export DataFrame: {err}"))
}

/// Write the normalized table to an `.xlsx` workbook.
pub fn export_records_to_xlsx(records: &[SpecLabelRecord], path: &Path) -> Result<(), LabelError> {
    let to_io = |message: String| LabelError::Io {
        path: path.to_path_buf(),
        message,
    };
    let df = derive_dataframe_from_records(records).map_err(to_io)?;
    let mut writer = XlsxWriter::new(
        path.to_path_buf(),
        &Default::default(),
        SpecXlsxWriteOptions {
            infer_numeric_cols: false,
            ..SpecXlsxWriteOptions::default()
        },
    );
    writer
        .write_sheet_from_dataframe(&df, C_SHEET_EXPORT)
        .map_err(to_io)?;
    writer.close().map_err(to_io)?;
    tracing::debug!("Exported {} records to {}.", records.len(), path.display());
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{EnumLineage, EnumProductStrain};
    use polars::prelude::{IpcWriter, SerWriter};

    fn build_frame() -> DataFrame {
        let col = |name: &str, values: &[&str]| {
            let l_values: Vec<Option<String>> = values
                .iter()
                .map(|val| (!val.is_empty()).then(|| val.to_string()))
                .collect();
            Column::new(name.into(), l_values)
        };
        DataFrame::new(vec![
            col(
                "Product Name*",
                &[
                    "  Blue Dream - 3.5g",
                    "  Blue Dream - 3.5g",
                    "Free Sample Jar",
                    "Glass Pipe",
                    "Blue Dream - 3.5g by Acme",
                ],
            ),
            col(
                "Product Type*",
                &["flower", "flower", "Sample - Vendor", "paraphernalia", "flower"],
            ),
            col("Lineage", &["sativa", "sativa", "", "indica", "sativa"]),
            col("Product Brand", &["Acme", "Acme", "", "GlassCo", "Acme"]),
            col("Vendor/Supplier*", &["Farm A", "Farm A", "", "Glass Inc", "Farm A"]),
            col("Price* (Tier Name for Bulk)", &["25", "25", "0", "12.5", "25"]),
            col("Weight*", &["3.5", "3.5", "", "", "3.5"]),
            col("Weight Unit* (grams/gm or ounces/oz)", &["grams", "grams", "", "", "grams"]),
        ])
        .expect("frame")
    }

    #[test]
    fn test_load_records_dedups_and_excludes_samples() {
        let l_records = load_records_from_dataframe(&build_frame()).expect("records");
        assert_eq!(l_records.len(), 2);

        let flower = &l_records[0];
        assert_eq!(flower.product_name, "Blue Dream - 3.5g");
        assert_eq!(flower.description, "Blue Dream - 3.5g");
        assert_eq!(flower.lineage, EnumLineage::Sativa);
        assert_eq!(flower.vendor, "Farm A");
        assert_eq!(flower.price, "$25");
        assert_eq!(flower.units, "g");

        let pipe = &l_records[1];
        assert_eq!(pipe.product_strain, EnumProductStrain::Paraphernalia);
        assert_eq!(pipe.price, "$12.50");
    }

    #[test]
    fn test_missing_product_name_is_input_error() {
        let df = DataFrame::new(vec![Column::new("Lineage".into(), vec!["sativa"])]).expect("frame");
        match load_records_from_dataframe(&df) {
            Err(LabelError::Input(msg)) => assert!(msg.contains("Product Name*")),
            other => panic!("expected input error, got {other:?}"),
        }
    }

    #[test]
    fn test_columns_past_limit_are_ignored() {
        let mut l_columns: Vec<Column> = (0..N_NCOLS_INPUT_MAX)
            .map(|idx| Column::new(format!("Extra {idx}").as_str().into(), vec!["x"]))
            .collect();
        l_columns.push(Column::new(C_COL_PRODUCT_NAME.into(), vec!["Late Column"]));
        let df = DataFrame::new(l_columns).expect("frame");
        assert!(load_records_from_dataframe(&df).is_err());
    }

    #[test]
    fn test_ipc_bytes_round_into_records() {
        let mut df = build_frame();
        let mut v_bytes: Vec<u8> = Vec::new();
        IpcWriter::new(&mut v_bytes).finish(&mut df).expect("ipc");
        let l_records = load_records_from_ipc_bytes(&v_bytes).expect("records");
        assert_eq!(l_records.len(), 2);
    }

    #[test]
    fn test_filter_options_sort_weights_numerically() {
        let record = |weight: f64, brand: &str| SpecLabelRecord {
            product_name: format!("{brand} {weight}"),
            product_brand: brand.to_string(),
            weight: Some(weight),
            units: "g".to_string(),
            ..SpecLabelRecord::default()
        };
        let options = derive_filter_options(&[
            record(28.0, "Zeta"),
            record(3.5, "Acme"),
            record(10.0, "Acme"),
        ]);
        assert_eq!(options.weights, vec!["3.5g", "10g", "28g"]);
        assert_eq!(options.brands, vec!["Acme", "Zeta"]);
        assert_eq!(options.lineages, vec!["HYBRID"]);
    }

    #[test]
    fn test_export_writes_workbook() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("labels.xlsx");
        let l_records = load_records_from_dataframe(&build_frame()).expect("records");
        export_records_to_xlsx(&l_records, &path).expect("export");
        assert!(path.is_file());

        let df = read_spreadsheet(&path, None).expect("read back");
        assert_eq!(df.height(), 2);
        assert!(df.column(C_COL_COMBINED_WEIGHT).is_ok());
    }
}
