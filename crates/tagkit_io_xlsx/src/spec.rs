//! Shared spreadsheet specification models.

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification used by the workbook writer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
}

/// Normalized cell value during read/write conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
}

impl EnumCellValue {
    /// Render the value as display text; `None` renders as empty.
    pub fn to_text(&self) -> String {
        match self {
            EnumCellValue::None => String::new(),
            EnumCellValue::String(val) => val.clone(),
            EnumCellValue::Number(val) => {
                if val.is_finite() && val.fract() == 0.0 && val.abs() < 1e15 {
                    format!("{}", *val as i64)
                } else {
                    val.to_string()
                }
            }
        }
    }

    /// Whether the value is missing or whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            EnumCellValue::None => true,
            EnumCellValue::String(val) => val.trim().is_empty(),
            EnumCellValue::Number(val) => val.is_nan(),
        }
    }
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReadOptions

/// Options for reading one worksheet into a frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecSheetReadOptions {
    /// Worksheet name; the first sheet is used when `None`.
    pub sheet_name: Option<String>,
    /// Trim surrounding whitespace from header cells.
    pub if_trim_header: bool,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WriteOptions

/// Policy for column width inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecAutofitCellsPolicy {
    /// Max body rows inspected during width inference.
    pub height_body_inferred_max: Option<usize>,
    /// Minimum final width.
    pub width_cell_min: usize,
    /// Maximum final width.
    pub width_cell_max: usize,
    /// Width padding added after inference.
    pub width_cell_padding: usize,
}

impl Default for SpecAutofitCellsPolicy {
    fn default() -> Self {
        Self {
            height_body_inferred_max: Some(5_000),
            width_cell_min: 8,
            width_cell_max: 60,
            width_cell_padding: 2,
        }
    }
}

/// Writer-wide options controlling value conversion and layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxWriteOptions {
    /// Write numeric-looking strings in numeric columns as numbers.
    pub infer_numeric_cols: bool,
    /// Freeze the header row.
    pub if_freeze_header: bool,
    /// Column autofit policy.
    pub policy_autofit: SpecAutofitCellsPolicy,
}

impl Default for SpecXlsxWriteOptions {
    fn default() -> Self {
        Self {
            infer_numeric_cols: true,
            if_freeze_header: true,
            policy_autofit: SpecAutofitCellsPolicy::default(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Report

/// Write report for one sheet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecXlsxReport {
    /// Actual unique sheet name in workbook.
    pub sheet_name: String,
    /// Number of body rows written.
    pub n_rows_written: usize,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecXlsxReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefers_right_side() {
        let fmt_base = SpecCellFormat {
            font_name: Some("Arial".to_string()),
            bold: Some(false),
            ..Default::default()
        };
        let fmt_merged = fmt_base.with_(SpecCellFormat {
            bold: Some(true),
            ..Default::default()
        });
        assert_eq!(fmt_merged.font_name.as_deref(), Some("Arial"));
        assert_eq!(fmt_merged.bold, Some(true));
    }

    #[test]
    fn test_cell_value_text_drops_integral_decimals() {
        assert_eq!(EnumCellValue::Number(12.0).to_text(), "12");
        assert_eq!(EnumCellValue::Number(3.5).to_text(), "3.5");
        assert_eq!(EnumCellValue::None.to_text(), "");
        assert!(EnumCellValue::String("  ".to_string()).is_blank());
    }
}
