//! Shared label specification models, options and errors.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

////////////////////////////////////////////////////////////////////////////////
// #region Orientation

/// Physical label layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum EnumOrientation {
    /// 3x3 grid of landscape tags.
    #[default]
    Horizontal,
    /// 3x3 grid of portrait tags.
    Vertical,
    /// 4x5 grid of small tags.
    Mini,
    /// 4-slot inventory slip form.
    Inventory,
}

impl EnumOrientation {
    /// Lower-case name used in file names and option strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnumOrientation::Horizontal => "horizontal",
            EnumOrientation::Vertical => "vertical",
            EnumOrientation::Mini => "mini",
            EnumOrientation::Inventory => "inventory",
        }
    }
}

impl FromStr for EnumOrientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "horizontal" => Ok(EnumOrientation::Horizontal),
            "vertical" => Ok(EnumOrientation::Vertical),
            "mini" => Ok(EnumOrientation::Mini),
            "inventory" => Ok(EnumOrientation::Inventory),
            other => Err(format!(
                "Unknown orientation {other:?}; expected horizontal, vertical, mini or inventory."
            )),
        }
    }
}

impl fmt::Display for EnumOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FieldKind

/// Marker-delimited label field that the autosize pass resizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EnumFieldKind {
    /// Product description (`DESC`).
    Description,
    /// Price (`PRIC`).
    Price,
    /// Lineage text (`LINEAGE`).
    Lineage,
    /// Centered lineage text (`LINEAGE_CENTER`).
    LineageCenter,
    /// THC/CBD block (`THC_CBD`).
    ThcCbd,
    /// Cannabinoid ratio (`RATIO`).
    Ratio,
    /// Weight (`WEIGHT`).
    Weight,
    /// Units (`UNITS`).
    Units,
    /// Product strain (`PRODUCTSTRAIN`).
    Strain,
    /// Centered brand or vendor (`PRODUCTBRAND_CENTER`).
    Brand,
}

impl EnumFieldKind {
    /// All kinds in the order the autosize pass visits them.
    pub const ALL: [EnumFieldKind; 10] = [
        EnumFieldKind::Description,
        EnumFieldKind::Price,
        EnumFieldKind::Lineage,
        EnumFieldKind::LineageCenter,
        EnumFieldKind::ThcCbd,
        EnumFieldKind::Ratio,
        EnumFieldKind::Weight,
        EnumFieldKind::Units,
        EnumFieldKind::Strain,
        EnumFieldKind::Brand,
    ];

    /// Marker stem written around field text.
    pub fn marker_name(&self) -> &'static str {
        match self {
            EnumFieldKind::Description => "DESC",
            EnumFieldKind::Price => "PRIC",
            EnumFieldKind::Lineage => "LINEAGE",
            EnumFieldKind::LineageCenter => "LINEAGE_CENTER",
            EnumFieldKind::ThcCbd => "THC_CBD",
            EnumFieldKind::Ratio => "RATIO",
            EnumFieldKind::Weight => "WEIGHT",
            EnumFieldKind::Units => "UNITS",
            EnumFieldKind::Strain => "PRODUCTSTRAIN",
            EnumFieldKind::Brand => "PRODUCTBRAND_CENTER",
        }
    }

    /// Opening marker, e.g. `DESC_START`.
    pub fn marker_start(&self) -> String {
        format!("{}_START", self.marker_name())
    }

    /// Closing marker, e.g. `DESC_END`.
    pub fn marker_end(&self) -> String {
        format!("{}_END", self.marker_name())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FontScheme

/// Sizing parameters for one field kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecFontParams {
    /// Size in points for text up to `max_length` characters.
    pub base_size: f64,
    /// Lower clamp in points.
    pub min_size: f64,
    /// Character count above which the size shrinks.
    pub max_length: usize,
}

/// Per-orientation font sizing parameters, one entry per field kind.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecFontScheme {
    /// Orientation this scheme belongs to.
    pub orientation: EnumOrientation,
    /// Entries in [`EnumFieldKind::ALL`] order.
    pub entries: Vec<(EnumFieldKind, SpecFontParams)>,
}

impl SpecFontScheme {
    /// Look up parameters for one field kind.
    pub fn params(&self, kind: EnumFieldKind) -> Option<SpecFontParams> {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, params)| *params)
    }
}

/// Step function from complexity score to point size.
///
/// The first step whose ceiling is strictly above the score wins;
/// scores past every ceiling get `size_tail`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecThresholdTable {
    /// `(complexity_ceiling_exclusive, point_size)` in ascending ceiling order.
    pub steps: &'static [(usize, f64)],
    /// Size for scores at or above the last ceiling.
    pub size_tail: f64,
}

impl SpecThresholdTable {
    /// Resolve the point size for a complexity score.
    pub fn lookup(&self, n_complexity: usize) -> f64 {
        self.steps
            .iter()
            .find(|(n_ceiling, _)| n_complexity < *n_ceiling)
            .map(|(_, size)| *size)
            .unwrap_or(self.size_tail)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RecordCategories

/// Resolved lineage of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum EnumLineage {
    /// `SATIVA`.
    Sativa,
    /// `INDICA`.
    Indica,
    /// `HYBRID`; the default for missing input.
    #[default]
    Hybrid,
    /// `HYBRID/SATIVA`.
    HybridSativa,
    /// `HYBRID/INDICA`.
    HybridIndica,
    /// `CBD`.
    Cbd,
    /// `MIXED`.
    Mixed,
    /// `PARAPHERNALIA`; only reachable through a manual override.
    Paraphernalia,
}

impl EnumLineage {
    /// Upper-case display text.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnumLineage::Sativa => "SATIVA",
            EnumLineage::Indica => "INDICA",
            EnumLineage::Hybrid => "HYBRID",
            EnumLineage::HybridSativa => "HYBRID/SATIVA",
            EnumLineage::HybridIndica => "HYBRID/INDICA",
            EnumLineage::Cbd => "CBD",
            EnumLineage::Mixed => "MIXED",
            EnumLineage::Paraphernalia => "PARAPHERNALIA",
        }
    }

    /// Parse free text; returns `None` for blank or unrecognized input.
    pub fn parse_lenient(text: &str) -> Option<EnumLineage> {
        let c_key = text.trim().to_lowercase();
        match c_key.as_str() {
            "sativa" => Some(EnumLineage::Sativa),
            "indica" => Some(EnumLineage::Indica),
            "hybrid" => Some(EnumLineage::Hybrid),
            "sativa_hybrid" | "hybrid/sativa" | "hybrid sativa" => Some(EnumLineage::HybridSativa),
            "indica_hybrid" | "hybrid/indica" | "hybrid indica" => Some(EnumLineage::HybridIndica),
            "cbd" => Some(EnumLineage::Cbd),
            "mixed" => Some(EnumLineage::Mixed),
            "paraphernalia" => Some(EnumLineage::Paraphernalia),
            _ => None,
        }
    }
}

impl fmt::Display for EnumLineage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collapsed product strain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum EnumProductStrain {
    /// `Mixed`; every free-text strain collapses here.
    #[default]
    Mixed,
    /// `CBD Blend`.
    CbdBlend,
    /// `Paraphernalia`.
    Paraphernalia,
}

impl EnumProductStrain {
    /// Display text.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnumProductStrain::Mixed => "Mixed",
            EnumProductStrain::CbdBlend => "CBD Blend",
            EnumProductStrain::Paraphernalia => "Paraphernalia",
        }
    }
}

impl fmt::Display for EnumProductStrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic color bucket of a record, used for list coloring and grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EnumColorCategory {
    Sativa,
    Indica,
    Hybrid,
    HybridSativa,
    HybridIndica,
    Cbd,
    Mixed,
    Paraphernalia,
}

impl EnumColorCategory {
    /// Upper-case category name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnumColorCategory::Sativa => "SATIVA",
            EnumColorCategory::Indica => "INDICA",
            EnumColorCategory::Hybrid => "HYBRID",
            EnumColorCategory::HybridSativa => "HYBRID/SATIVA",
            EnumColorCategory::HybridIndica => "HYBRID/INDICA",
            EnumColorCategory::Cbd => "CBD",
            EnumColorCategory::Mixed => "MIXED",
            EnumColorCategory::Paraphernalia => "PARAPHERNALIA",
        }
    }
}

impl From<EnumLineage> for EnumColorCategory {
    fn from(lineage: EnumLineage) -> Self {
        match lineage {
            EnumLineage::Sativa => EnumColorCategory::Sativa,
            EnumLineage::Indica => EnumColorCategory::Indica,
            EnumLineage::Hybrid => EnumColorCategory::Hybrid,
            EnumLineage::HybridSativa => EnumColorCategory::HybridSativa,
            EnumLineage::HybridIndica => EnumColorCategory::HybridIndica,
            EnumLineage::Cbd => EnumColorCategory::Cbd,
            EnumLineage::Mixed => EnumColorCategory::Mixed,
            EnumLineage::Paraphernalia => EnumColorCategory::Paraphernalia,
        }
    }
}

impl fmt::Display for EnumColorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Record

/// One inventory row after normalization.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecLabelRecord {
    /// `Product Name*`, left-trimmed; unique within a session.
    pub product_name: String,
    /// Display description derived from the product name.
    pub description: String,
    /// `Product Type*` as typed (trimmed).
    pub product_type: String,
    /// Resolved lineage.
    pub lineage: EnumLineage,
    /// Resolved strain.
    pub product_strain: EnumProductStrain,
    /// `Product Brand`.
    pub product_brand: String,
    /// `Vendor/Supplier*`.
    pub vendor: String,
    /// Display price (`$12`, `$12.50`); empty when missing.
    pub price: String,
    /// Weight after unit conversion.
    pub weight: Option<f64>,
    /// Lower-case units after conversion (`g`, `oz`, ...).
    pub units: String,
    /// Cannabinoid ratio text.
    pub ratio: String,
    /// DOH compliance flag as typed (`Yes` enables the image).
    pub doh: String,
    /// `Barcode*`, for inventory slips.
    pub barcode: String,
    /// `Accepted Date`, for inventory slips.
    pub accepted_date: String,
    /// Integer quantity text, or empty.
    pub quantity_received: String,
}

impl SpecLabelRecord {
    /// Lower-cased product type used by every type comparison.
    pub fn product_type_key(&self) -> String {
        self.product_type.trim().to_lowercase()
    }
}

/// Raw spreadsheet row keyed by (renamed) column header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecRawRow {
    /// Column name to cell text; blank cells are absent.
    pub values: std::collections::BTreeMap<String, String>,
}

impl SpecRawRow {
    /// Cell text for `column`, or `None` when blank/missing.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .get(column)
            .map(String::as_str)
            .filter(|val| !val.trim().is_empty())
    }

    /// Builder-style insert used by ingestion and tests.
    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.values.insert(column.to_string(), value.to_string());
        self
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region GridAndAssets

/// Physical grid shape for template expansion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecGridShape {
    /// Row count.
    pub n_rows: usize,
    /// Column count.
    pub n_cols: usize,
    /// Cell width in inches.
    pub width_cell_in: f64,
    /// Cell height in inches.
    pub height_cell_in: f64,
    /// Optional inter-cell spacing in twips.
    pub spacing_cell_twips: Option<u32>,
}

impl SpecGridShape {
    /// Number of label slots.
    pub fn n_slots(&self) -> usize {
        self.n_rows * self.n_cols
    }
}

/// PNG image embedded into labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecImageAsset {
    /// Stable part name, e.g. `doh.png`.
    pub name: String,
    /// PNG bytes.
    pub bytes: Arc<Vec<u8>>,
    /// Pixel width from the PNG header.
    pub width_px: u32,
    /// Pixel height from the PNG header.
    pub height_px: u32,
}

impl SpecImageAsset {
    /// Build an asset from PNG bytes; the header is decoded for the pixel size.
    pub fn from_png_bytes(name: &str, bytes: Vec<u8>) -> Result<Self, LabelError> {
        let (width_px, height_px) = {
            let reader = png::Decoder::new(bytes.as_slice())
                .read_info()
                .map_err(|err| LabelError::Input(format!("Image {name:?} is not a PNG file: {err}")))?;
            let info = reader.info();
            (info.width, info.height)
        };
        if width_px == 0 || height_px == 0 {
            return Err(LabelError::Input(format!("Image {name:?} has zero size.")));
        }
        Ok(Self {
            name: name.to_string(),
            bytes: Arc::new(bytes),
            width_px,
            height_px,
        })
    }
}

/// Small opaque RGBA PNG used as an image fixture in tests.
#[cfg(test)]
pub(crate) fn derive_png_fixture(width_px: u32, height_px: u32) -> Vec<u8> {
    let mut v_buf = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut v_buf, width_px, height_px);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().expect("png header");
        writer
            .write_image_data(&vec![255u8; (width_px * height_px * 4) as usize])
            .expect("png data");
    }
    v_buf
}

/// Compliance images used in the DOH slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecLabelAssets {
    /// Standard DOH-compliant image.
    pub image_doh: Option<SpecImageAsset>,
    /// High-CBD DOH-compliant image.
    pub image_high_cbd: Option<SpecImageAsset>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RunOptions

/// Optional equality filters; `None` or `"All"` disables a filter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecRecordFilters {
    /// Filter on `Product Type*`.
    pub product_type: Option<String>,
    /// Filter on `Lineage`.
    pub lineage: Option<String>,
    /// Filter on `Product Brand`.
    pub brand: Option<String>,
    /// Filter on `Vendor`.
    pub vendor: Option<String>,
    /// Filter on `CombinedWeight` (e.g. `3.5g`).
    pub weight: Option<String>,
    /// Filter on `Product Strain`.
    pub strain: Option<String>,
}

/// Options for one generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecRunOptions {
    /// Label layout.
    pub orientation: EnumOrientation,
    /// Uniform font scale in `[0.5, 2.0]`.
    pub scale_factor: f64,
    /// Append a vendor/brand back page after each front page.
    pub if_print_vendor_back: bool,
    /// Active filters.
    pub filters: SpecRecordFilters,
    /// Output directory.
    pub dir_out: PathBuf,
    /// Custom prototype `.docx`; the built-in prototype is used when `None`.
    pub path_template: Option<PathBuf>,
    /// Date stamp for the output name (`YYYY-MM-DD`); today when `None`.
    pub date_stamp: Option<String>,
    /// Worker threads for chunk rendering; `0` lets rayon decide.
    pub n_workers_max: usize,
}

impl Default for SpecRunOptions {
    fn default() -> Self {
        Self {
            orientation: EnumOrientation::Horizontal,
            scale_factor: 1.0,
            if_print_vendor_back: false,
            filters: SpecRecordFilters::default(),
            dir_out: PathBuf::from("."),
            path_template: None,
            date_stamp: None,
            n_workers_max: 0,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Errors surfaced by the top-level run boundary.
#[derive(Debug)]
pub enum LabelError {
    /// Bad input: missing column, unreadable workbook, empty path.
    Input(String),
    /// No records were selected.
    EmptySelection,
    /// Filters removed every record.
    EmptyFilterResult,
    /// Template structure is unusable.
    Render(String),
    /// Filesystem failure, including a save that still failed after lock release.
    Io { path: PathBuf, message: String },
    /// Malformed feed payload.
    Feed(String),
}

impl fmt::Display for LabelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelError::Input(msg) => write!(f, "input error: {msg}"),
            LabelError::EmptySelection => write!(f, "No selected tags are checked!"),
            LabelError::EmptyFilterResult => write!(f, "No records found after filtering."),
            LabelError::Render(msg) => write!(f, "render error: {msg}"),
            LabelError::Io { path, message } => {
                write!(f, "io error at {}: {message}", path.display())
            }
            LabelError::Feed(msg) => write!(f, "feed error: {msg}"),
        }
    }
}

impl std::error::Error for LabelError {}

// #endregion
////////////////////////////////////////////////////////////////////////////////
