//! Label constants, static tables and default preset factories.

use crate::spec::{
    EnumColorCategory, EnumFieldKind, EnumLineage, EnumOrientation, SpecFontParams,
    SpecFontScheme, SpecGridShape, SpecThresholdTable,
};

////////////////////////////////////////////////////////////////////////////////
// #region Input

/// Columns past this index are discarded on ingestion.
pub const N_NCOLS_INPUT_MAX: usize = 41;

pub const C_COL_PRODUCT_NAME: &str = "Product Name*";
pub const C_COL_PRODUCT_TYPE: &str = "Product Type*";
pub const C_COL_LINEAGE: &str = "Lineage";
pub const C_COL_PRODUCT_BRAND: &str = "Product Brand";
pub const C_COL_PRODUCT_STRAIN: &str = "Product Strain";
pub const C_COL_VENDOR: &str = "Vendor";
pub const C_COL_PRICE: &str = "Price";
pub const C_COL_WEIGHT: &str = "Weight*";
pub const C_COL_UNITS: &str = "Units";
pub const C_COL_DOH: &str = "DOH";
pub const C_COL_BARCODE: &str = "Barcode*";
pub const C_COL_ACCEPTED_DATE: &str = "Accepted Date";
pub const C_COL_QUANTITY_RECEIVED: &str = "Quantity Received*";
pub const C_COL_QUANTITY: &str = "Quantity*";
pub const C_COL_DESCRIPTION: &str = "Description";
pub const C_COL_RATIO: &str = "Ratio";
pub const C_COL_COMBINED_WEIGHT: &str = "CombinedWeight";

/// Source header aliases renamed on ingestion.
pub const TUP_COLUMN_ALIASES: [(&str, &str); 4] = [
    ("Weight Unit* (grams/gm or ounces/oz)", C_COL_UNITS),
    ("Price* (Tier Name for Bulk)", C_COL_PRICE),
    ("Vendor/Supplier*", C_COL_VENDOR),
    ("DOH Compliant (Yes/No)", C_COL_DOH),
];

/// Product types excluded from every run.
pub const TUP_SAMPLE_PRODUCT_TYPES: [&str; 2] = ["Samples - Educational", "Sample - Vendor"];

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ProductTypes

pub const C_TYPE_PARAPHERNALIA: &str = "paraphernalia";

/// Types whose color category comes straight from lineage.
pub const TUP_CLASSIC_TYPES: [&str; 6] = [
    "flower",
    "pre-roll",
    "concentrate",
    "infused pre-roll",
    "solventless concentrate",
    "vape cartridge",
];

/// Types that print lineage plus the THC/CBD block.
pub const TUP_THC_CBD_TYPES: [&str; 8] = [
    "co2 concentrate",
    "alcohol/ethanol extract",
    "flower",
    "vape cartridge",
    "solventless concentrate",
    "concentrate",
    "pre-roll",
    "infused pre-roll",
];

pub const TUP_PRE_ROLL_TYPES: [&str; 2] = ["pre-roll", "infused pre-roll"];

/// Types stored in grams that print in ounces.
pub const TUP_OUNCE_CONVERTED_TYPES: [&str; 6] = [
    "edible (solid)",
    "edible (liquid)",
    "high cbd edible liquid",
    "tincture",
    "topical",
    "capsule",
];

/// DOH-compliant types that use the high-CBD image.
pub const TUP_HIGH_CBD_DOH_TYPES: [&str; 3] = [
    "high cbd edible liquid - doh compliant",
    "high cbd edible solid - doh compliant",
    "high cbd topical - doh compliant",
];

pub const F_GRAMS_TO_OUNCES: f64 = 0.035_273_961_95;

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Text

pub const C_NBSP: char = '\u{00A0}';
pub const C_THC_CBD_BLOCK: &str = "THC:\n\nCBD:";
pub const C_PLACEHOLDER_PROTOTYPE_LABEL: &str = "Label1";
pub const C_FONT_NAME_LABEL: &str = "Arial";
/// Weight applied to each word in the complexity score.
pub const N_WORD_WEIGHT: usize = 5;

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Scale

pub const F_SCALE_FACTOR_MIN: f64 = 0.5;
pub const F_SCALE_FACTOR_MAX: f64 = 2.0;

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FontSchemes

type TupFontRow = (EnumFieldKind, f64, f64, usize);

const TUP_FONT_SCHEME_HORIZONTAL: [TupFontRow; 10] = [
    (EnumFieldKind::Description, 28.0, 12.0, 100),
    (EnumFieldKind::Price, 38.0, 20.0, 20),
    (EnumFieldKind::Lineage, 20.0, 12.0, 30),
    (EnumFieldKind::LineageCenter, 18.0, 12.0, 30),
    (EnumFieldKind::ThcCbd, 12.0, 10.0, 50),
    (EnumFieldKind::Ratio, 10.0, 8.0, 30),
    (EnumFieldKind::Weight, 18.0, 10.0, 20),
    (EnumFieldKind::Units, 18.0, 10.0, 20),
    (EnumFieldKind::Strain, 1.0, 1.0, 40),
    (EnumFieldKind::Brand, 20.0, 12.0, 40),
];

const TUP_FONT_SCHEME_VERTICAL: [TupFontRow; 10] = [
    (EnumFieldKind::Description, 23.0, 12.0, 100),
    (EnumFieldKind::Price, 36.0, 20.0, 20),
    (EnumFieldKind::Lineage, 18.0, 12.0, 30),
    (EnumFieldKind::LineageCenter, 18.0, 12.0, 30),
    (EnumFieldKind::ThcCbd, 12.0, 10.0, 50),
    (EnumFieldKind::Ratio, 8.0, 10.0, 30),
    (EnumFieldKind::Weight, 16.0, 10.0, 20),
    (EnumFieldKind::Units, 16.0, 10.0, 20),
    (EnumFieldKind::Strain, 1.0, 1.0, 40),
    (EnumFieldKind::Brand, 20.0, 12.0, 40),
];

const TUP_FONT_SCHEME_MINI: [TupFontRow; 10] = [
    (EnumFieldKind::Description, 20.0, 8.0, 100),
    (EnumFieldKind::Price, 22.0, 10.0, 20),
    (EnumFieldKind::Lineage, 10.0, 8.0, 30),
    (EnumFieldKind::LineageCenter, 10.0, 8.0, 30),
    (EnumFieldKind::ThcCbd, 8.0, 6.0, 50),
    (EnumFieldKind::Ratio, 8.0, 6.0, 30),
    (EnumFieldKind::Weight, 10.0, 8.0, 20),
    (EnumFieldKind::Units, 10.0, 8.0, 20),
    (EnumFieldKind::Strain, 1.0, 1.0, 40),
    (EnumFieldKind::Brand, 7.0, 1.0, 40),
];

/// Build the font scheme for an orientation; inventory slips reuse the horizontal scheme.
pub fn derive_font_scheme(orientation: EnumOrientation) -> SpecFontScheme {
    let l_rows: &[TupFontRow] = match orientation {
        EnumOrientation::Vertical => &TUP_FONT_SCHEME_VERTICAL,
        EnumOrientation::Mini => &TUP_FONT_SCHEME_MINI,
        EnumOrientation::Horizontal | EnumOrientation::Inventory => &TUP_FONT_SCHEME_HORIZONTAL,
    };
    SpecFontScheme {
        orientation,
        entries: l_rows
            .iter()
            .map(|(kind, base_size, min_size, max_length)| {
                (
                    *kind,
                    SpecFontParams {
                        base_size: *base_size,
                        min_size: *min_size,
                        max_length: *max_length,
                    },
                )
            })
            .collect(),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ComplexityThresholds

const TABLE_DESC_MINI: SpecThresholdTable = SpecThresholdTable {
    steps: &[(30, 19.0), (40, 18.0), (50, 17.0), (70, 16.0), (90, 14.0), (100, 12.0)],
    size_tail: 10.0,
};
const TABLE_DESC_VERTICAL: SpecThresholdTable = SpecThresholdTable {
    steps: &[(30, 29.0), (60, 26.0), (100, 22.0), (140, 20.0)],
    size_tail: 18.0,
};
const TABLE_DESC_HORIZONTAL: SpecThresholdTable = SpecThresholdTable {
    steps: &[(20, 34.0), (30, 32.0), (40, 28.0), (50, 26.0), (60, 24.0), (70, 22.0)],
    size_tail: 20.0,
};
const TABLE_DESC_FALLBACK: SpecThresholdTable = SpecThresholdTable {
    steps: &[],
    size_tail: 14.0,
};

const TABLE_RATIO_MINI: SpecThresholdTable = SpecThresholdTable {
    steps: &[(20, 8.0), (40, 7.0)],
    size_tail: 6.0,
};
// The tail steps back up to 10pt after the 8pt band.
const TABLE_RATIO_VERTICAL: SpecThresholdTable = SpecThresholdTable {
    steps: &[(20, 14.0), (30, 12.0), (100, 10.0), (140, 8.0)],
    size_tail: 10.0,
};
const TABLE_RATIO_HORIZONTAL: SpecThresholdTable = SpecThresholdTable {
    steps: &[(20, 16.0), (30, 14.0), (50, 12.0), (100, 10.0)],
    size_tail: 10.0,
};
const TABLE_RATIO_FALLBACK: SpecThresholdTable = SpecThresholdTable {
    steps: &[],
    size_tail: 10.0,
};

const TABLE_BRAND_MINI: SpecThresholdTable = SpecThresholdTable {
    steps: &[(10, 14.0), (30, 11.0), (40, 8.0)],
    size_tail: 7.0,
};
const TABLE_BRAND_VERTICAL: SpecThresholdTable = SpecThresholdTable {
    steps: &[(20, 16.0), (40, 14.0), (80, 12.0)],
    size_tail: 11.0,
};
const TABLE_BRAND_HORIZONTAL: SpecThresholdTable = SpecThresholdTable {
    steps: &[(20, 18.0), (40, 16.0), (80, 12.0)],
    size_tail: 10.0,
};

/// Complexity step table for a field kind, or `None` when the kind uses the length rule.
pub fn derive_threshold_table(
    kind: EnumFieldKind,
    orientation: EnumOrientation,
) -> Option<SpecThresholdTable> {
    use EnumOrientation::{Horizontal, Inventory, Mini, Vertical};
    let table = match (kind, orientation) {
        (EnumFieldKind::Description, Mini) => TABLE_DESC_MINI,
        (EnumFieldKind::Description, Vertical) => TABLE_DESC_VERTICAL,
        (EnumFieldKind::Description, Horizontal) => TABLE_DESC_HORIZONTAL,
        (EnumFieldKind::Description, Inventory) => TABLE_DESC_FALLBACK,
        (EnumFieldKind::Ratio, Mini) => TABLE_RATIO_MINI,
        (EnumFieldKind::Ratio, Vertical) => TABLE_RATIO_VERTICAL,
        (EnumFieldKind::Ratio, Horizontal) => TABLE_RATIO_HORIZONTAL,
        (EnumFieldKind::Ratio, Inventory) => TABLE_RATIO_FALLBACK,
        (EnumFieldKind::Brand, Mini) => TABLE_BRAND_MINI,
        (EnumFieldKind::Brand, Vertical) => TABLE_BRAND_VERTICAL,
        (EnumFieldKind::Brand, Horizontal | Inventory) => TABLE_BRAND_HORIZONTAL,
        _ => return None,
    };
    Some(table)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ConditionalFormatting

/// Ordered keyword rules; the first rule with any keyword in the cell text wins.
pub const TUP_CELL_COLOR_RULES: [(&[&str], &str); 8] = [
    (&["CBD", "CBN", "CBG", "CBC"], "F1C232"),
    (&["PARAPHERNALIA"], "FFC0CB"),
    (&["HYBRID/INDICA", "HYBRID INDICA"], "9900FF"),
    (&["HYBRID/SATIVA", "HYBRID SATIVA"], "ED4123"),
    (&["INDICA"], "9900FF"),
    (&["SATIVA"], "ED4123"),
    (&["HYBRID"], "009900"),
    (&["MIXED"], "0021F5"),
];

pub const C_COLOR_CELL_DEFAULT: &str = "FFFFFF";
pub const C_COLOR_FONT_ON_FILL: &str = "FFFFFF";
pub const C_COLOR_MIDDLE_ROW: &str = "C0C0C0";
pub const TUP_MIDDLE_ROW_KEYWORDS: [&str; 2] = ["LINEAGE", "PRODUCT STRAIN"];

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Grid

pub const N_TWIPS_PER_INCH: f64 = 1440.0;
pub const N_EMU_PER_MM: f64 = 36_000.0;
pub const C_COLOR_GRID_SHADING: &str = "D3D3D3";
pub const C_COLOR_GRID_GUIDE: &str = "D3D3D3";
/// Guide line width in eighths of a point.
pub const N_SIZE_GRID_GUIDE: u32 = 4;
/// Uniform spacing re-applied to every table of a composed document (0.03 in).
pub const N_TWIPS_COMPOSE_SPACING: u32 = 43;

/// Grid shape per orientation; inventory slips are not expanded.
pub fn derive_grid_shape(orientation: EnumOrientation) -> Option<SpecGridShape> {
    match orientation {
        EnumOrientation::Horizontal | EnumOrientation::Vertical => Some(SpecGridShape {
            n_rows: 3,
            n_cols: 3,
            width_cell_in: 3.5,
            height_cell_in: 2.5,
            spacing_cell_twips: None,
        }),
        EnumOrientation::Mini => Some(SpecGridShape {
            n_rows: 5,
            n_cols: 4,
            width_cell_in: 2.5,
            height_cell_in: 1.75,
            // 0.001 in
            spacing_cell_twips: Some(1),
        }),
        EnumOrientation::Inventory => None,
    }
}

/// Label slots per page.
pub fn calculate_slots_per_page(orientation: EnumOrientation) -> usize {
    match derive_grid_shape(orientation) {
        Some(shape) => shape.n_slots(),
        None => N_SLOTS_INVENTORY,
    }
}

pub const N_SLOTS_INVENTORY: usize = 4;

/// DOH image width in millimetres.
pub fn derive_image_width_mm(orientation: EnumOrientation) -> f64 {
    match orientation {
        EnumOrientation::Mini => 8.0,
        EnumOrientation::Vertical => 12.0,
        EnumOrientation::Horizontal | EnumOrientation::Inventory => 14.0,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Ordering

/// Sort order for generated tags.
pub const TUP_LINEAGE_SORT_ORDER: [EnumLineage; 8] = [
    EnumLineage::Sativa,
    EnumLineage::Indica,
    EnumLineage::Hybrid,
    EnumLineage::HybridSativa,
    EnumLineage::HybridIndica,
    EnumLineage::Cbd,
    EnumLineage::Mixed,
    EnumLineage::Paraphernalia,
];

/// Group order for the selected-tags list.
pub const TUP_SELECTED_GROUP_ORDER: [EnumColorCategory; 8] = [
    EnumColorCategory::Sativa,
    EnumColorCategory::HybridSativa,
    EnumColorCategory::Indica,
    EnumColorCategory::HybridIndica,
    EnumColorCategory::Hybrid,
    EnumColorCategory::Cbd,
    EnumColorCategory::Mixed,
    EnumColorCategory::Paraphernalia,
];

/// List colors per category.
pub const TUP_CATEGORY_COLORS: [(EnumColorCategory, &str); 8] = [
    (EnumColorCategory::Sativa, "#E74C3C"),
    (EnumColorCategory::Indica, "#8E44AD"),
    (EnumColorCategory::Hybrid, "#27AE60"),
    (EnumColorCategory::HybridSativa, "#E74C3C"),
    (EnumColorCategory::HybridIndica, "#8E44AD"),
    (EnumColorCategory::Cbd, "#F1C40F"),
    (EnumColorCategory::Mixed, "#2C3E50"),
    (EnumColorCategory::Paraphernalia, "#FF69B4"),
];

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Feed

/// Keyword in a feed item name that pins the record product type.
pub const TUP_FEED_TYPE_OVERRIDES: [(&str, &str); 5] = [
    ("all-in-one", "vape cartridge"),
    ("rosin", "concentrate"),
    ("mini buds", "flower"),
    ("bud", "flower"),
    ("pre-roll", "pre-roll"),
];

pub const N_FEED_TOKEN_OVERLAP_MIN: usize = 2;
pub const F_FEED_JACCARD_MIN: f64 = 0.3;
pub const F_FEED_SEQUENCE_RATIO_MIN: f64 = 0.6;

// #endregion
////////////////////////////////////////////////////////////////////////////////
