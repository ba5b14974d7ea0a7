//! Field normalizer: raw spreadsheet cells to canonical record fields.
//!
//! Every function here is total. Parse failures degrade to the cleaned
//! input text rather than an error.

use std::sync::LazyLock;

use regex::Regex;

use crate::conf::{
    C_COL_ACCEPTED_DATE, C_COL_BARCODE, C_COL_DOH, C_COL_LINEAGE, C_COL_PRICE, C_COL_PRODUCT_BRAND,
    C_COL_PRODUCT_NAME, C_COL_PRODUCT_STRAIN, C_COL_PRODUCT_TYPE, C_COL_QUANTITY,
    C_COL_QUANTITY_RECEIVED, C_COL_UNITS, C_COL_VENDOR, C_COL_WEIGHT, C_TYPE_PARAPHERNALIA,
    F_GRAMS_TO_OUNCES, TUP_OUNCE_CONVERTED_TYPES, TUP_PRE_ROLL_TYPES,
};
use crate::spec::{EnumLineage, EnumProductStrain, SpecLabelRecord, SpecRawRow};

static RE_CANNABINOID_DESCRIPTION: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?i)CBD|CBN|CBC|CBG|:"));
static RE_CANNABINOID_RATIO: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:CBD|CBC|CBN|CBG)\b"));
static RE_PARAPHERNALIA_WEIGHT_SUFFIX: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\s*-\s*\d+g$"));
static RE_RATIO_FROM_NAME: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"-\s*(.+)"));
static RE_RATIO_LINE_SPLIT: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\s*\|\s*|\s{2,}"));

fn if_regex_matches(re: &LazyLock<Result<Regex, regex::Error>>, text: &str) -> bool {
    match re.as_ref() {
        Ok(re) => re.is_match(text),
        Err(_) => false,
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region Numbers

fn parse_decimal(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|val| val.is_finite())
}

fn if_integral(val: f64) -> bool {
    val.fract() == 0.0 && val.abs() < i64::MAX as f64
}

/// Spreadsheet-style price with a leading apostrophe: `'12`, `'7.5`.
pub fn format_price(raw: &str) -> String {
    let c_clean = raw.trim().trim_start_matches(['$', '\'']).trim();
    match parse_decimal(c_clean) {
        Some(val) if if_integral(val) => format!("'{}", val as i64),
        Some(val) => format!("'{val}"),
        None => format!("'{c_clean}"),
    }
}

/// On-label price: `$12`, `$12.50`; empty input stays empty.
pub fn format_price_display(raw: &str) -> String {
    let c_trim = raw.trim();
    if c_trim.is_empty() {
        return String::new();
    }
    let c_clean = c_trim.trim_start_matches('$').replace('\'', "");
    let c_clean = c_clean.trim();
    match parse_decimal(c_clean) {
        Some(val) if if_integral(val) => format!("${}", val as i64),
        Some(val) => format!("${val:.2}"),
        None => format!("${c_clean}"),
    }
}

/// Two decimals with trailing zeros and point stripped: `1.00` -> `1`, `3.50` -> `3.5`.
pub fn format_weight(weight: f64) -> String {
    let c_fixed = format!("{weight:.2}");
    c_fixed
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Lower-case units with `ounces`/`grams` spelled short.
pub fn normalize_units(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace("ounces", "oz")
        .replace("grams", "g")
}

/// Convert gram weights to ounces for the types that print in ounces.
///
/// Returns the input unchanged for every other type or unit, so applying it
/// twice is the same as applying it once.
pub fn convert_weight_units(
    product_type_key: &str,
    weight: Option<f64>,
    units: &str,
) -> (Option<f64>, String) {
    match weight {
        Some(val)
            if TUP_OUNCE_CONVERTED_TYPES.contains(&product_type_key)
                && matches!(units, "g" | "grams") =>
        {
            (Some(val * F_GRAMS_TO_OUNCES), "oz".to_string())
        }
        _ => (weight, units.to_string()),
    }
}

/// `3.5g` style value used by the weight filter; empty without a weight.
pub fn derive_combined_weight(weight: Option<f64>, units: &str) -> String {
    match weight {
        Some(val) => format!("{}{units}", format_weight(val)),
        None => String::new(),
    }
}

/// Label weight text: ` -<NBSP>1oz`; empty when weight or units are missing.
pub fn format_weight_units(weight: Option<f64>, units: &str) -> String {
    match weight {
        Some(val) if !units.is_empty() => format!(" -\u{00A0}{}{units}", format_weight(val)),
        _ => String::new(),
    }
}

/// Integer text for inventory quantities; anything unparsable becomes empty.
pub fn coerce_quantity(raw: &str) -> String {
    match parse_decimal(raw) {
        Some(val) if if_integral(val) => (val as i64).to_string(),
        Some(val) => (val.trunc() as i64).to_string(),
        None => String::new(),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Text

/// Lineage from the raw column, defaulting to HYBRID, with the
/// cannabinoid description override applied last.
pub fn resolve_lineage(raw: Option<&str>, description: &str) -> EnumLineage {
    if if_regex_matches(&RE_CANNABINOID_DESCRIPTION, description) {
        return EnumLineage::Cbd;
    }
    raw.and_then(EnumLineage::parse_lenient).unwrap_or_default()
}

/// Text before `" by"`; paraphernalia also loses a trailing `-<n>g`.
pub fn derive_description(product_name: &str, product_type_key: &str) -> String {
    let c_head = product_name.split(" by").next().unwrap_or_default();
    if product_type_key != C_TYPE_PARAPHERNALIA {
        return c_head.to_string();
    }
    match RE_PARAPHERNALIA_WEIGHT_SUFFIX.as_ref() {
        Ok(re) => re.replace(c_head, "").into_owned(),
        Err(_) => c_head.to_string(),
    }
}

/// Everything after the first dash of the product name, with ` / ` flattened.
pub fn extract_ratio(product_name: &str) -> String {
    let Ok(re) = RE_RATIO_FROM_NAME.as_ref() else {
        return String::new();
    };
    re.captures(product_name)
        .and_then(|caps| caps.get(1))
        .map(|hit| hit.as_str().replace(" / ", " "))
        .unwrap_or_default()
}

/// Pre-roll ratio: drop the first two `" - "` segments and prefix `" - "`.
pub fn derive_pre_roll_ratio(ratio: &str) -> String {
    let l_parts: Vec<&str> = ratio.split(" - ").collect();
    let c_new = match l_parts.len() {
        0 | 1 => ratio.trim().to_string(),
        2 => l_parts[1].trim().to_string(),
        _ => l_parts[2..].join(" - ").trim().to_string(),
    };
    if c_new.starts_with(" - ") {
        c_new
    } else {
        format!(" - {c_new}")
    }
}

/// Split on `|` or runs of two or more spaces and join the pieces with newlines.
pub fn format_ratio_multiline(ratio: &str) -> String {
    let c_trim = ratio.trim();
    let l_parts: Vec<&str> = match RE_RATIO_LINE_SPLIT.as_ref() {
        Ok(re) => re.split(c_trim).collect(),
        Err(_) => vec![c_trim],
    };
    l_parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse free-text strain, then apply the ratio, description and
/// paraphernalia overrides in that order.
pub fn resolve_product_strain(
    raw: Option<&str>,
    ratio: &str,
    description: &str,
    product_type_key: &str,
) -> EnumProductStrain {
    let mut strain = match raw.map(str::trim) {
        Some("CBD Blend") => EnumProductStrain::CbdBlend,
        _ => EnumProductStrain::Mixed,
    };
    if if_regex_matches(&RE_CANNABINOID_RATIO, ratio) {
        strain = EnumProductStrain::CbdBlend;
    }
    if if_regex_matches(&RE_CANNABINOID_DESCRIPTION, description) {
        strain = EnumProductStrain::CbdBlend;
    }
    if product_type_key == C_TYPE_PARAPHERNALIA {
        strain = EnumProductStrain::Paraphernalia;
    }
    strain
}

fn derive_ratio(product_name: &str, product_type_key: &str) -> String {
    let ratio = extract_ratio(product_name);
    if TUP_PRE_ROLL_TYPES.contains(&product_type_key) {
        derive_pre_roll_ratio(&ratio)
    } else {
        ratio
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Records

/// Build a record from one raw (alias-renamed) spreadsheet row.
pub fn normalize_row(row: &SpecRawRow) -> SpecLabelRecord {
    let c_text = |column: &str| row.get(column).unwrap_or_default().trim().to_string();

    let product_name = row
        .get(C_COL_PRODUCT_NAME)
        .unwrap_or_default()
        .trim_start()
        .to_string();
    let product_type = c_text(C_COL_PRODUCT_TYPE);
    let product_type_key = product_type.to_lowercase();

    let description = derive_description(&product_name, &product_type_key);
    let ratio = derive_ratio(&product_name, &product_type_key);
    let lineage = resolve_lineage(row.get(C_COL_LINEAGE), &description);
    let product_strain = resolve_product_strain(
        row.get(C_COL_PRODUCT_STRAIN),
        &ratio,
        &description,
        &product_type_key,
    );

    let weight = row.get(C_COL_WEIGHT).and_then(parse_decimal);
    let units = normalize_units(row.get(C_COL_UNITS).unwrap_or_default());
    let (weight, units) = convert_weight_units(&product_type_key, weight, &units);

    let quantity_received = row
        .get(C_COL_QUANTITY_RECEIVED)
        .or_else(|| row.get(C_COL_QUANTITY))
        .map(coerce_quantity)
        .unwrap_or_default();

    SpecLabelRecord {
        product_name,
        description,
        product_type,
        lineage,
        product_strain,
        product_brand: c_text(C_COL_PRODUCT_BRAND),
        vendor: c_text(C_COL_VENDOR),
        price: format_price_display(row.get(C_COL_PRICE).unwrap_or_default()),
        weight,
        units,
        ratio,
        doh: c_text(C_COL_DOH),
        barcode: c_text(C_COL_BARCODE),
        accepted_date: c_text(C_COL_ACCEPTED_DATE),
        quantity_received,
    }
}

/// Re-derive every computed field from the record's own inputs.
///
/// `normalize_record(normalize_record(r)) == normalize_record(r)`.
pub fn normalize_record(record: &SpecLabelRecord) -> SpecLabelRecord {
    let product_type_key = record.product_type_key();
    let description = derive_description(&record.product_name, &product_type_key);
    let ratio = derive_ratio(&record.product_name, &product_type_key);
    let lineage = resolve_lineage(Some(record.lineage.as_str()), &description);
    let product_strain = resolve_product_strain(
        Some(record.product_strain.as_str()),
        &ratio,
        &description,
        &product_type_key,
    );
    let units = normalize_units(&record.units);
    let (weight, units) = convert_weight_units(&product_type_key, record.weight, &units);

    SpecLabelRecord {
        description,
        lineage,
        product_strain,
        price: format_price_display(&record.price),
        weight,
        units,
        ratio,
        quantity_received: coerce_quantity(&record.quantity_received),
        ..record.clone()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price("$12.00"), "'12");
        assert_eq!(format_price("7.5"), "'7.5");
        assert_eq!(format_price(" '8 "), "'8");
        assert!(format_price("bad").starts_with('\''));
        assert_eq!(format_price("$bad"), "'bad");
    }

    #[test]
    fn test_format_price_display() {
        assert_eq!(format_price_display("12"), "$12");
        assert_eq!(format_price_display("$12.5"), "$12.50");
        assert_eq!(format_price_display("'7"), "$7");
        assert_eq!(format_price_display("Tier A"), "$Tier A");
        assert_eq!(format_price_display("  "), "");
        assert_eq!(format_price_display("$12.50"), "$12.50");
    }

    #[test]
    fn test_format_weight_strips_trailing_zeros() {
        assert_eq!(format_weight(1.0), "1");
        assert_eq!(format_weight(3.5), "3.5");
        assert_eq!(format_weight(0.3333), "0.33");
        assert_eq!(format_weight(10.0), "10");
    }

    #[test]
    fn test_tincture_grams_convert_to_one_ounce() {
        let (weight, units) = convert_weight_units("tincture", Some(28.3495), "g");
        assert_eq!(units, "oz");
        assert_eq!(format_weight(weight.unwrap_or_default()), "1");

        let (weight_again, units_again) = convert_weight_units("tincture", weight, &units);
        assert_eq!(units_again, "oz");
        assert_eq!(weight_again, weight);

        let (weight_flower, units_flower) = convert_weight_units("flower", Some(3.5), "g");
        assert_eq!((weight_flower, units_flower.as_str()), (Some(3.5), "g"));
    }

    #[test]
    fn test_normalize_units() {
        assert_eq!(normalize_units("Grams"), "g");
        assert_eq!(normalize_units("OUNCES"), "oz");
        assert_eq!(normalize_units(" mg "), "mg");
    }

    #[test]
    fn test_lineage_default_and_cbd_override() {
        assert_eq!(resolve_lineage(None, "Blue Dream"), EnumLineage::Hybrid);
        assert_eq!(resolve_lineage(Some("garbage"), "Blue Dream"), EnumLineage::Hybrid);
        assert_eq!(
            resolve_lineage(Some("indica_hybrid"), "Blue Dream"),
            EnumLineage::HybridIndica
        );
        assert_eq!(resolve_lineage(Some("sativa"), "Calm 1:1 Tincture"), EnumLineage::Cbd);
        assert_eq!(resolve_lineage(Some("indica"), "Sleepy cbn gummies"), EnumLineage::Cbd);
    }

    #[test]
    fn test_derive_description() {
        assert_eq!(
            derive_description("Blue Dream by Acme - 3.5g", "flower"),
            "Blue Dream"
        );
        assert_eq!(
            derive_description("Glass Pipe - 50g", C_TYPE_PARAPHERNALIA),
            "Glass Pipe"
        );
        assert_eq!(derive_description("Glass Pipe - 50g", "flower"), "Glass Pipe - 50g");
    }

    #[test]
    fn test_extract_ratio_and_pre_roll_rule() {
        assert_eq!(extract_ratio("Calm Drops - THC 10mg / CBD 10mg"), "THC 10mg CBD 10mg");
        assert_eq!(extract_ratio("No dash here"), "");

        assert_eq!(derive_pre_roll_ratio("Roll - 1g - THC 25%"), " - THC 25%");
        assert_eq!(derive_pre_roll_ratio("1g - THC 25%"), " - THC 25%");
        assert_eq!(derive_pre_roll_ratio("THC 25%"), " - THC 25%");
        assert_eq!(derive_pre_roll_ratio("a - b - c - d"), " - c - d");
    }

    #[test]
    fn test_format_ratio_multiline() {
        assert_eq!(format_ratio_multiline("THC 20% | CBD 1%"), "THC 20%\nCBD 1%");
        assert_eq!(format_ratio_multiline("THC 20%   CBD 1%"), "THC 20%\nCBD 1%");
        assert_eq!(format_ratio_multiline("  "), "");
    }

    #[test]
    fn test_product_strain_precedence() {
        assert_eq!(
            resolve_product_strain(Some("Blue Dream"), "", "Blue Dream", "flower"),
            EnumProductStrain::Mixed
        );
        assert_eq!(
            resolve_product_strain(Some("CBD Blend"), "", "Gummies", "edible (solid)"),
            EnumProductStrain::CbdBlend
        );
        assert_eq!(
            resolve_product_strain(None, "THC 5mg CBD 5mg", "Gummies", "edible (solid)"),
            EnumProductStrain::CbdBlend
        );
        assert_eq!(
            resolve_product_strain(Some("CBD Blend"), "CBD", "CBD pipe", C_TYPE_PARAPHERNALIA),
            EnumProductStrain::Paraphernalia
        );
    }

    #[test]
    fn test_coerce_quantity() {
        assert_eq!(coerce_quantity("12"), "12");
        assert_eq!(coerce_quantity("12.0"), "12");
        assert_eq!(coerce_quantity("n/a"), "");
    }

    #[test]
    fn test_normalize_row_flower() {
        let row = SpecRawRow::default()
            .with(C_COL_PRODUCT_NAME, "  Blue Dream by Acme - 3.5g")
            .with(C_COL_PRODUCT_TYPE, "Flower")
            .with(C_COL_LINEAGE, "sativa")
            .with(C_COL_PRODUCT_BRAND, "Acme")
            .with(C_COL_VENDOR, "Acme Farms")
            .with(C_COL_PRICE, "$25")
            .with(C_COL_WEIGHT, "3.5")
            .with(C_COL_UNITS, "Grams");
        let record = normalize_row(&row);
        assert_eq!(record.product_name, "Blue Dream by Acme - 3.5g");
        assert_eq!(record.description, "Blue Dream");
        assert_eq!(record.lineage, EnumLineage::Sativa);
        assert_eq!(record.product_strain, EnumProductStrain::Mixed);
        assert_eq!(record.price, "$25");
        assert_eq!(record.weight, Some(3.5));
        assert_eq!(record.units, "g");
        assert_eq!(format_weight_units(record.weight, &record.units), " -\u{00A0}3.5g");
        assert_eq!(derive_combined_weight(record.weight, &record.units), "3.5g");
    }

    #[test]
    fn test_normalize_row_quantity_fallback() {
        let row = SpecRawRow::default()
            .with(C_COL_PRODUCT_NAME, "Slip")
            .with(C_COL_QUANTITY, "7");
        assert_eq!(normalize_row(&row).quantity_received, "7");
    }

    #[test]
    fn test_paraphernalia_normalization_is_idempotent() {
        let row = SpecRawRow::default()
            .with(C_COL_PRODUCT_NAME, "Glass Pipe - 50g by Vendor Co")
            .with(C_COL_PRODUCT_TYPE, "Paraphernalia")
            .with(C_COL_LINEAGE, "indica")
            .with(C_COL_PRODUCT_STRAIN, "CBD Blend")
            .with(C_COL_PRICE, "15")
            .with(C_COL_VENDOR, "Vendor Co");
        let record = normalize_row(&row);
        assert_eq!(record.product_strain, EnumProductStrain::Paraphernalia);
        assert_eq!(record.description, "Glass Pipe");

        let record_once = normalize_record(&record);
        let record_twice = normalize_record(&record_once);
        assert_eq!(record_once, record);
        assert_eq!(record_twice, record_once);
    }

    #[test]
    fn test_normalize_record_is_idempotent_for_converted_weights() {
        let row = SpecRawRow::default()
            .with(C_COL_PRODUCT_NAME, "Calm Drops - THC 10mg | CBD 10mg")
            .with(C_COL_PRODUCT_TYPE, "Tincture")
            .with(C_COL_WEIGHT, "28.3495")
            .with(C_COL_UNITS, "g")
            .with(C_COL_PRICE, "40.5");
        let record = normalize_row(&row);
        assert_eq!(record.units, "oz");
        assert_eq!(record.price, "$40.50");
        assert_eq!(record.product_strain, EnumProductStrain::CbdBlend);
        assert_eq!(normalize_record(&record), record);
    }

    #[test]
    fn test_pre_roll_ratio_from_name() {
        let row = SpecRawRow::default()
            .with(C_COL_PRODUCT_NAME, "Blue Dream Pre-Roll - 1g - THC 25%")
            .with(C_COL_PRODUCT_TYPE, "Pre-Roll");
        let record = normalize_row(&row);
        assert_eq!(record.ratio, " - THC 25%");
        assert_eq!(normalize_record(&record).ratio, " - THC 25%");
    }
}
