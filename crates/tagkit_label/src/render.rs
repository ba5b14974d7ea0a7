//! Label renderer: one chunk of records into one filled grid page.

use crate::autosize::autosize_document;
use crate::conf::{
    C_THC_CBD_BLOCK, C_TYPE_PARAPHERNALIA, TUP_HIGH_CBD_DOH_TYPES, TUP_PRE_ROLL_TYPES,
    TUP_THC_CBD_TYPES, calculate_slots_per_page, derive_image_width_mm,
};
use crate::document::{SpecDocument, SpecInlineImage};
use crate::format::{
    apply_conditional_formatting, clear_cell_margins, clear_empty_cells, clear_table_cell_padding,
    fix_paragraph_spacing,
};
use crate::normalize::{format_ratio_multiline, format_weight_units};
use crate::spec::{
    EnumFieldKind, EnumOrientation, SpecFontScheme, SpecImageAsset, SpecLabelAssets,
    SpecLabelRecord,
};
use crate::template::{DictLabelFields, EnumFieldValue, SpecRenderContext, render_placeholders};
use crate::util::{convert_mm_to_emu, escape_ampersand};

/// Fields every label slot defines.
const TUP_LABEL_FIELDS: [&str; 9] = [
    "DOH",
    "Price",
    "Lineage",
    "Ratio_or_THC_CBD",
    "ProductBrand",
    "Ratio",
    "Description",
    "ProductStrain",
    "WeightUnits",
];

/// Extra fields of an inventory slip slot.
const TUP_INVENTORY_FIELDS: [&str; 6] = [
    "AcceptedDate",
    "Vendor",
    "Barcode",
    "ProductName",
    "ProductType",
    "QuantityReceived",
];

////////////////////////////////////////////////////////////////////////////////
// #region Fields

/// Wrap `text` in the field's start/end markers; only `&` is escaped.
pub fn wrap_with_marker(text: &str, kind: EnumFieldKind) -> String {
    format!(
        "{}{}{}",
        kind.marker_start(),
        escape_ampersand(text),
        kind.marker_end()
    )
}

fn derive_doh_image(
    record: &SpecLabelRecord,
    orientation: EnumOrientation,
    assets: &SpecLabelAssets,
) -> Option<SpecInlineImage> {
    if record.doh.trim() != "Yes" {
        return None;
    }
    let c_type = record.product_type_key();
    let asset: &SpecImageAsset = if TUP_HIGH_CBD_DOH_TYPES.contains(&c_type.as_str()) {
        assets.image_high_cbd.as_ref()?
    } else {
        assets.image_doh.as_ref()?
    };
    let width_emu = convert_mm_to_emu(derive_image_width_mm(orientation));
    let height_emu =
        (width_emu as f64 * asset.height_px as f64 / asset.width_px as f64).round() as u64;
    Some(SpecInlineImage {
        asset: asset.clone(),
        width_emu,
        height_emu,
    })
}

/// Display fields for one record on a label layout.
pub fn derive_label_fields(
    record: &SpecLabelRecord,
    orientation: EnumOrientation,
    assets: &SpecLabelAssets,
) -> DictLabelFields {
    let c_type = record.product_type_key();
    let if_pre_roll = TUP_PRE_ROLL_TYPES.contains(&c_type.as_str());
    let if_paraphernalia = c_type == C_TYPE_PARAPHERNALIA;
    let c_brand_upper = record.product_brand.trim().to_uppercase();

    let mut dict_fields = DictLabelFields::new();
    let mut set_text = |key: &str, value: String| {
        dict_fields.insert(key.to_string(), EnumFieldValue::Text(value));
    };

    set_text("Price", wrap_with_marker(&record.price, EnumFieldKind::Price));
    set_text("ProductBrand", wrap_with_marker(&c_brand_upper, EnumFieldKind::Brand));

    if !matches!(orientation, EnumOrientation::Mini | EnumOrientation::Inventory) {
        let (c_lineage, c_ratio_or_block, c_strain) = if if_paraphernalia {
            (
                wrap_with_marker(&record.vendor.trim().to_uppercase(), EnumFieldKind::Brand),
                String::new(),
                wrap_with_marker("Paraphernalia", EnumFieldKind::Strain),
            )
        } else if TUP_THC_CBD_TYPES.contains(&c_type.as_str()) {
            (
                wrap_with_marker(record.lineage.as_str(), EnumFieldKind::Lineage),
                wrap_with_marker(C_THC_CBD_BLOCK, EnumFieldKind::ThcCbd),
                String::new(),
            )
        } else {
            (
                wrap_with_marker(&c_brand_upper, EnumFieldKind::Brand),
                wrap_with_marker(&record.ratio, EnumFieldKind::Ratio),
                wrap_with_marker(record.product_strain.as_str(), EnumFieldKind::Strain),
            )
        };
        set_text("Lineage", c_lineage);
        set_text("Ratio_or_THC_CBD", c_ratio_or_block);
        set_text("ProductStrain", c_strain);
    }

    set_text(
        "Ratio",
        wrap_with_marker(&format_ratio_multiline(&record.ratio), EnumFieldKind::Ratio),
    );

    let mut c_description = record.description.trim().to_string();
    if if_pre_roll {
        c_description.push('\u{00A0}');
    }
    set_text("Description", wrap_with_marker(&c_description, EnumFieldKind::Description));

    let c_weight_units = if orientation == EnumOrientation::Inventory {
        format_weight_units(record.weight, &record.units)
    } else if if_pre_roll {
        wrap_with_marker(&format_ratio_multiline(&record.ratio), EnumFieldKind::Description)
    } else if if_paraphernalia {
        String::new()
    } else {
        format_weight_units(record.weight, &record.units)
    };
    set_text("WeightUnits", c_weight_units);

    let doh = match derive_doh_image(record, orientation, assets) {
        Some(image) => EnumFieldValue::Image(image),
        None => EnumFieldValue::Text(String::new()),
    };
    dict_fields.insert("DOH".to_string(), doh);
    dict_fields
}

/// Fields of one inventory slip slot.
pub fn derive_inventory_fields(record: &SpecLabelRecord) -> DictLabelFields {
    [
        ("ProductName", record.product_name.clone()),
        ("Barcode", record.barcode.clone()),
        ("AcceptedDate", record.accepted_date.clone()),
        ("QuantityReceived", record.quantity_received.clone()),
        ("Vendor", record.vendor.clone()),
        ("ProductType", record.product_type.clone()),
        ("WeightUnits", format_weight_units(record.weight, &record.units)),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), EnumFieldValue::Text(value)))
    .collect()
}

/// All-empty fields for a slot with no record.
pub fn derive_blank_fields(orientation: EnumOrientation) -> DictLabelFields {
    let mut dict_fields: DictLabelFields = TUP_LABEL_FIELDS
        .iter()
        .map(|key| (key.to_string(), EnumFieldValue::Text(String::new())))
        .collect();
    if orientation == EnumOrientation::Inventory {
        for key in TUP_INVENTORY_FIELDS {
            dict_fields.insert(key.to_string(), EnumFieldValue::Text(String::new()));
        }
    }
    dict_fields
}

/// Context for one page of `n_slots` slots.
///
/// Inventory slips skip records with no name, barcode or quantity and pack
/// the rest into the lowest slots.
pub fn derive_render_context(
    chunk: &[SpecLabelRecord],
    orientation: EnumOrientation,
    n_slots: usize,
    assets: &SpecLabelAssets,
) -> SpecRenderContext {
    let mut context = SpecRenderContext::default();
    let l_fields: Vec<DictLabelFields> = if orientation == EnumOrientation::Inventory {
        chunk
            .iter()
            .filter(|record| {
                !(record.product_name.is_empty()
                    && record.barcode.is_empty()
                    && record.quantity_received.is_empty())
            })
            .map(derive_inventory_fields)
            .collect()
    } else {
        chunk
            .iter()
            .map(|record| derive_label_fields(record, orientation, assets))
            .collect()
    };

    let mut iter_fields = l_fields.into_iter();
    for n_label in 1..=n_slots {
        let fields = iter_fields
            .next()
            .unwrap_or_else(|| derive_blank_fields(orientation));
        context.insert(n_label, fields);
    }
    context
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Pages

/// Fill one copy of `grid` with `chunk` and run the post-render passes.
///
/// Inventory slips are filled only. Other layouts are autosized, colored and
/// cleaned of spacing; mini pages also clear cells left empty.
pub fn render_chunk(
    chunk: &[SpecLabelRecord],
    grid: &SpecDocument,
    scheme: &SpecFontScheme,
    scale_factor: f64,
    assets: &SpecLabelAssets,
) -> Result<SpecDocument, String> {
    let orientation = scheme.orientation;
    let n_slots = calculate_slots_per_page(orientation);
    if chunk.len() > n_slots {
        return Err(format!(
            "Chunk of {} records exceeds {n_slots} slots for {orientation} labels.",
            chunk.len()
        ));
    }

    let mut doc = grid.clone();
    let context = derive_render_context(chunk, orientation, n_slots, assets);
    render_placeholders(&mut doc, &context)?;

    if orientation != EnumOrientation::Inventory {
        autosize_document(&mut doc, scheme, scale_factor);
        apply_conditional_formatting(&mut doc);
        fix_paragraph_spacing(&mut doc);
        clear_cell_margins(&mut doc);
        clear_table_cell_padding(&mut doc);
    }
    if orientation == EnumOrientation::Mini {
        clear_empty_cells(&mut doc);
    }
    Ok(doc)
}

/// Back page for `chunk`: the same grid with `vendor\nbrand` per slot.
pub fn render_back_page(chunk: &[SpecLabelRecord], grid: &SpecDocument) -> Result<SpecDocument, String> {
    let mut doc = grid.clone();
    let table = doc
        .tables_mut()
        .next()
        .ok_or_else(|| "Back page grid has no table.".to_string())?;
    for (idx, cell) in table.cells_mut().enumerate() {
        let c_text = match chunk.get(idx) {
            Some(record) => {
                let c_vendor = record.vendor.trim();
                let c_brand = record.product_brand.trim();
                if c_vendor.is_empty() && c_brand.is_empty() {
                    String::new()
                } else {
                    format!("{c_vendor}\n{c_brand}")
                }
            }
            None => String::new(),
        };
        cell.set_text(&c_text);
    }
    Ok(doc)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::{derive_font_scheme, derive_grid_shape};
    use crate::grid::expand_template;
    use crate::spec::{EnumLineage, EnumProductStrain};
    use crate::template::derive_prototype_document;

    fn record(name: &str, product_type: &str, lineage: EnumLineage) -> SpecLabelRecord {
        SpecLabelRecord {
            product_name: name.to_string(),
            description: name.split(" by").next().unwrap_or_default().to_string(),
            product_type: product_type.to_string(),
            lineage,
            product_brand: "Acme & Co".to_string(),
            vendor: "North Farms".to_string(),
            price: "$25".to_string(),
            weight: Some(3.5),
            units: "g".to_string(),
            ..SpecLabelRecord::default()
        }
    }

    fn text_of(fields: &DictLabelFields, key: &str) -> String {
        match fields.get(key) {
            Some(EnumFieldValue::Text(text)) => text.clone(),
            other => panic!("{key}: expected text, got {other:?}"),
        }
    }

    #[test]
    fn test_wrap_with_marker_escapes_ampersand_only() {
        assert_eq!(
            wrap_with_marker("A & <B>", EnumFieldKind::Brand),
            "PRODUCTBRAND_CENTER_STARTA &amp; <B>PRODUCTBRAND_CENTER_END"
        );
    }

    #[test]
    fn test_flower_fields() {
        let rec = record("Blue Dream by Acme", "Flower", EnumLineage::Sativa);
        let fields = derive_label_fields(&rec, EnumOrientation::Horizontal, &SpecLabelAssets::default());
        assert_eq!(text_of(&fields, "Lineage"), "LINEAGE_STARTSATIVALINEAGE_END");
        assert_eq!(text_of(&fields, "Ratio_or_THC_CBD"), "THC_CBD_STARTTHC:\n\nCBD:THC_CBD_END");
        assert_eq!(text_of(&fields, "ProductStrain"), "");
        assert_eq!(text_of(&fields, "WeightUnits"), " -\u{00A0}3.5g");
        assert_eq!(text_of(&fields, "Description"), "DESC_STARTBlue DreamDESC_END");
        assert_eq!(text_of(&fields, "DOH"), "");
    }

    #[test]
    fn test_paraphernalia_shows_vendor_and_no_weight() {
        let mut rec = record("Glass Pipe by Acme", "Paraphernalia", EnumLineage::Hybrid);
        rec.product_strain = EnumProductStrain::Paraphernalia;
        let fields = derive_label_fields(&rec, EnumOrientation::Vertical, &SpecLabelAssets::default());
        assert_eq!(
            text_of(&fields, "Lineage"),
            "PRODUCTBRAND_CENTER_STARTNORTH FARMSPRODUCTBRAND_CENTER_END"
        );
        assert_eq!(text_of(&fields, "Ratio_or_THC_CBD"), "");
        assert_eq!(text_of(&fields, "ProductStrain"), "PRODUCTSTRAIN_STARTParaphernaliaPRODUCTSTRAIN_END");
        assert_eq!(text_of(&fields, "WeightUnits"), "");
    }

    #[test]
    fn test_other_types_show_brand_ratio_and_strain() {
        let mut rec = record("Gummies by Acme - CBD 10mg", "Edible (Solid)", EnumLineage::Cbd);
        rec.ratio = "CBD 10mg".to_string();
        rec.product_strain = EnumProductStrain::CbdBlend;
        let fields = derive_label_fields(&rec, EnumOrientation::Horizontal, &SpecLabelAssets::default());
        assert_eq!(
            text_of(&fields, "Lineage"),
            "PRODUCTBRAND_CENTER_STARTACME &amp; COPRODUCTBRAND_CENTER_END"
        );
        assert_eq!(text_of(&fields, "Ratio_or_THC_CBD"), "RATIO_STARTCBD 10mgRATIO_END");
        assert_eq!(text_of(&fields, "ProductStrain"), "PRODUCTSTRAIN_STARTCBD BlendPRODUCTSTRAIN_END");
    }

    #[test]
    fn test_pre_roll_weight_slot_holds_ratio_as_description() {
        let mut rec = record("Gelato Pre-Roll by Acme", "Pre-Roll", EnumLineage::Indica);
        rec.ratio = " - THC 25% | CBD 1%".to_string();
        let fields = derive_label_fields(&rec, EnumOrientation::Horizontal, &SpecLabelAssets::default());
        assert_eq!(text_of(&fields, "WeightUnits"), "DESC_START- THC 25%\nCBD 1%DESC_END");
        assert!(text_of(&fields, "Description").ends_with("\u{00A0}DESC_END"));

        let fields = derive_label_fields(&rec, EnumOrientation::Inventory, &SpecLabelAssets::default());
        assert_eq!(text_of(&fields, "WeightUnits"), " -\u{00A0}3.5g");
    }

    #[test]
    fn test_mini_skips_lineage_fields() {
        let rec = record("Blue Dream by Acme", "Flower", EnumLineage::Sativa);
        let fields = derive_label_fields(&rec, EnumOrientation::Mini, &SpecLabelAssets::default());
        assert!(!fields.contains_key("Lineage"));
        assert!(fields.contains_key("Ratio"));
    }

    #[test]
    fn test_inventory_context_skips_empty_records_and_packs() {
        let empty = SpecLabelRecord::default();
        let mut rec = record("Blue Dream by Acme", "Flower", EnumLineage::Sativa);
        rec.barcode = "B-1".to_string();
        rec.quantity_received = "12".to_string();
        let context = derive_render_context(
            &[empty, rec],
            EnumOrientation::Inventory,
            4,
            &SpecLabelAssets::default(),
        );
        assert_eq!(context.labels.len(), 4);
        assert_eq!(context.field(1, "Barcode"), Some(&EnumFieldValue::from("B-1")));
        assert_eq!(context.field(2, "Barcode"), Some(&EnumFieldValue::from("")));
        assert_eq!(context.field(4, "QuantityReceived"), Some(&EnumFieldValue::from("")));
    }

    #[test]
    fn test_render_chunk_fills_and_blanks_slots() {
        let orientation = EnumOrientation::Horizontal;
        let shape = derive_grid_shape(orientation).expect("shape");
        let grid = expand_template(&derive_prototype_document(orientation), &shape).expect("grid");
        let chunk = vec![record("Blue Dream by Acme", "Flower", EnumLineage::Sativa)];
        let doc = render_chunk(&chunk, &grid, &derive_font_scheme(orientation), 1.0, &SpecLabelAssets::default())
            .expect("render");

        let table = doc.tables().next().expect("table");
        let c_first = table.cell(0, 0).expect("cell").text();
        assert!(c_first.contains("Blue Dream"));
        assert!(c_first.contains("SATIVA"));
        assert!(!c_first.contains("_START"));
        assert_eq!(table.cell(0, 0).expect("cell").props.shading.as_deref(), Some("ED4123"));
        assert!(table.cell(2, 2).expect("cell").text().trim().is_empty());
        assert_eq!(table.cell(2, 2).expect("cell").props.shading.as_deref(), Some("FFFFFF"));

        let mut c_all = String::new();
        doc.visit_paragraphs(&mut |paragraph| c_all.push_str(&paragraph.text()));
        assert!(!c_all.contains("{{"));
    }

    #[test]
    fn test_render_chunk_rejects_oversized_chunk() {
        let orientation = EnumOrientation::Horizontal;
        let grid = derive_prototype_document(orientation);
        let chunk = vec![SpecLabelRecord::default(); 10];
        assert!(render_chunk(&chunk, &grid, &derive_font_scheme(orientation), 1.0, &SpecLabelAssets::default()).is_err());
    }

    #[test]
    fn test_back_page_holds_vendor_and_brand() {
        let orientation = EnumOrientation::Vertical;
        let shape = derive_grid_shape(orientation).expect("shape");
        let grid = expand_template(&derive_prototype_document(orientation), &shape).expect("grid");
        let chunk = vec![record("Blue Dream by Acme", "Flower", EnumLineage::Sativa)];
        let doc = render_back_page(&chunk, &grid).expect("back");
        let table = doc.tables().next().expect("table");
        assert_eq!(table.cell(0, 0).expect("cell").text(), "North Farms\nAcme & Co");
        assert_eq!(table.cell(0, 1).expect("cell").text(), "");
    }
}
