//! Record classifier: structured fields to a color category.

use crate::conf::{C_TYPE_PARAPHERNALIA, TUP_CATEGORY_COLORS, TUP_CLASSIC_TYPES};
use crate::spec::{EnumColorCategory, EnumProductStrain, SpecLabelRecord};

/// Color category of a record.
///
/// Classic types follow lineage; otherwise paraphernalia, then CBD blend,
/// then mixed strain; lineage again as the fallback.
pub fn classify_record(record: &SpecLabelRecord) -> EnumColorCategory {
    let c_type = record.product_type_key();
    if TUP_CLASSIC_TYPES.contains(&c_type.as_str()) {
        return record.lineage.into();
    }
    if c_type == C_TYPE_PARAPHERNALIA {
        return EnumColorCategory::Paraphernalia;
    }
    match record.product_strain {
        EnumProductStrain::CbdBlend => EnumColorCategory::Cbd,
        EnumProductStrain::Mixed => EnumColorCategory::Mixed,
        EnumProductStrain::Paraphernalia => record.lineage.into(),
    }
}

impl EnumColorCategory {
    /// `#RRGGBB` list color.
    pub fn color_hex(&self) -> &'static str {
        TUP_CATEGORY_COLORS
            .iter()
            .find(|(category, _)| category == self)
            .map(|(_, hex)| *hex)
            .unwrap_or("#FFFFFF")
    }
}
