//! Autosize engine: marker-delimited fields get one bold run sized to their content.
//!
//! Brand, description and ratio sizes come from per-orientation complexity
//! step tables. Strain always uses its base size. Every other field shrinks
//! linearly once its text is longer than the scheme's `max_length`.

use crate::conf::{
    C_FONT_NAME_LABEL, F_SCALE_FACTOR_MAX, F_SCALE_FACTOR_MIN, derive_threshold_table,
};
use crate::document::{EnumAlign, EnumInline, SpecDocument, SpecParagraph, SpecRun, SpecRunProps};
use crate::spec::{EnumFieldKind, EnumOrientation, SpecFontParams, SpecFontScheme};
use crate::util::{calculate_complexity, unescape_entities};

/// Clamp a user scale factor into the supported range; non-finite input means 1.0.
pub fn sanitize_scale_factor(scale_factor: f64) -> f64 {
    if scale_factor.is_finite() {
        scale_factor.clamp(F_SCALE_FACTOR_MIN, F_SCALE_FACTOR_MAX)
    } else {
        1.0
    }
}

/// Point size for `text` in a field of `kind`.
pub fn calculate_field_size(
    kind: EnumFieldKind,
    text: &str,
    params: &SpecFontParams,
    orientation: EnumOrientation,
    scale_factor: f64,
) -> f64 {
    if kind == EnumFieldKind::Strain {
        return params.base_size;
    }
    let size = match derive_threshold_table(kind, orientation) {
        Some(table) => table.lookup(calculate_complexity(text)),
        None => {
            let n_len = text.chars().count();
            if n_len <= params.max_length {
                params.base_size
            } else {
                f64::max(
                    params.min_size,
                    params.base_size * params.max_length as f64 / n_len as f64,
                )
            }
        }
    };
    size * sanitize_scale_factor(scale_factor)
}

fn convert_points_to_half_points(size: f64) -> u32 {
    u32::max(1, (size * 2.0).round() as u32)
}

/// Resize one field in one paragraph; returns whether the paragraph changed.
///
/// The first marker pair decides the size. The paragraph's inline content is
/// replaced by a single bold run of its whole text with this kind's markers
/// removed and entities resolved; paragraph properties are kept.
pub fn autosize_paragraph(
    paragraph: &mut SpecParagraph,
    kind: EnumFieldKind,
    params: &SpecFontParams,
    orientation: EnumOrientation,
    scale_factor: f64,
) -> bool {
    let c_full = paragraph.text();
    let c_start = kind.marker_start();
    let c_end = kind.marker_end();
    if !(c_full.contains(&c_start) && c_full.contains(&c_end)) {
        return false;
    }
    let Some((_, c_after_start)) = c_full.split_once(&c_start) else {
        return false;
    };
    let c_field = c_after_start
        .split_once(&c_end)
        .map(|(c_inner, _)| c_inner)
        .unwrap_or(c_after_start)
        .trim();

    let size = calculate_field_size(kind, c_field, params, orientation, scale_factor);
    tracing::trace!(
        "Autosize {} field {:?} -> {size:.1}pt.",
        kind.marker_name(),
        c_field
    );
    let c_text = unescape_entities(&c_full.replace(&c_start, "").replace(&c_end, ""));

    paragraph.inlines = vec![EnumInline::Run(SpecRun {
        props: SpecRunProps {
            font_name: Some(C_FONT_NAME_LABEL.to_string()),
            size_half_points: Some(convert_points_to_half_points(size)),
            bold: Some(true),
            ..SpecRunProps::default()
        },
        text: c_text,
    })];
    if kind == EnumFieldKind::Brand {
        paragraph.props.align = Some(EnumAlign::Center);
    }
    true
}

/// Run every field kind over every paragraph of `doc`, nested tables included.
pub fn autosize_document(doc: &mut SpecDocument, scheme: &SpecFontScheme, scale_factor: f64) {
    let orientation = scheme.orientation;
    let mut n_resized = 0usize;
    for kind in EnumFieldKind::ALL {
        let Some(params) = scheme.params(kind) else {
            continue;
        };
        doc.visit_paragraphs_mut(&mut |paragraph| {
            if autosize_paragraph(paragraph, kind, &params, orientation, scale_factor) {
                n_resized += 1;
            }
        });
    }
    tracing::debug!("Autosized {n_resized} fields ({orientation}).");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::derive_font_scheme;
    use crate::document::EnumBlock;

    fn params_of(kind: EnumFieldKind, orientation: EnumOrientation) -> SpecFontParams {
        derive_font_scheme(orientation)
            .params(kind)
            .expect("params")
    }

    fn only_run(paragraph: &SpecParagraph) -> &SpecRun {
        assert_eq!(paragraph.inlines.len(), 1);
        match &paragraph.inlines[0] {
            EnumInline::Run(run) => run,
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn test_vertical_description_sizes_are_non_increasing() {
        let orientation = EnumOrientation::Vertical;
        let params = params_of(EnumFieldKind::Description, orientation);
        let size_of = |n_chars: usize| {
            calculate_field_size(
                EnumFieldKind::Description,
                &"x".repeat(n_chars),
                &params,
                orientation,
                1.0,
            )
        };
        // One word each: complexity = chars + 5.
        let (s10, s50, s200) = (size_of(5), size_of(45), size_of(195));
        assert_eq!(s10, 29.0);
        assert!(s10 >= s50 && s50 >= s200);
        assert_eq!(s200, 18.0);
    }

    #[test]
    fn test_length_rule_and_strain_exemption() {
        let orientation = EnumOrientation::Horizontal;
        let params = params_of(EnumFieldKind::Price, orientation);
        assert_eq!(
            calculate_field_size(EnumFieldKind::Price, "$25", &params, orientation, 1.0),
            38.0
        );
        let c_long = "9".repeat(40);
        assert_eq!(
            calculate_field_size(EnumFieldKind::Price, &c_long, &params, orientation, 1.0),
            20.0
        );
        let params = params_of(EnumFieldKind::Strain, orientation);
        assert_eq!(
            calculate_field_size(EnumFieldKind::Strain, "Mixed", &params, orientation, 2.0),
            params.base_size
        );
    }

    #[test]
    fn test_scale_factor_is_clamped() {
        assert_eq!(sanitize_scale_factor(5.0), 2.0);
        assert_eq!(sanitize_scale_factor(0.1), 0.5);
        assert_eq!(sanitize_scale_factor(f64::NAN), 1.0);
        let orientation = EnumOrientation::Mini;
        let params = params_of(EnumFieldKind::Brand, orientation);
        assert_eq!(
            calculate_field_size(EnumFieldKind::Brand, "ACME", &params, orientation, 9.0),
            28.0
        );
    }

    #[test]
    fn test_paragraph_becomes_single_bold_run() {
        let orientation = EnumOrientation::Horizontal;
        let mut paragraph = SpecParagraph::default();
        paragraph
            .inlines
            .push(EnumInline::Run(SpecRun::new("DESC_STARTSalt &amp; Pepper")));
        paragraph
            .inlines
            .push(EnumInline::Run(SpecRun::new("DESC_END -\u{00A0}3.5g")));
        let params = params_of(EnumFieldKind::Description, orientation);
        assert!(autosize_paragraph(
            &mut paragraph,
            EnumFieldKind::Description,
            &params,
            orientation,
            1.0
        ));
        let run = only_run(&paragraph);
        assert_eq!(run.text, "Salt & Pepper -\u{00A0}3.5g");
        assert_eq!(run.props.bold, Some(true));
        assert_eq!(run.props.font_name.as_deref(), Some("Arial"));
        // "Salt &amp; Pepper": 17 chars + 3 words * 5 = 32 -> 28pt.
        assert_eq!(run.props.size_half_points, Some(56));
    }

    #[test]
    fn test_brand_is_centered_and_unmarked_paragraphs_untouched() {
        let orientation = EnumOrientation::Horizontal;
        let mut doc = SpecDocument {
            blocks: vec![
                EnumBlock::Paragraph(SpecParagraph::from_text(
                    "PRODUCTBRAND_CENTER_STARTACMEPRODUCTBRAND_CENTER_END",
                )),
                EnumBlock::Paragraph(SpecParagraph::from_text("plain")),
            ],
            ..SpecDocument::default()
        };
        autosize_document(&mut doc, &derive_font_scheme(orientation), 1.0);
        match &doc.blocks[0] {
            EnumBlock::Paragraph(paragraph) => {
                assert_eq!(paragraph.props.align, Some(EnumAlign::Center));
                assert_eq!(only_run(paragraph).text, "ACME");
                assert_eq!(only_run(paragraph).props.size_half_points, Some(36));
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
        match &doc.blocks[1] {
            EnumBlock::Paragraph(paragraph) => {
                assert_eq!(only_run(paragraph).props, SpecRunProps::default());
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
    }
}
