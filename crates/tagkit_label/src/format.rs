//! Conditional formatter and spacing cleanup for rendered pages.
//!
//! Coloring reads each cell's final text, not the record it came from, so it
//! can disagree with [`crate::classify::classify_record`] on ambiguous text.

use crate::conf::{
    C_COLOR_CELL_DEFAULT, C_COLOR_FONT_ON_FILL, C_COLOR_MIDDLE_ROW, TUP_CELL_COLOR_RULES,
    TUP_MIDDLE_ROW_KEYWORDS,
};
use crate::document::{EnumBlock, SpecDocument, SpecParagraph, SpecTable, SpecTableCell};

////////////////////////////////////////////////////////////////////////////////
// #region Colors

/// Fill color of the first rule matching `text` (case-insensitive), if any.
pub fn derive_cell_color(text: &str) -> Option<&'static str> {
    let c_upper = text.trim().to_uppercase();
    TUP_CELL_COLOR_RULES
        .iter()
        .find(|(l_keywords, _)| l_keywords.iter().any(|kw| c_upper.contains(kw)))
        .map(|(_, color)| *color)
}

/// Shade `cell`; a cell with no visible text gets a single space first.
pub fn set_cell_background(cell: &mut SpecTableCell, color_hex: &str) {
    if cell.is_blank() {
        cell.set_text(" ");
    }
    cell.props.shading = Some(color_hex.to_uppercase());
}

/// White text without highlight on every run of the cell's direct paragraphs.
pub fn set_font_color_white(cell: &mut SpecTableCell) {
    for paragraph in cell.paragraphs_mut() {
        for run in paragraph.runs_mut() {
            run.props.color = Some(C_COLOR_FONT_ON_FILL.to_string());
            run.props.highlight = None;
        }
    }
}

fn apply_formatting_to_cell(cell: &mut SpecTableCell) {
    match derive_cell_color(&cell.text()) {
        Some(color) => {
            set_cell_background(cell, color);
            set_font_color_white(cell);
        }
        None => set_cell_background(cell, C_COLOR_CELL_DEFAULT),
    }
}

fn shade_middle_row_if_needed(table: &mut SpecTable) {
    if table.rows.is_empty() {
        return;
    }
    let n_mid = table.n_rows() / 2;
    let c_row = table.row_text(n_mid).to_uppercase();
    if !TUP_MIDDLE_ROW_KEYWORDS.iter().any(|kw| c_row.contains(kw)) {
        return;
    }
    for cell in &mut table.rows[n_mid].cells {
        set_cell_background(cell, C_COLOR_MIDDLE_ROW);
        set_font_color_white(cell);
    }
}

/// Color every top-level table cell by keyword, then shade heading middle rows.
pub fn apply_conditional_formatting(doc: &mut SpecDocument) {
    for table in doc.tables_mut() {
        for cell in table.cells_mut() {
            apply_formatting_to_cell(cell);
        }
    }
    for table in doc.tables_mut() {
        shade_middle_row_if_needed(table);
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Spacing

/// Zero space before/after on every paragraph, nested cells included.
pub fn fix_paragraph_spacing(doc: &mut SpecDocument) {
    doc.visit_paragraphs_mut(&mut |paragraph| {
        paragraph.props.space_before = Some(0);
        paragraph.props.space_after = Some(0);
    });
}

/// Zero margins on every top-level table cell.
pub fn clear_cell_margins(doc: &mut SpecDocument) {
    for table in doc.tables_mut() {
        for cell in table.cells_mut() {
            cell.props.margins_zero = true;
        }
    }
}

/// Zero default cell padding on every top-level table.
pub fn clear_table_cell_padding(doc: &mut SpecDocument) {
    for table in doc.tables_mut() {
        table.props.cell_margins_zero = true;
    }
}

/// Strip cells whose text is empty down to one empty paragraph on white.
pub fn clear_empty_cells(doc: &mut SpecDocument) {
    for table in doc.tables_mut() {
        for cell in table.cells_mut() {
            if cell.text().trim().is_empty() {
                cell.blocks = vec![EnumBlock::Paragraph(SpecParagraph::default())];
                cell.props.shading = Some(C_COLOR_CELL_DEFAULT.to_string());
            }
        }
    }
}

/// Set the same cell spacing on every top-level table.
pub fn apply_uniform_cell_spacing(doc: &mut SpecDocument, n_twips: u32) {
    for table in doc.tables_mut() {
        table.props.cell_spacing_twips = Some(n_twips);
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{EnumInline, SpecRun, SpecTableRow};

    fn cell_with(text: &str) -> SpecTableCell {
        SpecTableCell {
            blocks: text
                .split('\n')
                .map(|line| EnumBlock::Paragraph(SpecParagraph::from_text(line)))
                .collect(),
            ..SpecTableCell::default()
        }
    }

    fn doc_with_rows(l_rows: &[&[&str]]) -> SpecDocument {
        let table = SpecTable {
            rows: l_rows
                .iter()
                .map(|l_cells| SpecTableRow {
                    cells: l_cells.iter().map(|text| cell_with(text)).collect(),
                    ..SpecTableRow::default()
                })
                .collect(),
            ..SpecTable::default()
        };
        SpecDocument {
            blocks: vec![EnumBlock::Table(table)],
            ..SpecDocument::default()
        }
    }

    fn first_run_color(cell: &SpecTableCell) -> Option<String> {
        cell.blocks.iter().find_map(|block| match block {
            EnumBlock::Paragraph(paragraph) => paragraph.inlines.iter().find_map(|inline| match inline {
                EnumInline::Run(SpecRun { props, .. }) => Some(props.color.clone()),
                _ => None,
            }),
            _ => None,
        })?
    }

    #[test]
    fn test_rule_order_first_match_wins() {
        assert_eq!(derive_cell_color("Indica gummies CBD 10mg"), Some("F1C232"));
        assert_eq!(derive_cell_color("glass\nParaphernalia"), Some("FFC0CB"));
        assert_eq!(derive_cell_color("HYBRID/INDICA"), Some("9900FF"));
        assert_eq!(derive_cell_color("hybrid sativa"), Some("ED4123"));
        assert_eq!(derive_cell_color("SATIVA"), Some("ED4123"));
        assert_eq!(derive_cell_color("HYBRID"), Some("009900"));
        assert_eq!(derive_cell_color("Mixed"), Some("0021F5"));
        assert_eq!(derive_cell_color("plain"), None);
    }

    #[test]
    fn test_cells_are_shaded_and_recolored() {
        let mut doc = doc_with_rows(&[&["Blue Dream\nSATIVA", "nothing", ""]]);
        apply_conditional_formatting(&mut doc);
        let table = doc.tables().next().expect("table");

        let cell = table.cell(0, 0).expect("cell");
        assert_eq!(cell.props.shading.as_deref(), Some("ED4123"));
        assert_eq!(first_run_color(cell).as_deref(), Some("FFFFFF"));

        let cell = table.cell(0, 1).expect("cell");
        assert_eq!(cell.props.shading.as_deref(), Some("FFFFFF"));
        assert_eq!(first_run_color(cell), None);

        let cell = table.cell(0, 2).expect("cell");
        assert_eq!(cell.text(), " ");
    }

    #[test]
    fn test_middle_row_heading_is_silver() {
        let mut doc = doc_with_rows(&[&["a"], &["Lineage"], &["c"]]);
        apply_conditional_formatting(&mut doc);
        let table = doc.tables().next().expect("table");
        assert_eq!(table.cell(1, 0).expect("cell").props.shading.as_deref(), Some("C0C0C0"));
        assert_eq!(table.cell(0, 0).expect("cell").props.shading.as_deref(), Some("FFFFFF"));
    }

    #[test]
    fn test_spacing_cleanup_and_empty_cells() {
        let mut doc = doc_with_rows(&[&["x", "  "]]);
        fix_paragraph_spacing(&mut doc);
        clear_cell_margins(&mut doc);
        clear_table_cell_padding(&mut doc);
        clear_empty_cells(&mut doc);
        apply_uniform_cell_spacing(&mut doc, 43);

        let table = doc.tables().next().expect("table");
        assert!(table.props.cell_margins_zero);
        assert_eq!(table.props.cell_spacing_twips, Some(43));
        let cell = table.cell(0, 0).expect("cell");
        assert!(cell.props.margins_zero);
        match &cell.blocks[0] {
            EnumBlock::Paragraph(paragraph) => {
                assert_eq!(paragraph.props.space_before, Some(0));
                assert_eq!(paragraph.props.space_after, Some(0));
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
        let cell = table.cell(0, 1).expect("cell");
        assert_eq!(cell.blocks, vec![EnumBlock::Paragraph(SpecParagraph::default())]);
        assert_eq!(cell.props.shading.as_deref(), Some("FFFFFF"));
    }
}
