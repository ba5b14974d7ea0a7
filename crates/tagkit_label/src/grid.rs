//! Template grid expansion: one prototype cell becomes an N x M page of slots.

use crate::conf::{C_COLOR_GRID_GUIDE, C_COLOR_GRID_SHADING, C_PLACEHOLDER_PROTOTYPE_LABEL, N_SIZE_GRID_GUIDE};
use crate::document::{
    EnumAlign, EnumBlock, EnumInline, SpecBorder, SpecDocument, SpecTable, SpecTableBorders,
    SpecTableCell, SpecTableCellProps, SpecTableProps, SpecTableRow, visit_block_paragraphs,
    visit_block_paragraphs_mut,
};
use crate::spec::SpecGridShape;
use crate::util::convert_inches_to_twips;
use crate::xml::{EnumXmlNode, XmlElement};

/// Expand the first table's `(0, 0)` cell of `prototype` into a grid.
///
/// The prototype table is replaced in place by a fixed-layout table of
/// `shape.n_rows x shape.n_cols` cells. Every cell starts as a deep copy of
/// the source cell with `Label1` renamed to `Label{n}` (1-based, row-major).
/// Leading blank paragraphs before the table are dropped.
pub fn expand_template(prototype: &SpecDocument, shape: &SpecGridShape) -> Result<SpecDocument, String> {
    let n_idx_table = prototype
        .position_first_table()
        .ok_or_else(|| "Template must contain at least one table.".to_string())?;
    let l_source_blocks = match &prototype.blocks[n_idx_table] {
        EnumBlock::Table(table) => table
            .cell(0, 0)
            .map(|cell| cell.blocks.clone())
            .ok_or_else(|| "Template table has no cells.".to_string())?,
        _ => return Err("Template must contain at least one table.".to_string()),
    };
    if !if_blocks_mention_label(&l_source_blocks, C_PLACEHOLDER_PROTOTYPE_LABEL) {
        return Err(format!(
            "Template cell has no {C_PLACEHOLDER_PROTOTYPE_LABEL} placeholder."
        ));
    }
    if shape.n_rows == 0 || shape.n_cols == 0 {
        return Err(format!(
            "Grid shape {}x{} has no slots.",
            shape.n_rows, shape.n_cols
        ));
    }

    let mut doc = prototype.clone();
    doc.blocks.remove(n_idx_table);
    let mut n_idx_insert = n_idx_table;
    while n_idx_insert > 0 && is_blank_paragraph(&doc.blocks[0]) {
        doc.blocks.remove(0);
        n_idx_insert -= 1;
    }

    let table = derive_grid_table(&l_source_blocks, shape);
    doc.blocks.insert(n_idx_insert, EnumBlock::Table(table));
    tracing::debug!(
        "Expanded template to {}x{} grid of {}in x {}in cells.",
        shape.n_rows,
        shape.n_cols,
        shape.width_cell_in,
        shape.height_cell_in
    );
    Ok(doc)
}

fn derive_grid_table(l_source_blocks: &[EnumBlock], shape: &SpecGridShape) -> SpecTable {
    let n_width_col = convert_inches_to_twips(shape.width_cell_in);
    let n_height_row = convert_inches_to_twips(shape.height_cell_in);
    let guide = SpecBorder::single(N_SIZE_GRID_GUIDE, C_COLOR_GRID_GUIDE);

    let rows = (0..shape.n_rows)
        .map(|n_row| SpecTableRow {
            height_twips: Some(n_height_row),
            height_exact: true,
            extra: Vec::new(),
            cells: (0..shape.n_cols)
                .map(|n_col| {
                    let n_label = n_row * shape.n_cols + n_col + 1;
                    let mut l_blocks = l_source_blocks.to_vec();
                    rename_label_in_blocks(&mut l_blocks, &format!("Label{n_label}"));
                    SpecTableCell {
                        props: SpecTableCellProps {
                            width_twips: Some(n_width_col),
                            ..SpecTableCellProps::default()
                        },
                        blocks: l_blocks,
                    }
                })
                .collect(),
        })
        .collect();

    SpecTable {
        props: SpecTableProps {
            width_twips: Some(n_width_col * shape.n_cols as u32),
            align: Some(EnumAlign::Center),
            layout_fixed: true,
            shading: Some(C_COLOR_GRID_SHADING.to_string()),
            borders: Some(SpecTableBorders {
                top: Some(SpecBorder::nil()),
                left: Some(SpecBorder::nil()),
                bottom: Some(SpecBorder::nil()),
                right: Some(SpecBorder::nil()),
                inside_h: Some(guide.clone()),
                inside_v: Some(guide),
            }),
            cell_spacing_twips: shape.spacing_cell_twips,
            ..SpecTableProps::default()
        },
        grid_cols_twips: vec![n_width_col; shape.n_cols],
        rows,
    }
}

fn is_blank_paragraph(block: &EnumBlock) -> bool {
    match block {
        EnumBlock::Paragraph(paragraph) => {
            paragraph.text().trim().is_empty()
                && !paragraph
                    .inlines
                    .iter()
                    .any(|inline| matches!(inline, EnumInline::Image(_)))
        }
        _ => false,
    }
}

fn if_blocks_mention_label(blocks: &[EnumBlock], c_label: &str) -> bool {
    let mut if_found = false;
    visit_block_paragraphs(blocks, &mut |paragraph| {
        if_found |= paragraph.text().contains(c_label);
    });
    if_found
}

/// Rename `Label1` to `c_label` in run text and raw `w:t` text, recursing into nested tables.
fn rename_label_in_blocks(blocks: &mut [EnumBlock], c_label: &str) {
    visit_block_paragraphs_mut(blocks, &mut |paragraph| {
        for inline in &mut paragraph.inlines {
            match inline {
                EnumInline::Run(run) => {
                    if run.text.contains(C_PLACEHOLDER_PROTOTYPE_LABEL) {
                        run.text = run.text.replace(C_PLACEHOLDER_PROTOTYPE_LABEL, c_label);
                    }
                }
                EnumInline::Raw(el) => rename_label_in_xml(el, c_label, false),
                EnumInline::Image(_) => {}
            }
        }
    });
}

fn rename_label_in_xml(el: &mut XmlElement, c_label: &str, if_in_text: bool) {
    let if_text = if_in_text || el.name == "w:t";
    for node in &mut el.children {
        match node {
            EnumXmlNode::Element(child) => rename_label_in_xml(child, c_label, if_text),
            EnumXmlNode::Text(text) if if_text && text.contains(C_PLACEHOLDER_PROTOTYPE_LABEL) => {
                *text = text.replace(C_PLACEHOLDER_PROTOTYPE_LABEL, c_label);
            }
            EnumXmlNode::Text(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::derive_grid_shape;
    use crate::document::SpecParagraph;
    use crate::spec::EnumOrientation;
    use crate::template::derive_prototype_document;

    fn shape_4x5() -> SpecGridShape {
        derive_grid_shape(EnumOrientation::Mini).expect("mini shape")
    }

    #[test]
    fn test_expand_yields_twenty_renamed_slots() {
        let proto = derive_prototype_document(EnumOrientation::Mini);
        let doc = expand_template(&proto, &shape_4x5()).expect("expand");
        let table = doc.tables().next().expect("grid");
        assert_eq!((table.n_rows(), table.n_cols()), (5, 4));
        assert_eq!(table.cells().count(), 20);

        let c_first = table.cell(0, 0).expect("cell").text();
        for (idx, cell) in table.cells().enumerate() {
            let c_expected = c_first.replace("Label1.", &format!("Label{}.", idx + 1));
            assert_eq!(cell.text(), c_expected);
        }
        assert!(table.cell(4, 3).expect("cell").text().contains("{{Label20.Price}}"));
    }

    #[test]
    fn test_expand_is_deterministic() {
        let proto = derive_prototype_document(EnumOrientation::Horizontal);
        let shape = derive_grid_shape(EnumOrientation::Horizontal).expect("shape");
        let doc_a = expand_template(&proto, &shape).expect("expand");
        let doc_b = expand_template(&proto, &shape).expect("expand");
        assert_eq!(doc_a, doc_b);
    }

    #[test]
    fn test_grid_table_styling() {
        let proto = derive_prototype_document(EnumOrientation::Horizontal);
        let shape = derive_grid_shape(EnumOrientation::Horizontal).expect("shape");
        let doc = expand_template(&proto, &shape).expect("expand");
        let table = doc.tables().next().expect("grid");
        assert!(table.props.layout_fixed);
        assert_eq!(table.props.shading.as_deref(), Some("D3D3D3"));
        assert_eq!(table.grid_cols_twips, vec![5040, 5040, 5040]);
        assert!(table.rows.iter().all(|row| row.height_exact && row.height_twips == Some(3600)));
        let borders = table.props.borders.as_ref().expect("borders");
        assert_eq!(borders.top.as_ref().map(|b| b.val.as_str()), Some("nil"));
        assert_eq!(borders.inside_v.as_ref().and_then(|b| b.size), Some(4));
        assert_eq!(table.props.cell_spacing_twips, None);
    }

    #[test]
    fn test_nested_table_placeholders_are_renamed() {
        let proto = derive_prototype_document(EnumOrientation::Horizontal);
        let shape = derive_grid_shape(EnumOrientation::Horizontal).expect("shape");
        let doc = expand_template(&proto, &shape).expect("expand");
        let mut c_all = String::new();
        doc.visit_paragraphs(&mut |paragraph| c_all.push_str(&paragraph.text()));
        assert!(c_all.contains("{{Label9.Ratio_or_THC_CBD}}"));
    }

    #[test]
    fn test_missing_table_or_label_is_an_error() {
        let doc = SpecDocument {
            blocks: vec![EnumBlock::Paragraph(SpecParagraph::from_text("no grid"))],
            ..SpecDocument::default()
        };
        let err = expand_template(&doc, &shape_4x5()).expect_err("no table");
        assert_eq!(err, "Template must contain at least one table.");

        let mut proto = derive_prototype_document(EnumOrientation::Mini);
        if let Some(table) = proto.tables_mut().next()
            && let Some(cell) = table.cell_mut(0, 0)
        {
            cell.set_text("static text");
        }
        assert!(expand_template(&proto, &shape_4x5()).is_err());
    }

    #[test]
    fn test_leading_blank_paragraphs_are_dropped() {
        let mut proto = derive_prototype_document(EnumOrientation::Mini);
        proto.blocks.insert(0, EnumBlock::Paragraph(SpecParagraph::default()));
        proto.blocks.insert(0, EnumBlock::Paragraph(SpecParagraph::from_text("  ")));
        let doc = expand_template(&proto, &shape_4x5()).expect("expand");
        assert!(matches!(doc.blocks[0], EnumBlock::Table(_)));
        assert_eq!(doc.blocks.len(), 2);
    }
}
