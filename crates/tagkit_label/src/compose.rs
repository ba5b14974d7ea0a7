//! Document compositor: ordered page documents into one output document.

use crate::conf::N_TWIPS_COMPOSE_SPACING;
use crate::document::{EnumBlock, EnumInline, SpecDocument, SpecParagraph};
use crate::format::apply_uniform_cell_spacing;

/// Append every document after the first, each starting on a new page.
///
/// Root attributes and the page section come from the first document. Order
/// of `docs` is the page order of the result. An empty paragraph that only
/// trails a table is replaced by the page break, so each page ends in a
/// single break line.
pub fn compose_documents(docs: Vec<SpecDocument>) -> Result<SpecDocument, String> {
    let mut iter_docs = docs.into_iter();
    let mut composed = iter_docs
        .next()
        .ok_or_else(|| "Nothing to compose: no documents.".to_string())?;
    let mut n_docs = 1usize;
    for doc in iter_docs {
        drop_trailing_table_paragraph(&mut composed.blocks);
        composed.blocks.push(EnumBlock::PageBreak);
        composed.blocks.extend(doc.blocks);
        n_docs += 1;
    }
    apply_uniform_cell_spacing(&mut composed, N_TWIPS_COMPOSE_SPACING);
    tracing::debug!(
        "Composed {n_docs} documents into {} pages.",
        composed.count_pages()
    );
    Ok(composed)
}

fn drop_trailing_table_paragraph(blocks: &mut Vec<EnumBlock>) {
    let n_len = blocks.len();
    if n_len < 2 || !matches!(blocks[n_len - 2], EnumBlock::Table(_)) {
        return;
    }
    if let EnumBlock::Paragraph(paragraph) = &blocks[n_len - 1]
        && paragraph
            .inlines
            .iter()
            .all(|inline| matches!(inline, EnumInline::Run(run) if run.text.trim().is_empty()))
    {
        blocks.pop();
    }
}

/// A page holding one empty paragraph.
pub fn derive_blank_page() -> SpecDocument {
    SpecDocument {
        blocks: vec![EnumBlock::Paragraph(SpecParagraph::default())],
        ..SpecDocument::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{SpecTable, SpecTableCell, SpecTableRow};
    use crate::xml::XmlElement;

    fn page(text: &str) -> SpecDocument {
        let mut cell = SpecTableCell::default();
        cell.set_text(text);
        SpecDocument {
            blocks: vec![EnumBlock::Table(SpecTable {
                rows: vec![SpecTableRow {
                    cells: vec![cell],
                    ..SpecTableRow::default()
                }],
                ..SpecTable::default()
            })],
            ..SpecDocument::default()
        }
    }

    #[test]
    fn test_pages_keep_input_order() {
        let mut first = page("A");
        first.section = Some(XmlElement::new("w:sectPr"));
        let composed = compose_documents(vec![first, page("B"), page("C")]).expect("compose");

        assert_eq!(composed.count_pages(), 3);
        let l_texts: Vec<String> = composed
            .tables()
            .map(|table| table.row_text(0))
            .collect();
        assert_eq!(l_texts, vec!["A", "B", "C"]);
        assert!(composed.section.is_some());
        assert!(matches!(composed.blocks[1], EnumBlock::PageBreak));
    }

    #[test]
    fn test_spacing_is_uniform_and_idempotent() {
        let composed = compose_documents(vec![page("A"), page("B")]).expect("compose");
        let composed = compose_documents(vec![composed]).expect("compose");
        assert!(composed
            .tables()
            .all(|table| table.props.cell_spacing_twips == Some(N_TWIPS_COMPOSE_SPACING)));
        assert_eq!(composed.count_pages(), 2);
    }

    #[test]
    fn test_trailing_paragraph_gives_way_to_page_break() {
        let with_trailer = |text: &str| {
            let mut doc = page(text);
            doc.blocks.push(EnumBlock::Paragraph(SpecParagraph::default()));
            doc
        };
        let composed =
            compose_documents(vec![with_trailer("A"), with_trailer("B"), with_trailer("C")])
                .expect("compose");
        let l_kinds: Vec<&str> = composed
            .blocks
            .iter()
            .map(|block| match block {
                EnumBlock::Table(_) => "table",
                EnumBlock::PageBreak => "break",
                EnumBlock::Paragraph(_) => "paragraph",
                EnumBlock::Raw(_) => "raw",
            })
            .collect();
        assert_eq!(
            l_kinds,
            vec!["table", "break", "table", "break", "table", "paragraph"]
        );
        assert_eq!(composed.count_pages(), 3);
    }

    #[test]
    fn test_blank_page_and_empty_input() {
        let composed = compose_documents(vec![page("A"), derive_blank_page(), page("B")])
            .expect("compose");
        assert_eq!(composed.count_pages(), 3);
        assert!(compose_documents(Vec::new()).is_err());
    }
}
