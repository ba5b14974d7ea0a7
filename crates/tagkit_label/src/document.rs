//! Owned word-processing document tree.
//!
//! Only the structure labels need is typed (paragraphs, runs, tables, cells,
//! page breaks). Everything else rides along as raw XML so a loaded template
//! survives a load/save cycle. Each value owns its subtree; cloning a cell is
//! a deep copy.

use crate::spec::SpecImageAsset;
use crate::xml::XmlElement;

////////////////////////////////////////////////////////////////////////////////
// #region Document

/// A document body plus the package-level bits that travel with it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecDocument {
    /// Attributes of the `w:document` root (namespace declarations).
    pub root_attrs: Vec<(String, String)>,
    /// Body blocks in order.
    pub blocks: Vec<EnumBlock>,
    /// Trailing `w:sectPr` (page size, margins), if any.
    pub section: Option<XmlElement>,
}

/// Top-level or cell-level block.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumBlock {
    Paragraph(SpecParagraph),
    Table(SpecTable),
    /// Paragraph holding a single page break.
    PageBreak,
    /// Unmodelled block kept verbatim.
    Raw(XmlElement),
}

impl SpecDocument {
    /// Top-level tables in order.
    pub fn tables(&self) -> impl Iterator<Item = &SpecTable> {
        self.blocks.iter().filter_map(|block| match block {
            EnumBlock::Table(table) => Some(table),
            _ => None,
        })
    }

    pub fn tables_mut(&mut self) -> impl Iterator<Item = &mut SpecTable> {
        self.blocks.iter_mut().filter_map(|block| match block {
            EnumBlock::Table(table) => Some(table),
            _ => None,
        })
    }

    /// Index of the first top-level table.
    pub fn position_first_table(&self) -> Option<usize> {
        self.blocks
            .iter()
            .position(|block| matches!(block, EnumBlock::Table(_)))
    }

    /// Number of rendered pages, counting explicit page breaks only.
    pub fn count_pages(&self) -> usize {
        self.blocks
            .iter()
            .filter(|block| matches!(block, EnumBlock::PageBreak))
            .count()
            + 1
    }

    /// Visit every paragraph, including those inside (nested) table cells.
    pub fn visit_paragraphs_mut(&mut self, f: &mut dyn FnMut(&mut SpecParagraph)) {
        visit_block_paragraphs_mut(&mut self.blocks, f);
    }

    /// Visit every paragraph read-only.
    pub fn visit_paragraphs(&self, f: &mut dyn FnMut(&SpecParagraph)) {
        visit_block_paragraphs(&self.blocks, f);
    }
}

/// Recursive paragraph visitor over a block list.
pub fn visit_block_paragraphs_mut(blocks: &mut [EnumBlock], f: &mut dyn FnMut(&mut SpecParagraph)) {
    for block in blocks {
        match block {
            EnumBlock::Paragraph(paragraph) => f(paragraph),
            EnumBlock::Table(table) => {
                for row in &mut table.rows {
                    for cell in &mut row.cells {
                        visit_block_paragraphs_mut(&mut cell.blocks, f);
                    }
                }
            }
            EnumBlock::PageBreak | EnumBlock::Raw(_) => {}
        }
    }
}

pub fn visit_block_paragraphs(blocks: &[EnumBlock], f: &mut dyn FnMut(&SpecParagraph)) {
    for block in blocks {
        match block {
            EnumBlock::Paragraph(paragraph) => f(paragraph),
            EnumBlock::Table(table) => {
                for row in &table.rows {
                    for cell in &row.cells {
                        visit_block_paragraphs(&cell.blocks, f);
                    }
                }
            }
            EnumBlock::PageBreak | EnumBlock::Raw(_) => {}
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Paragraph

/// Horizontal alignment (`w:jc`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumAlign {
    Left,
    Center,
    Right,
    Both,
}

impl EnumAlign {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnumAlign::Left => "left",
            EnumAlign::Center => "center",
            EnumAlign::Right => "right",
            EnumAlign::Both => "both",
        }
    }

    pub fn parse(text: &str) -> Option<EnumAlign> {
        match text {
            "left" | "start" => Some(EnumAlign::Left),
            "center" => Some(EnumAlign::Center),
            "right" | "end" => Some(EnumAlign::Right),
            "both" | "distribute" => Some(EnumAlign::Both),
            _ => None,
        }
    }
}

/// Typed subset of `w:pPr`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecParagraphProps {
    /// `w:pStyle`.
    pub style: Option<String>,
    /// `w:jc`.
    pub align: Option<EnumAlign>,
    /// `w:spacing/@w:before` in twips.
    pub space_before: Option<u32>,
    /// `w:spacing/@w:after` in twips.
    pub space_after: Option<u32>,
    /// Other `w:spacing` attributes (`w:line`, `w:lineRule`, ...).
    pub spacing_attrs_extra: Vec<(String, String)>,
    /// Untyped children kept verbatim.
    pub extra: Vec<XmlElement>,
}

/// Paragraph with typed props and inline content.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecParagraph {
    pub props: SpecParagraphProps,
    pub inlines: Vec<EnumInline>,
}

/// Inline paragraph content.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumInline {
    Run(SpecRun),
    Image(SpecInlineImage),
    /// Unmodelled inline (hyperlink, bookmark, drawing run ...).
    Raw(XmlElement),
}

/// Typed subset of `w:rPr`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecRunProps {
    /// `w:rFonts` family applied to every script slot.
    pub font_name: Option<String>,
    /// `w:sz` in half-points.
    pub size_half_points: Option<u32>,
    /// `w:b`.
    pub bold: Option<bool>,
    /// `w:color` hex.
    pub color: Option<String>,
    /// `w:highlight` name.
    pub highlight: Option<String>,
    /// Untyped children kept verbatim.
    pub extra: Vec<XmlElement>,
}

/// Text run. `\n` renders as a line break, `\t` as a tab.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecRun {
    pub props: SpecRunProps,
    pub text: String,
}

/// Picture placed inline, sized in EMU.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecInlineImage {
    pub asset: SpecImageAsset,
    pub width_emu: u64,
    pub height_emu: u64,
}

impl SpecRun {
    pub fn new(text: &str) -> Self {
        Self {
            props: SpecRunProps::default(),
            text: text.to_string(),
        }
    }
}

impl SpecParagraph {
    /// Paragraph with a single plain run (no run when `text` is empty).
    pub fn from_text(text: &str) -> Self {
        let mut paragraph = SpecParagraph::default();
        if !text.is_empty() {
            paragraph.inlines.push(EnumInline::Run(SpecRun::new(text)));
        }
        paragraph
    }

    /// Visible text: run text plus any `w:t`/`w:br`/`w:tab` inside raw inlines.
    pub fn text(&self) -> String {
        let mut c_out = String::new();
        for inline in &self.inlines {
            match inline {
                EnumInline::Run(run) => c_out.push_str(&run.text),
                EnumInline::Image(_) => {}
                EnumInline::Raw(el) => el.visit(&mut |node| match node.name.as_str() {
                    "w:t" => c_out.push_str(&node.text()),
                    "w:tab" => c_out.push('\t'),
                    "w:br" | "w:cr" => c_out.push('\n'),
                    _ => {}
                }),
            }
        }
        c_out
    }

    /// Typed runs, mutable.
    pub fn runs_mut(&mut self) -> impl Iterator<Item = &mut SpecRun> {
        self.inlines.iter_mut().filter_map(|inline| match inline {
            EnumInline::Run(run) => Some(run),
            _ => None,
        })
    }

    /// True when the paragraph has no inline content at all.
    pub fn is_empty(&self) -> bool {
        self.inlines.is_empty()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Table

/// One border edge (`w:top`, `w:insideH`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecBorder {
    /// `w:val`, e.g. `single` or `nil`.
    pub val: String,
    /// `w:sz` in eighths of a point.
    pub size: Option<u32>,
    pub color: Option<String>,
    pub space: Option<u32>,
}

impl SpecBorder {
    /// Hidden edge.
    pub fn nil() -> Self {
        Self {
            val: "nil".to_string(),
            size: None,
            color: None,
            space: None,
        }
    }

    /// Solid edge.
    pub fn single(size: u32, color: &str) -> Self {
        Self {
            val: "single".to_string(),
            size: Some(size),
            color: Some(color.to_string()),
            space: Some(0),
        }
    }
}

/// `w:tblBorders`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecTableBorders {
    pub top: Option<SpecBorder>,
    pub left: Option<SpecBorder>,
    pub bottom: Option<SpecBorder>,
    pub right: Option<SpecBorder>,
    pub inside_h: Option<SpecBorder>,
    pub inside_v: Option<SpecBorder>,
}

/// Typed subset of `w:tblPr`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecTableProps {
    /// `w:tblStyle`.
    pub style: Option<String>,
    /// `w:tblW` in twips.
    pub width_twips: Option<u32>,
    /// `w:jc`.
    pub align: Option<EnumAlign>,
    /// `w:tblLayout w:type="fixed"`.
    pub layout_fixed: bool,
    /// `w:shd/@w:fill`.
    pub shading: Option<String>,
    pub borders: Option<SpecTableBorders>,
    /// `w:tblCellSpacing` in twips.
    pub cell_spacing_twips: Option<u32>,
    /// `w:tblCellMar` with every side zero.
    pub cell_margins_zero: bool,
    /// Untyped children kept verbatim.
    pub extra: Vec<XmlElement>,
}

/// Typed subset of `w:tcPr`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecTableCellProps {
    /// `w:tcW` in twips.
    pub width_twips: Option<u32>,
    /// `w:shd/@w:fill`.
    pub shading: Option<String>,
    /// `w:tcMar` with every side zero.
    pub margins_zero: bool,
    /// `w:vAlign/@w:val`.
    pub v_align: Option<String>,
    /// Untyped children (`w:gridSpan`, `w:vMerge`, ...) kept verbatim.
    pub extra: Vec<XmlElement>,
}

/// Table cell; its blocks may include nested tables.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecTableCell {
    pub props: SpecTableCellProps,
    pub blocks: Vec<EnumBlock>,
}

/// Table row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecTableRow {
    /// `w:trHeight/@w:val` in twips.
    pub height_twips: Option<u32>,
    /// `w:trHeight/@w:hRule="exact"`.
    pub height_exact: bool,
    /// Untyped `w:trPr` children kept verbatim.
    pub extra: Vec<XmlElement>,
    pub cells: Vec<SpecTableCell>,
}

/// Table with grid and rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecTable {
    pub props: SpecTableProps,
    /// `w:tblGrid` column widths in twips.
    pub grid_cols_twips: Vec<u32>,
    pub rows: Vec<SpecTableRow>,
}

impl SpecTableCell {
    /// Direct paragraphs, mutable (nested tables excluded).
    pub fn paragraphs_mut(&mut self) -> impl Iterator<Item = &mut SpecParagraph> {
        self.blocks.iter_mut().filter_map(|block| match block {
            EnumBlock::Paragraph(paragraph) => Some(paragraph),
            _ => None,
        })
    }

    /// Direct paragraph texts joined by `\n`; nested tables are not included.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                EnumBlock::Paragraph(paragraph) => Some(paragraph.text()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Replace all content with one paragraph holding `text`; props are kept.
    pub fn set_text(&mut self, text: &str) {
        self.blocks = vec![EnumBlock::Paragraph(SpecParagraph::from_text(text))];
    }

    /// True when the cell holds nothing but empty paragraphs.
    pub fn is_blank(&self) -> bool {
        self.blocks.iter().all(|block| match block {
            EnumBlock::Paragraph(paragraph) => paragraph.text().trim().is_empty()
                && paragraph
                    .inlines
                    .iter()
                    .all(|inline| matches!(inline, EnumInline::Run(_))),
            _ => false,
        })
    }
}

impl SpecTable {
    /// Row count.
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Column count from the widest row.
    pub fn n_cols(&self) -> usize {
        self.rows.iter().map(|row| row.cells.len()).max().unwrap_or(0)
    }

    /// Cell at `(row, col)`.
    pub fn cell(&self, n_row: usize, n_col: usize) -> Option<&SpecTableCell> {
        self.rows.get(n_row).and_then(|row| row.cells.get(n_col))
    }

    pub fn cell_mut(&mut self, n_row: usize, n_col: usize) -> Option<&mut SpecTableCell> {
        self.rows
            .get_mut(n_row)
            .and_then(|row| row.cells.get_mut(n_col))
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &SpecTableCell> {
        self.rows.iter().flat_map(|row| row.cells.iter())
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut SpecTableCell> {
        self.rows.iter_mut().flat_map(|row| row.cells.iter_mut())
    }

    /// Cell texts of one row joined by a space.
    pub fn row_text(&self, n_row: usize) -> String {
        self.rows
            .get(n_row)
            .map(|row| {
                row.cells
                    .iter()
                    .map(SpecTableCell::text)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn build_cell(lines: &[&str]) -> SpecTableCell {
        SpecTableCell {
            props: SpecTableCellProps::default(),
            blocks: lines
                .iter()
                .map(|line| EnumBlock::Paragraph(SpecParagraph::from_text(line)))
                .collect(),
        }
    }

    #[test]
    fn test_cell_text_joins_direct_paragraphs_only() {
        let mut cell = build_cell(&["SATIVA", "Blue Dream"]);
        let nested = SpecTable {
            rows: vec![SpecTableRow {
                cells: vec![build_cell(&["CBD: 1%"])],
                ..SpecTableRow::default()
            }],
            ..SpecTable::default()
        };
        cell.blocks.push(EnumBlock::Table(nested));
        assert_eq!(cell.text(), "SATIVA\nBlue Dream");

        let mut n_paragraphs = 0;
        visit_block_paragraphs(&cell.blocks, &mut |_| n_paragraphs += 1);
        assert_eq!(n_paragraphs, 3);
    }

    #[test]
    fn test_set_text_keeps_props() {
        let mut cell = build_cell(&["a", "b"]);
        cell.props.shading = Some("D3D3D3".to_string());
        cell.set_text("Vendor\nBrand");
        assert_eq!(cell.blocks.len(), 1);
        assert_eq!(cell.text(), "Vendor\nBrand");
        assert_eq!(cell.props.shading.as_deref(), Some("D3D3D3"));
    }

    #[test]
    fn test_raw_inline_text_is_visible() {
        let raw = XmlElement::new("w:hyperlink").with_child(
            XmlElement::new("w:r")
                .with_child(XmlElement::new("w:t").with_text("Link"))
                .with_child(XmlElement::new("w:br")),
        );
        let paragraph = SpecParagraph {
            props: SpecParagraphProps::default(),
            inlines: vec![
                EnumInline::Run(SpecRun::new("Go ")),
                EnumInline::Raw(raw),
            ],
        };
        assert_eq!(paragraph.text(), "Go Link\n");
    }

    #[test]
    fn test_row_text_and_page_count() {
        let table = SpecTable {
            rows: vec![SpecTableRow {
                cells: vec![build_cell(&["LINEAGE"]), build_cell(&["PRODUCT STRAIN"])],
                ..SpecTableRow::default()
            }],
            ..SpecTable::default()
        };
        assert_eq!(table.row_text(0), "LINEAGE PRODUCT STRAIN");
        assert_eq!(table.row_text(5), "");

        let doc = SpecDocument {
            blocks: vec![
                EnumBlock::Table(table.clone()),
                EnumBlock::PageBreak,
                EnumBlock::Table(table),
            ],
            ..SpecDocument::default()
        };
        assert_eq!(doc.count_pages(), 2);
        assert_eq!(doc.tables().count(), 2);
        assert_eq!(doc.position_first_table(), Some(0));
    }

    #[test]
    fn test_blank_cell_detection() {
        assert!(build_cell(&["", " "]).is_blank());
        assert!(!build_cell(&["x"]).is_blank());
        assert!(SpecTableCell::default().is_blank());
    }
}
