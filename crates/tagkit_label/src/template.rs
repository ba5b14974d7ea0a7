//! Built-in prototype templates and `{{LabelN.Field}}` placeholder rendering.
//!
//! A prototype is a document whose first table holds one label cell (or, for
//! inventory slips, four ready-made slots). Placeholders name a slot and a
//! field; rendering replaces them with text or an inline picture.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::conf::{
    C_FONT_NAME_LABEL, C_PLACEHOLDER_PROTOTYPE_LABEL, N_SLOTS_INVENTORY, N_TWIPS_COMPOSE_SPACING,
    derive_grid_shape,
};
use crate::document::{
    EnumAlign, EnumBlock, EnumInline, SpecBorder, SpecDocument, SpecInlineImage, SpecParagraph,
    SpecParagraphProps, SpecRun, SpecRunProps, SpecTable, SpecTableBorders, SpecTableCell,
    SpecTableCellProps, SpecTableProps, SpecTableRow,
};
use crate::spec::EnumOrientation;
use crate::util::convert_inches_to_twips;
use crate::xml::XmlElement;

static RE_PLACEHOLDER: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\{\{\s*Label(\d+)\.(\w+)\s*\}\}"));

////////////////////////////////////////////////////////////////////////////////
// #region Context

/// Value substituted for one placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumFieldValue {
    Text(String),
    Image(SpecInlineImage),
}

impl From<String> for EnumFieldValue {
    fn from(text: String) -> Self {
        EnumFieldValue::Text(text)
    }
}

impl From<&str> for EnumFieldValue {
    fn from(text: &str) -> Self {
        EnumFieldValue::Text(text.to_string())
    }
}

/// Field name to value for one label slot.
pub type DictLabelFields = BTreeMap<String, EnumFieldValue>;

/// Values for every slot of one page, keyed by 1-based label index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecRenderContext {
    pub labels: BTreeMap<usize, DictLabelFields>,
}

impl SpecRenderContext {
    /// Set the fields of `Label{n_label}`.
    pub fn insert(&mut self, n_label: usize, fields: DictLabelFields) {
        self.labels.insert(n_label, fields);
    }

    /// Value of `Label{n_label}.{name}`, if set.
    pub fn field(&self, n_label: usize, name: &str) -> Option<&EnumFieldValue> {
        self.labels.get(&n_label).and_then(|fields| fields.get(name))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Rendering

/// Replace every placeholder in `doc`, including nested tables.
///
/// Consecutive runs of a paragraph are merged before matching so that a
/// placeholder split across runs still resolves; the merged run keeps the
/// first run's properties. Unknown slots or fields render as empty text.
pub fn render_placeholders(doc: &mut SpecDocument, context: &SpecRenderContext) -> Result<(), String> {
    let re = RE_PLACEHOLDER
        .as_ref()
        .map_err(|err| format!("Invalid placeholder pattern: {err}"))?;
    doc.visit_paragraphs_mut(&mut |paragraph| {
        if paragraph.text().contains("{{") {
            render_paragraph(paragraph, context, re);
        }
    });
    Ok(())
}

fn render_paragraph(paragraph: &mut SpecParagraph, context: &SpecRenderContext, re: &Regex) {
    let l_inlines = std::mem::take(&mut paragraph.inlines);
    let mut l_out: Vec<EnumInline> = Vec::with_capacity(l_inlines.len());
    let mut l_group: Vec<SpecRun> = Vec::new();

    for inline in l_inlines {
        match inline {
            EnumInline::Run(run) => l_group.push(run),
            other => {
                flush_run_group(&mut l_group, &mut l_out, context, re);
                l_out.push(other);
            }
        }
    }
    flush_run_group(&mut l_group, &mut l_out, context, re);
    paragraph.inlines = l_out;
}

fn flush_run_group(
    l_group: &mut Vec<SpecRun>,
    l_out: &mut Vec<EnumInline>,
    context: &SpecRenderContext,
    re: &Regex,
) {
    if l_group.is_empty() {
        return;
    }
    let props = l_group[0].props.clone();
    let c_merged: String = l_group.iter().map(|run| run.text.as_str()).collect();
    l_group.clear();

    if !c_merged.contains("{{") {
        l_out.push(EnumInline::Run(SpecRun {
            props,
            text: c_merged,
        }));
        return;
    }

    let mut c_buf = String::new();
    let mut n_last = 0;
    for caps in re.captures_iter(&c_merged) {
        let Some(m) = caps.get(0) else { continue };
        c_buf.push_str(&c_merged[n_last..m.start()]);
        n_last = m.end();

        let n_label = caps
            .get(1)
            .and_then(|g| g.as_str().parse::<usize>().ok())
            .unwrap_or(0);
        let c_field = caps.get(2).map(|g| g.as_str()).unwrap_or_default();
        match context.field(n_label, c_field) {
            Some(EnumFieldValue::Text(text)) => c_buf.push_str(text),
            Some(EnumFieldValue::Image(image)) => {
                if !c_buf.is_empty() {
                    l_out.push(EnumInline::Run(SpecRun {
                        props: props.clone(),
                        text: std::mem::take(&mut c_buf),
                    }));
                }
                l_out.push(EnumInline::Image(image.clone()));
            }
            None => {}
        }
    }
    c_buf.push_str(&c_merged[n_last..]);
    if !c_buf.is_empty() {
        l_out.push(EnumInline::Run(SpecRun {
            props,
            text: c_buf,
        }));
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Prototypes

const N_TWIPS_LETTER_LONG: u32 = 15_840;
const N_TWIPS_LETTER_SHORT: u32 = 12_240;
const N_TWIPS_MARGIN_SIDE: u32 = 360;
const N_TWIPS_MARGIN_TOP: u32 = 720;
/// Height of the one-line paragraph that follows each grid (page break or body end).
pub const N_TWIPS_TRAILING_LINE: u32 = 360;

/// Space a cell-spaced table adds across `n_cells` cells: a gap on both sides
/// of every cell boundary, table edges included.
fn calculate_spacing_extent(n_cells: usize) -> u32 {
    (n_cells as u32 + 1) * 2 * N_TWIPS_COMPOSE_SPACING
}

fn placeholder(field: &str) -> String {
    format!("{{{{{C_PLACEHOLDER_PROTOTYPE_LABEL}.{field}}}}}")
}

fn derive_label_run(text: &str) -> SpecRun {
    SpecRun {
        props: SpecRunProps {
            font_name: Some(C_FONT_NAME_LABEL.to_string()),
            bold: Some(true),
            ..SpecRunProps::default()
        },
        text: text.to_string(),
    }
}

fn derive_field_paragraph(fields: &[&str], align: Option<EnumAlign>) -> EnumBlock {
    let c_text: String = fields.iter().map(|field| placeholder(field)).collect();
    EnumBlock::Paragraph(SpecParagraph {
        props: SpecParagraphProps {
            align,
            ..SpecParagraphProps::default()
        },
        inlines: vec![EnumInline::Run(derive_label_run(&c_text))],
    })
}

fn derive_single_cell_table(blocks: Vec<EnumBlock>, width_twips: u32, height_twips: u32) -> SpecTable {
    SpecTable {
        props: SpecTableProps {
            width_twips: Some(width_twips),
            layout_fixed: true,
            ..SpecTableProps::default()
        },
        grid_cols_twips: vec![width_twips],
        rows: vec![SpecTableRow {
            height_twips: Some(height_twips),
            height_exact: true,
            extra: Vec::new(),
            cells: vec![SpecTableCell {
                props: SpecTableCellProps {
                    width_twips: Some(width_twips),
                    ..SpecTableCellProps::default()
                },
                blocks,
            }],
        }],
    }
}

/// `w:sectPr` for a built-in prototype.
///
/// The body must hold the composed grid: exact row heights and column widths,
/// the compose cell spacing, and one trailing line. Letter landscape is used
/// when that fits, with margins shrunk as needed; otherwise the page is sized
/// to the body plus the default margins.
pub fn derive_section(orientation: EnumOrientation) -> XmlElement {
    let (n_width_grid, n_height_grid, n_rows, n_cols) = match derive_grid_shape(orientation) {
        Some(shape) => (
            convert_inches_to_twips(shape.width_cell_in) * shape.n_cols as u32,
            convert_inches_to_twips(shape.height_cell_in) * shape.n_rows as u32,
            shape.n_rows,
            shape.n_cols,
        ),
        None => (
            convert_inches_to_twips(2.5) * N_SLOTS_INVENTORY as u32,
            convert_inches_to_twips(6.0),
            1,
            N_SLOTS_INVENTORY,
        ),
    };
    let n_width_body = n_width_grid + calculate_spacing_extent(n_cols);
    let n_height_body = n_height_grid + calculate_spacing_extent(n_rows) + N_TWIPS_TRAILING_LINE;
    let (n_width_page, n_height_page) =
        if n_width_body <= N_TWIPS_LETTER_LONG && n_height_body <= N_TWIPS_LETTER_SHORT {
            (N_TWIPS_LETTER_LONG, N_TWIPS_LETTER_SHORT)
        } else {
            (
                n_width_body + 2 * N_TWIPS_MARGIN_SIDE,
                n_height_body + 2 * N_TWIPS_MARGIN_TOP,
            )
        };
    let n_margin_side = N_TWIPS_MARGIN_SIDE.min((n_width_page - n_width_body) / 2);
    let n_margin_top = N_TWIPS_MARGIN_TOP.min((n_height_page - n_height_body) / 2);

    let mut pg_sz = XmlElement::new("w:pgSz")
        .with_attr("w:w", &n_width_page.to_string())
        .with_attr("w:h", &n_height_page.to_string());
    if n_width_page > n_height_page {
        pg_sz.set_attr("w:orient", "landscape");
    }
    let c_side = n_margin_side.to_string();
    let c_top = n_margin_top.to_string();
    XmlElement::new("w:sectPr").with_child(pg_sz).with_child(
        XmlElement::new("w:pgMar")
            .with_attr("w:top", &c_top)
            .with_attr("w:right", &c_side)
            .with_attr("w:bottom", &c_top)
            .with_attr("w:left", &c_side)
            .with_attr("w:header", "0")
            .with_attr("w:footer", "0")
            .with_attr("w:gutter", "0"),
    )
}

fn derive_label_cell_blocks(orientation: EnumOrientation, n_width_twips: u32) -> Vec<EnumBlock> {
    if orientation == EnumOrientation::Mini {
        return vec![
            derive_field_paragraph(&["ProductBrand"], Some(EnumAlign::Center)),
            derive_field_paragraph(&["Description", "WeightUnits"], Some(EnumAlign::Center)),
            derive_field_paragraph(&["Ratio"], Some(EnumAlign::Center)),
            derive_field_paragraph(&["Price"], Some(EnumAlign::Center)),
        ];
    }

    let n_width_inner = n_width_twips / 2;
    let mut table_ratio = derive_single_cell_table(
        vec![derive_field_paragraph(&["Ratio_or_THC_CBD"], Some(EnumAlign::Left))],
        n_width_inner,
        convert_inches_to_twips(0.6),
    );
    table_ratio.rows[0].height_exact = false;
    table_ratio.props.borders = Some(SpecTableBorders {
        top: Some(SpecBorder::nil()),
        left: Some(SpecBorder::nil()),
        bottom: Some(SpecBorder::nil()),
        right: Some(SpecBorder::nil()),
        inside_h: Some(SpecBorder::nil()),
        inside_v: Some(SpecBorder::nil()),
    });

    vec![
        derive_field_paragraph(&["DOH"], Some(EnumAlign::Right)),
        derive_field_paragraph(&["ProductBrand"], Some(EnumAlign::Center)),
        derive_field_paragraph(&["Description", "WeightUnits"], Some(EnumAlign::Center)),
        derive_field_paragraph(&["Price"], Some(EnumAlign::Center)),
        derive_field_paragraph(&["Lineage"], Some(EnumAlign::Center)),
        EnumBlock::Table(table_ratio),
        derive_field_paragraph(&["ProductStrain"], Some(EnumAlign::Center)),
    ]
}

fn derive_inventory_slot_blocks(n_label: usize) -> Vec<EnumBlock> {
    let field = |name: &str| format!("{{{{Label{n_label}.{name}}}}}");
    let paragraph = |c_caption: &str, c_field: &str| {
        let mut l_inlines = Vec::new();
        if !c_caption.is_empty() {
            l_inlines.push(EnumInline::Run(derive_label_run(c_caption)));
        }
        l_inlines.push(EnumInline::Run(SpecRun {
            props: SpecRunProps {
                font_name: Some(C_FONT_NAME_LABEL.to_string()),
                size_half_points: Some(20),
                ..SpecRunProps::default()
            },
            text: field(c_field),
        }));
        EnumBlock::Paragraph(SpecParagraph {
            props: SpecParagraphProps::default(),
            inlines: l_inlines,
        })
    };
    vec![
        paragraph("", "ProductName"),
        paragraph("Barcode: ", "Barcode"),
        paragraph("Accepted: ", "AcceptedDate"),
        paragraph("Qty: ", "QuantityReceived"),
        paragraph("Vendor: ", "Vendor"),
    ]
}

fn derive_inventory_table() -> SpecTable {
    let n_width = convert_inches_to_twips(2.5);
    let border = SpecBorder::single(4, "000000");
    SpecTable {
        props: SpecTableProps {
            width_twips: Some(n_width * N_SLOTS_INVENTORY as u32),
            align: Some(EnumAlign::Center),
            layout_fixed: true,
            borders: Some(SpecTableBorders {
                top: Some(border.clone()),
                left: Some(border.clone()),
                bottom: Some(border.clone()),
                right: Some(border.clone()),
                inside_h: Some(border.clone()),
                inside_v: Some(border),
            }),
            ..SpecTableProps::default()
        },
        grid_cols_twips: vec![n_width; N_SLOTS_INVENTORY],
        rows: vec![SpecTableRow {
            height_twips: Some(convert_inches_to_twips(6.0)),
            height_exact: true,
            extra: Vec::new(),
            cells: (1..=N_SLOTS_INVENTORY)
                .map(|n_label| SpecTableCell {
                    props: SpecTableCellProps {
                        width_twips: Some(n_width),
                        ..SpecTableCellProps::default()
                    },
                    blocks: derive_inventory_slot_blocks(n_label),
                })
                .collect(),
        }],
    }
}

/// Built-in prototype for `orientation`.
///
/// Label layouts hold a single `Label1` cell that the grid expander copies;
/// the inventory form already carries its four slots.
pub fn derive_prototype_document(orientation: EnumOrientation) -> SpecDocument {
    let table = match derive_grid_shape(orientation) {
        Some(shape) => {
            let n_width = convert_inches_to_twips(shape.width_cell_in);
            let n_height = convert_inches_to_twips(shape.height_cell_in);
            derive_single_cell_table(
                derive_label_cell_blocks(orientation, n_width),
                n_width,
                n_height,
            )
        }
        None => derive_inventory_table(),
    };
    SpecDocument {
        root_attrs: Vec::new(),
        blocks: vec![
            EnumBlock::Table(table),
            EnumBlock::Paragraph(SpecParagraph::default()),
        ],
        section: Some(derive_section(orientation)),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
