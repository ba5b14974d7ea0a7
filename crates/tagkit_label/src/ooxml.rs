//! WordprocessingML mapping between `word/document.xml` and the document tree.
//!
//! Property children are written in schema order; a typed field always
//! replaces an untyped child of the same name.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::document::{
    EnumAlign, EnumBlock, EnumInline, SpecBorder, SpecDocument, SpecInlineImage, SpecParagraph,
    SpecParagraphProps, SpecRun, SpecRunProps, SpecTable, SpecTableBorders, SpecTableCell,
    SpecTableCellProps, SpecTableProps, SpecTableRow,
};
use crate::spec::SpecImageAsset;
use crate::xml::{EnumXmlNode, XmlElement};

////////////////////////////////////////////////////////////////////////////////
// #region Namespaces

pub const C_NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub const C_NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const C_NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
pub const C_NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub const C_NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";

const TUP_ROOT_NAMESPACES: [(&str, &str); 3] = [
    ("xmlns:w", C_NS_W),
    ("xmlns:r", C_NS_R),
    ("xmlns:wp", C_NS_WP),
];

/// Add the namespace declarations the writer relies on, keeping existing ones.
pub fn ensure_root_namespaces(attrs: &mut Vec<(String, String)>) {
    for (key, value) in TUP_ROOT_NAMESPACES {
        if !attrs.iter().any(|(k, _)| k == key) {
            attrs.push((key.to_string(), value.to_string()));
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SchemaOrder

const TUP_ORDER_PPR: [&str; 36] = [
    "w:pStyle",
    "w:keepNext",
    "w:keepLines",
    "w:pageBreakBefore",
    "w:framePr",
    "w:widowControl",
    "w:numPr",
    "w:suppressLineNumbers",
    "w:pBdr",
    "w:shd",
    "w:tabs",
    "w:suppressAutoHyphens",
    "w:kinsoku",
    "w:wordWrap",
    "w:overflowPunct",
    "w:topLinePunct",
    "w:autoSpaceDE",
    "w:autoSpaceDN",
    "w:bidi",
    "w:adjustRightInd",
    "w:snapToGrid",
    "w:spacing",
    "w:ind",
    "w:contextualSpacing",
    "w:mirrorIndents",
    "w:suppressOverlap",
    "w:jc",
    "w:textDirection",
    "w:textAlignment",
    "w:textboxTightWrap",
    "w:outlineLvl",
    "w:divId",
    "w:cnfStyle",
    "w:rPr",
    "w:sectPr",
    "w:pPrChange",
];

const TUP_ORDER_RPR: [&str; 39] = [
    "w:rStyle",
    "w:rFonts",
    "w:b",
    "w:bCs",
    "w:i",
    "w:iCs",
    "w:caps",
    "w:smallCaps",
    "w:strike",
    "w:dstrike",
    "w:outline",
    "w:shadow",
    "w:emboss",
    "w:imprint",
    "w:noProof",
    "w:snapToGrid",
    "w:vanish",
    "w:webHidden",
    "w:color",
    "w:spacing",
    "w:w",
    "w:kern",
    "w:position",
    "w:sz",
    "w:szCs",
    "w:highlight",
    "w:u",
    "w:effect",
    "w:bdr",
    "w:shd",
    "w:fitText",
    "w:vertAlign",
    "w:rtl",
    "w:cs",
    "w:em",
    "w:lang",
    "w:eastAsianLayout",
    "w:specVanish",
    "w:oMath",
];

const TUP_ORDER_TBLPR: [&str; 17] = [
    "w:tblStyle",
    "w:tblpPr",
    "w:tblOverlap",
    "w:bidiVisual",
    "w:tblStyleRowBandSize",
    "w:tblStyleColBandSize",
    "w:tblW",
    "w:jc",
    "w:tblCellSpacing",
    "w:tblInd",
    "w:tblBorders",
    "w:shd",
    "w:tblLayout",
    "w:tblCellMar",
    "w:tblLook",
    "w:tblCaption",
    "w:tblDescription",
];

const TUP_ORDER_TCPR: [&str; 13] = [
    "w:cnfStyle",
    "w:tcW",
    "w:gridSpan",
    "w:hMerge",
    "w:vMerge",
    "w:tcBorders",
    "w:shd",
    "w:noWrap",
    "w:tcMar",
    "w:textDirection",
    "w:tcFitText",
    "w:vAlign",
    "w:hideMark",
];

const TUP_BORDER_SIDES: [&str; 6] = [
    "w:top",
    "w:left",
    "w:bottom",
    "w:right",
    "w:insideH",
    "w:insideV",
];

const TUP_MARGIN_SIDES: [&str; 4] = ["w:top", "w:left", "w:bottom", "w:right"];

/// Merge typed and untyped children, typed first on name clashes, then
/// stable-sort by the schema order (unknown names last).
fn assemble_props(name: &str, typed: Vec<XmlElement>, extra: &[XmlElement], order: &[&str]) -> XmlElement {
    let set_typed: BTreeSet<&str> = typed.iter().map(|el| el.name.as_str()).collect();
    let mut l_children: Vec<XmlElement> = extra
        .iter()
        .filter(|el| !set_typed.contains(el.name.as_str()))
        .cloned()
        .collect();
    l_children.extend(typed);
    l_children.sort_by_key(|el| {
        order
            .iter()
            .position(|known| *known == el.name)
            .unwrap_or(order.len())
    });
    XmlElement {
        name: name.to_string(),
        attrs: Vec::new(),
        children: l_children.into_iter().map(EnumXmlNode::Element).collect(),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Parse

fn parse_u32_attr(el: &XmlElement, key: &str) -> Option<u32> {
    el.attr(key)
        .and_then(|val| val.trim().parse::<f64>().ok())
        .filter(|val| val.is_finite() && *val >= 0.0)
        .map(|val| val.round() as u32)
}

fn parse_on_off(el: &XmlElement) -> bool {
    !matches!(el.attr("w:val"), Some("0" | "false" | "off"))
}

fn if_all_sides_zero(el: &XmlElement) -> bool {
    let l_sides: Vec<&XmlElement> = el.elements().collect();
    !l_sides.is_empty() && l_sides.iter().all(|side| side.attr("w:w") == Some("0"))
}

/// Build the document tree from the parsed `w:document` root.
pub fn parse_document(root: &XmlElement) -> Result<SpecDocument, String> {
    if root.name != "w:document" {
        return Err(format!("Expected <w:document> root, found <{}>.", root.name));
    }
    let body = root
        .child("w:body")
        .ok_or_else(|| "Document has no <w:body>.".to_string())?;

    let mut doc = SpecDocument {
        root_attrs: root.attrs.clone(),
        ..SpecDocument::default()
    };
    for el in body.elements() {
        match el.name.as_str() {
            "w:sectPr" => doc.section = Some(el.clone()),
            _ => doc.blocks.push(parse_block(el)),
        }
    }
    Ok(doc)
}

fn parse_block(el: &XmlElement) -> EnumBlock {
    match el.name.as_str() {
        "w:p" => parse_paragraph(el),
        "w:tbl" => EnumBlock::Table(parse_table(el)),
        _ => EnumBlock::Raw(el.clone()),
    }
}

fn if_page_break_run(inline: &EnumInline) -> bool {
    let EnumInline::Raw(el) = inline else {
        return false;
    };
    let l_content: Vec<&XmlElement> = el.elements().filter(|c| c.name != "w:rPr").collect();
    el.name == "w:r"
        && l_content.len() == 1
        && l_content[0].name == "w:br"
        && l_content[0].attr("w:type") == Some("page")
}

fn parse_paragraph(el: &XmlElement) -> EnumBlock {
    let mut paragraph = SpecParagraph::default();
    for child in el.elements() {
        match child.name.as_str() {
            "w:pPr" => paragraph.props = parse_paragraph_props(child),
            "w:r" => paragraph.inlines.push(parse_run(child)),
            _ => paragraph.inlines.push(EnumInline::Raw(child.clone())),
        }
    }
    if paragraph.inlines.len() == 1 && if_page_break_run(&paragraph.inlines[0]) {
        return EnumBlock::PageBreak;
    }
    EnumBlock::Paragraph(paragraph)
}

fn parse_paragraph_props(el: &XmlElement) -> SpecParagraphProps {
    let mut props = SpecParagraphProps::default();
    for child in el.elements() {
        match child.name.as_str() {
            "w:pStyle" => props.style = child.attr("w:val").map(str::to_string),
            "w:jc" => match child.attr("w:val").and_then(EnumAlign::parse) {
                Some(align) => props.align = Some(align),
                None => props.extra.push(child.clone()),
            },
            "w:spacing" => {
                for (key, value) in &child.attrs {
                    match key.as_str() {
                        "w:before" => props.space_before = parse_u32_attr(child, key),
                        "w:after" => props.space_after = parse_u32_attr(child, key),
                        _ => props.spacing_attrs_extra.push((key.clone(), value.clone())),
                    }
                }
            }
            _ => props.extra.push(child.clone()),
        }
    }
    props
}

fn parse_run(el: &XmlElement) -> EnumInline {
    let mut run = SpecRun::default();
    for child in el.elements() {
        match child.name.as_str() {
            "w:rPr" => run.props = parse_run_props(child),
            "w:t" => run.text.push_str(&child.text()),
            "w:tab" => run.text.push('\t'),
            "w:cr" => run.text.push('\n'),
            "w:br" if child.attr("w:type").is_none_or(|kind| kind == "textWrapping") => {
                run.text.push('\n')
            }
            "w:lastRenderedPageBreak" | "w:proofErr" => {}
            _ => return EnumInline::Raw(el.clone()),
        }
    }
    EnumInline::Run(run)
}

fn parse_run_props(el: &XmlElement) -> SpecRunProps {
    let mut props = SpecRunProps::default();
    for child in el.elements() {
        match child.name.as_str() {
            "w:rFonts" => match child.attr("w:ascii").or_else(|| child.attr("w:hAnsi")) {
                Some(font) => props.font_name = Some(font.to_string()),
                None => props.extra.push(child.clone()),
            },
            "w:b" => props.bold = Some(parse_on_off(child)),
            "w:sz" => props.size_half_points = parse_u32_attr(child, "w:val"),
            "w:color" => props.color = child.attr("w:val").map(str::to_string),
            "w:highlight" => props.highlight = child.attr("w:val").map(str::to_string),
            _ => props.extra.push(child.clone()),
        }
    }
    props
}

fn parse_border(el: &XmlElement) -> SpecBorder {
    SpecBorder {
        val: el.attr("w:val").unwrap_or("nil").to_string(),
        size: parse_u32_attr(el, "w:sz"),
        color: el.attr("w:color").map(str::to_string),
        space: parse_u32_attr(el, "w:space"),
    }
}

fn parse_table_props(el: &XmlElement) -> SpecTableProps {
    let mut props = SpecTableProps::default();
    for child in el.elements() {
        match child.name.as_str() {
            "w:tblStyle" => props.style = child.attr("w:val").map(str::to_string),
            "w:tblW" if child.attr("w:type") == Some("dxa") => {
                props.width_twips = parse_u32_attr(child, "w:w")
            }
            "w:jc" => match child.attr("w:val").and_then(EnumAlign::parse) {
                Some(align) => props.align = Some(align),
                None => props.extra.push(child.clone()),
            },
            "w:tblCellSpacing" => props.cell_spacing_twips = parse_u32_attr(child, "w:w"),
            "w:tblBorders" => {
                let mut borders = SpecTableBorders::default();
                for side in child.elements() {
                    let border = Some(parse_border(side));
                    match side.name.as_str() {
                        "w:top" => borders.top = border,
                        "w:left" | "w:start" => borders.left = border,
                        "w:bottom" => borders.bottom = border,
                        "w:right" | "w:end" => borders.right = border,
                        "w:insideH" => borders.inside_h = border,
                        "w:insideV" => borders.inside_v = border,
                        _ => {}
                    }
                }
                props.borders = Some(borders);
            }
            "w:shd" => props.shading = child.attr("w:fill").map(str::to_string),
            "w:tblLayout" => props.layout_fixed = child.attr("w:type") == Some("fixed"),
            "w:tblCellMar" if if_all_sides_zero(child) => props.cell_margins_zero = true,
            _ => props.extra.push(child.clone()),
        }
    }
    props
}

fn parse_table(el: &XmlElement) -> SpecTable {
    let mut table = SpecTable::default();
    for child in el.elements() {
        match child.name.as_str() {
            "w:tblPr" => table.props = parse_table_props(child),
            "w:tblGrid" => {
                table.grid_cols_twips = child
                    .elements()
                    .filter(|col| col.name == "w:gridCol")
                    .map(|col| parse_u32_attr(col, "w:w").unwrap_or(0))
                    .collect()
            }
            "w:tr" => table.rows.push(parse_row(child)),
            other => tracing::debug!("Dropping unsupported table child <{other}>."),
        }
    }
    table
}

fn parse_row(el: &XmlElement) -> SpecTableRow {
    let mut row = SpecTableRow::default();
    for child in el.elements() {
        match child.name.as_str() {
            "w:trPr" => {
                for prop in child.elements() {
                    if prop.name == "w:trHeight" {
                        row.height_twips = parse_u32_attr(prop, "w:val");
                        row.height_exact = prop.attr("w:hRule") == Some("exact");
                    } else {
                        row.extra.push(prop.clone());
                    }
                }
            }
            "w:tc" => row.cells.push(parse_cell(child)),
            other => tracing::debug!("Dropping unsupported row child <{other}>."),
        }
    }
    row
}

fn parse_cell(el: &XmlElement) -> SpecTableCell {
    let mut cell = SpecTableCell::default();
    for child in el.elements() {
        match child.name.as_str() {
            "w:tcPr" => {
                for prop in child.elements() {
                    match prop.name.as_str() {
                        "w:tcW" if prop.attr("w:type") == Some("dxa") => {
                            cell.props.width_twips = parse_u32_attr(prop, "w:w")
                        }
                        "w:shd" => cell.props.shading = prop.attr("w:fill").map(str::to_string),
                        "w:tcMar" if if_all_sides_zero(prop) => cell.props.margins_zero = true,
                        "w:vAlign" => cell.props.v_align = prop.attr("w:val").map(str::to_string),
                        _ => cell.props.extra.push(prop.clone()),
                    }
                }
            }
            _ => cell.blocks.push(parse_block(child)),
        }
    }
    cell
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Emit

/// One picture part collected while emitting the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecMediaEntry {
    /// Relationship id referenced by `a:blip/@r:embed`.
    pub rel_id: String,
    /// Target relative to `word/`, e.g. `media/tagkit_doh.png`.
    pub target: String,
    pub bytes: Arc<Vec<u8>>,
}

/// Collects picture parts and hands out drawing ids during emission.
#[derive(Debug, Clone, Default)]
pub struct SpecMediaRegistry {
    pub entries: Vec<SpecMediaEntry>,
    set_reserved_ids: BTreeSet<String>,
    n_doc_pr_last: u32,
}

impl SpecMediaRegistry {
    /// Registry that avoids relationship ids and drawing ids already in the package.
    pub fn with_reserved(set_reserved_ids: BTreeSet<String>, n_doc_pr_last: u32) -> Self {
        Self {
            entries: Vec::new(),
            set_reserved_ids,
            n_doc_pr_last,
        }
    }

    /// Relationship id for `asset`, registering it on first use.
    pub fn register(&mut self, asset: &SpecImageAsset) -> String {
        let c_target = format!("media/tagkit_{}", asset.name);
        if let Some(entry) = self.entries.iter().find(|entry| entry.target == c_target) {
            return entry.rel_id.clone();
        }
        let rel_id = (self.entries.len() + 1..)
            .map(|n_idx| format!("rIdTagImg{n_idx}"))
            .find(|rel_id| !self.set_reserved_ids.contains(rel_id))
            .unwrap_or_default();
        self.set_reserved_ids.insert(rel_id.clone());
        self.entries.push(SpecMediaEntry {
            rel_id: rel_id.clone(),
            target: c_target,
            bytes: Arc::clone(&asset.bytes),
        });
        rel_id
    }

    fn next_doc_pr_id(&mut self) -> u32 {
        self.n_doc_pr_last += 1;
        self.n_doc_pr_last
    }
}

fn el_val(name: &str, value: &str) -> XmlElement {
    XmlElement::new(name).with_attr("w:val", value)
}

fn el_width_dxa(name: &str, twips: u32) -> XmlElement {
    XmlElement::new(name)
        .with_attr("w:w", &twips.to_string())
        .with_attr("w:type", "dxa")
}

fn el_shading(fill: &str) -> XmlElement {
    XmlElement::new("w:shd")
        .with_attr("w:val", "clear")
        .with_attr("w:color", "auto")
        .with_attr("w:fill", fill)
}

fn el_zero_margins(name: &str) -> XmlElement {
    TUP_MARGIN_SIDES
        .iter()
        .fold(XmlElement::new(name), |el, side| {
            el.with_child(el_width_dxa(side, 0))
        })
}

/// Build the `w:document` root for `doc`, registering pictures in `registry`.
pub fn emit_document(doc: &SpecDocument, registry: &mut SpecMediaRegistry) -> XmlElement {
    let mut root_attrs = doc.root_attrs.clone();
    ensure_root_namespaces(&mut root_attrs);

    let mut body = XmlElement::new("w:body");
    for block in &doc.blocks {
        body.children
            .push(EnumXmlNode::Element(emit_block(block, registry)));
    }
    if let Some(section) = &doc.section {
        body.children.push(EnumXmlNode::Element(section.clone()));
    }

    XmlElement {
        name: "w:document".to_string(),
        attrs: root_attrs,
        children: vec![EnumXmlNode::Element(body)],
    }
}

fn emit_block(block: &EnumBlock, registry: &mut SpecMediaRegistry) -> XmlElement {
    match block {
        EnumBlock::Paragraph(paragraph) => emit_paragraph(paragraph, registry),
        EnumBlock::Table(table) => emit_table(table, registry),
        EnumBlock::PageBreak => XmlElement::new("w:p").with_child(
            XmlElement::new("w:r").with_child(XmlElement::new("w:br").with_attr("w:type", "page")),
        ),
        EnumBlock::Raw(el) => el.clone(),
    }
}

fn emit_paragraph(paragraph: &SpecParagraph, registry: &mut SpecMediaRegistry) -> XmlElement {
    let mut el = XmlElement::new("w:p");
    if paragraph.props != SpecParagraphProps::default() {
        el = el.with_child(emit_paragraph_props(&paragraph.props));
    }
    for inline in &paragraph.inlines {
        let child = match inline {
            EnumInline::Run(run) => emit_run(run),
            EnumInline::Image(image) => emit_image_run(image, registry),
            EnumInline::Raw(raw) => raw.clone(),
        };
        el = el.with_child(child);
    }
    el
}

fn emit_paragraph_props(props: &SpecParagraphProps) -> XmlElement {
    let mut l_typed = Vec::new();
    if let Some(style) = &props.style {
        l_typed.push(el_val("w:pStyle", style));
    }
    if props.space_before.is_some()
        || props.space_after.is_some()
        || !props.spacing_attrs_extra.is_empty()
    {
        let mut spacing = XmlElement::new("w:spacing");
        if let Some(before) = props.space_before {
            spacing.set_attr("w:before", &before.to_string());
        }
        if let Some(after) = props.space_after {
            spacing.set_attr("w:after", &after.to_string());
        }
        for (key, value) in &props.spacing_attrs_extra {
            spacing.set_attr(key, value);
        }
        l_typed.push(spacing);
    }
    if let Some(align) = props.align {
        l_typed.push(el_val("w:jc", align.as_str()));
    }
    assemble_props("w:pPr", l_typed, &props.extra, &TUP_ORDER_PPR)
}

fn emit_run_props(props: &SpecRunProps) -> Option<XmlElement> {
    if *props == SpecRunProps::default() {
        return None;
    }
    let mut l_typed = Vec::new();
    if let Some(font) = &props.font_name {
        l_typed.push(
            XmlElement::new("w:rFonts")
                .with_attr("w:ascii", font)
                .with_attr("w:hAnsi", font)
                .with_attr("w:eastAsia", font)
                .with_attr("w:cs", font),
        );
    }
    match props.bold {
        Some(true) => l_typed.push(XmlElement::new("w:b")),
        Some(false) => l_typed.push(el_val("w:b", "0")),
        None => {}
    }
    if let Some(color) = &props.color {
        l_typed.push(el_val("w:color", color));
    }
    if let Some(size) = props.size_half_points {
        l_typed.push(el_val("w:sz", &size.to_string()));
    }
    if let Some(highlight) = &props.highlight {
        l_typed.push(el_val("w:highlight", highlight));
    }
    Some(assemble_props("w:rPr", l_typed, &props.extra, &TUP_ORDER_RPR))
}

fn emit_text(el: &mut XmlElement, c_buf: &mut String) {
    if c_buf.is_empty() {
        return;
    }
    el.children.push(EnumXmlNode::Element(
        XmlElement::new("w:t")
            .with_attr("xml:space", "preserve")
            .with_text(c_buf),
    ));
    c_buf.clear();
}

fn emit_run(run: &SpecRun) -> XmlElement {
    let mut el = XmlElement::new("w:r");
    if let Some(props) = emit_run_props(&run.props) {
        el = el.with_child(props);
    }
    let mut c_buf = String::new();
    for chr in run.text.chars() {
        match chr {
            '\n' => {
                emit_text(&mut el, &mut c_buf);
                el = el.with_child(XmlElement::new("w:br"));
            }
            '\t' => {
                emit_text(&mut el, &mut c_buf);
                el = el.with_child(XmlElement::new("w:tab"));
            }
            _ => c_buf.push(chr),
        }
    }
    emit_text(&mut el, &mut c_buf);
    el
}

fn emit_image_run(image: &SpecInlineImage, registry: &mut SpecMediaRegistry) -> XmlElement {
    let rel_id = registry.register(&image.asset);
    let c_id = registry.next_doc_pr_id().to_string();
    let c_cx = image.width_emu.to_string();
    let c_cy = image.height_emu.to_string();

    let picture = XmlElement::new("pic:pic")
        .with_attr("xmlns:pic", C_NS_PIC)
        .with_child(
            XmlElement::new("pic:nvPicPr")
                .with_child(
                    XmlElement::new("pic:cNvPr")
                        .with_attr("id", "0")
                        .with_attr("name", &image.asset.name),
                )
                .with_child(XmlElement::new("pic:cNvPicPr")),
        )
        .with_child(
            XmlElement::new("pic:blipFill")
                .with_child(XmlElement::new("a:blip").with_attr("r:embed", &rel_id))
                .with_child(XmlElement::new("a:stretch").with_child(XmlElement::new("a:fillRect"))),
        )
        .with_child(
            XmlElement::new("pic:spPr")
                .with_child(
                    XmlElement::new("a:xfrm")
                        .with_child(XmlElement::new("a:off").with_attr("x", "0").with_attr("y", "0"))
                        .with_child(
                            XmlElement::new("a:ext")
                                .with_attr("cx", &c_cx)
                                .with_attr("cy", &c_cy),
                        ),
                )
                .with_child(
                    XmlElement::new("a:prstGeom")
                        .with_attr("prst", "rect")
                        .with_child(XmlElement::new("a:avLst")),
                ),
        );

    let inline = XmlElement::new("wp:inline")
        .with_attr("distT", "0")
        .with_attr("distB", "0")
        .with_attr("distL", "0")
        .with_attr("distR", "0")
        .with_child(
            XmlElement::new("wp:extent")
                .with_attr("cx", &c_cx)
                .with_attr("cy", &c_cy),
        )
        .with_child(
            XmlElement::new("wp:docPr")
                .with_attr("id", &c_id)
                .with_attr("name", &format!("Picture {c_id}")),
        )
        .with_child(
            XmlElement::new("wp:cNvGraphicFramePr").with_child(
                XmlElement::new("a:graphicFrameLocks")
                    .with_attr("xmlns:a", C_NS_A)
                    .with_attr("noChangeAspect", "1"),
            ),
        )
        .with_child(
            XmlElement::new("a:graphic")
                .with_attr("xmlns:a", C_NS_A)
                .with_child(
                    XmlElement::new("a:graphicData")
                        .with_attr("uri", C_NS_PIC)
                        .with_child(picture),
                ),
        );

    XmlElement::new("w:r").with_child(XmlElement::new("w:drawing").with_child(inline))
}

fn emit_border(name: &str, border: &SpecBorder) -> XmlElement {
    let mut el = el_val(name, &border.val);
    if let Some(size) = border.size {
        el.set_attr("w:sz", &size.to_string());
    }
    if let Some(space) = border.space {
        el.set_attr("w:space", &space.to_string());
    }
    if let Some(color) = &border.color {
        el.set_attr("w:color", color);
    }
    el
}

fn emit_table_props(props: &SpecTableProps) -> XmlElement {
    let mut l_typed = Vec::new();
    if let Some(style) = &props.style {
        l_typed.push(el_val("w:tblStyle", style));
    }
    if let Some(width) = props.width_twips {
        l_typed.push(el_width_dxa("w:tblW", width));
    }
    if let Some(align) = props.align {
        l_typed.push(el_val("w:jc", align.as_str()));
    }
    if let Some(spacing) = props.cell_spacing_twips {
        l_typed.push(el_width_dxa("w:tblCellSpacing", spacing));
    }
    if let Some(borders) = &props.borders {
        let l_sides = [
            &borders.top,
            &borders.left,
            &borders.bottom,
            &borders.right,
            &borders.inside_h,
            &borders.inside_v,
        ];
        let el = TUP_BORDER_SIDES
            .iter()
            .zip(l_sides)
            .filter_map(|(name, side)| side.as_ref().map(|border| emit_border(name, border)))
            .fold(XmlElement::new("w:tblBorders"), XmlElement::with_child);
        l_typed.push(el);
    }
    if let Some(fill) = &props.shading {
        l_typed.push(el_shading(fill));
    }
    if props.layout_fixed {
        l_typed.push(XmlElement::new("w:tblLayout").with_attr("w:type", "fixed"));
    }
    if props.cell_margins_zero {
        l_typed.push(el_zero_margins("w:tblCellMar"));
    }
    assemble_props("w:tblPr", l_typed, &props.extra, &TUP_ORDER_TBLPR)
}

fn emit_cell_props(props: &SpecTableCellProps) -> Option<XmlElement> {
    if *props == SpecTableCellProps::default() {
        return None;
    }
    let mut l_typed = Vec::new();
    if let Some(width) = props.width_twips {
        l_typed.push(el_width_dxa("w:tcW", width));
    }
    if let Some(fill) = &props.shading {
        l_typed.push(el_shading(fill));
    }
    if props.margins_zero {
        l_typed.push(el_zero_margins("w:tcMar"));
    }
    if let Some(v_align) = &props.v_align {
        l_typed.push(el_val("w:vAlign", v_align));
    }
    Some(assemble_props("w:tcPr", l_typed, &props.extra, &TUP_ORDER_TCPR))
}

fn emit_table(table: &SpecTable, registry: &mut SpecMediaRegistry) -> XmlElement {
    let mut el = XmlElement::new("w:tbl").with_child(emit_table_props(&table.props));

    let l_grid: Vec<u32> = if table.grid_cols_twips.is_empty() {
        vec![0; table.n_cols()]
    } else {
        table.grid_cols_twips.clone()
    };
    el = el.with_child(l_grid.iter().fold(XmlElement::new("w:tblGrid"), |grid, width| {
        grid.with_child(XmlElement::new("w:gridCol").with_attr("w:w", &width.to_string()))
    }));

    for row in &table.rows {
        let mut el_row = XmlElement::new("w:tr");
        if row.height_twips.is_some() || !row.extra.is_empty() {
            let mut el_props = XmlElement::new("w:trPr");
            for extra in &row.extra {
                el_props = el_props.with_child(extra.clone());
            }
            if let Some(height) = row.height_twips {
                let mut el_height = el_val("w:trHeight", &height.to_string());
                if row.height_exact {
                    el_height.set_attr("w:hRule", "exact");
                }
                el_props = el_props.with_child(el_height);
            }
            el_row = el_row.with_child(el_props);
        }
        for cell in &row.cells {
            let mut el_cell = XmlElement::new("w:tc");
            if let Some(props) = emit_cell_props(&cell.props) {
                el_cell = el_cell.with_child(props);
            }
            for block in &cell.blocks {
                el_cell = el_cell.with_child(emit_block(block, registry));
            }
            // A cell must end with a paragraph.
            if !matches!(cell.blocks.last(), Some(EnumBlock::Paragraph(_) | EnumBlock::PageBreak)) {
                el_cell = el_cell.with_child(XmlElement::new("w:p"));
            }
            el_row = el_row.with_child(el_cell);
        }
        el = el.with_child(el_row);
    }
    el
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::{parse_xml, write_xml};

    const C_DOC_XML: &str = concat!(
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
        r#"<w:body>"#,
        r#"<w:p><w:pPr><w:jc w:val="center"/><w:spacing w:after="200" w:line="276"/></w:pPr>"#,
        r#"<w:r><w:rPr><w:b/><w:sz w:val="24"/><w:i/></w:rPr><w:t>Hello</w:t><w:br/><w:t xml:space="preserve"> World</w:t></w:r></w:p>"#,
        r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#,
        r#"<w:tbl><w:tblPr><w:tblW w:w="5000" w:type="dxa"/><w:tblLayout w:type="fixed"/></w:tblPr>"#,
        r#"<w:tblGrid><w:gridCol w:w="5000"/></w:tblGrid>"#,
        r#"<w:tr><w:trPr><w:trHeight w:val="3600" w:hRule="exact"/></w:trPr>"#,
        r#"<w:tc><w:tcPr><w:tcW w:w="5000" w:type="dxa"/><w:gridSpan w:val="1"/></w:tcPr><w:p><w:r><w:t>{{Label1.Price}}</w:t></w:r></w:p></w:tc>"#,
        r#"</w:tr></w:tbl>"#,
        r#"<w:sectPr><w:pgSz w:w="15840" w:h="12240"/></w:sectPr>"#,
        r#"</w:body></w:document>"#
    );

    #[test]
    fn test_parse_document_structure() {
        let doc = parse_document(&parse_xml(C_DOC_XML.as_bytes()).expect("xml")).expect("doc");
        assert_eq!(doc.blocks.len(), 3);
        assert!(doc.section.is_some());

        let EnumBlock::Paragraph(paragraph) = &doc.blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(paragraph.props.align, Some(EnumAlign::Center));
        assert_eq!(paragraph.props.space_after, Some(200));
        assert_eq!(paragraph.text(), "Hello\n World");
        let EnumInline::Run(run) = &paragraph.inlines[0] else {
            panic!("expected run");
        };
        assert_eq!(run.props.bold, Some(true));
        assert_eq!(run.props.size_half_points, Some(24));
        assert_eq!(run.props.extra.len(), 1);

        assert_eq!(doc.blocks[1], EnumBlock::PageBreak);

        let table = doc.tables().next().expect("table");
        assert!(table.props.layout_fixed);
        assert_eq!(table.props.width_twips, Some(5000));
        assert_eq!(table.rows[0].height_twips, Some(3600));
        assert!(table.rows[0].height_exact);
        assert_eq!(table.rows[0].cells[0].props.width_twips, Some(5000));
        assert_eq!(table.rows[0].cells[0].text(), "{{Label1.Price}}");
    }

    #[test]
    fn test_emit_then_parse_is_stable() {
        let doc = parse_document(&parse_xml(C_DOC_XML.as_bytes()).expect("xml")).expect("doc");
        let mut registry = SpecMediaRegistry::default();
        let bytes = write_xml(&emit_document(&doc, &mut registry)).expect("write");
        let doc_again = parse_document(&parse_xml(&bytes).expect("xml")).expect("doc");
        assert_eq!(doc_again.blocks, doc.blocks);
        assert_eq!(doc_again.section, doc.section);
        assert!(registry.entries.is_empty());
    }

    #[test]
    fn test_props_follow_schema_order_and_typed_wins() {
        let props = SpecRunProps {
            font_name: Some("Arial".to_string()),
            size_half_points: Some(20),
            bold: Some(true),
            color: Some("FFFFFF".to_string()),
            highlight: None,
            extra: vec![el_val("w:color", "000000"), XmlElement::new("w:i")],
        };
        let el = emit_run_props(&props).expect("props");
        let l_names: Vec<&str> = el.elements().map(|child| child.name.as_str()).collect();
        assert_eq!(l_names, vec!["w:rFonts", "w:b", "w:i", "w:color", "w:sz"]);
        assert_eq!(el.child("w:color").and_then(|c| c.attr("w:val")), Some("FFFFFF"));
    }

    #[test]
    fn test_image_run_registers_media_once() {
        let asset = SpecImageAsset {
            name: "doh.png".to_string(),
            bytes: Arc::new(vec![1, 2, 3]),
            width_px: 10,
            height_px: 10,
        };
        let image = SpecInlineImage {
            asset,
            width_emu: 504_000,
            height_emu: 504_000,
        };
        let mut registry = SpecMediaRegistry::default();
        let el_first = emit_image_run(&image, &mut registry);
        let _ = emit_image_run(&image, &mut registry);
        assert_eq!(registry.entries.len(), 1);
        assert_eq!(registry.entries[0].rel_id, "rIdTagImg1");
        assert_eq!(registry.entries[0].target, "media/tagkit_doh.png");

        let mut c_embed = None;
        el_first.visit(&mut |node| {
            if node.name == "a:blip" {
                c_embed = node.attr("r:embed").map(str::to_string);
            }
        });
        assert_eq!(c_embed.as_deref(), Some("rIdTagImg1"));
    }

    #[test]
    fn test_cell_without_trailing_paragraph_gets_one() {
        let table = SpecTable {
            rows: vec![SpecTableRow {
                cells: vec![SpecTableCell::default()],
                ..SpecTableRow::default()
            }],
            ..SpecTable::default()
        };
        let el = emit_table(&table, &mut SpecMediaRegistry::default());
        let cell = el
            .child("w:tr")
            .and_then(|row| row.child("w:tc"))
            .expect("cell");
        assert!(cell.child("w:p").is_some());
        assert_eq!(
            el.child("w:tblGrid").map(|grid| grid.elements().count()),
            Some(1)
        );
    }
}
