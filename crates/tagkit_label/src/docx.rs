//! `.docx` package codec.
//!
//! Only `word/document.xml` is decoded into the document tree; every other
//! part is carried byte-for-byte. Pictures added by the renderer become
//! `word/media/*` parts with matching relationships and content types.

use std::collections::BTreeSet;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::document::{EnumBlock, EnumInline, SpecDocument, visit_block_paragraphs};
use crate::ooxml::{SpecMediaRegistry, emit_document, parse_document};
use crate::xml::{EnumXmlNode, XmlElement, parse_xml, write_xml};

pub const C_PART_DOCUMENT: &str = "word/document.xml";
pub const C_PART_CONTENT_TYPES: &str = "[Content_Types].xml";
pub const C_PART_DOCUMENT_RELS: &str = "word/_rels/document.xml.rels";
const C_PART_ROOT_RELS: &str = "_rels/.rels";
const C_PART_STYLES: &str = "word/styles.xml";

const C_REL_TYPE_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const C_NS_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

const C_XML_CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    r#"<Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>"#,
    r#"</Types>"#
);

const C_XML_ROOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    r#"</Relationships>"#
);

const C_XML_DOCUMENT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
    r#"</Relationships>"#
);

const C_XML_STYLES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    r#"<w:docDefaults><w:rPrDefault><w:rPr>"#,
    r#"<w:rFonts w:ascii="Arial" w:hAnsi="Arial" w:eastAsia="Arial" w:cs="Arial"/><w:sz w:val="20"/>"#,
    r#"</w:rPr></w:rPrDefault><w:pPrDefault><w:pPr>"#,
    r#"<w:spacing w:after="0" w:line="240" w:lineRule="auto"/>"#,
    r#"</w:pPr></w:pPrDefault></w:docDefaults>"#,
    r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>"#,
    r#"<w:style w:type="table" w:default="1" w:styleId="TableNormal"><w:name w:val="Normal Table"/>"#,
    r#"<w:tblPr><w:tblInd w:w="0" w:type="dxa"/><w:tblCellMar>"#,
    r#"<w:top w:w="0" w:type="dxa"/><w:left w:w="108" w:type="dxa"/>"#,
    r#"<w:bottom w:w="0" w:type="dxa"/><w:right w:w="108" w:type="dxa"/>"#,
    r#"</w:tblCellMar></w:tblPr></w:style>"#,
    r#"</w:styles>"#
);

/// A word-processing package: the decoded body plus every other part verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecDocxPackage {
    /// Decoded `word/document.xml`.
    pub document: SpecDocument,
    /// Other parts `(name, bytes)` in archive order.
    pub parts: Vec<(String, Vec<u8>)>,
}

impl SpecDocxPackage {
    /// Fresh package with the minimal part set around `document`.
    pub fn new_blank(document: SpecDocument) -> Self {
        Self {
            document,
            parts: vec![
                (C_PART_CONTENT_TYPES.to_string(), C_XML_CONTENT_TYPES.as_bytes().to_vec()),
                (C_PART_ROOT_RELS.to_string(), C_XML_ROOT_RELS.as_bytes().to_vec()),
                (C_PART_DOCUMENT_RELS.to_string(), C_XML_DOCUMENT_RELS.as_bytes().to_vec()),
                (C_PART_STYLES.to_string(), C_XML_STYLES.as_bytes().to_vec()),
            ],
        }
    }

    /// Same package parts around a different body.
    pub fn with_document(&self, document: SpecDocument) -> Self {
        Self {
            document,
            parts: self.parts.clone(),
        }
    }

    /// Bytes of a non-document part.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(part_name, _)| part_name == name)
            .map(|(_, bytes)| bytes.as_slice())
    }

    fn set_part(&mut self, name: &str, bytes: Vec<u8>) {
        match self.parts.iter_mut().find(|(part_name, _)| part_name == name) {
            Some((_, slot)) => *slot = bytes,
            None => self.parts.push((name.to_string(), bytes)),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region Load

/// Decode a `.docx` held in memory.
pub fn load_docx_bytes(bytes: &[u8]) -> Result<SpecDocxPackage, String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|err| format!("Not a .docx package: {err}"))?;

    let mut c_document: Option<Vec<u8>> = None;
    let mut parts = Vec::new();
    for idx in 0..archive.len() {
        let mut file = archive
            .by_index(idx)
            .map_err(|err| format!("Failed to read package entry #{idx}: {err}"))?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .map_err(|err| format!("Failed to read package part {name}: {err}"))?;
        if name == C_PART_DOCUMENT {
            c_document = Some(buf);
        } else {
            parts.push((name, buf));
        }
    }

    let c_document = c_document.ok_or_else(|| format!("Package has no {C_PART_DOCUMENT}."))?;
    let root = parse_xml(&c_document).map_err(|err| format!("{C_PART_DOCUMENT}: {err}"))?;
    let document = parse_document(&root)?;
    tracing::debug!(
        "Loaded .docx package: {} parts, {} body blocks.",
        parts.len() + 1,
        document.blocks.len()
    );
    Ok(SpecDocxPackage { document, parts })
}

/// Decode a `.docx` file.
pub fn load_docx(path: &Path) -> Result<SpecDocxPackage, String> {
    let bytes = std::fs::read(path)
        .map_err(|err| format!("Failed to read template {}: {err}", path.display()))?;
    load_docx_bytes(&bytes).map_err(|err| format!("{}: {err}", path.display()))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Save

fn collect_relationship_ids(rels: &XmlElement) -> BTreeSet<String> {
    rels.elements()
        .filter_map(|el| el.attr("Id").map(str::to_string))
        .collect()
}

fn calculate_max_doc_pr_id(document: &SpecDocument) -> u32 {
    let mut n_max = 0u32;
    let mut scan = |el: &XmlElement| {
        el.visit(&mut |node| {
            if node.name == "wp:docPr"
                && let Some(n_id) = node.attr("id").and_then(|val| val.parse::<u32>().ok())
            {
                n_max = n_max.max(n_id);
            }
        })
    };
    for block in &document.blocks {
        if let EnumBlock::Raw(el) = block {
            scan(el);
        }
    }
    visit_block_paragraphs(&document.blocks, &mut |paragraph| {
        for inline in &paragraph.inlines {
            if let EnumInline::Raw(el) = inline {
                scan(el);
            }
        }
    });
    n_max
}

fn append_image_relationships(rels: &mut XmlElement, registry: &SpecMediaRegistry) {
    for entry in &registry.entries {
        rels.children.push(EnumXmlNode::Element(
            XmlElement::new("Relationship")
                .with_attr("Id", &entry.rel_id)
                .with_attr("Type", C_REL_TYPE_IMAGE)
                .with_attr("Target", &entry.target),
        ));
    }
}

fn ensure_png_content_type(types: &mut XmlElement) {
    let if_has_png = types.elements().any(|el| {
        el.name == "Default"
            && el
                .attr("Extension")
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
    });
    if !if_has_png {
        types.children.push(EnumXmlNode::Element(
            XmlElement::new("Default")
                .with_attr("Extension", "png")
                .with_attr("ContentType", "image/png"),
        ));
    }
}

/// Encode the package to `.docx` bytes.
pub fn save_docx_bytes(package: &SpecDocxPackage) -> Result<Vec<u8>, String> {
    let mut package = package.clone();

    let mut rels = match package.part(C_PART_DOCUMENT_RELS) {
        Some(bytes) => parse_xml(bytes).map_err(|err| format!("{C_PART_DOCUMENT_RELS}: {err}"))?,
        None => XmlElement::new("Relationships").with_attr("xmlns", C_NS_RELATIONSHIPS),
    };
    let mut registry = SpecMediaRegistry::with_reserved(
        collect_relationship_ids(&rels),
        calculate_max_doc_pr_id(&package.document),
    );
    let root = emit_document(&package.document, &mut registry);
    let c_document = write_xml(&root)?;

    if !registry.entries.is_empty() {
        append_image_relationships(&mut rels, &registry);
        package.set_part(C_PART_DOCUMENT_RELS, write_xml(&rels)?);

        let mut types = match package.part(C_PART_CONTENT_TYPES) {
            Some(bytes) => {
                parse_xml(bytes).map_err(|err| format!("{C_PART_CONTENT_TYPES}: {err}"))?
            }
            None => parse_xml(C_XML_CONTENT_TYPES.as_bytes())?,
        };
        ensure_png_content_type(&mut types);
        package.set_part(C_PART_CONTENT_TYPES, write_xml(&types)?);

        for entry in &registry.entries {
            package.set_part(&format!("word/{}", entry.target), entry.bytes.as_ref().clone());
        }
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut write_part = |name: &str, bytes: &[u8]| -> Result<(), String> {
        zip.start_file(name, options)
            .map_err(|err| format!("Failed to add {name} to package: {err}"))?;
        zip.write_all(bytes)
            .map_err(|err| format!("Failed to write {name}: {err}"))
    };

    if let Some(bytes) = package.part(C_PART_CONTENT_TYPES) {
        write_part(C_PART_CONTENT_TYPES, bytes)?;
    }
    write_part(C_PART_DOCUMENT, &c_document)?;
    for (name, bytes) in &package.parts {
        if name != C_PART_CONTENT_TYPES {
            write_part(name, bytes)?;
        }
    }

    let cursor = zip
        .finish()
        .map_err(|err| format!("Failed to finish package: {err}"))?;
    Ok(cursor.into_inner())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::document::{EnumBlock, SpecInlineImage, SpecParagraph};
    use crate::spec::SpecImageAsset;

    fn build_image(name: &str) -> SpecInlineImage {
        SpecInlineImage {
            asset: SpecImageAsset {
                name: name.to_string(),
                bytes: Arc::new(vec![0x89, b'P', b'N', b'G']),
                width_px: 4,
                height_px: 4,
            },
            width_emu: 100,
            height_emu: 100,
        }
    }

    #[test]
    fn test_blank_package_roundtrip() {
        let document = SpecDocument {
            blocks: vec![EnumBlock::Paragraph(SpecParagraph::from_text("Hello"))],
            ..SpecDocument::default()
        };
        let package = SpecDocxPackage::new_blank(document);
        let bytes = save_docx_bytes(&package).expect("save");
        let loaded = load_docx_bytes(&bytes).expect("load");

        assert_eq!(loaded.document.blocks, package.document.blocks);
        assert!(loaded.part(C_PART_STYLES).is_some());
        assert!(loaded.part(C_PART_ROOT_RELS).is_some());
        assert_eq!(loaded.parts.len(), package.parts.len());
    }

    #[test]
    fn test_images_add_media_rels_and_content_type() {
        let mut paragraph = SpecParagraph::default();
        paragraph
            .inlines
            .push(EnumInline::Image(build_image("doh.png")));
        paragraph
            .inlines
            .push(EnumInline::Image(build_image("doh.png")));
        let document = SpecDocument {
            blocks: vec![EnumBlock::Paragraph(paragraph)],
            ..SpecDocument::default()
        };
        let bytes = save_docx_bytes(&SpecDocxPackage::new_blank(document)).expect("save");
        let loaded = load_docx_bytes(&bytes).expect("load");

        assert!(loaded.part("word/media/tagkit_doh.png").is_some());
        let c_rels = String::from_utf8(loaded.part(C_PART_DOCUMENT_RELS).expect("rels").to_vec())
            .expect("utf8");
        assert_eq!(c_rels.matches("media/tagkit_doh.png").count(), 1);
        let c_types = String::from_utf8(loaded.part(C_PART_CONTENT_TYPES).expect("types").to_vec())
            .expect("utf8");
        assert!(c_types.contains(r#"Extension="png""#));

        // Drawings come back as raw inlines and keep their ids on a second save.
        let again = load_docx_bytes(&save_docx_bytes(&loaded).expect("save")).expect("load");
        assert_eq!(again.document.blocks, loaded.document.blocks);
    }

    #[test]
    fn test_load_rejects_non_package() {
        assert!(load_docx_bytes(b"not a zip").is_err());
    }
}
