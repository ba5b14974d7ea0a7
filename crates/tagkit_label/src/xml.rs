//! Minimal owned XML tree over quick-xml events.
//!
//! Names are kept with their namespace prefix (`w:p`), attribute order is
//! preserved, and text nodes are stored unescaped.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// Element or text child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumXmlNode {
    Element(XmlElement),
    Text(String),
}

/// One XML element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    /// Qualified name, e.g. `w:tbl`.
    pub name: String,
    /// Attributes in document order.
    pub attrs: Vec<(String, String)>,
    /// Child nodes in document order.
    pub children: Vec<EnumXmlNode>,
}

impl XmlElement {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute.
    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder-style element child.
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(EnumXmlNode::Element(child));
        self
    }

    /// Builder-style text child.
    pub fn with_text(mut self, text: &str) -> Self {
        self.children.push(EnumXmlNode::Text(text.to_string()));
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Insert or replace an attribute, keeping its position when present.
    pub fn set_attr(&mut self, key: &str, value: &str) {
        match self.attrs.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attrs.push((key.to_string(), value.to_string())),
        }
    }

    /// Element children only.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            EnumXmlNode::Element(el) => Some(el),
            EnumXmlNode::Text(_) => None,
        })
    }

    /// First element child named `name`.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|el| el.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.children.iter_mut().find_map(|node| match node {
            EnumXmlNode::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }

    /// Concatenated text of this element's direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                EnumXmlNode::Text(text) => Some(text.as_str()),
                EnumXmlNode::Element(_) => None,
            })
            .collect()
    }

    /// Depth-first visit of this element and all descendants.
    pub fn visit<'a>(&'a self, f: &mut dyn FnMut(&'a XmlElement)) {
        f(self);
        for el in self.elements() {
            el.visit(f);
        }
    }
}

fn derive_start_element(e: &BytesStart) -> Result<XmlElement, String> {
    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
    let mut attrs = Vec::new();
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|err| format!("XML attribute error in <{name}>: {err}"))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| format!("XML attribute value error in <{name}>: {err}"))?
            .to_string();
        attrs.push((key, value));
    }
    Ok(XmlElement {
        name,
        attrs,
        children: Vec::new(),
    })
}

fn push_node(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), String> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(EnumXmlNode::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err("XML has more than one root element.".to_string()),
    }
}

/// Parse an XML document into its root element.
pub fn parse_xml(bytes: &[u8]) -> Result<XmlElement, String> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => stack.push(derive_start_element(&e)?),
            Ok(Event::Empty(e)) => {
                let element = derive_start_element(&e)?;
                push_node(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(e)) => {
                let completed = stack.pop().ok_or_else(|| {
                    format!(
                        "Unexpected closing tag </{}>.",
                        String::from_utf8_lossy(e.name().as_ref())
                    )
                })?;
                push_node(&mut stack, &mut root, completed)?;
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| format!("XML text unescape error: {err}"))?
                    .to_string();
                if let Some(current) = stack.last_mut() {
                    current.children.push(EnumXmlNode::Text(text));
                }
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).to_string();
                if let Some(current) = stack.last_mut() {
                    current.children.push(EnumXmlNode::Text(text));
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(format!(
                    "XML parse error at byte {}: {err}",
                    reader.buffer_position()
                ));
            }
            // Declarations, comments, processing instructions.
            Ok(_) => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err("XML ended before every element was closed.".to_string());
    }
    root.ok_or_else(|| "No root element found in XML.".to_string())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> Result<(), String> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|err| format!("Failed to write <{}>: {err}", element.name));
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|err| format!("Failed to write <{}>: {err}", element.name))?;
    for node in &element.children {
        match node {
            EnumXmlNode::Element(child) => write_element(writer, child)?,
            EnumXmlNode::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(|err| format!("Failed to write text in <{}>: {err}", element.name))?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(|err| format!("Failed to close <{}>: {err}", element.name))
}

/// Serialize `root` with a standalone UTF-8 declaration.
pub fn write_xml(root: &XmlElement) -> Result<Vec<u8>, String> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
        .map_err(|err| format!("Failed to write XML declaration: {err}"))?;
    write_element(&mut writer, root)?;
    Ok(writer.into_inner())
}
