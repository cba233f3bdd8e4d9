//! Owned, typed view of an XML document.
//!
//! Only elements are kept. Tags are stored by local name so KML written
//! with or without the `http://www.opengis.net/kml/2.2` namespace looks the
//! same to the extractor.

use crate::error::FormatError;

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    /// Concatenated direct text content, untrimmed. `None` when empty.
    pub text: Option<String>,
}

impl Element {
    pub fn parse(source: &str) -> Result<Element, FormatError> {
        let doc = roxmltree::Document::parse(source)?;
        Ok(Element::from_node(doc.root_element()))
    }

    fn from_node(node: roxmltree::Node<'_, '_>) -> Element {
        let mut text = String::new();
        let mut children = Vec::new();
        for child in node.children() {
            if child.is_element() {
                children.push(Element::from_node(child));
            } else if child.is_text() {
                text.push_str(child.text().unwrap_or_default());
            }
        }

        Element {
            tag: node.tag_name().name().to_string(),
            attributes: node
                .attributes()
                .map(|a| (a.name().to_string(), a.value().to_string()))
                .collect(),
            children,
            text: if text.is_empty() { None } else { Some(text) },
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child with the given tag.
    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// Trimmed text, `None` if missing or blank.
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Every element below this one with the given tag, in document order.
    /// Does not include `self`.
    pub fn descendants<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        let mut stack: Vec<&Element> = self.children.iter().rev().collect();
        std::iter::from_fn(move || {
            while let Some(el) = stack.pop() {
                stack.extend(el.children.iter().rev());
                if el.tag == tag {
                    return Some(el);
                }
            }
            None
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <name>  Trip  </name>
    <Folder id="f1"><name>A</name><Folder><name>B</name></Folder></Folder>
    <Folder><name>C</name></Folder>
  </Document>
</kml>"#;

    #[test]
    fn strips_namespace_and_keeps_attributes() {
        let root = Element::parse(DOC).unwrap();
        assert_eq!(root.tag, "kml");
        let doc = root.child("Document").unwrap();
        assert_eq!(doc.child("name").and_then(Element::trimmed_text), Some("Trip"));
        let first = doc.child("Folder").unwrap();
        assert_eq!(first.attribute("id"), Some("f1"));
        assert_eq!(first.attribute("missing"), None);
    }

    #[test]
    fn descendants_are_in_document_order() {
        let root = Element::parse(DOC).unwrap();
        let names: Vec<_> = root
            .descendants("Folder")
            .filter_map(|f| f.child("name").and_then(Element::trimmed_text))
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn blank_text_is_none() {
        let root = Element::parse("<a><b>   </b><c/></a>").unwrap();
        assert_eq!(root.child("b").unwrap().trimmed_text(), None);
        assert_eq!(root.child("c").unwrap().text, None);
    }

    #[test]
    fn malformed_xml_is_a_markup_error() {
        assert!(matches!(
            Element::parse("<kml><Folder></kml>"),
            Err(FormatError::Markup(_))
        ));
    }
}
