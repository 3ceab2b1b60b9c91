//! Owned XML document with namespace-qualified lookup helpers.

use std::collections::HashMap;

use crate::XmlError;

/// An owned, validated XML document.
///
/// The text is parsed once for validation at construction time; call
/// [`XmlDocument::tree`] to obtain a temporary [`roxmltree::Document`]
/// borrowing the stored text, and pass that reference down through a
/// processing pipeline rather than re-parsing per step.
pub struct XmlDocument {
    text: String,
}

impl XmlDocument {
    /// Parses and validates XML from a string, taking ownership.
    pub fn parse(text: String) -> Result<Self, XmlError> {
        let _ = roxmltree::Document::parse(&text).map_err(|e| XmlError::Parse(e.to_string()))?;
        Ok(Self { text })
    }

    /// Parses and validates XML from bytes.
    pub fn parse_bytes(data: &[u8]) -> Result<Self, XmlError> {
        let text = std::str::from_utf8(data)
            .map_err(|e| XmlError::Utf8(e.to_string()))?
            .to_owned();
        Self::parse(text)
    }

    /// Returns the raw XML text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parses the stored text into a temporary document tree.
    pub fn tree(&self) -> Result<roxmltree::Document<'_>, XmlError> {
        roxmltree::Document::parse(&self.text).map_err(|e| XmlError::Parse(e.to_string()))
    }

    /// Builds an ID → node mapping over the given attribute names.
    ///
    /// SAML documents identify signed elements via `ID` attributes; the
    /// default registration also accepts the `Id`/`id` spellings seen in
    /// the wild.
    #[must_use]
    pub fn build_id_map<'a>(
        doc: &'a roxmltree::Document<'a>,
        attr_names: &[&str],
    ) -> HashMap<String, roxmltree::NodeId> {
        let mut map = HashMap::new();
        for node in doc.descendants() {
            if node.is_element() {
                for attr_name in attr_names {
                    if let Some(val) = node.attribute(*attr_name) {
                        map.insert(val.to_owned(), node.id());
                    }
                }
            }
        }
        map
    }

    /// Resolves a registered ID to its element node.
    #[must_use]
    pub fn find_by_id<'a>(
        doc: &'a roxmltree::Document<'a>,
        id_map: &HashMap<String, roxmltree::NodeId>,
        id: &str,
    ) -> Option<roxmltree::Node<'a, 'a>> {
        let node_id = id_map.get(id)?;
        doc.get_node(*node_id)
    }
}

/// Finds all descendant elements with the given namespace and local name,
/// in document order.
#[must_use]
pub fn find_elements<'a>(
    doc: &'a roxmltree::Document<'a>,
    ns_uri: &str,
    local_name: &str,
) -> Vec<roxmltree::Node<'a, 'a>> {
    doc.descendants()
        .filter(|n| {
            n.is_element()
                && n.tag_name().name() == local_name
                && n.tag_name().namespace().unwrap_or("") == ns_uri
        })
        .collect()
}

/// Finds the first direct child element with the given namespace and local
/// name.
#[must_use]
pub fn find_child_element<'a>(
    parent: roxmltree::Node<'a, 'a>,
    ns_uri: &str,
    local_name: &str,
) -> Option<roxmltree::Node<'a, 'a>> {
    parent.children().find(|n| {
        n.is_element()
            && n.tag_name().name() == local_name
            && n.tag_name().namespace().unwrap_or("") == ns_uri
    })
}

/// Finds all direct child elements with the given namespace and local name.
#[must_use]
pub fn find_child_elements<'a>(
    parent: roxmltree::Node<'a, 'a>,
    ns_uri: &str,
    local_name: &str,
) -> Vec<roxmltree::Node<'a, 'a>> {
    parent
        .children()
        .filter(|n| {
            n.is_element()
                && n.tag_name().name() == local_name
                && n.tag_name().namespace().unwrap_or("") == ns_uri
        })
        .collect()
}

/// Reads an attribute from the first descendant element with the given
/// namespace and local name, searching the parent's subtree.
#[must_use]
pub fn child_attribute(
    parent: roxmltree::Node<'_, '_>,
    ns_uri: &str,
    local_name: &str,
    attribute: &str,
) -> Option<String> {
    parent
        .descendants()
        .find(|n| {
            n.is_element()
                && n.tag_name().name() == local_name
                && n.tag_name().namespace().unwrap_or("") == ns_uri
        })
        .and_then(|n| n.attribute(attribute))
        .map(str::to_owned)
}

/// Reads the text content of the first descendant element with the given
/// namespace and local name, searching the parent's subtree.
#[must_use]
pub fn child_text(parent: roxmltree::Node<'_, '_>, ns_uri: &str, local_name: &str) -> Option<String> {
    parent
        .descendants()
        .find(|n| {
            n.is_element()
                && n.tag_name().name() == local_name
                && n.tag_name().namespace().unwrap_or("") == ns_uri
        })
        .and_then(|n| n.text())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";

    const SAMPLE: &str = r#"<Root xmlns:ds="http://www.w3.org/2000/09/xmldsig#" ID="_root">
<Child ID="_c1"><ds:Signature><ds:SignatureValue>abc</ds:SignatureValue></ds:Signature></Child>
<Child ID="_c2"/>
</Root>"#;

    #[test]
    fn parse_rejects_malformed() {
        assert!(XmlDocument::parse("<broken".to_string()).is_err());
        assert!(XmlDocument::parse_bytes(&[0xff, 0xfe, 0x00]).is_err());
    }

    #[test]
    fn id_map_lookup() {
        let doc = XmlDocument::parse(SAMPLE.to_string()).unwrap();
        let tree = doc.tree().unwrap();
        let ids = XmlDocument::build_id_map(&tree, &["ID", "Id", "id"]);

        let node = XmlDocument::find_by_id(&tree, &ids, "_c2").unwrap();
        assert_eq!(node.tag_name().name(), "Child");
        assert!(XmlDocument::find_by_id(&tree, &ids, "_missing").is_none());
    }

    #[test]
    fn namespace_qualified_search() {
        let doc = XmlDocument::parse(SAMPLE.to_string()).unwrap();
        let tree = doc.tree().unwrap();

        let sigs = find_elements(&tree, DSIG, "Signature");
        assert_eq!(sigs.len(), 1);

        // Child search is namespace-aware: Signature is not in the empty ns.
        assert!(find_child_element(tree.root_element(), DSIG, "Signature").is_none());
        let child = find_child_element(tree.root_element(), "", "Child").unwrap();
        assert!(find_child_element(child, DSIG, "Signature").is_some());
    }

    #[test]
    fn subtree_field_reads() {
        let doc = XmlDocument::parse(SAMPLE.to_string()).unwrap();
        let tree = doc.tree().unwrap();
        let sig = find_elements(&tree, DSIG, "Signature")[0];

        assert_eq!(child_text(sig, DSIG, "SignatureValue").as_deref(), Some("abc"));
        assert_eq!(child_text(sig, DSIG, "DigestValue"), None);
    }
}
