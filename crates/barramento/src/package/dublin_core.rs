//! Descriptive metadata in the simple Dublin Core element set.

use crate::config::schema::{FixedMetadata, MetadataMapping};
use crate::error::PackageError;
use crate::repository::Item;

use super::xml::XmlOut;

pub const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";
pub const DCTERMS_NAMESPACE: &str = "http://purl.org/dc/terms/";

/// The fifteen core elements. Mapping targets outside this list must use
/// the `dcterms:` namespace.
pub const CORE_ELEMENTS: [&str; 15] = [
    "title",
    "description",
    "creator",
    "date",
    "type",
    "format",
    "identifier",
    "language",
    "publisher",
    "relation",
    "rights",
    "source",
    "subject",
    "coverage",
    "contributor",
];

/// Resolves a configured element name to its qualified form.
///
/// `creator` and `dc:creator` become `dc:creator`; `dcterms:spatial` is kept
/// as is. Anything else is unknown and yields `None`.
pub fn qualify_element(name: &str) -> Option<String> {
    let name = name.trim();
    if let Some(term) = name.strip_prefix("dcterms:") {
        let valid = !term.is_empty() && term.chars().all(|c| c.is_ascii_alphanumeric());
        return valid.then(|| name.to_string());
    }

    let local = name.strip_prefix("dc:").unwrap_or(name).to_ascii_lowercase();
    CORE_ELEMENTS
        .contains(&local.as_str())
        .then(|| format!("dc:{}", local))
}

/// One element of the descriptive record, with its qualified name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DcElement {
    pub name: String,
    pub value: String,
}

impl DcElement {
    fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

/// Builds the descriptive record of an item.
///
/// Fixed item fields come first, then mapped fields in mapping order (one
/// element per value), then the fixed metadata.
pub fn describe(
    item: &Item,
    mapping: &[MetadataMapping],
    fixed: &[FixedMetadata],
    identifier_prefix: &str,
) -> Vec<DcElement> {
    let mut elements = vec![DcElement::new("dc:title", item.title.trim())];

    if !item.description.trim().is_empty() {
        elements.push(DcElement::new("dc:description", item.description.trim()));
    }
    elements.push(DcElement::new(
        "dc:identifier",
        format!("{}:{}", identifier_prefix, item.id),
    ));
    if let Some(url) = item.url.as_deref().filter(|u| !u.is_empty()) {
        elements.push(DcElement::new("dc:relation", url));
    }
    if let Some(created) = item.creation_date.as_deref().filter(|d| !d.is_empty()) {
        elements.push(DcElement::new("dcterms:created", created));
    }
    if let Some(modified) = item.modification_date.as_deref().filter(|d| !d.is_empty()) {
        elements.push(DcElement::new("dcterms:modified", modified));
    }

    for m in mapping {
        let Some(name) = qualify_element(&m.element) else {
            continue;
        };
        for value in item.metadata_values(&m.field) {
            elements.push(DcElement::new(&name, value));
        }
    }

    for f in fixed {
        let Some(name) = qualify_element(&f.element) else {
            continue;
        };
        if !f.value.trim().is_empty() {
            elements.push(DcElement::new(&name, f.value.trim()));
        }
    }

    elements
}

/// Renders `dc.xml`.
pub fn render(elements: &[DcElement]) -> Result<String, PackageError> {
    let mut out = XmlOut::new("dc.xml");
    out.declaration()?;
    out.start(
        "metadata",
        &[("xmlns:dc", DC_NAMESPACE), ("xmlns:dcterms", DCTERMS_NAMESPACE)],
    )?;
    write_elements(&mut out, elements)?;
    out.end("metadata")?;
    Ok(out.finish())
}

pub(crate) fn write_elements(out: &mut XmlOut, elements: &[DcElement]) -> Result<(), PackageError> {
    for element in elements {
        out.text_element(&element.name, &[], &element.value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MetadataValue;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn item() -> Item {
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "12".to_string(),
            MetadataValue::new("Author", json!(["Machado de Assis", "José de Alencar"])),
        );
        metadata.insert("15".to_string(), MetadataValue::new("Place", json!("Rio de Janeiro")));
        metadata.insert("16".to_string(), MetadataValue::new("Empty", json!("")));
        Item {
            id: 42,
            title: "Dom Casmurro".to_string(),
            description: String::new(),
            collection_id: 7,
            document: None,
            attachments: Vec::new(),
            metadata,
            url: Some("https://acervo.example.org/item/42".to_string()),
            creation_date: Some("2024-03-01T10:00:00".to_string()),
            modification_date: None,
        }
    }

    fn mapping(field: &str, element: &str) -> MetadataMapping {
        MetadataMapping {
            field: field.to_string(),
            element: element.to_string(),
        }
    }

    #[test]
    fn test_qualify_element() {
        assert_eq!(qualify_element("creator").as_deref(), Some("dc:creator"));
        assert_eq!(qualify_element("dc:Subject").as_deref(), Some("dc:subject"));
        assert_eq!(
            qualify_element("dcterms:spatial").as_deref(),
            Some("dcterms:spatial")
        );
        assert_eq!(qualify_element("colour"), None);
        assert_eq!(qualify_element("dcterms:"), None);
        assert_eq!(qualify_element("dcterms:a b"), None);
    }

    #[test]
    fn test_describe_orders_elements() {
        let elements = describe(
            &item(),
            &[
                mapping("12", "creator"),
                mapping("15", "dcterms:spatial"),
                mapping("16", "subject"),
                mapping("99", "rights"),
            ],
            &[FixedMetadata {
                element: "publisher".to_string(),
                value: "Biblioteca Nacional".to_string(),
            }],
            "tainacan",
        );

        let names: Vec<&str> = elements.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "dc:title",
                "dc:identifier",
                "dc:relation",
                "dcterms:created",
                "dc:creator",
                "dc:creator",
                "dcterms:spatial",
                "dc:publisher",
            ]
        );
        assert_eq!(elements[1].value, "tainacan:42");
        assert_eq!(elements[5].value, "José de Alencar");
    }

    #[test]
    fn test_render_escapes_text() {
        let xml = render(&[DcElement::new("dc:title", "Maps & <Charts>")]).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(&format!("xmlns:dc=\"{}\"", DC_NAMESPACE)));
        assert!(xml.contains("<dc:title>Maps &amp; &lt;Charts&gt;</dc:title>"));
        assert!(xml.trim_end().ends_with("</metadata>"));
    }
}
