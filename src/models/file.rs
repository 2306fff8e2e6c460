//! File-level response of `GET /files/:key`

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Node;

/// A Figma file as returned by the files endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FigmaFile {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Node>,
    /// Components keyed by node id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, Component>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FigmaFile {
    /// Top-level canvases of the document.
    pub fn pages(&self) -> &[Node] {
        self.document
            .as_ref()
            .map(|doc| doc.children.as_slice())
            .unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.document
            .as_ref()
            .map_or(0, |doc| 1 + doc.descendant_count())
    }
}

/// A published component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_set_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documentation_links: Vec<DocumentationLink>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentationLink {
    #[serde(alias = "url")]
    pub uri: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components_as_map() {
        let json = r#"{
            "name": "Test File",
            "lastModified": "2024-01-01T12:00:00.000Z",
            "version": "123456789",
            "components": {
                "123:456": {
                    "key": "component_key_1",
                    "name": "Button/Primary",
                    "description": "A primary button"
                },
                "789:012": {
                    "key": "component_key_2",
                    "name": "Button/Secondary",
                    "description": "A secondary button"
                }
            }
        }"#;

        let file: FigmaFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.name, "Test File");
        assert_eq!(file.components.len(), 2);

        let primary = &file.components["123:456"];
        assert_eq!(primary.key, "component_key_1");
        assert_eq!(primary.name, "Button/Primary");
        assert_eq!(primary.description.as_deref(), Some("A primary button"));
        assert_eq!(file.components["789:012"].name, "Button/Secondary");
    }

    #[test]
    fn test_documentation_links_array() {
        let json = r#"{
            "name": "Test File",
            "components": {
                "123:456": {
                    "key": "component_key_1",
                    "name": "Button/Primary",
                    "documentationLinks": [
                        {"url": "https://example.com/docs/button"},
                        {"uri": "https://example.com/docs/primary-button"}
                    ]
                }
            }
        }"#;

        let file: FigmaFile = serde_json::from_str(json).unwrap();
        let links = &file.components["123:456"].documentation_links;
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].uri, "https://example.com/docs/button");
    }

    #[test]
    fn test_unknown_fields_survive_reserialization() {
        let json = r#"{
            "name": "File",
            "schemaVersion": 14,
            "document": {
                "id": "0:0",
                "name": "Document",
                "type": "DOCUMENT",
                "children": [{
                    "id": "0:1",
                    "name": "Page 1",
                    "type": "CANVAS",
                    "backgroundColor": {"r": 1, "g": 1, "b": 1, "a": 1},
                    "children": [{
                        "id": "1:2",
                        "name": "Frame",
                        "type": "FRAME",
                        "absoluteBoundingBox": {"x": 0.0, "y": 0.0, "width": 320.0, "height": 480.0},
                        "fills": [{"type": "SOLID"}]
                    }]
                }]
            }
        }"#;

        let file: FigmaFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.extra["schemaVersion"], 14);
        assert_eq!(file.pages().len(), 1);
        assert_eq!(file.node_count(), 3);

        let page = &file.pages()[0];
        assert!(page.extra.contains_key("backgroundColor"));
        let frame = file.document.as_ref().unwrap().find("1:2").unwrap();
        assert_eq!(
            frame.absolute_bounding_box.as_ref().unwrap().width,
            Some(320.0)
        );

        let again: FigmaFile =
            serde_json::from_str(&serde_json::to_string(&file).unwrap()).unwrap();
        assert_eq!(again, file);
    }
}
