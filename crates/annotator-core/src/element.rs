//! Placed elements: the annotations a user puts on top of a page

use crate::coords::PageRect;
use serde::{Deserialize, Serialize};

pub type ElementId = u64;

/// Reference to a catalog asset drawn by stamp and signature elements
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetRef {
    pub asset_id: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Stamp,
    Signature,
    Text,
    Highlight,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ElementKind {
    Stamp {
        asset: AssetRef,
    },
    Signature {
        asset: AssetRef,
    },
    Text {
        text: String,
        font_size: f64,
        color: String,
    },
    Highlight {
        color: String,
    },
}

impl ElementKind {
    pub fn element_type(&self) -> ElementType {
        match self {
            ElementKind::Stamp { .. } => ElementType::Stamp,
            ElementKind::Signature { .. } => ElementType::Signature,
            ElementKind::Text { .. } => ElementType::Text,
            ElementKind::Highlight { .. } => ElementType::Highlight,
        }
    }

    pub fn asset(&self) -> Option<&AssetRef> {
        match self {
            ElementKind::Stamp { asset } | ElementKind::Signature { asset } => Some(asset),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlacedElement {
    pub id: ElementId,
    /// 1-based page number
    pub page: u32,
    pub rect: PageRect,
    #[serde(flatten)]
    pub kind: ElementKind,
}

impl PlacedElement {
    pub fn element_type(&self) -> ElementType {
        self.kind.element_type()
    }

    pub fn is_highlight(&self) -> bool {
        matches!(self.kind, ElementKind::Highlight { .. })
    }
}

/// Partial update applied by `AnnotationStore::update`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementPatch {
    pub rect: Option<PageRect>,
    pub text: Option<String>,
    pub font_size: Option<f64>,
    pub color: Option<String>,
}

impl ElementPatch {
    pub fn rect(rect: PageRect) -> Self {
        Self {
            rect: Some(rect),
            ..Self::default()
        }
    }

    /// Apply to `element`. Text fields only touch text elements and `color`
    /// also recolors highlights.
    pub(crate) fn apply_to(&self, element: &mut PlacedElement) {
        if let Some(rect) = self.rect {
            element.rect = rect;
        }
        match &mut element.kind {
            ElementKind::Text {
                text,
                font_size,
                color,
            } => {
                if let Some(new_text) = &self.text {
                    *text = new_text.clone();
                }
                if let Some(size) = self.font_size {
                    *font_size = size;
                }
                if let Some(new_color) = &self.color {
                    *color = new_color.clone();
                }
            }
            ElementKind::Highlight { color } => {
                if let Some(new_color) = &self.color {
                    *color = new_color.clone();
                }
            }
            ElementKind::Stamp { .. } | ElementKind::Signature { .. } => {}
        }
    }
}

pub fn elements_to_json(elements: &[PlacedElement]) -> Result<String, serde_json::Error> {
    serde_json::to_string(elements)
}

pub fn elements_from_json(json: &str) -> Result<Vec<PlacedElement>, serde_json::Error> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_element() -> PlacedElement {
        PlacedElement {
            id: 7,
            page: 1,
            rect: PageRect::new(10.0, 20.0, 200.0, 40.0),
            kind: ElementKind::Text {
                text: "Approved".to_string(),
                font_size: 14.0,
                color: "#000000".to_string(),
            },
        }
    }

    #[test]
    fn test_json_is_tagged_by_type() {
        let json = elements_to_json(&[text_element()]).unwrap();
        assert!(json.contains(r#""type":"text""#));
        assert!(json.contains(r#""font_size":14.0"#));
    }

    #[test]
    fn test_json_deserializes_stamp() {
        let json = r##"[{"id":3,"page":2,"rect":{"x":1.0,"y":2.0,"width":100.0,"height":100.0},
            "type":"stamp","asset":{"asset_id":"paid","image_url":"https://cdn.example/paid.png"}}]"##;
        let elements = elements_from_json(json).unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].element_type(), ElementType::Stamp);
        assert_eq!(elements[0].kind.asset().unwrap().asset_id, "paid");
    }

    #[test]
    fn test_patch_updates_text_fields() {
        let mut el = text_element();
        ElementPatch {
            text: Some("Rejected".to_string()),
            font_size: Some(18.0),
            ..ElementPatch::default()
        }
        .apply_to(&mut el);
        match &el.kind {
            ElementKind::Text {
                text, font_size, ..
            } => {
                assert_eq!(text, "Rejected");
                assert_eq!(*font_size, 18.0);
            }
            other => panic!("Expected text element, got {:?}", other),
        }
    }

    #[test]
    fn test_patch_ignores_text_on_highlight() {
        let mut el = PlacedElement {
            id: 1,
            page: 1,
            rect: PageRect::new(0.0, 0.0, 50.0, 14.0),
            kind: ElementKind::Highlight {
                color: "#FFEB3B".to_string(),
            },
        };
        ElementPatch {
            text: Some("ignored".to_string()),
            color: Some("#00FF00".to_string()),
            ..ElementPatch::default()
        }
        .apply_to(&mut el);
        assert_eq!(
            el.kind,
            ElementKind::Highlight {
                color: "#00FF00".to_string()
            }
        );
    }
}
