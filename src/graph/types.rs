//! Network and position types matching the persisted interview model.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Stable node identifier (the persisted node's primary key)
pub type NodeId = String;

/// A position normalized to the canvas bounding box.
///
/// Both axes run from 0.0 (left/top) to 1.0 (right/bottom), so stored
/// positions stay valid when the canvas is resized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const CENTER: Position = Position { x: 0.5, y: 0.5 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Euclidean distance in normalized units
    pub fn distance(&self, other: Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Canvas size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasDimensions {
    pub width: f32,
    pub height: f32,
}

impl CanvasDimensions {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn from_rect(rect: egui::Rect) -> Self {
        Self::new(rect.width(), rect.height())
    }

    /// True once the canvas has been laid out with a positive, finite size
    pub fn is_measured(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// A node as the persisted network model stores it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedNode {
    #[serde(rename = "_uid")]
    pub id: NodeId,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

impl PersistedNode {
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            attributes: HashMap::new(),
        }
    }

    /// Builder-style helper that sets the layout attribute
    pub fn with_layout(mut self, attribute: &str, position: Position) -> Self {
        self.attributes
            .insert(attribute.to_string(), encode_layout(position));
        self
    }

    /// Decode the layout attribute.
    ///
    /// Returns `None` when the attribute is missing, not an `{x, y}` object,
    /// or holds non-finite numbers. Such nodes are "unplaced".
    pub fn layout_position(&self, attribute: &str) -> Option<Position> {
        let value = self.attributes.get(attribute)?;
        let position = Position::deserialize(value).ok()?;
        position.is_finite().then_some(position)
    }
}

/// Encode a position the way it is stored in the layout attribute
pub fn encode_layout(position: Position) -> Value {
    serde_json::json!({ "x": position.x, "y": position.y })
}

/// An edge between two persisted nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEdge {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl PersistedEdge {
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind: String::new(),
        }
    }
}

/// The persisted network: nodes plus edges
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkData {
    #[serde(default)]
    pub nodes: Vec<PersistedNode>,
    #[serde(default)]
    pub edges: Vec<PersistedEdge>,
}

impl NetworkData {
    pub fn node(&self, id: &str) -> Option<&PersistedNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut PersistedNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_position_decodes_object() {
        let node = PersistedNode::new("a").with_layout("layout", Position::new(0.25, 0.75));
        assert_eq!(node.layout_position("layout"), Some(Position::new(0.25, 0.75)));
    }

    #[test]
    fn malformed_layout_is_unplaced() {
        let mut node = PersistedNode::new("a");
        assert_eq!(node.layout_position("layout"), None);

        node.attributes
            .insert("layout".into(), serde_json::json!("somewhere"));
        assert_eq!(node.layout_position("layout"), None);

        node.attributes
            .insert("layout".into(), serde_json::json!({ "x": 0.3 }));
        assert_eq!(node.layout_position("layout"), None);
    }

    #[test]
    fn network_parses_interview_json() {
        let json = r#"{
            "nodes": [
                { "_uid": "n1", "attributes": { "layout": { "x": 0.1, "y": 0.2 } } },
                { "_uid": "n2" }
            ],
            "edges": [ { "from": "n1", "to": "n2", "type": "friend" } ]
        }"#;
        let network: NetworkData = serde_json::from_str(json).unwrap();
        assert_eq!(network.nodes.len(), 2);
        assert_eq!(network.edges[0].kind, "friend");
        assert_eq!(
            network.node("n1").and_then(|n| n.layout_position("layout")),
            Some(Position::new(0.1, 0.2))
        );
        assert!(network.node("n2").unwrap().attributes.is_empty());
    }

    #[test]
    fn unmeasured_dimensions() {
        assert!(!CanvasDimensions::new(0.0, 400.0).is_measured());
        assert!(!CanvasDimensions::new(f32::NAN, 400.0).is_measured());
        assert!(CanvasDimensions::new(800.0, 600.0).is_measured());
    }
}
