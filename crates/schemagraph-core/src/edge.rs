//! Relationship edges between diagram nodes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::{EdgeId, NodeId};

/// A directed relationship from the referencing node to the referenced node.
///
/// Edges do not own their endpoints; [`DiagramGraph`](crate::graph::DiagramGraph)
/// removes them when either endpoint is removed. Handles name the fields the
/// edge is anchored to on each side, when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: EdgeId,
    pub source_node_id: NodeId,
    pub target_node_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GraphEdge {
    pub fn new(id: impl Into<EdgeId>, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        GraphEdge {
            id: id.into(),
            source_node_id: source.into(),
            target_node_id: target.into(),
            source_handle: None,
            target_handle: None,
            extra: Map::new(),
        }
    }

    pub fn with_handles(mut self, source: Option<String>, target: Option<String>) -> Self {
        self.source_handle = source;
        self.target_handle = target;
        self
    }

    /// Returns `true` if either endpoint is `node`.
    pub fn touches(&self, node: &NodeId) -> bool {
        &self.source_node_id == node || &self.target_node_id == node
    }
}
