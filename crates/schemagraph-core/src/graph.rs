//! DiagramGraph: the root aggregate describing a whole schema diagram.
//!
//! Nodes and edges are stored in insertion order so a diagram round-trips
//! through JSON unchanged, but identity is by id: `add_node`/`add_edge` refuse
//! duplicates, and `add_edge` refuses endpoints that are not in the graph.
//! Removing a node removes every edge touching it, so the graph never holds a
//! dangling edge after a mutation made through these methods.
//!
//! Content arriving from outside (an editor save, a stored snapshot) is
//! deserialized directly and may violate these rules; [`DiagramGraph::check_integrity`]
//! reports the first violation.
//!
//! Every wire type carries a flattened `extra` map so keys written by other
//! tools survive a load/save cycle untouched.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::edge::GraphEdge;
use crate::engine::EngineKind;
use crate::error::CoreError;
use crate::id::{EdgeId, NodeId};
use crate::node::GraphNode;

/// Diagram-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_kind: Option<EngineKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    /// Keys the model does not interpret, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GraphMetadata {
    pub fn for_engine(engine_kind: EngineKind) -> Self {
        GraphMetadata {
            engine_kind: Some(engine_kind),
            schema_version: None,
            extra: Map::new(),
        }
    }
}

/// A schema diagram: tables/collections, their fields, and relationships.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiagramGraph {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    #[serde(default)]
    pub metadata: GraphMetadata,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DiagramGraph {
    /// Creates an empty graph with the given metadata.
    pub fn new(metadata: GraphMetadata) -> Self {
        DiagramGraph {
            nodes: Vec::new(),
            edges: Vec::new(),
            metadata,
            extra: Map::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|n| &n.id == id)
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| &e.id == id)
    }

    /// Finds the first node whose label equals `label`, ignoring ASCII case.
    pub fn node_by_label(&self, label: &str) -> Option<&GraphNode> {
        self.nodes
            .iter()
            .find(|n| n.label.eq_ignore_ascii_case(label))
    }

    /// Returns every edge with `node` as source or target.
    pub fn edges_touching<'a>(&'a self, node: &'a NodeId) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |e| e.touches(node))
    }

    /// Returns `true` if an edge already links `source` to `target` through
    /// the same source handle.
    pub fn has_edge_between(
        &self,
        source: &NodeId,
        target: &NodeId,
        source_handle: Option<&str>,
    ) -> bool {
        self.edges.iter().any(|e| {
            &e.source_node_id == source
                && &e.target_node_id == target
                && e.source_handle.as_deref() == source_handle
        })
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Adds a node. Fails if a node with the same id exists.
    pub fn add_node(&mut self, node: GraphNode) -> Result<(), CoreError> {
        if self.contains_node(&node.id) {
            return Err(CoreError::DuplicateNode { id: node.id });
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Adds an edge. Both endpoints must already be nodes of this graph.
    pub fn add_edge(&mut self, edge: GraphEdge) -> Result<(), CoreError> {
        if self.edge(&edge.id).is_some() {
            return Err(CoreError::DuplicateEdge { id: edge.id });
        }
        for endpoint in [&edge.source_node_id, &edge.target_node_id] {
            if !self.contains_node(endpoint) {
                return Err(CoreError::DanglingEdge {
                    edge: edge.id.clone(),
                    node: endpoint.clone(),
                });
            }
        }
        self.edges.push(edge);
        Ok(())
    }

    /// Removes a node and every edge touching it.
    ///
    /// Returns the removed node and the cascaded edges.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<(GraphNode, Vec<GraphEdge>), CoreError> {
        let pos = self
            .nodes
            .iter()
            .position(|n| &n.id == id)
            .ok_or_else(|| CoreError::NodeNotFound { id: id.clone() })?;
        let node = self.nodes.remove(pos);

        let (removed, kept): (Vec<GraphEdge>, Vec<GraphEdge>) =
            std::mem::take(&mut self.edges)
                .into_iter()
                .partition(|e| e.touches(id));
        self.edges = kept;

        Ok((node, removed))
    }

    pub fn remove_edge(&mut self, id: &EdgeId) -> Result<GraphEdge, CoreError> {
        let pos = self
            .edges
            .iter()
            .position(|e| &e.id == id)
            .ok_or_else(|| CoreError::EdgeNotFound { id: id.clone() })?;
        Ok(self.edges.remove(pos))
    }

    // -----------------------------------------------------------------------
    // Integrity
    // -----------------------------------------------------------------------

    /// Verifies id uniqueness (nodes, edges, fields per node) and that every
    /// edge references existing nodes.
    pub fn check_integrity(&self) -> Result<(), CoreError> {
        let mut node_ids: HashSet<&NodeId> = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !node_ids.insert(&node.id) {
                return Err(CoreError::DuplicateNode { id: node.id.clone() });
            }
            let mut field_ids = HashSet::with_capacity(node.fields.len());
            for field in &node.fields {
                if !field_ids.insert(&field.id) {
                    return Err(CoreError::DuplicateField {
                        node: node.id.clone(),
                        field: field.id.clone(),
                    });
                }
            }
        }

        let mut edge_ids: HashSet<&EdgeId> = HashSet::with_capacity(self.edges.len());
        for edge in &self.edges {
            if !edge_ids.insert(&edge.id) {
                return Err(CoreError::DuplicateEdge { id: edge.id.clone() });
            }
            for endpoint in [&edge.source_node_id, &edge.target_node_id] {
                if !node_ids.contains(endpoint) {
                    return Err(CoreError::DanglingEdge {
                        edge: edge.id.clone(),
                        node: endpoint.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Field, NodeKind};

    fn table(id: &str) -> GraphNode {
        GraphNode::new(id, NodeKind::RelationalTable, id)
            .with_field(Field::new(format!("{id}.id"), "id", "INTEGER").primary_key())
    }

    fn users_orders() -> DiagramGraph {
        let mut graph = DiagramGraph::new(GraphMetadata::for_engine(EngineKind::Postgresql));
        graph.add_node(table("users")).unwrap();
        graph.add_node(table("orders")).unwrap();
        graph.add_node(table("items")).unwrap();
        graph
            .add_edge(GraphEdge::new("e1", "orders", "users"))
            .unwrap();
        graph
            .add_edge(GraphEdge::new("e2", "items", "orders"))
            .unwrap();
        graph
    }

    #[test]
    fn test_add_node_rejects_duplicate() {
        let mut graph = users_orders();
        let err = graph.add_node(table("users")).unwrap_err();
        assert_eq!(err, CoreError::DuplicateNode { id: "users".into() });
    }

    #[test]
    fn test_add_edge_rejects_missing_endpoint() {
        let mut graph = users_orders();
        let err = graph
            .add_edge(GraphEdge::new("e3", "orders", "invoices"))
            .unwrap_err();
        assert!(matches!(err, CoreError::DanglingEdge { .. }));
        assert_eq!(graph.edges.len(), 2);
    }

    #[test]
    fn test_add_edge_rejects_duplicate_id() {
        let mut graph = users_orders();
        let err = graph
            .add_edge(GraphEdge::new("e1", "items", "users"))
            .unwrap_err();
        assert_eq!(err, CoreError::DuplicateEdge { id: "e1".into() });
    }

    #[test]
    fn test_remove_node_cascades_edges() {
        let mut graph = users_orders();
        let (node, removed) = graph.remove_node(&"orders".into()).unwrap();

        assert_eq!(node.label, "orders");
        assert_eq!(removed.len(), 2, "both edges touch orders");
        assert!(graph.edges.is_empty());
        assert!(graph.check_integrity().is_ok());
    }

    #[test]
    fn test_remove_node_keeps_unrelated_edges() {
        let mut graph = users_orders();
        graph.remove_node(&"items".into()).unwrap();
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].id, EdgeId::from("e1"));
    }

    #[test]
    fn test_remove_missing_node_fails() {
        let mut graph = users_orders();
        assert!(matches!(
            graph.remove_node(&"ghost".into()),
            Err(CoreError::NodeNotFound { .. })
        ));
    }

    #[test]
    fn test_check_integrity_detects_dangling_edge_from_raw_content() {
        let raw = serde_json::json!({
            "nodes": [{"id": "a", "kind": "relationalTable", "label": "a", "fields": []}],
            "edges": [{"id": "e", "sourceNodeId": "a", "targetNodeId": "b"}],
        });
        let graph: DiagramGraph = serde_json::from_value(raw).unwrap();
        assert_eq!(
            graph.check_integrity(),
            Err(CoreError::DanglingEdge {
                edge: "e".into(),
                node: "b".into()
            })
        );
    }

    #[test]
    fn test_check_integrity_detects_duplicate_field() {
        let node = GraphNode::new("a", NodeKind::RelationalTable, "a")
            .with_field(Field::new("f", "x", "TEXT"))
            .with_field(Field::new("f", "y", "TEXT"));
        let graph = DiagramGraph {
            nodes: vec![node],
            ..DiagramGraph::default()
        };
        assert!(matches!(
            graph.check_integrity(),
            Err(CoreError::DuplicateField { .. })
        ));
    }

    #[test]
    fn test_node_by_label_is_case_insensitive() {
        let graph = users_orders();
        assert_eq!(graph.node_by_label("USERS").map(|n| n.id.as_str()), Some("users"));
        assert!(graph.node_by_label("user").is_none());
    }

    #[test]
    fn test_unknown_graph_and_metadata_keys_round_trip() {
        let raw = serde_json::json!({
            "nodes": [],
            "edges": [],
            "metadata": {"engineKind": "sqlite", "notes": "hello"},
            "viewport": {"zoom": 1.5},
        });
        let graph: DiagramGraph = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(graph.metadata.engine_kind, Some(EngineKind::Sqlite));
        assert_eq!(graph.metadata.extra["notes"], "hello");
        assert_eq!(serde_json::to_value(&graph).unwrap(), raw);
    }

    #[test]
    fn test_missing_sections_deserialize_empty() {
        let graph: DiagramGraph = serde_json::from_str("{}").unwrap();
        assert!(graph.is_empty());
        assert_eq!(graph.metadata, GraphMetadata::default());
    }
}
