//! Core error types for schemagraph-core.
//!
//! Uses `thiserror` for structured, matchable variants covering every way a
//! graph mutation can violate the model's identity and reference rules.

use thiserror::Error;

use crate::id::{EdgeId, FieldId, NodeId};

/// Errors produced by [`DiagramGraph`](crate::graph::DiagramGraph) mutations
/// and integrity checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A node with this id is already part of the graph.
    #[error("duplicate node id: '{id}'")]
    DuplicateNode { id: NodeId },

    /// An edge with this id is already part of the graph.
    #[error("duplicate edge id: '{id}'")]
    DuplicateEdge { id: EdgeId },

    /// Two fields inside the same node share an id.
    #[error("duplicate field id '{field}' in node '{node}'")]
    DuplicateField { node: NodeId, field: FieldId },

    /// A node id was not found in the graph.
    #[error("node not found: '{id}'")]
    NodeNotFound { id: NodeId },

    /// An edge id was not found in the graph.
    #[error("edge not found: '{id}'")]
    EdgeNotFound { id: EdgeId },

    /// An edge references a node that does not exist.
    #[error("edge '{edge}' references missing node '{node}'")]
    DanglingEdge { edge: EdgeId, node: NodeId },
}
