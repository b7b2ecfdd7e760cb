//! Canonical in-memory model of a database schema diagram.
//!
//! A [`DiagramGraph`] holds one [`GraphNode`] per table or collection, the
//! [`Field`]s each one declares, and the [`GraphEdge`]s relating them. The
//! graph is pure data: persistence, fingerprinting and introspection live in
//! the sibling crates.

pub mod edge;
pub mod engine;
pub mod error;
pub mod export;
pub mod graph;
pub mod id;
pub mod node;

// Re-export commonly used types
pub use edge::GraphEdge;
pub use engine::{EngineFamily, EngineKind};
pub use error::CoreError;
pub use export::{ExportError, JsonExporter, ScriptExporter};
pub use graph::{DiagramGraph, GraphMetadata};
pub use id::{EdgeId, FieldId, NodeId};
pub use node::{Field, GraphNode, NodeKind, Position};
