//! Identifier newtypes for diagram entities.
//!
//! Diagram ids are opaque strings chosen by whoever authored the diagram (the
//! editor, or the introspection engine). Each kind gets its own newtype so a
//! `NodeId` cannot be passed where an `EdgeId` is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a [`GraphNode`](crate::node::GraphNode), unique within a graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

/// Identifier of a [`GraphEdge`](crate::edge::GraphEdge), unique within a graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

/// Identifier of a [`Field`](crate::node::Field), unique within its owning node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(pub String);

macro_rules! string_id {
    ($ty:ident) => {
        impl $ty {
            /// Returns the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(s: &str) -> Self {
                $ty(s.to_string())
            }
        }

        impl From<String> for $ty {
            fn from(s: String) -> Self {
                $ty(s)
            }
        }
    };
}

string_id!(NodeId);
string_id!(EdgeId);
string_id!(FieldId);
