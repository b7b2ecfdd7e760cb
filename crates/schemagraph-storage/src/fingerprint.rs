//! Deterministic content fingerprints for diagrams using blake3.
//!
//! A fingerprint is the only signal the save path uses to decide whether a
//! save changed anything, so two structurally identical diagrams must hash
//! identically no matter how they were built.
//!
//! # Determinism
//!
//! - Nodes and edges are sets keyed by id: both are sorted by id before
//!   hashing, so insertion order never matters.
//! - Fields keep declaration order: column order is content.
//! - Object keys are written in sorted order. Pass-through `extra` maps keep
//!   whatever order the editor sent, which carries no meaning.
//! - A domain tag prefixes the stream so diagram digests never collide with
//!   other blake3 uses by construction.

use std::fmt;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;

use schemagraph_core::{DiagramGraph, GraphEdge, GraphMetadata, GraphNode};

const DOMAIN_TAG: &[u8] = b"schemagraph/diagram/v1\0";

/// A 32-byte blake3 digest of a diagram's canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(blake3::Hash);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Canonical view of a graph: sets sorted by id.
#[derive(Serialize)]
struct Canonical<'a> {
    metadata: &'a GraphMetadata,
    nodes: Vec<&'a GraphNode>,
    edges: Vec<&'a GraphEdge>,
}

impl<'a> Canonical<'a> {
    fn of(graph: &'a DiagramGraph) -> Self {
        let mut nodes: Vec<&GraphNode> = graph.nodes.iter().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        let mut edges: Vec<&GraphEdge> = graph.edges.iter().collect();
        edges.sort_by(|a, b| a.id.cmp(&b.id));
        Canonical {
            metadata: &graph.metadata,
            nodes,
            edges,
        }
    }
}

/// Writes a JSON value with every object's keys in sorted order.
struct SortedKeys<'a>(&'a Value);

impl Serialize for SortedKeys<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let mut entries: Vec<(&String, &Value)> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                let mut out = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    out.serialize_entry(key, &SortedKeys(value))?;
                }
                out.end()
            }
            Value::Array(items) => serializer.collect_seq(items.iter().map(SortedKeys)),
            scalar => scalar.serialize(serializer),
        }
    }
}

fn write_canonical(hasher: &mut blake3::Hasher, graph: &DiagramGraph) -> serde_json::Result<()> {
    let value = serde_json::to_value(Canonical::of(graph))?;
    serde_json::to_writer(hasher, &SortedKeys(&value))
}

/// Computes the fingerprint of a diagram.
pub fn fingerprint(graph: &DiagramGraph) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    hasher.update(DOMAIN_TAG);
    // String keys only and no fallible Serialize impls: cannot fail.
    write_canonical(&mut hasher, graph).expect("DiagramGraph serialization should never fail");
    Fingerprint(hasher.finalize())
}
