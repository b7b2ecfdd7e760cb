//! Naming-convention relationship inference.
//!
//! A field named `<base>Id`, `<base>_id` or `<base>ID` is taken to reference
//! the node labelled `<base>` or `<base>s` (case-insensitive). This is a
//! heuristic: misses are expected, and false positives are ordinary edges
//! the user can delete.

use indexmap::IndexMap;

use schemagraph_core::{CoreError, DiagramGraph, EdgeId, FieldId, GraphEdge, GraphNode, NodeId};

/// Reference suffixes, longest-match first so `user_id` strips `_id`.
const REFERENCE_SUFFIXES: [&str; 3] = ["_id", "Id", "ID"];

/// The identity field every document carries.
const IDENTITY_FIELD: &str = "_id";

/// Returns the lowercased base name a reference-like field points at.
pub fn reference_base(field_name: &str) -> Option<String> {
    if field_name == IDENTITY_FIELD {
        return None;
    }
    REFERENCE_SUFFIXES.iter().find_map(|suffix| {
        let base = field_name.strip_suffix(suffix)?;
        (!base.is_empty()).then(|| base.to_lowercase())
    })
}

/// Finds the node a base name refers to: exact label first, then plural.
fn find_target<'g>(graph: &'g DiagramGraph, base: &str) -> Option<&'g GraphNode> {
    graph
        .node_by_label(base)
        .or_else(|| graph.node_by_label(&format!("{base}s")))
}

/// An edge found by name matching, before it is given an id.
struct Reference {
    field_name: String,
    target: NodeId,
    target_handle: Option<String>,
}

/// Returns `base`, or `base~2`, `base~3`, ... if the graph already holds it.
fn unused_edge_id(graph: &DiagramGraph, base: &str) -> EdgeId {
    let mut id = EdgeId::from(base);
    let mut suffix = 2;
    while graph.edge(&id).is_some() {
        id = EdgeId(format!("{base}~{suffix}"));
        suffix += 1;
    }
    id
}

/// Adds an edge for every reference-like field on an `eligible` node whose
/// base name matches another node, and flags that field as a foreign key.
/// Returns the number of edges added.
pub fn infer_relationships(
    graph: &mut DiagramGraph,
    eligible: impl Fn(&GraphNode) -> bool,
) -> Result<usize, CoreError> {
    let mut planned: IndexMap<(NodeId, FieldId), Reference> = IndexMap::new();

    for node in graph.nodes.iter().filter(|n| eligible(*n)) {
        for field in node.fields.iter().filter(|f| !f.is_primary_key) {
            let Some(base) = reference_base(&field.name) else {
                continue;
            };
            let Some(target) = find_target(graph, &base) else {
                continue;
            };
            if target.id == node.id
                || graph.has_edge_between(&node.id, &target.id, Some(field.id.as_str()))
            {
                continue;
            }

            planned
                .entry((node.id.clone(), field.id.clone()))
                .or_insert_with(|| Reference {
                    field_name: field.name.clone(),
                    target: target.id.clone(),
                    target_handle: target.primary_key().map(|pk| pk.id.to_string()),
                });
        }
    }

    let added = planned.len();
    for ((source, field), reference) in planned {
        let base = format!("rel-{}-{}-{}", source, reference.field_name, reference.target);
        let id = unused_edge_id(graph, &base);
        tracing::debug!(
            edge = %id,
            source = %source,
            target = %reference.target,
            handle = field.as_str(),
            "inferred relationship"
        );
        let edge = GraphEdge::new(id, source.clone(), reference.target)
            .with_handles(Some(field.to_string()), reference.target_handle);
        graph.add_edge(edge)?;

        if let Some(f) = graph.node_mut(&source).and_then(|n| n.field_mut(&field)) {
            f.is_foreign_key = true;
        }
    }
    Ok(added)
}
