//! Document-oriented introspection: one sampled document per collection.

use serde_json::{Map, Value};

use schemagraph_core::{DiagramGraph, EngineKind, Field, GraphMetadata, GraphNode, NodeKind, Position};

use crate::error::IntrospectError;
use crate::infer::{infer_type, InferredType};
use crate::introspector::IntrospectOptions;
use crate::relations::infer_relationships;
use crate::scoped::CancelToken;
use crate::source::DocumentSource;

const IDENTITY_FIELD: &str = "_id";

/// Builds a diagram from a document source.
///
/// Only fields present in each collection's sampled document are
/// discovered; shapes are not reconciled across documents.
pub fn introspect_documents(
    source: &mut dyn DocumentSource,
    engine_kind: EngineKind,
    options: &IntrospectOptions,
    cancel: &CancelToken,
) -> Result<DiagramGraph, IntrospectError> {
    let mut graph = DiagramGraph::new(GraphMetadata::for_engine(engine_kind));
    let mut grid = options.layout.cursor();

    let collections = source.list_collections()?;
    tracing::debug!(count = collections.len(), "collections enumerated");

    for name in collections {
        cancel.check()?;
        let sample = source.sample_document(&name)?;
        let node = collection_node(&name, sample.as_ref(), grid.next_position());
        graph
            .add_node(node)
            .map_err(|e| IntrospectError::introspection(format!("collection '{name}'"), e))?;
    }

    if options.infer_relationships {
        infer_relationships(&mut graph, |_| true)
            .map_err(|e| IntrospectError::introspection("relationship inference", e))?;
    }
    Ok(graph)
}

/// Turns one collection and its sample into a node.
pub fn collection_node(name: &str, sample: Option<&Map<String, Value>>, position: Position) -> GraphNode {
    let identity_type = sample
        .and_then(|doc| doc.get(IDENTITY_FIELD))
        .map(infer_type)
        .filter(|ty| *ty != InferredType::Mixed)
        .unwrap_or(InferredType::ObjectId);

    let mut node = GraphNode::new(name, NodeKind::DocumentCollection, name)
        .with_position(position)
        .with_field(
            Field::new(format!("{name}.{IDENTITY_FIELD}"), IDENTITY_FIELD, identity_type.as_str())
                .primary_key(),
        );

    for (key, value) in sample.into_iter().flatten() {
        if key == IDENTITY_FIELD {
            continue;
        }
        node = node.with_field(Field::new(format!("{name}.{key}"), key.as_str(), infer_type(value).as_str()));
    }
    node
}
