//! Relational introspection from declared catalog metadata.
//!
//! Keys and relationships come from the catalog, so they are exact. The
//! naming heuristic only runs for tables that declare no foreign keys.

use std::collections::HashSet;

use schemagraph_core::{
    DiagramGraph, EdgeId, EngineKind, Field, GraphEdge, GraphMetadata, GraphNode, NodeId, NodeKind,
    Position,
};

use crate::error::IntrospectError;
use crate::introspector::IntrospectOptions;
use crate::relations::infer_relationships;
use crate::scoped::CancelToken;
use crate::source::{CatalogSource, TableDescription};

/// Builds a diagram from a catalog source.
pub fn introspect_catalog(
    source: &mut dyn CatalogSource,
    engine_kind: EngineKind,
    options: &IntrospectOptions,
    cancel: &CancelToken,
) -> Result<DiagramGraph, IntrospectError> {
    let mut graph = DiagramGraph::new(GraphMetadata::for_engine(engine_kind));
    let mut grid = options.layout.cursor();

    let tables = source.list_tables()?;
    tracing::debug!(count = tables.len(), "tables enumerated");

    let mut descriptions = Vec::with_capacity(tables.len());
    for name in &tables {
        cancel.check()?;
        let description = source.describe_table(name)?;
        graph
            .add_node(table_node(&description, grid.next_position()))
            .map_err(|e| IntrospectError::introspection(format!("table '{name}'"), e))?;
        descriptions.push(description);
    }

    for description in &descriptions {
        for edge in declared_edges(&graph, description) {
            graph
                .add_edge(edge)
                .map_err(|e| IntrospectError::introspection(format!("table '{}'", description.name), e))?;
        }
    }

    if options.infer_relationships {
        let undeclared: HashSet<NodeId> = descriptions
            .iter()
            .filter(|d| d.foreign_keys.is_empty())
            .map(|d| NodeId::from(d.name.as_str()))
            .collect();
        infer_relationships(&mut graph, |node| undeclared.contains(&node.id))
            .map_err(|e| IntrospectError::introspection("relationship inference", e))?;
    }
    Ok(graph)
}

fn field_id(table: &str, column: &str) -> String {
    format!("{table}.{column}")
}

/// Turns a table description into a node with exact key flags.
pub fn table_node(table: &TableDescription, position: Position) -> GraphNode {
    let fk_columns: HashSet<&str> = table.foreign_keys.iter().map(|fk| fk.column.as_str()).collect();

    let mut node = GraphNode::new(table.name.as_str(), NodeKind::RelationalTable, table.name.as_str())
        .with_position(position);
    for column in &table.columns {
        let mut field = Field::new(field_id(&table.name, &column.name), column.name.as_str(), column.data_type.as_str());
        if column.primary_key {
            field = field.primary_key();
        }
        if column.not_null {
            field = field.not_null();
        }
        if fk_columns.contains(column.name.as_str()) {
            field = field.foreign_key();
        }
        if table.unique_columns.iter().any(|c| c == &column.name) {
            field = field.unique();
        }
        if let Some(default) = &column.default_value {
            field = field.with_default(default.as_str());
        }
        node = node.with_field(field);
    }
    node
}

/// Edges for declared foreign keys whose referenced table was introspected.
fn declared_edges(graph: &DiagramGraph, table: &TableDescription) -> Vec<GraphEdge> {
    let source = NodeId::from(table.name.as_str());
    let mut edges = Vec::new();

    for fk in &table.foreign_keys {
        let Some(target) = graph.node(&NodeId::from(fk.referenced_table.as_str())) else {
            tracing::debug!(
                table = %table.name,
                references = %fk.referenced_table,
                "foreign key target not introspected"
            );
            continue;
        };
        let target_handle = fk
            .referenced_column
            .as_deref()
            .and_then(|column| target.field_named(column))
            .or_else(|| target.primary_key())
            .map(|f| f.id.to_string());

        let id = EdgeId(format!("fk-{}-{}-{}", table.name, fk.column, fk.referenced_table));
        if edges.iter().any(|e: &GraphEdge| e.id == id) {
            continue;
        }
        edges.push(
            GraphEdge::new(id, source.clone(), target.id.clone())
                .with_handles(Some(field_id(&table.name, &fk.column)), target_handle),
        );
    }
    edges
}
