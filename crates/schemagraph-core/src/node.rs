//! Node and field types.
//!
//! A [`GraphNode`] is one table (relational engines) or collection (document
//! engines). Its [`Field`]s keep declaration order; that order is part of the
//! node's content and therefore of its fingerprint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::{FieldId, NodeId};

/// What a node represents in the external engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    RelationalTable,
    DocumentCollection,
}

/// Canvas position of a node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }
}

/// A column or document key.
///
/// `field_type` is a free-form tag (`"INTEGER"`, `"varchar(255)"`,
/// `"ObjectId"`, ...); the model never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: FieldId,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_foreign_key: bool,
    #[serde(default = "default_nullable")]
    pub is_nullable: bool,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_nullable() -> bool {
    true
}

impl Field {
    /// Creates a nullable, non-key field.
    pub fn new(id: impl Into<FieldId>, name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Field {
            id: id.into(),
            name: name.into(),
            field_type: field_type.into(),
            is_primary_key: false,
            is_foreign_key: false,
            is_nullable: true,
            is_unique: false,
            default_value: None,
            extra: Map::new(),
        }
    }

    /// Marks the field as the primary key. Primary keys are never nullable.
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_nullable = false;
        self
    }

    pub fn foreign_key(mut self) -> Self {
        self.is_foreign_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// A table or collection on the diagram canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: NodeId,
    pub kind: NodeKind,
    #[serde(default)]
    pub position: Position,
    pub label: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    /// Editor-owned keys (`data`, styling, ...) the model passes through.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GraphNode {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind, label: impl Into<String>) -> Self {
        GraphNode {
            id: id.into(),
            kind,
            position: Position::default(),
            label: label.into(),
            fields: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field_mut(&mut self, id: &FieldId) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| &f.id == id)
    }

    /// Looks up a field by id.
    pub fn field(&self, id: &FieldId) -> Option<&Field> {
        self.fields.iter().find(|f| &f.id == id)
    }

    /// Looks up a field by its column/key name.
    pub fn field_named(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the first primary-key field, if any.
    pub fn primary_key(&self) -> Option<&Field> {
        self.fields.iter().find(|f| f.is_primary_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_wire_format_is_camel_case() {
        let field = Field::new("users._id", "_id", "ObjectId").primary_key();
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["type"], "ObjectId");
        assert_eq!(json["isPrimaryKey"], true);
        assert_eq!(json["isNullable"], false);
        assert!(json.get("field_type").is_none());
    }

    #[test]
    fn test_field_defaults_when_flags_missing() {
        let field: Field =
            serde_json::from_str(r#"{"id":"f1","name":"email","type":"text"}"#).unwrap();
        assert!(field.is_nullable);
        assert!(!field.is_primary_key);
        assert_eq!(field.default_value, None);
    }

    #[test]
    fn test_unknown_node_keys_round_trip() {
        let raw = serde_json::json!({
            "id": "n",
            "kind": "relationalTable",
            "label": "n",
            "fields": [{"id": "n.id", "name": "id", "type": "INTEGER", "comment": "surrogate"}],
            "data": {"color": "red"},
        });
        let node: GraphNode = serde_json::from_value(raw).unwrap();
        assert_eq!(node.extra["data"]["color"], "red");
        assert_eq!(node.fields[0].extra["comment"], "surrogate");

        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["data"], serde_json::json!({"color": "red"}));
        assert_eq!(back["fields"][0]["comment"], "surrogate");
        assert!(back.get("extra").is_none());
    }

    #[test]
    fn test_node_kind_serializes_camel_case() {
        let json = serde_json::to_string(&NodeKind::DocumentCollection).unwrap();
        assert_eq!(json, "\"documentCollection\"");
    }

    #[test]
    fn test_primary_key_lookup() {
        let node = GraphNode::new("users", NodeKind::RelationalTable, "users")
            .with_field(Field::new("users.email", "email", "TEXT"))
            .with_field(Field::new("users.id", "id", "INTEGER").primary_key());
        assert_eq!(node.primary_key().map(|f| f.name.as_str()), Some("id"));
        assert!(node.field_named("email").is_some());
    }
}
