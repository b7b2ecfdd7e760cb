//! Coarse type inference from sampled document values.
//!
//! Understands the Extended JSON wrappers a document export uses for values
//! JSON cannot express natively (`{"$oid": ..}`, `{"$date": ..}`, ...).

use std::fmt;

use chrono::DateTime;
use serde_json::{Map, Value};

/// The type tag assigned to a sampled field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InferredType {
    /// `null`: the sample says nothing about the type.
    Mixed,
    Array,
    /// An object id or a DBRef.
    ObjectId,
    Date,
    String,
    Number,
    Boolean,
    Object,
    Binary,
}

impl InferredType {
    pub fn as_str(self) -> &'static str {
        match self {
            InferredType::Mixed => "Mixed",
            InferredType::Array => "Array",
            InferredType::ObjectId => "ObjectId",
            InferredType::Date => "Date",
            InferredType::String => "String",
            InferredType::Number => "Number",
            InferredType::Boolean => "Boolean",
            InferredType::Object => "Object",
            InferredType::Binary => "Binary",
        }
    }
}

impl fmt::Display for InferredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Infers the type tag of one sampled value.
pub fn infer_type(value: &Value) -> InferredType {
    match value {
        Value::Null => InferredType::Mixed,
        Value::Bool(_) => InferredType::Boolean,
        Value::Number(_) => InferredType::Number,
        Value::Array(_) => InferredType::Array,
        Value::String(s) if is_rfc3339(s) => InferredType::Date,
        Value::String(_) => InferredType::String,
        Value::Object(map) => infer_wrapper(map).unwrap_or(InferredType::Object),
    }
}

fn infer_wrapper(map: &Map<String, Value>) -> Option<InferredType> {
    if map.contains_key("$ref") && map.contains_key("$id") {
        return Some(InferredType::ObjectId);
    }
    if map.len() != 1 {
        return None;
    }
    let key = map.keys().next()?;
    let ty = match key.as_str() {
        "$oid" => InferredType::ObjectId,
        "$date" => InferredType::Date,
        "$numberInt" | "$numberLong" | "$numberDouble" | "$numberDecimal" => InferredType::Number,
        "$binary" | "$uuid" => InferredType::Binary,
        _ => return None,
    };
    Some(ty)
}

fn is_rfc3339(s: &str) -> bool {
    // Cheap shape check before parsing: "YYYY-MM-DDT..."
    s.len() >= 20 && s.as_bytes().get(10) == Some(&b'T') && DateTime::parse_from_rfc3339(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json_kinds() {
        assert_eq!(infer_type(&json!(null)), InferredType::Mixed);
        assert_eq!(infer_type(&json!(true)), InferredType::Boolean);
        assert_eq!(infer_type(&json!(3.5)), InferredType::Number);
        assert_eq!(infer_type(&json!([1, 2])), InferredType::Array);
        assert_eq!(infer_type(&json!("alice")), InferredType::String);
        assert_eq!(infer_type(&json!({"street": "Main"})), InferredType::Object);
    }

    #[test]
    fn test_extended_json_wrappers() {
        assert_eq!(
            infer_type(&json!({"$oid": "507f1f77bcf86cd799439011"})),
            InferredType::ObjectId
        );
        assert_eq!(
            infer_type(&json!({"$ref": "users", "$id": {"$oid": "507f1f77bcf86cd799439011"}})),
            InferredType::ObjectId
        );
        assert_eq!(
            infer_type(&json!({"$date": "2024-01-01T00:00:00Z"})),
            InferredType::Date
        );
        assert_eq!(infer_type(&json!({"$numberLong": "42"})), InferredType::Number);
        assert_eq!(
            infer_type(&json!({"$binary": {"base64": "AA==", "subType": "00"}})),
            InferredType::Binary
        );
    }

    #[test]
    fn test_date_strings() {
        assert_eq!(infer_type(&json!("2024-05-01T10:20:30Z")), InferredType::Date);
        assert_eq!(
            infer_type(&json!("2024-05-01T10:20:30.123+02:00")),
            InferredType::Date
        );
        assert_eq!(infer_type(&json!("2024-05-01")), InferredType::String);
        assert_eq!(infer_type(&json!("not a date at all!!")), InferredType::String);
    }
}
