//! Structural safety checks on raw diagram content.
//!
//! These run on the untyped JSON before it is parsed into a
//! [`DiagramGraph`](schemagraph_core::DiagramGraph). They bound the payload
//! size, pin down the root shape, and reject object keys that downstream
//! dynamically-typed consumers treat as prototype/constructor hooks. Business
//! semantics are out of scope here.

use std::io;

use serde_json::Value;
use thiserror::Error;

use schemagraph_core::CoreError;

/// Object keys rejected at any depth.
pub const DENYLISTED_KEYS: &[&str] = &["__proto__", "constructor", "prototype"];

/// Default serialized size ceiling: 5 MiB.
pub const DEFAULT_MAX_CONTENT_BYTES: usize = 5 * 1024 * 1024;

/// A violated content rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("content is {size} bytes, exceeding the {limit}-byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("content root must be an object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("'{field}' must be an array, found {found}")]
    NotASequence {
        field: &'static str,
        found: &'static str,
    },

    #[error("forbidden key '{key}' at {path}")]
    ForbiddenKey { key: String, path: String },

    #[error("malformed diagram: {0}")]
    Malformed(String),

    #[error("inconsistent diagram: {0}")]
    Integrity(#[from] CoreError),
}

/// Checks raw content against every structural rule, reporting the first
/// violation found.
pub fn validate_content(content: &Value, max_bytes: usize) -> Result<(), ValidationError> {
    let size = serialized_len(content)?;
    if size > max_bytes {
        return Err(ValidationError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let root = content.as_object().ok_or(ValidationError::NotAnObject {
        found: kind_name(content),
    })?;

    for field in ["nodes", "edges"] {
        match root.get(field) {
            None | Some(Value::Array(_)) => {}
            Some(other) => {
                return Err(ValidationError::NotASequence {
                    field,
                    found: kind_name(other),
                })
            }
        }
    }

    check_forbidden_keys(content)
}

/// Walks the whole document with an explicit stack, so nesting depth is
/// bounded by memory rather than the call stack.
fn check_forbidden_keys(content: &Value) -> Result<(), ValidationError> {
    let mut stack: Vec<(&Value, String)> = vec![(content, "$".to_string())];
    while let Some((value, path)) = stack.pop() {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    if DENYLISTED_KEYS.contains(&key.as_str()) {
                        return Err(ValidationError::ForbiddenKey {
                            key: key.clone(),
                            path,
                        });
                    }
                    if child.is_object() || child.is_array() {
                        stack.push((child, format!("{path}.{key}")));
                    }
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    if child.is_object() || child.is_array() {
                        stack.push((child, format!("{path}[{i}]")));
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Compact serialized length, counted without buffering the output.
fn serialized_len(content: &Value) -> Result<usize, ValidationError> {
    struct Counter(usize);

    impl io::Write for Counter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0 += buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let mut counter = Counter(0);
    serde_json::to_writer(&mut counter, content)
        .map_err(|e| ValidationError::Malformed(e.to_string()))?;
    Ok(counter.0)
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
