//! Document driver over an Extended JSON export directory.
//!
//! Each collection is a file under `<host>/<databaseName>/`: either
//! `<collection>.jsonl` (one document per line) or `<collection>.json` (a
//! single document or an array of documents). Only the first document is
//! read.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::descriptor::{ConnectionDescriptor, Endpoint};
use crate::error::IntrospectError;
use crate::source::{Close, DocumentSource, Driver, Session};

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtendedJsonDriver;

impl Driver for ExtendedJsonDriver {
    fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        endpoint: &Endpoint,
    ) -> Result<Session, IntrospectError> {
        let root = Path::new(&endpoint.host).join(&descriptor.database_name);
        if !root.is_dir() {
            return Err(IntrospectError::Connection(format!(
                "database directory {} does not exist",
                root.display()
            )));
        }
        Ok(Session::Document(Box::new(ExportDirectory { root, files: None })))
    }
}

struct ExportDirectory {
    root: PathBuf,
    /// Filled by the first directory scan and reused for every sample.
    files: Option<BTreeMap<String, PathBuf>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Lines,
    Document,
}

fn format_of(path: &Path) -> Option<Format> {
    match path.extension()?.to_str()? {
        "jsonl" => Some(Format::Lines),
        "json" => Some(Format::Document),
        _ => None,
    }
}

/// Collection name to file, sorted by name. `.jsonl` wins over `.json`.
fn scan(root: &Path) -> Result<BTreeMap<String, PathBuf>, IntrospectError> {
    let entries = fs::read_dir(root).map_err(|e| IntrospectError::connection(root.display(), e))?;

    let mut files = BTreeMap::new();
    for entry in entries {
        let path = entry
            .map_err(|e| IntrospectError::introspection(root.display(), e))?
            .path();
        let Some(format) = format_of(&path) else {
            continue;
        };
        let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        if !path.is_file() {
            continue;
        }
        match files.get(&name).and_then(|p: &PathBuf| format_of(p)) {
            Some(Format::Lines) if format == Format::Document => {}
            _ => {
                files.insert(name, path);
            }
        }
    }
    Ok(files)
}

/// Skips ASCII whitespace and returns the next byte without consuming it.
fn peek_non_whitespace(reader: &mut impl BufRead) -> io::Result<Option<u8>> {
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(None);
        }
        match buf.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(pos) => {
                let byte = buf[pos];
                reader.consume(pos);
                return Ok(Some(byte));
            }
            None => {
                let len = buf.len();
                reader.consume(len);
            }
        }
    }
}

/// Parses one JSON value from the front of `reader`, leaving the rest unread.
fn next_value(reader: impl Read) -> serde_json::Result<Option<Value>> {
    serde_json::Deserializer::from_reader(reader)
        .into_iter::<Value>()
        .next()
        .transpose()
}

/// Reads the leading document of a `.json` file: the first array element,
/// or the whole value when the file holds a single document.
fn leading_document(mut reader: impl BufRead) -> Result<Option<Value>, String> {
    match peek_non_whitespace(&mut reader).map_err(|e| e.to_string())? {
        None => Ok(None),
        Some(b'[') => {
            reader.consume(1);
            match peek_non_whitespace(&mut reader).map_err(|e| e.to_string())? {
                None => Err("unterminated array".to_string()),
                Some(b']') => Ok(None),
                Some(_) => next_value(reader).map_err(|e| e.to_string()),
            }
        }
        Some(_) => next_value(reader).map_err(|e| e.to_string()),
    }
}

impl ExportDirectory {
    fn files(&mut self) -> Result<&BTreeMap<String, PathBuf>, IntrospectError> {
        let files = match self.files.take() {
            Some(files) => files,
            None => scan(&self.root)?,
        };
        Ok(&*self.files.insert(files))
    }

    fn first_document(path: &Path) -> Result<Option<Value>, IntrospectError> {
        let context = || path.display().to_string();
        let file = File::open(path).map_err(|e| IntrospectError::introspection(context(), e))?;
        let reader = BufReader::new(file);

        match format_of(path) {
            Some(Format::Lines) => {
                for line in reader.lines() {
                    let line = line.map_err(|e| IntrospectError::introspection(context(), e))?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    let value = serde_json::from_str(&line)
                        .map_err(|e| IntrospectError::introspection(context(), e))?;
                    return Ok(Some(value));
                }
                Ok(None)
            }
            _ => leading_document(reader).map_err(|e| IntrospectError::introspection(context(), e)),
        }
    }
}

impl Close for ExportDirectory {
    fn describe(&self) -> String {
        format!("export directory {}", self.root.display())
    }

    fn close(self: Box<Self>) -> Result<(), IntrospectError> {
        Ok(())
    }
}

impl DocumentSource for ExportDirectory {
    fn list_collections(&mut self) -> Result<Vec<String>, IntrospectError> {
        Ok(self.files()?.keys().cloned().collect())
    }

    fn sample_document(
        &mut self,
        collection: &str,
    ) -> Result<Option<Map<String, Value>>, IntrospectError> {
        let path = self.files()?.get(collection).cloned().ok_or_else(|| {
            IntrospectError::Introspection(format!("collection '{collection}' was not listed"))
        })?;

        match Self::first_document(&path)? {
            None => Ok(None),
            Some(Value::Object(doc)) => Ok(Some(doc)),
            Some(other) => Err(IntrospectError::Introspection(format!(
                "first document of '{}' is not an object: {}",
                collection,
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemagraph_core::EngineKind;

    fn export(files: &[(&str, &str)]) -> (tempfile::TempDir, ConnectionDescriptor) {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("app");
        fs::create_dir(&db).unwrap();
        for (name, body) in files {
            fs::write(db.join(name), body).unwrap();
        }
        let descriptor = ConnectionDescriptor::new(
            EngineKind::Mongodb,
            dir.path().to_string_lossy().into_owned(),
            "app",
        );
        (dir, descriptor)
    }

    fn open(descriptor: &ConnectionDescriptor) -> Box<dyn DocumentSource> {
        match ExtendedJsonDriver.connect(descriptor, &descriptor.endpoint()).unwrap() {
            Session::Document(source) => source,
            Session::Relational(_) => panic!("export directory must open a document session"),
        }
    }

    #[test]
    fn test_lists_collections_sorted_ignoring_other_files() {
        let (_dir, descriptor) = export(&[
            ("users.jsonl", "{\"name\":\"a\"}\n"),
            ("orders.json", "[]"),
            ("README.md", "# export"),
        ]);
        let mut source = open(&descriptor);
        assert_eq!(source.list_collections().unwrap(), ["orders", "users"]);
    }

    #[test]
    fn test_samples_first_document_only() {
        let (_dir, descriptor) = export(&[
            ("users.jsonl", "\n{\"name\":\"ada\"}\n{\"email\":\"x\"}\n"),
            ("orders.json", "[{\"total\": 3}, {\"other\": 1}]"),
            ("empty.json", "[]"),
        ]);
        let mut source = open(&descriptor);

        let user = source.sample_document("users").unwrap().unwrap();
        assert!(user.contains_key("name") && !user.contains_key("email"));

        let order = source.sample_document("orders").unwrap().unwrap();
        assert_eq!(order.keys().collect::<Vec<_>>(), ["total"]);

        assert!(source.sample_document("empty").unwrap().is_none());
    }

    #[test]
    fn test_json_array_stops_after_first_element() {
        let (_dir, descriptor) = export(&[
            ("users.json", "  [ {\"_id\":1,\"name\":\"ada\"}, {\"name\": BROKEN"),
            ("single.json", "\n{\"sku\": \"x\"}\n"),
            ("blank.json", "   \n"),
        ]);
        let mut source = open(&descriptor);

        let user = source.sample_document("users").unwrap().unwrap();
        assert_eq!(user["name"], "ada");

        let single = source.sample_document("single").unwrap().unwrap();
        assert_eq!(single["sku"], "x");

        assert!(source.sample_document("blank").unwrap().is_none());
    }

    #[test]
    fn test_broken_first_element_is_introspection_error() {
        let (_dir, descriptor) = export(&[("users.json", "[{\"name\": ]")]);
        let mut source = open(&descriptor);
        let err = source.sample_document("users").unwrap_err();
        assert!(matches!(err, IntrospectError::Introspection(_)));
    }

    #[test]
    fn test_directory_is_scanned_once_per_session() {
        let (dir, descriptor) = export(&[("users.jsonl", "{\"name\":\"ada\"}\n")]);
        let mut source = open(&descriptor);
        assert_eq!(source.list_collections().unwrap(), ["users"]);

        fs::write(dir.path().join("app").join("late.jsonl"), "{\"x\":1}\n").unwrap();

        assert_eq!(source.list_collections().unwrap(), ["users"]);
        assert!(source.sample_document("users").unwrap().is_some());
        assert!(matches!(
            source.sample_document("late"),
            Err(IntrospectError::Introspection(_))
        ));
    }

    #[test]
    fn test_sampling_without_listing_scans_lazily() {
        let (_dir, descriptor) = export(&[("orders.json", "[{\"total\": 3}]")]);
        let mut source = open(&descriptor);
        assert!(source.sample_document("orders").unwrap().is_some());
    }

    #[test]
    fn test_non_object_document_is_introspection_error() {
        let (_dir, descriptor) = export(&[("numbers.jsonl", "42\n")]);
        let mut source = open(&descriptor);
        let err = source.sample_document("numbers").unwrap_err();
        assert!(matches!(err, IntrospectError::Introspection(_)));
    }

    #[test]
    fn test_missing_database_directory_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor = ConnectionDescriptor::new(
            EngineKind::Mongodb,
            dir.path().to_string_lossy().into_owned(),
            "nope",
        );
        let err = ExtendedJsonDriver
            .connect(&descriptor, &descriptor.endpoint())
            .err()
            .unwrap();
        assert!(matches!(err, IntrospectError::Connection(_)));
    }
}
