//! Driver and session contracts.
//!
//! A [`Driver`] turns a descriptor into a live [`Session`]. A session is
//! either a [`DocumentSource`] (schema-on-read: enumerate collections,
//! sample a document) or a [`CatalogSource`] (declared catalog: tables,
//! columns, keys). Sessions and tunnels are single-use and are consumed by
//! `close`.

use serde_json::{Map, Value};

use crate::descriptor::{ConnectionDescriptor, Endpoint, TunnelDescriptor};
use crate::error::IntrospectError;

/// A resource that must be released exactly once.
pub trait Close: Send {
    /// Short label used when logging the release.
    fn describe(&self) -> String;

    fn close(self: Box<Self>) -> Result<(), IntrospectError>;
}

/// Schema-on-read access to a document database.
pub trait DocumentSource: Close {
    fn list_collections(&mut self) -> Result<Vec<String>, IntrospectError>;

    /// Returns one representative document, or `None` for an empty
    /// collection.
    fn sample_document(&mut self, collection: &str)
        -> Result<Option<Map<String, Value>>, IntrospectError>;
}

/// Catalog access to a relational database.
pub trait CatalogSource: Close {
    fn list_tables(&mut self) -> Result<Vec<String>, IntrospectError>;

    fn describe_table(&mut self, table: &str) -> Result<TableDescription, IntrospectError>;
}

/// An open connection to an external engine.
pub enum Session {
    Document(Box<dyn DocumentSource>),
    Relational(Box<dyn CatalogSource>),
}

/// Connects to one engine kind.
pub trait Driver: Send + Sync {
    /// Opens a session against `endpoint`, which is either the descriptor's
    /// own address or the local end of a tunnel.
    fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        endpoint: &Endpoint,
    ) -> Result<Session, IntrospectError>;
}

/// An open tunnel forwarding a local endpoint to the engine.
pub trait Tunnel: Close {
    fn local_endpoint(&self) -> Endpoint;
}

/// Opens tunnels through jump hosts.
pub trait TunnelOpener: Send + Sync {
    fn open(
        &self,
        tunnel: &TunnelDescriptor,
        target: &Endpoint,
    ) -> Result<Box<dyn Tunnel>, IntrospectError>;
}

/// One column as declared in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

/// A declared foreign-key constraint on a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyInfo {
    pub column: String,
    pub referenced_table: String,
    /// `None` when the constraint targets the referenced table's primary key
    /// implicitly.
    pub referenced_column: Option<String>,
}

/// Everything the catalog declares about one table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableDescription {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub foreign_keys: Vec<ForeignKeyInfo>,
    /// Columns covered by a single-column unique constraint or index.
    pub unique_columns: Vec<String>,
}
