//! Reverse-engineers live databases into [`DiagramGraph`]s.
//!
//! An [`Introspector`] picks the [`Driver`] registered for a descriptor's
//! engine kind, optionally opens a tunnel first, and runs one of two
//! variants over the resulting session:
//!
//! - **document** ([`document`]): sample one document per collection, infer
//!   coarse field types, then infer relationships from field names;
//! - **relational** ([`relational`]): read declared columns and keys from the
//!   catalog, with the naming heuristic only for tables without foreign keys.
//!
//! Nodes are placed on a deterministic grid ([`layout`]). Engines behind a
//! jump host are reached through [`SshTunnelOpener`].
//!
//! [`DiagramGraph`]: schemagraph_core::DiagramGraph

pub mod descriptor;
pub mod document;
pub mod drivers;
pub mod error;
pub mod infer;
pub mod introspector;
pub mod layout;
pub mod relational;
pub mod relations;
pub mod scoped;
pub mod source;
pub mod tunnel;

pub use descriptor::{ConnectionDescriptor, Credentials, Endpoint, TunnelAuth, TunnelDescriptor};
pub use drivers::{ExtendedJsonDriver, MongodbDriver, MysqlDriver, PostgresDriver, SqliteDriver};
pub use error::IntrospectError;
pub use infer::{infer_type, InferredType};
pub use introspector::{IntrospectOptions, Introspector};
pub use layout::{GridCursor, GridLayout};
pub use scoped::{CancelToken, Scoped};
pub use source::{
    CatalogSource, Close, ColumnInfo, DocumentSource, Driver, ForeignKeyInfo, Session,
    TableDescription, Tunnel, TunnelOpener,
};
pub use tunnel::SshTunnelOpener;
