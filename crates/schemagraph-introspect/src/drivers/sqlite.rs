//! SQLite catalog driver.
//!
//! The database file is `<host>/<databaseName>`, or `host` alone when the
//! database name is empty. Catalog queries go through the table-valued
//! pragma functions so they can be bound like ordinary statements.

use std::path::PathBuf;

use rusqlite::{params, Connection, OpenFlags};

use crate::descriptor::{ConnectionDescriptor, Endpoint};
use crate::error::IntrospectError;
use crate::source::{
    CatalogSource, Close, ColumnInfo, Driver, ForeignKeyInfo, Session, TableDescription,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl SqliteDriver {
    fn database_path(descriptor: &ConnectionDescriptor, endpoint: &Endpoint) -> PathBuf {
        let host = PathBuf::from(&endpoint.host);
        if descriptor.database_name.is_empty() {
            host
        } else {
            host.join(&descriptor.database_name)
        }
    }
}

impl Driver for SqliteDriver {
    fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        endpoint: &Endpoint,
    ) -> Result<Session, IntrospectError> {
        let path = Self::database_path(descriptor, endpoint);
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| IntrospectError::connection(path.display(), e))?;

        // Opening is lazy; touch the schema so a non-database file fails here.
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
            .map_err(|e| IntrospectError::connection(path.display(), e))?;

        Ok(Session::Relational(Box::new(SqliteCatalog { conn, path })))
    }
}

struct SqliteCatalog {
    conn: Connection,
    path: PathBuf,
}

impl SqliteCatalog {
    fn columns(&self, table: &str) -> rusqlite::Result<Vec<ColumnInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let rows = stmt.query_map(params![table], |row| {
            let data_type: String = row.get(1)?;
            Ok(ColumnInfo {
                name: row.get(0)?,
                data_type: if data_type.is_empty() {
                    "ANY".to_string()
                } else {
                    data_type
                },
                not_null: row.get::<_, i64>(2)? != 0,
                default_value: row.get(3)?,
                primary_key: row.get::<_, i64>(4)? > 0,
            })
        })?;
        rows.collect()
    }

    fn foreign_keys(&self, table: &str) -> rusqlite::Result<Vec<ForeignKeyInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT \"table\", \"from\", \"to\" FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
        )?;
        let rows = stmt.query_map(params![table], |row| {
            Ok(ForeignKeyInfo {
                referenced_table: row.get(0)?,
                column: row.get(1)?,
                referenced_column: row.get(2)?,
            })
        })?;
        rows.collect()
    }

    fn unique_columns(&self, table: &str) -> rusqlite::Result<Vec<String>> {
        let mut indexes = self.conn.prepare(
            "SELECT name FROM pragma_index_list(?1) WHERE \"unique\" = 1 AND origin != 'pk'",
        )?;
        let names: Vec<String> = indexes
            .query_map(params![table], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;

        let mut info = self
            .conn
            .prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")?;
        let mut unique = Vec::new();
        for index in names {
            let columns: Vec<Option<String>> = info
                .query_map(params![index], |row| row.get(0))?
                .collect::<rusqlite::Result<_>>()?;
            // Only single-column indexes make a column unique on its own.
            if let [Some(column)] = columns.as_slice() {
                if !unique.contains(column) {
                    unique.push(column.clone());
                }
            }
        }
        Ok(unique)
    }
}

impl Close for SqliteCatalog {
    fn describe(&self) -> String {
        format!("sqlite session {}", self.path.display())
    }

    fn close(self: Box<Self>) -> Result<(), IntrospectError> {
        let SqliteCatalog { conn, path } = *self;
        conn.close()
            .map_err(|(_, e)| IntrospectError::connection(format!("closing {}", path.display()), e))
    }
}

impl CatalogSource for SqliteCatalog {
    fn list_tables(&mut self) -> Result<Vec<String>, IntrospectError> {
        let read = || -> rusqlite::Result<Vec<String>> {
            let mut stmt = self.conn.prepare(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect()
        };
        read().map_err(|e| IntrospectError::introspection("listing tables", e))
    }

    fn describe_table(&mut self, table: &str) -> Result<TableDescription, IntrospectError> {
        let context = || format!("reading catalog of table '{table}'");
        Ok(TableDescription {
            name: table.to_string(),
            columns: self
                .columns(table)
                .map_err(|e| IntrospectError::introspection(context(), e))?,
            foreign_keys: self
                .foreign_keys(table)
                .map_err(|e| IntrospectError::introspection(context(), e))?,
            unique_columns: self
                .unique_columns(table)
                .map_err(|e| IntrospectError::introspection(context(), e))?,
        })
    }
}
