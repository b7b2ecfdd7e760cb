//! MySQL catalog driver over `information_schema`, scoped to `DATABASE()`.

use std::time::Duration;

use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder};

use crate::descriptor::{ConnectionDescriptor, Endpoint};
use crate::drivers::single_column_keys;
use crate::error::IntrospectError;
use crate::source::{
    CatalogSource, Close, ColumnInfo, Driver, ForeignKeyInfo, Session, TableDescription,
};

const LIST_TABLES: &str = "
    SELECT TABLE_NAME
    FROM information_schema.TABLES
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
    ORDER BY TABLE_NAME";

const LIST_COLUMNS: &str = "
    SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_DEFAULT, COLUMN_KEY
    FROM information_schema.COLUMNS
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION";

const LIST_FOREIGN_KEYS: &str = "
    SELECT COLUMN_NAME, REFERENCED_TABLE_NAME, REFERENCED_COLUMN_NAME
    FROM information_schema.KEY_COLUMN_USAGE
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
      AND REFERENCED_TABLE_NAME IS NOT NULL
    ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION";

const LIST_UNIQUE: &str = "
    SELECT INDEX_NAME, COLUMN_NAME
    FROM information_schema.STATISTICS
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
      AND NON_UNIQUE = 0 AND INDEX_NAME <> 'PRIMARY'
    ORDER BY INDEX_NAME, SEQ_IN_INDEX";

#[derive(Debug, Clone, Copy)]
pub struct MysqlDriver {
    connect_timeout: Duration,
}

impl Default for MysqlDriver {
    fn default() -> Self {
        MysqlDriver {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl MysqlDriver {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn options(&self, descriptor: &ConnectionDescriptor, endpoint: &Endpoint) -> OptsBuilder {
        let credentials = &descriptor.credentials;
        OptsBuilder::new()
            .ip_or_hostname(Some(endpoint.host.clone()))
            .tcp_port(endpoint.port.unwrap_or(3306))
            .user((!credentials.username.is_empty()).then(|| credentials.username.clone()))
            .pass((!credentials.password.is_empty()).then(|| credentials.password.clone()))
            .db_name(Some(descriptor.database_name.clone()))
            .tcp_connect_timeout(Some(self.connect_timeout))
    }
}

impl Driver for MysqlDriver {
    fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        endpoint: &Endpoint,
    ) -> Result<Session, IntrospectError> {
        let conn = Conn::new(self.options(descriptor, endpoint))
            .map_err(|e| IntrospectError::connection(endpoint, e))?;
        Ok(Session::Relational(Box::new(MysqlCatalog {
            conn,
            label: format!("mysql session {endpoint}/{}", descriptor.database_name),
        })))
    }
}

struct MysqlCatalog {
    conn: Conn,
    label: String,
}

impl MysqlCatalog {
    fn columns(&mut self, table: &str) -> mysql::Result<Vec<ColumnInfo>> {
        let rows: Vec<(String, String, String, Option<String>, String)> =
            self.conn.exec(LIST_COLUMNS, (table,))?;
        Ok(rows
            .into_iter()
            .map(|(name, data_type, nullable, default_value, key)| ColumnInfo {
                name,
                data_type,
                not_null: nullable == "NO",
                default_value,
                primary_key: key == "PRI",
            })
            .collect())
    }

    fn foreign_keys(&mut self, table: &str) -> mysql::Result<Vec<ForeignKeyInfo>> {
        let rows: Vec<(String, String, Option<String>)> =
            self.conn.exec(LIST_FOREIGN_KEYS, (table,))?;
        Ok(rows
            .into_iter()
            .map(|(column, referenced_table, referenced_column)| ForeignKeyInfo {
                column,
                referenced_table,
                referenced_column,
            })
            .collect())
    }

    fn unique_columns(&mut self, table: &str) -> mysql::Result<Vec<String>> {
        let pairs: Vec<(String, String)> = self.conn.exec(LIST_UNIQUE, (table,))?;
        Ok(single_column_keys(pairs))
    }
}

impl Close for MysqlCatalog {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn close(self: Box<Self>) -> Result<(), IntrospectError> {
        // Dropping the connection sends COM_QUIT.
        Ok(())
    }
}

impl CatalogSource for MysqlCatalog {
    fn list_tables(&mut self) -> Result<Vec<String>, IntrospectError> {
        self.conn
            .query(LIST_TABLES)
            .map_err(|e| IntrospectError::introspection("listing tables", e))
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
