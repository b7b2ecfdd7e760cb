//! PostgreSQL catalog driver.
//!
//! Reads `information_schema` for the connection's current schema. Every
//! catalog column is cast to `text` because several of them are declared
//! with the `sql_identifier` domain, which has no direct Rust mapping.

use std::time::Duration;

use postgres::{Client, Config, NoTls};

use crate::descriptor::{ConnectionDescriptor, Endpoint};
use crate::drivers::single_column_keys;
use crate::error::IntrospectError;
use crate::source::{
    CatalogSource, Close, ColumnInfo, Driver, ForeignKeyInfo, Session, TableDescription,
};

const LIST_TABLES: &str = "
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = current_schema() AND table_type = 'BASE TABLE'
    ORDER BY table_name";

const LIST_COLUMNS: &str = "
    SELECT c.column_name::text,
           CASE WHEN c.data_type IN ('USER-DEFINED', 'ARRAY') THEN c.udt_name::text
                ELSE c.data_type::text END,
           c.is_nullable::text,
           c.column_default::text,
           EXISTS (
               SELECT 1
               FROM information_schema.table_constraints tc
               JOIN information_schema.key_column_usage k
                 ON k.constraint_schema = tc.constraint_schema
                AND k.constraint_name = tc.constraint_name
               WHERE tc.constraint_type = 'PRIMARY KEY'
                 AND tc.table_schema = c.table_schema
                 AND tc.table_name = c.table_name
                 AND k.column_name = c.column_name
           )
    FROM information_schema.columns c
    WHERE c.table_schema = current_schema() AND c.table_name = $1
    ORDER BY c.ordinal_position";

const LIST_FOREIGN_KEYS: &str = "
    SELECT k.column_name::text, u.table_name::text, u.column_name::text
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage k
      ON k.constraint_schema = tc.constraint_schema
     AND k.constraint_name = tc.constraint_name
    JOIN information_schema.constraint_column_usage u
      ON u.constraint_schema = tc.constraint_schema
     AND u.constraint_name = tc.constraint_name
    WHERE tc.constraint_type = 'FOREIGN KEY'
      AND tc.table_schema = current_schema()
      AND tc.table_name = $1
    ORDER BY tc.constraint_name, k.ordinal_position";

const LIST_UNIQUE: &str = "
    SELECT tc.constraint_name::text, k.column_name::text
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage k
      ON k.constraint_schema = tc.constraint_schema
     AND k.constraint_name = tc.constraint_name
    WHERE tc.constraint_type = 'UNIQUE'
      AND tc.table_schema = current_schema()
      AND tc.table_name = $1
    ORDER BY tc.constraint_name, k.ordinal_position";

#[derive(Debug, Clone, Copy)]
pub struct PostgresDriver {
    connect_timeout: Duration,
}

impl Default for PostgresDriver {
    fn default() -> Self {
        PostgresDriver {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl PostgresDriver {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn config(&self, descriptor: &ConnectionDescriptor, endpoint: &Endpoint) -> Config {
        let mut config = Config::new();
        config
            .host(&endpoint.host)
            .port(endpoint.port.unwrap_or(5432))
            .dbname(&descriptor.database_name)
            .application_name("schemagraph")
            .connect_timeout(self.connect_timeout);
        if !descriptor.credentials.username.is_empty() {
            config.user(&descriptor.credentials.username);
        }
        if !descriptor.credentials.password.is_empty() {
            config.password(&descriptor.credentials.password);
        }
        config
    }
}

impl Driver for PostgresDriver {
    fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        endpoint: &Endpoint,
    ) -> Result<Session, IntrospectError> {
        let client = self
            .config(descriptor, endpoint)
            .connect(NoTls)
            .map_err(|e| IntrospectError::connection(endpoint, e))?;
        Ok(Session::Relational(Box::new(PostgresCatalog {
            client,
            label: format!("postgresql session {endpoint}/{}", descriptor.database_name),
        })))
    }
}

struct PostgresCatalog {
    client: Client,
    label: String,
}

impl PostgresCatalog {
    fn columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>, postgres::Error> {
        self.client
            .query(LIST_COLUMNS, &[&table])?
            .iter()
            .map(|row| {
                Ok(ColumnInfo {
                    name: row.try_get(0)?,
                    data_type: row.try_get(1)?,
                    not_null: row.try_get::<_, String>(2)? == "NO",
                    default_value: row.try_get(3)?,
                    primary_key: row.try_get(4)?,
                })
            })
            .collect()
    }

    fn foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyInfo>, postgres::Error> {
        self.client
            .query(LIST_FOREIGN_KEYS, &[&table])?
            .iter()
            .map(|row| {
                Ok(ForeignKeyInfo {
                    column: row.try_get(0)?,
                    referenced_table: row.try_get(1)?,
                    referenced_column: row.try_get(2)?,
                })
            })
            .collect()
    }

    fn unique_columns(&mut self, table: &str) -> Result<Vec<String>, postgres::Error> {
        let pairs = self
            .client
            .query(LIST_UNIQUE, &[&table])?
            .iter()
            .map(|row| Ok((row.try_get(0)?, row.try_get(1)?)))
            .collect::<Result<Vec<(String, String)>, postgres::Error>>()?;
        Ok(single_column_keys(pairs))
    }
}

impl Close for PostgresCatalog {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn close(self: Box<Self>) -> Result<(), IntrospectError> {
        let PostgresCatalog { client, label } = *self;
        client
            .close()
            .map_err(|e| IntrospectError::connection(format!("closing {label}"), e))
    }
}

impl CatalogSource for PostgresCatalog {
    fn list_tables(&mut self) -> Result<Vec<String>, IntrospectError> {
        let rows = self
            .client
            .query(LIST_TABLES, &[])
            .map_err(|e| IntrospectError::introspection("listing tables", e))?;
        rows.iter()
            .map(|row| row.try_get::<_, String>(0))
            .collect::<Result<Vec<_>, _>>()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Credentials;
    use crate::drivers::tests::closed_port;
    use schemagraph_core::EngineKind;

    #[test]
    fn test_config_carries_descriptor_fields() {
        let descriptor = ConnectionDescriptor::new(EngineKind::Postgresql, "db.internal", "shop")
            .with_credentials(Credentials::new("reader", "hunter2"));
        let config = PostgresDriver::default().config(&descriptor, &descriptor.endpoint());

        assert_eq!(config.get_ports(), [5432]);
        assert_eq!(config.get_dbname(), Some("shop"));
        assert_eq!(config.get_user(), Some("reader"));
        assert_eq!(config.get_password(), Some(&b"hunter2"[..]));
    }

    #[test]
    fn test_tunnel_endpoint_overrides_descriptor_address() {
        let descriptor = ConnectionDescriptor::new(EngineKind::Postgresql, "db.internal", "shop");
        let local = Endpoint {
            host: "127.0.0.1".into(),
            port: Some(40123),
        };
        let config = PostgresDriver::default().config(&descriptor, &local);
        assert_eq!(config.get_ports(), [40123]);
        assert_eq!(config.get_user(), None);
    }

    #[test]
    fn test_refused_connection_is_connection_error() {
        let descriptor =
            ConnectionDescriptor::new(EngineKind::Postgresql, "127.0.0.1", "shop").with_port(closed_port());
        let err = PostgresDriver::default()
            .with_connect_timeout(Duration::from_secs(2))
            .connect(&descriptor, &descriptor.endpoint())
            .err()
            .unwrap();
        assert!(matches!(err, IntrospectError::Connection(_)), "{err:?}");
    }
}
