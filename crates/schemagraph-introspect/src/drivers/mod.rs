//! Built-in drivers.
//!
//! - [`SqliteDriver`]: reads a SQLite file's catalog, opened read-only.
//! - [`PostgresDriver`] and [`MysqlDriver`]: read `information_schema` over
//!   the network.
//! - [`MongodbDriver`]: samples a live server, or an export directory when
//!   the host is a local path.
//! - [`ExtendedJsonDriver`]: reads a document export directory laid out as
//!   `<host>/<database>/<collection>.json|.jsonl`.

pub mod extjson;
pub mod mongodb;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use self::extjson::ExtendedJsonDriver;
pub use self::mongodb::MongodbDriver;
pub use self::mysql::MysqlDriver;
pub use self::postgres::PostgresDriver;
pub use self::sqlite::SqliteDriver;

/// Reduces `(constraint, column)` rows, grouped by constraint, to the
/// columns that are unique on their own. Composite keys are dropped.
pub(crate) fn single_column_keys(rows: Vec<(String, String)>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    let mut rows = rows.into_iter().peekable();
    while let Some((constraint, column)) = rows.next() {
        let mut width = 1;
        while rows.peek().is_some_and(|(next, _)| *next == constraint) {
            rows.next();
            width += 1;
        }
        if width == 1 && !columns.contains(&column) {
            columns.push(column);
        }
    }
    columns
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A local port with nothing listening on it.
    pub(crate) fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    fn rows(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(c, col)| (c.to_string(), col.to_string()))
            .collect()
    }

    #[test]
    fn test_single_column_keys_skip_composites() {
        let keys = single_column_keys(rows(&[
            ("uq_email", "email"),
            ("uq_pair", "tenant_id"),
            ("uq_pair", "slug"),
            ("uq_slug", "slug"),
            ("uq_email_again", "email"),
        ]));
        assert_eq!(keys, ["email", "slug"]);
    }
}
