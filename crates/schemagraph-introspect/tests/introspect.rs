//! End-to-end introspection through the built-in drivers.

use std::fs;

use rusqlite::Connection;

use schemagraph_core::{EngineKind, NodeKind};
use schemagraph_introspect::{
    ConnectionDescriptor, IntrospectError, IntrospectOptions, Introspector, SqliteDriver,
};

fn export_dir(collections: &[(&str, &str)]) -> (tempfile::TempDir, ConnectionDescriptor) {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("store");
    fs::create_dir(&db).unwrap();
    for (file, body) in collections {
        fs::write(db.join(file), body).unwrap();
    }
    let descriptor = ConnectionDescriptor::new(
        EngineKind::Mongodb,
        dir.path().to_string_lossy().into_owned(),
        "store",
    );
    (dir, descriptor)
}

#[test]
fn zero_collections_yield_empty_graph() {
    let (_dir, descriptor) = export_dir(&[]);
    let graph = Introspector::with_builtin_drivers()
        .introspect(&descriptor)
        .unwrap();
    assert!(graph.nodes.is_empty());
    assert!(graph.edges.is_empty());
    assert_eq!(graph.metadata.engine_kind, Some(EngineKind::Mongodb));
}

#[test]
fn document_export_infers_fields_layout_and_relationships() {
    let (_dir, descriptor) = export_dir(&[
        (
            "orders.jsonl",
            r#"{"_id":{"$oid":"65a000000000000000000010"},"userId":{"$oid":"65a000000000000000000001"},"couponId":"SPRING","total":{"$numberDecimal":"12.50"}}"#,
        ),
        (
            "users.json",
            r#"[{"_id":{"$oid":"65a000000000000000000001"},"email":"ada@example.com","createdAt":{"$date":"2024-01-01T00:00:00Z"}}]"#,
        ),
        ("audit.jsonl", ""),
    ]);

    let graph = Introspector::with_builtin_drivers()
        .introspect(&descriptor)
        .unwrap();

    let labels: Vec<&str> = graph.nodes.iter().map(|n| n.label.as_str()).collect();
    assert_eq!(labels, ["audit", "orders", "users"]);
    assert!(graph.nodes.iter().all(|n| n.kind == NodeKind::DocumentCollection));

    let positions: Vec<(f64, f64)> = graph.nodes.iter().map(|n| (n.position.x, n.position.y)).collect();
    assert_eq!(positions, [(50.0, 50.0), (350.0, 50.0), (650.0, 50.0)]);

    let audit = graph.node_by_label("audit").unwrap();
    assert_eq!(audit.fields.len(), 1);
    assert!(audit.fields[0].is_primary_key);

    let users = graph.node_by_label("users").unwrap();
    assert_eq!(users.field_named("createdAt").unwrap().field_type, "Date");
    let orders = graph.node_by_label("orders").unwrap();
    assert_eq!(orders.field_named("total").unwrap().field_type, "Number");

    // userId -> users; couponId has no "coupon(s)" collection.
    assert_eq!(graph.edges.len(), 1);
    let edge = &graph.edges[0];
    assert_eq!(edge.source_node_id.as_str(), "orders");
    assert_eq!(edge.target_node_id.as_str(), "users");
    assert_eq!(edge.source_handle.as_deref(), Some("orders.userId"));
    assert_eq!(edge.target_handle.as_deref(), Some("users._id"));
    assert!(orders.field_named("userId").unwrap().is_foreign_key);
    assert!(!orders.field_named("couponId").unwrap().is_foreign_key);
    assert!(graph.check_integrity().is_ok());
}

#[test]
fn relationship_inference_can_be_disabled() {
    let (_dir, descriptor) = export_dir(&[
        ("orders.jsonl", r#"{"userId": 1}"#),
        ("users.jsonl", r#"{"name": "x"}"#),
    ]);
    let graph = Introspector::with_builtin_drivers()
        .with_options(IntrospectOptions {
            infer_relationships: false,
            ..Default::default()
        })
        .introspect(&descriptor)
        .unwrap();
    assert_eq!(graph.nodes.len(), 2);
    assert!(graph.edges.is_empty());
}

#[test]
fn sqlite_catalog_uses_declared_keys_and_falls_back_to_names() {
    let dir = tempfile::tempdir().unwrap();
    let conn = Connection::open(dir.path().join("shop.sqlite")).unwrap();
    conn.execute_batch(
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, email TEXT NOT NULL UNIQUE);
         CREATE TABLE products (sku TEXT PRIMARY KEY, name TEXT);
         CREATE TABLE orders (
             id INTEGER PRIMARY KEY,
             customer_id INTEGER NOT NULL REFERENCES customers(id),
             product_id TEXT
         );
         CREATE TABLE reviews (id INTEGER PRIMARY KEY, product_id TEXT, body TEXT);",
    )
    .unwrap();
    drop(conn);

    let descriptor = ConnectionDescriptor::new(
        EngineKind::Sqlite,
        dir.path().to_string_lossy().into_owned(),
        "shop.sqlite",
    );
    let graph = Introspector::with_builtin_drivers()
        .introspect(&descriptor)
        .unwrap();

    assert!(graph.nodes.iter().all(|n| n.kind == NodeKind::RelationalTable));
    let orders = graph.node_by_label("orders").unwrap();
    let customer_id = orders.field_named("customer_id").unwrap();
    assert!(customer_id.is_foreign_key && !customer_id.is_nullable);
    assert!(!orders.field_named("product_id").unwrap().is_foreign_key);
    let reviews = graph.node_by_label("reviews").unwrap();
    assert!(reviews.field_named("product_id").unwrap().is_foreign_key);
    assert!(graph
        .node_by_label("customers")
        .unwrap()
        .field_named("email")
        .unwrap()
        .is_unique);

    let mut pairs: Vec<(String, String, Option<String>)> = graph
        .edges
        .iter()
        .map(|e| {
            (
                e.source_node_id.to_string(),
                e.target_node_id.to_string(),
                e.target_handle.clone(),
            )
        })
        .collect();
    pairs.sort();
    // orders declares a foreign key, so its product_id is not guessed;
    // reviews declares none, so the naming heuristic applies.
    assert_eq!(
        pairs,
        [
            ("orders".to_string(), "customers".to_string(), Some("customers.id".to_string())),
            ("reviews".to_string(), "products".to_string(), Some("products.sku".to_string())),
        ]
    );
}

#[test]
fn engine_without_driver_is_unsupported() {
    let descriptor = ConnectionDescriptor::new(EngineKind::Postgresql, "db.internal", "shop");
    let err = Introspector::new()
        .with_driver(EngineKind::Sqlite, SqliteDriver)
        .introspect(&descriptor)
        .unwrap_err();
    assert!(matches!(err, IntrospectError::UnsupportedEngine(EngineKind::Postgresql)));
}

#[test]
fn builtin_drivers_cover_every_engine() {
    let introspector = Introspector::with_builtin_drivers();
    for kind in EngineKind::ALL {
        assert!(introspector.supports(kind), "{kind}");
    }
}

#[test]
fn unreachable_relational_server_is_connection_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    for kind in [EngineKind::Postgresql, EngineKind::Mysql] {
        let descriptor = ConnectionDescriptor::new(kind, "127.0.0.1", "shop").with_port(port);
        let err = Introspector::with_builtin_drivers()
            .introspect(&descriptor)
            .unwrap_err();
        assert!(matches!(err, IntrospectError::Connection(_)), "{kind}: {err:?}");
    }
}
