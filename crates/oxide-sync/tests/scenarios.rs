//! End-to-end scenarios through the public runner API.

mod common;

use std::sync::Arc;

use serde_json::{json, Value};

use common::{mysql, postgres, FakeDatabase};
use oxide_sync::prelude::*;

fn user_table() -> Table {
    Table::new("user")
        .column(
            TableColumn::new("id", "int")
                .primary()
                .generated(GenerationStrategy::Increment),
        )
        .column(TableColumn::new("email", "varchar").length("255").unique())
}

// =============================================================================
// MySQL create and drop
// =============================================================================

#[tokio::test]
async fn mysql_create_table_inlines_one_unique_index() {
    let db = Arc::new(FakeDatabase::new());
    let mut runner = mysql(&db);

    runner
        .create_table(user_table(), false, CreateTableOptions::default())
        .await
        .unwrap();

    let statements = db.statements();
    assert_eq!(statements.len(), 1);
    let create = &statements[0];
    assert!(create.starts_with("CREATE TABLE `user`"));
    assert_eq!(create.matches("UNIQUE INDEX").count(), 1);
    assert!(create.contains("(`email`)"));
    assert!(create.contains("PRIMARY KEY (`id`)"));

    runner.enable_sql_memory();
    runner
        .drop_table("user".into(), false, DropTableOptions::default())
        .await
        .unwrap();
    assert_eq!(runner.sql_memory().up[0].sql, "DROP TABLE `user`");
}

// =============================================================================
// PostgreSQL nullability flip
// =============================================================================

#[tokio::test]
async fn postgres_not_null_flip_is_a_single_pair() {
    let db = Arc::new(FakeDatabase::new());
    let mut runner = postgres(&db);
    let table = Table::new("user")
        .column(TableColumn::new("id", "int").primary())
        .column(TableColumn::new("email", "varchar").nullable());

    runner.enable_sql_memory();
    runner
        .change_column(table.into(), "email".into(), TableColumn::new("email", "varchar"))
        .await
        .unwrap();

    let memory = runner.sql_memory();
    assert_eq!(memory.len(), 1);
    assert_eq!(
        memory.up[0].sql,
        "ALTER TABLE \"user\" ALTER COLUMN \"email\" SET NOT NULL"
    );
    assert_eq!(
        memory.down[0].sql,
        "ALTER TABLE \"user\" ALTER COLUMN \"email\" DROP NOT NULL"
    );
    assert!(db.statements().is_empty());
}

// =============================================================================
// Default schema resolution
// =============================================================================

#[tokio::test]
async fn qualified_and_bare_names_resolve_to_the_same_row() {
    let db = Arc::new(FakeDatabase::new().respond(
        "FROM information_schema.tables",
        json!([{"table_name": "user"}]),
    ));
    let mut runner = postgres(&db);

    assert!(runner.has_table("public.user").await.unwrap());
    assert!(runner.has_table("user").await.unwrap());

    let executed = db.executed();
    assert_eq!(executed.len(), 2);
    assert_eq!(executed[0], executed[1]);
    assert_eq!(db.parameters(0), db.parameters(1));
    assert_eq!(
        db.parameters(0),
        vec![Value::from("public"), Value::from("user")]
    );

    assert_eq!(runner.cache_key("public.user"), runner.cache_key("user"));
    assert_ne!(runner.cache_key("audit.user"), runner.cache_key("user"));
}
