//! Views and their metadata rows.

use tracing::info;

use super::ViewRef;
use crate::dialect::CreateTableOptions;
use crate::error::Result;
use crate::runner::QueryRunner;
use crate::schema::View;
use crate::statement::Changeset;

impl QueryRunner {
    /// Creates a view and records its definition in the metadata table,
    /// creating that table first if needed.
    pub async fn create_view(&mut self, view: View) -> Result<()> {
        if view.materialized {
            self.require(
                self.dialect.features().materialized_views,
                "materialized views",
                Some("views"),
            )?;
        }
        let metadata = self.metadata.table();
        self.create_table(metadata, true, CreateTableOptions::default())
            .await?;
        info!(view = %view.name, "Creating view");

        let mut plan = Changeset::new();
        plan.push(
            self.dialect.create_view_sql(&view),
            self.dialect.drop_view_sql(&view),
        );
        plan.push(
            self.metadata
                .insert_view(self.dialect.as_ref(), &self.context, &view),
            self.metadata
                .delete_view(self.dialect.as_ref(), &self.context, &view),
        );
        self.execute_queries(plan).await?;
        self.replace_cached_view(view);
        Ok(())
    }

    /// Drops a view and its metadata row.
    pub async fn drop_view(&mut self, view: ViewRef) -> Result<()> {
        let view = self.resolve_view(view).await?;
        info!(view = %view.name, "Dropping view");

        let mut plan = Changeset::new();
        plan.push(
            self.dialect.drop_view_sql(&view),
            self.dialect.create_view_sql(&view),
        );
        plan.push(
            self.metadata
                .delete_view(self.dialect.as_ref(), &self.context, &view),
            self.metadata
                .insert_view(self.dialect.as_ref(), &self.context, &view),
        );
        self.execute_queries(plan).await?;
        self.forget_cached_view(&view.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use crate::config::RunnerOptions;
    use crate::dialect::{MySqlDialect, PostgresDialect};
    use crate::error::SyncError;
    use crate::schema::View;
    use crate::testing::{runner, ScriptedConnection};

    #[tokio::test]
    async fn test_create_view_writes_metadata_row() {
        let conn = Arc::new(ScriptedConnection::new().respond(
            "FROM information_schema.tables",
            json!([{"table_name": "oxide_metadata"}]),
        ));
        let mut runner = runner(&conn, PostgresDialect::new(), RunnerOptions::new().with_schema("public"));

        runner
            .create_view(View::new("active_user", "SELECT * FROM \"user\" WHERE \"active\""))
            .await
            .unwrap();

        let statements = conn.statements();
        assert_eq!(
            statements[0],
            "CREATE VIEW \"active_user\" AS SELECT * FROM \"user\" WHERE \"active\""
        );
        assert!(statements[1].starts_with("INSERT INTO \"oxide_metadata\""));
        let index = conn
            .executed()
            .iter()
            .position(|sql| sql.starts_with("INSERT INTO"))
            .unwrap();
        assert_eq!(
            conn.parameters(index),
            vec![
                Value::from("VIEW"),
                Value::from("public"),
                Value::from("active_user"),
                Value::from("SELECT * FROM \"user\" WHERE \"active\""),
            ]
        );
        assert!(runner.schema_cache().view("active_user").is_some());
    }

    #[tokio::test]
    async fn test_create_view_creates_missing_metadata_table() {
        let conn = Arc::new(ScriptedConnection::new());
        let mut runner = runner(&conn, MySqlDialect::new(), RunnerOptions::new().with_database("app"));

        runner
            .create_view(View::new("recent", "SELECT 1"))
            .await
            .unwrap();

        let statements = conn.statements();
        assert!(statements[0].starts_with("CREATE TABLE `oxide_metadata`"));
        assert_eq!(statements[1], "CREATE VIEW `recent` AS SELECT 1");
    }

    #[tokio::test]
    async fn test_materialized_view_needs_support() {
        let conn = Arc::new(ScriptedConnection::new());
        let mut runner = runner(&conn, MySqlDialect::new(), RunnerOptions::new().with_database("app"));

        let err = runner
            .create_view(View::new("totals", "SELECT 1").materialized())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Unsupported { .. }));
        assert!(conn.executed().is_empty());
    }

    #[tokio::test]
    async fn test_drop_view_by_value_removes_row() {
        let conn = Arc::new(ScriptedConnection::new());
        let mut runner = runner(&conn, PostgresDialect::new(), RunnerOptions::new().with_schema("public"));

        runner
            .drop_view(View::new("active_user", "SELECT 1").into())
            .await
            .unwrap();

        let statements = conn.statements();
        assert_eq!(statements[0], "DROP VIEW \"active_user\"");
        assert!(statements[1].starts_with("DELETE FROM \"oxide_metadata\""));
    }
}
