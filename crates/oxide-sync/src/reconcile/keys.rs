//! Primary and foreign keys.

use tracing::info;

use super::{resolve_member, ForeignKeyRef, TableRef};
use crate::dialect::plan::column_of;
use crate::error::{Result, SyncError};
use crate::runner::QueryRunner;
use crate::schema::TableForeignKey;
use crate::statement::Changeset;

impl QueryRunner {
    /// Creates a primary key on a table that has none.
    pub async fn create_primary_key(
        &mut self,
        table: TableRef,
        columns: &[String],
        constraint_name: Option<&str>,
    ) -> Result<()> {
        let mut table = self.resolve_table(table).await?;
        if table.primary_columns().next().is_some() {
            return Err(SyncError::InvalidDefinition(format!(
                "Table \"{}\" already has a primary key",
                table.name
            )));
        }
        for name in columns {
            column_of(&table, name)?;
        }
        let previous = table.name.clone();
        info!(table = %previous, columns = ?columns, "Creating primary key");

        let keys = self.blocking_keys(&previous).await?;
        let up = self
            .dialect
            .create_primary_key_sql(&self.ddl(), &table, columns, constraint_name);
        for column in &mut table.columns {
            if columns.contains(&column.name) {
                column.is_primary = true;
                column.primary_key_constraint_name = constraint_name.map(str::to_string);
            }
        }
        let down = self.dialect.drop_primary_key_sql(&self.ddl(), &table);

        let mut plan = Changeset::new();
        plan.push(up, down);
        let plan = self.guard_plan(&keys, None, plan);
        self.commit_table(&previous, table, plan).await
    }

    /// Replaces the primary key with one over `columns`.
    pub async fn update_primary_keys(&mut self, table: TableRef, columns: &[String]) -> Result<()> {
        let mut table = self.resolve_table(table).await?;
        let previous = table.name.clone();
        info!(table = %previous, columns = ?columns, "Updating primary key");

        let keys = self.blocking_keys(&previous).await?;
        let mut plan = Changeset::new();
        self.dialect
            .plan_update_primary_keys(&self.ddl(), &mut table, columns, &mut plan)?;
        let plan = self.guard_plan(&keys, None, plan);
        self.commit_table(&previous, table, plan).await
    }

    /// Drops the primary key.
    pub async fn drop_primary_key(&mut self, table: TableRef) -> Result<()> {
        let mut table = self.resolve_table(table).await?;
        let previous = table.name.clone();
        info!(table = %previous, "Dropping primary key");

        let keys = self.blocking_keys(&previous).await?;
        let mut plan = Changeset::new();
        self.dialect
            .plan_drop_primary_key(&self.ddl(), &mut table, &mut plan)?;
        let plan = self.guard_plan(&keys, None, plan);
        self.commit_table(&previous, table, plan).await
    }

    /// Creates a foreign key. A blank name is derived by the naming strategy.
    pub async fn create_foreign_key(
        &mut self,
        table: TableRef,
        foreign_key: TableForeignKey,
    ) -> Result<()> {
        self.create_foreign_keys(table, vec![foreign_key]).await
    }

    /// Creates foreign keys in one batch.
    pub async fn create_foreign_keys(
        &mut self,
        table: TableRef,
        foreign_keys: Vec<TableForeignKey>,
    ) -> Result<()> {
        let mut table = self.resolve_table(table).await?;
        let previous = table.name.clone();
        let mut plan = Changeset::new();
        for mut foreign_key in foreign_keys {
            if foreign_key.name.is_empty() {
                foreign_key.name = self.naming.foreign_key_name(
                    &table.name,
                    &foreign_key.column_names,
                    &foreign_key.referenced_table_name,
                    &foreign_key.referenced_column_names,
                );
            }
            info!(table = %previous, foreign_key = %foreign_key.name, "Creating foreign key");
            plan.push(
                self.dialect.create_foreign_key_sql(&table.name, &foreign_key),
                self.dialect.drop_foreign_key_sql(&table.name, &foreign_key),
            );
            table.foreign_keys.push(foreign_key);
        }
        self.commit_table(&previous, table, plan).await
    }

    /// Drops a foreign key.
    pub async fn drop_foreign_key(
        &mut self,
        table: TableRef,
        foreign_key: ForeignKeyRef,
    ) -> Result<()> {
        self.drop_foreign_keys(table, vec![foreign_key]).await
    }

    /// Drops foreign keys in one batch.
    pub async fn drop_foreign_keys(
        &mut self,
        table: TableRef,
        foreign_keys: Vec<ForeignKeyRef>,
    ) -> Result<()> {
        let mut table = self.resolve_table(table).await?;
        let previous = table.name.clone();
        let mut plan = Changeset::new();
        for reference in foreign_keys {
            let foreign_key = resolve_member(reference, &table.foreign_keys, |name| {
                SyncError::ForeignKeyNotFound {
                    table: table.name.clone(),
                    foreign_key: name,
                }
            })?;
            info!(table = %previous, foreign_key = %foreign_key.name, "Dropping foreign key");
            plan.push(
                self.dialect.drop_foreign_key_sql(&table.name, &foreign_key),
                self.dialect.create_foreign_key_sql(&table.name, &foreign_key),
            );
            table.remove_foreign_key(&foreign_key.name);
        }
        self.commit_table(&previous, table, plan).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::config::RunnerOptions;
    use crate::dialect::{MySqlDialect, PostgresDialect};
    use crate::error::SyncError;
    use crate::schema::{ForeignKeyAction, GenerationStrategy, Table, TableColumn, TableForeignKey};
    use crate::testing::{runner, ScriptedConnection};

    fn post() -> Table {
        Table::new("post")
            .column(TableColumn::new("id", "int").primary())
            .column(TableColumn::new("author_id", "int"))
            .foreign_key(
                TableForeignKey::new("FK_author", ["author_id"], "user", ["id"])
                    .on_delete(ForeignKeyAction::Cascade),
            )
    }

    #[tokio::test]
    async fn test_drop_primary_key_clears_auto_increment_first() {
        let conn = Arc::new(ScriptedConnection::new());
        let mut runner = runner(&conn, MySqlDialect::new(), RunnerOptions::new().with_database("app"));
        let table = Table::new("counter")
            .column(
                TableColumn::new("id", "int")
                    .primary()
                    .generated(GenerationStrategy::Increment),
            )
            .column(TableColumn::new("tenant", "int").primary());

        runner.drop_primary_key(table.into()).await.unwrap();

        let statements = conn.statements();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("ALTER TABLE `counter` CHANGE `id` `id` int NOT NULL"));
        assert!(!statements[0].contains("AUTO_INCREMENT"));
        assert_eq!(statements[1], "ALTER TABLE `counter` DROP PRIMARY KEY");
    }

    #[tokio::test]
    async fn test_drop_primary_key_without_one() {
        let conn = Arc::new(ScriptedConnection::new());
        let mut runner = runner(&conn, PostgresDialect::new(), RunnerOptions::new().with_schema("public"));

        let err = runner
            .drop_primary_key(Table::new("log").column(TableColumn::new("line", "text")).into())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::PrimaryKeyNotFound(name) if name == "log"));
    }

    #[tokio::test]
    async fn test_foreign_keys_by_name() {
        let conn = Arc::new(ScriptedConnection::new());
        let mut runner = runner(&conn, PostgresDialect::new(), RunnerOptions::new().with_schema("public"));

        runner
            .drop_foreign_key(post().into(), "FK_author".into())
            .await
            .unwrap();
        assert_eq!(
            conn.statements(),
            vec!["ALTER TABLE \"post\" DROP CONSTRAINT \"FK_author\""]
        );
        assert!(runner.schema_cache().table("post").unwrap().foreign_keys.is_empty());

        let err = runner
            .drop_foreign_key("post".into(), "FK_author".into())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ForeignKeyNotFound { .. }));
    }

    #[tokio::test]
    async fn test_unnamed_foreign_key_gets_derived_name() {
        let conn = Arc::new(ScriptedConnection::new());
        let mut runner = runner(&conn, PostgresDialect::new(), RunnerOptions::new().with_schema("public"));
        let mut table = post();
        table.foreign_keys.clear();

        runner
            .create_foreign_key(
                table.into(),
                TableForeignKey::new("", ["author_id"], "user", ["id"]),
            )
            .await
            .unwrap();

        let cached = runner.schema_cache().table("post").unwrap();
        assert!(cached.foreign_keys[0].name.starts_with("FK_"));
        assert!(conn.statements()[0].contains("REFERENCES \"user\" (\"id\")"));
    }
}
