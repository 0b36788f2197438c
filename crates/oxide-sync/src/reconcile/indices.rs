//! Index operations.

use tracing::info;

use super::{resolve_member, IndexRef, TableRef};
use crate::error::{Result, SyncError};
use crate::runner::QueryRunner;
use crate::schema::TableIndex;
use crate::statement::Changeset;

impl QueryRunner {
    /// Creates an index. A blank name is derived by the naming strategy.
    pub async fn create_index(&mut self, table: TableRef, index: TableIndex) -> Result<()> {
        self.create_indices(table, vec![index]).await
    }

    /// Creates indices in one batch.
    pub async fn create_indices(&mut self, table: TableRef, indices: Vec<TableIndex>) -> Result<()> {
        let mut table = self.resolve_table(table).await?;
        let previous = table.name.clone();
        let mut plan = Changeset::new();
        for mut index in indices {
            if index.name.is_empty() {
                index.name = self.naming.index_name(
                    &table.name,
                    &index.column_names,
                    index.where_clause.as_deref(),
                );
            }
            info!(table = %previous, index = %index.name, "Creating index");
            plan.push(
                self.dialect.create_index_sql(&table, &index),
                self.dialect.drop_index_sql(&table, &index),
            );
            table.indices.push(index);
        }
        self.commit_table(&previous, table, plan).await
    }

    /// Drops an index.
    pub async fn drop_index(&mut self, table: TableRef, index: IndexRef) -> Result<()> {
        self.drop_indices(table, vec![index]).await
    }

    /// Drops indices in one batch.
    pub async fn drop_indices(&mut self, table: TableRef, indices: Vec<IndexRef>) -> Result<()> {
        let mut table = self.resolve_table(table).await?;
        let previous = table.name.clone();
        let mut plan = Changeset::new();
        for reference in indices {
            let index = resolve_member(reference, &table.indices, |name| SyncError::IndexNotFound {
                table: table.name.clone(),
                index: name,
            })?;
            info!(table = %previous, index = %index.name, "Dropping index");
            plan.push(
                self.dialect.drop_index_sql(&table, &index),
                self.dialect.create_index_sql(&table, &index),
            );
            table.remove_index(&index.name);
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
    use crate::schema::{Table, TableColumn, TableIndex};
    use crate::testing::{runner, ScriptedConnection};

    fn article() -> Table {
        Table::new("article")
            .column(TableColumn::new("id", "int").primary())
            .column(TableColumn::new("slug", "varchar").length("64"))
            .index(TableIndex::new("IDX_slug", ["slug"]))
    }

    #[tokio::test]
    async fn test_partial_index_name_includes_predicate() {
        let conn = Arc::new(ScriptedConnection::new());
        let mut runner = runner(&conn, PostgresDialect::new(), RunnerOptions::new().with_schema("public"));

        runner
            .create_indices(
                article().into(),
                vec![
                    TableIndex::new("", ["slug"]),
                    TableIndex::new("", ["slug"]).where_clause("\"id\" > 10"),
                ],
            )
            .await
            .unwrap();

        let cached = runner.schema_cache().table("article").unwrap();
        assert_eq!(cached.indices.len(), 3);
        assert!(cached.indices[1].name.starts_with("IDX_"));
        assert_ne!(cached.indices[1].name, cached.indices[2].name);
        assert!(conn.statements()[1].ends_with("(\"slug\") WHERE \"id\" > 10"));
    }

    #[tokio::test]
    async fn test_drop_index_on_mysql() {
        let conn = Arc::new(ScriptedConnection::new());
        let mut runner = runner(&conn, MySqlDialect::new(), RunnerOptions::new().with_database("app"));

        runner
            .drop_index(article().into(), "IDX_slug".into())
            .await
            .unwrap();
        assert_eq!(conn.statements(), vec!["DROP INDEX `IDX_slug` ON `article`"]);

        let err = runner
            .drop_index("article".into(), "IDX_slug".into())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::IndexNotFound { .. }));
    }
}
