//! Column operations.

use tracing::info;

use super::{resolve_member, ColumnRef, ObjectRef, TableRef};
use crate::dialect::expression_changed;
use crate::error::{Result, SyncError};
use crate::introspect::Catalog;
use crate::runner::QueryRunner;
use crate::schema::{Table, TableColumn};
use crate::statement::Changeset;

/// One column change: the current definition and the wanted one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnChange {
    /// Current definition.
    pub from: TableColumn,
    /// Wanted definition.
    pub to: TableColumn,
}

impl ColumnChange {
    /// Creates a change.
    #[must_use]
    pub const fn new(from: TableColumn, to: TableColumn) -> Self {
        Self { from, to }
    }
}

/// Returns true when the column cannot be altered in place and has to be
/// dropped and added again.
pub fn requires_rebuild(dialect: &dyn Catalog, old: &TableColumn, new: &TableColumn) -> bool {
    dialect.normalize_type(old) != dialect.normalize_type(new)
        || dialect.effective_length(old) != dialect.effective_length(new)
        || old.is_array != new.is_array
        || old.generated_type != new.generated_type
        || (new.generated_type.is_some() && expression_changed(dialect, old, new))
}

fn column_not_found(table: &Table) -> impl FnOnce(String) -> SyncError + '_ {
    move |column| SyncError::ColumnNotFound {
        table: table.name.clone(),
        column,
    }
}

impl QueryRunner {
    /// Adds a column. A primary column joins the primary key; a unique
    /// column gets its unique constraint or index.
    pub async fn add_column(&mut self, table: TableRef, column: TableColumn) -> Result<()> {
        let mut table = self.resolve_table(table).await?;
        let previous = table.name.clone();
        info!(table = %previous, column = %column.name, "Adding column");

        let keys = if column.is_primary {
            self.blocking_keys(&previous).await?
        } else {
            Vec::new()
        };
        let mut plan = Changeset::new();
        self.dialect
            .plan_add_column(&self.ddl(), &mut table, &column, &mut plan)?;
        let plan = self.guard_plan(&keys, None, plan);
        self.commit_table(&previous, table, plan).await
    }

    /// Adds columns one after the other.
    pub async fn add_columns(&mut self, table: TableRef, columns: Vec<TableColumn>) -> Result<()> {
        let mut target = table;
        for column in columns {
            let name = target.name().to_string();
            self.add_column(target, column).await?;
            target = ObjectRef::ByName(name);
        }
        Ok(())
    }

    /// Drops a column with its indices, keys and constraints.
    pub async fn drop_column(&mut self, table: TableRef, column: ColumnRef) -> Result<()> {
        let mut table = self.resolve_table(table).await?;
        let column = resolve_member(column, &table.columns, column_not_found(&table))?;
        let previous = table.name.clone();
        info!(table = %previous, column = %column.name, "Dropping column");

        let keys = if column.is_primary {
            self.blocking_keys(&previous).await?
        } else {
            Vec::new()
        };
        let mut plan = Changeset::new();
        self.dialect
            .plan_drop_column(&self.ddl(), &mut table, &column.name, &mut plan)?;
        let plan = self.guard_plan(&keys, None, plan);
        self.commit_table(&previous, table, plan).await
    }

    /// Drops columns one after the other.
    pub async fn drop_columns(&mut self, table: TableRef, columns: Vec<ColumnRef>) -> Result<()> {
        let mut target = table;
        for column in columns {
            let name = target.name().to_string();
            self.drop_column(target, column).await?;
            target = ObjectRef::ByName(name);
        }
        Ok(())
    }

    /// Renames a column. `new` is either a full definition or just the new
    /// name, in which case the old definition is kept.
    pub async fn rename_column(
        &mut self,
        table: TableRef,
        old: ColumnRef,
        new: ColumnRef,
    ) -> Result<()> {
        let table = self.resolve_table(table).await?;
        let old = resolve_member(old, &table.columns, column_not_found(&table))?;
        let new = match new {
            ObjectRef::ByValue(column) => column,
            ObjectRef::ByName(name) => old.renamed(&name),
        };
        self.change_column(ObjectRef::ByValue(table), ObjectRef::ByValue(old), new)
            .await
    }

    /// Changes a column.
    ///
    /// A change of type, length, array-ness or generated expression drops
    /// the column and adds it back. Anything else is altered in place.
    pub async fn change_column(
        &mut self,
        table: TableRef,
        old: ColumnRef,
        new: TableColumn,
    ) -> Result<()> {
        let mut table = self.resolve_table(table).await?;
        let old = resolve_member(old, &table.columns, column_not_found(&table))?;
        let previous = table.name.clone();
        info!(table = %previous, column = %old.name, "Changing column");

        let rebuild = requires_rebuild(self.dialect.as_ref(), &old, &new);
        let touches_key = if rebuild {
            old.is_primary || new.is_primary
        } else {
            old.is_primary != new.is_primary
        };
        let keys = if touches_key {
            self.blocking_keys(&previous).await?
        } else {
            Vec::new()
        };

        let mut plan = Changeset::new();
        if rebuild {
            self.dialect
                .plan_drop_column(&self.ddl(), &mut table, &old.name, &mut plan)?;
            self.dialect
                .plan_add_column(&self.ddl(), &mut table, &new, &mut plan)?;
        } else {
            self.ensure_no_parked_types(&table, &old, &new).await?;
            self.dialect
                .plan_change_column(&self.ddl(), &mut table, &old, &new, &mut plan)?;
        }
        let plan = self.guard_plan(&keys, None, plan);
        self.commit_table(&previous, table, plan).await
    }

    /// Changes columns one after the other.
    pub async fn change_columns(
        &mut self,
        table: TableRef,
        changes: Vec<ColumnChange>,
    ) -> Result<()> {
        let mut target = table;
        for change in changes {
            let name = target.name().to_string();
            self.change_column(target, ObjectRef::ByValue(change.from), change.to)
                .await?;
            target = ObjectRef::ByName(name);
        }
        Ok(())
    }

    /// Fails when a type the change would park under a temporary name
    /// already exists, which means an earlier change never finished.
    async fn ensure_no_parked_types(
        &mut self,
        table: &Table,
        old: &TableColumn,
        new: &TableColumn,
    ) -> Result<()> {
        let parked = self.dialect.parked_types(&self.ddl(), table, old, new);
        if parked.is_empty() {
            return Ok(());
        }
        let conn = self.connect().await?;
        for path in parked {
            if self
                .dialect
                .has_type(conn.as_ref(), &self.context, &path)
                .await?
            {
                return Err(SyncError::StaleEnumType(path.qualified()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::config::RunnerOptions;
    use crate::dialect::{MySqlDialect, PostgresDialect};
    use crate::testing::{runner, ScriptedConnection};

    fn user() -> Table {
        Table::new("user")
            .column(TableColumn::new("id", "integer").primary())
            .column(TableColumn::new("email", "varchar").length("255"))
            .column(TableColumn::new("age", "integer").nullable())
    }

    fn postgres(conn: &Arc<ScriptedConnection>) -> QueryRunner {
        runner(conn, PostgresDialect::new(), RunnerOptions::new().with_schema("public"))
    }

    #[test]
    fn test_requires_rebuild() {
        let dialect = PostgresDialect::new();
        let int = TableColumn::new("a", "int4");
        assert!(!requires_rebuild(&dialect, &int, &TableColumn::new("a", "integer")));
        assert!(requires_rebuild(&dialect, &int, &TableColumn::new("a", "bigint")));
        assert!(requires_rebuild(&dialect, &int, &TableColumn::new("a", "int4").array()));
        assert!(!requires_rebuild(&dialect, &int, &TableColumn::new("a", "int4").nullable()));
    }

    #[tokio::test]
    async fn test_add_existing_column_fails_before_any_statement() {
        let conn = Arc::new(ScriptedConnection::new());
        let mut runner = postgres(&conn);

        let err = runner
            .add_column(user().into(), TableColumn::new("email", "text"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ColumnExists { .. }));
        assert!(conn.executed().is_empty());
    }

    #[tokio::test]
    async fn test_type_change_drops_and_adds() {
        let conn = Arc::new(ScriptedConnection::new());
        let mut runner = postgres(&conn);

        runner
            .change_column(user().into(), "age".into(), TableColumn::new("age", "bigint").nullable())
            .await
            .unwrap();

        assert_eq!(
            conn.statements(),
            vec![
                "ALTER TABLE \"user\" DROP COLUMN \"age\"",
                "ALTER TABLE \"user\" ADD \"age\" bigint",
            ]
        );
        let cached = runner.schema_cache().table("user").unwrap();
        assert_eq!(cached.find_column("age").unwrap().data_type, "bigint");
    }

    #[tokio::test]
    async fn test_rename_by_name_keeps_definition() {
        let conn = Arc::new(ScriptedConnection::new());
        let mut runner = postgres(&conn);

        runner
            .rename_column(user().into(), "email".into(), "mail".into())
            .await
            .unwrap();

        assert_eq!(
            conn.statements(),
            vec!["ALTER TABLE \"user\" RENAME COLUMN \"email\" TO \"mail\""]
        );
        let cached = runner.schema_cache().table("user").unwrap();
        assert_eq!(cached.find_column("mail").unwrap().length.as_deref(), Some("255"));
    }

    #[tokio::test]
    async fn test_leftover_old_enum_type_is_refused() {
        let conn = Arc::new(
            ScriptedConnection::new().respond("FROM pg_type", json!([{"typname": "user_status_enum_old"}])),
        );
        let mut runner = postgres(&conn);
        let table = user().column(TableColumn::new("status", "enum").enum_values(["a", "b"]));

        let err = runner
            .change_column(
                table.into(),
                "status".into(),
                TableColumn::new("status", "enum").enum_values(["a", "b", "c"]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::StaleEnumType(name) if name == "user_status_enum_old"));
        assert!(conn.statements().is_empty());
    }

    #[tokio::test]
    async fn test_drop_missing_column() {
        let conn = Arc::new(ScriptedConnection::new());
        let mut runner = runner(&conn, MySqlDialect::new(), RunnerOptions::new().with_database("app"));

        let err = runner
            .drop_column(user().into(), "nickname".into())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Column \"nickname\" was not found in table \"user\""
        );
    }
}
