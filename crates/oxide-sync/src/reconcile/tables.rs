//! Table lifecycle: create, drop, rename and clear.

use tracing::{debug, info};

use super::TableRef;
use crate::dialect::{CreateTableOptions, DropTableOptions};
use crate::error::Result;
use crate::runner::{QueryRunner, SchemaSnapshot};
use crate::schema::Table;
use crate::statement::Changeset;

impl QueryRunner {
    /// Creates a table together with its indices, unique constraints and
    /// comments. With `if_not_exist`, an existing table is left untouched.
    pub async fn create_table(
        &mut self,
        table: Table,
        if_not_exist: bool,
        options: CreateTableOptions,
    ) -> Result<()> {
        if if_not_exist && self.has_table(&table.name).await? {
            debug!(table = %table.name, "Table exists, skipping");
            return Ok(());
        }
        info!(table = %table.name, "Creating table");

        let mut created = table;
        let mut plan = Changeset::new();
        self.dialect
            .plan_create_table(&self.ddl(), &mut created, options, &mut plan)?;
        let name = created.name.clone();
        self.commit_table(&name, created, plan).await
    }

    /// Drops a table. With `if_exist`, a missing table is not an error.
    pub async fn drop_table(
        &mut self,
        table: TableRef,
        if_exist: bool,
        options: DropTableOptions,
    ) -> Result<()> {
        if if_exist && !self.has_table(table.name()).await? {
            debug!(table = %table.name(), "Table does not exist, skipping");
            return Ok(());
        }
        let table = self.resolve_table(table).await?;
        info!(table = %table.name, "Dropping table");

        let mut plan = Changeset::new();
        self.dialect
            .plan_drop_table(&self.ddl(), &table, options, &mut plan)?;
        self.execute_queries(plan).await?;
        self.forget_cached_table(&table.name);
        Ok(())
    }

    /// Renames a table and every index, key and constraint whose name was
    /// derived from the old table name.
    pub async fn rename_table(&mut self, table: TableRef, new_name: &str) -> Result<()> {
        let mut table = self.resolve_table(table).await?;
        let previous = table.name.clone();
        info!(table = %previous, new_name = %new_name, "Renaming table");

        let keys = self.blocking_keys(&previous).await?;
        let mut plan = Changeset::new();
        self.dialect
            .plan_rename_table(&self.ddl(), &mut table, new_name, &mut plan)?;
        let plan = self.guard_plan(&keys, Some(table.name.as_str()), plan);
        self.commit_table(&previous, table, plan).await
    }

    /// Removes every row of a table.
    pub async fn clear_table(&mut self, table: &str) -> Result<()> {
        info!(table = %table, "Clearing table");
        let statement = self.dialect.clear_table_sql(table);
        self.query(&statement.sql, &statement.parameters).await?;
        Ok(())
    }

    /// Drops every view and table of the default namespace.
    ///
    /// Runs in a transaction of its own unless one is open. When a statement
    /// fails the rollback is best-effort and the statement's error is what
    /// the caller sees.
    pub async fn clear_database(&mut self) -> Result<()> {
        let conn = self.connect().await?;
        let views = self.dialect.list_views(conn.as_ref(), &self.context).await?;
        let tables = self.dialect.table_names(conn.as_ref(), &self.context).await?;
        info!(views = views.len(), tables = tables.len(), "Clearing database");
        let statements = self.dialect.clear_database_sql(&views, &tables);

        let owns_transaction = !self.is_transaction_active();
        if owns_transaction {
            self.start_transaction(None).await?;
        }
        let mut outcome = Ok(());
        for statement in &statements {
            if let Err(err) = self.query(&statement.sql, &statement.parameters).await {
                outcome = Err(err);
                break;
            }
        }

        if let Err(err) = outcome {
            if owns_transaction {
                if let Err(rollback) = self.rollback_transaction().await {
                    debug!(error = %rollback, "Ignoring failed rollback");
                }
            }
            return Err(err);
        }
        if owns_transaction {
            self.commit_transaction().await?;
        }
        self.cache.update(SchemaSnapshot::clear);
        Ok(())
    }
}
