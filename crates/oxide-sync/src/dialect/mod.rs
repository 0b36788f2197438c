//! Dialect-specific DDL synthesis.
//!
//! A [`DdlDialect`] knows how one database spells identifiers, column types
//! and structural statements. Every `*_sql` method returns one statement;
//! callers pair a create with its drop so that each change can be undone.
//! The `plan_*` methods build whole operations (create a table, rename a
//! column, swap a primary key) on a working copy of the table and append the
//! resulting up/down pairs to a [`Changeset`]. Their default bodies live in
//! [`plan`] so dialect overrides can still fall back to the shared steps.

pub mod hana;
pub mod mysql;
pub mod plan;
pub mod postgres;

pub use hana::HanaDialect;
pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;

use crate::context::{SchemaContext, TablePath};
use crate::error::{Result, SyncError};
use crate::naming::NamingStrategy;
use crate::schema::{
    Table, TableCheck, TableColumn, TableExclusion, TableForeignKey, TableIndex, TableUnique,
    View,
};
use crate::statement::{Changeset, Statement};

/// Supported database families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectKind {
    /// MySQL and MariaDB.
    MySql,
    /// PostgreSQL.
    Postgres,
    /// SAP HANA.
    Hana,
}

impl DialectKind {
    /// Human-readable dialect name used in error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MySql => "MySql",
            Self::Postgres => "PostgreSQL",
            Self::Hana => "SAP HANA",
        }
    }

    /// Detects the dialect from a connection URL scheme.
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split_once(':').map_or(url, |(s, _)| s);
        match scheme.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "postgres" | "postgresql" => Some(Self::Postgres),
            "hana" | "sap" => Some(Self::Hana),
            _ => None,
        }
    }
}

/// What a dialect can express natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct DialectFeatures {
    /// Named unique constraints. Without them uniqueness becomes a unique index.
    pub unique_constraints: bool,
    /// Check constraints.
    pub check_constraints: bool,
    /// Exclusion constraints.
    pub exclusion_constraints: bool,
    /// Schemas as namespaces.
    pub schemas: bool,
    /// Databases can be created and dropped.
    pub databases: bool,
    /// Enum values live in separate types.
    pub enum_types: bool,
    /// Sequences back increment columns.
    pub sequences: bool,
    /// DDL participates in transactions.
    pub transactional_ddl: bool,
    /// Statements must be funnelled through one FIFO queue.
    pub serialized_queries: bool,
    /// Referencing foreign keys block primary key changes.
    pub referential_guard: bool,
    /// Indices are declared inside `CREATE TABLE`.
    pub inline_indices: bool,
    /// Materialized views.
    pub materialized_views: bool,
    /// Auto-increment must be cleared before touching the primary key.
    pub increment_guard: bool,
}

/// Transaction isolation levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    /// `READ UNCOMMITTED`
    ReadUncommitted,
    /// `READ COMMITTED`
    ReadCommitted,
    /// `REPEATABLE READ`
    RepeatableRead,
    /// `SERIALIZABLE`
    Serializable,
}

impl IsolationLevel {
    /// Returns the SQL spelling.
    #[must_use]
    pub const fn to_sql(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

/// Naming strategy and schema defaults handed to every planner.
#[derive(Debug, Clone, Copy)]
pub struct DdlContext<'a> {
    /// Derives constraint and index names.
    pub naming: &'a dyn NamingStrategy,
    /// Current database and schema.
    pub schema: &'a SchemaContext,
}

/// Options for creating a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateTableOptions {
    /// Create the declared foreign keys.
    pub foreign_keys: bool,
    /// Create the declared indices.
    pub indices: bool,
}

impl Default for CreateTableOptions {
    fn default() -> Self {
        Self {
            foreign_keys: true,
            indices: true,
        }
    }
}

/// Options for dropping a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropTableOptions {
    /// Drop the foreign keys first.
    pub foreign_keys: bool,
    /// Drop the indices first.
    pub indices: bool,
}

impl Default for DropTableOptions {
    fn default() -> Self {
        Self {
            foreign_keys: true,
            indices: true,
        }
    }
}

/// Quotes a string literal.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Makes every `is_unique` column explicit as a unique constraint, or as a
/// unique index when `as_indices` is set. Columns already covered by a
/// single-column unique index or constraint are left alone.
pub fn materialize_unique_columns(table: &mut Table, naming: &dyn NamingStrategy, as_indices: bool) {
    let unique_columns: Vec<String> = table
        .columns
        .iter()
        .filter(|c| c.is_unique)
        .map(|c| c.name.clone())
        .collect();
    for column in unique_columns {
        let covered = table
            .indices
            .iter()
            .any(|i| i.is_unique && i.is_single_column(&column))
            || table
                .uniques
                .iter()
                .any(|u| u.column_names.len() == 1 && u.column_names[0] == column);
        if covered {
            continue;
        }
        let columns = vec![column];
        let name = naming.unique_constraint_name(&table.name, &columns);
        if as_indices {
            table.indices.push(TableIndex::new(name, columns).unique());
        } else {
            table.uniques.push(TableUnique::new(name, columns));
        }
    }
}

/// Compares computed column expressions in their normalized form.
pub fn expression_changed<D: DdlDialect + ?Sized>(
    dialect: &D,
    old: &TableColumn,
    new: &TableColumn,
) -> bool {
    let expression = |c: &TableColumn| {
        c.as_expression
            .as_deref()
            .map(|e| dialect.normalize_expression(e))
    };
    expression(old) != expression(new)
}

/// Compares the attributes every dialect renders into a column definition.
pub fn base_definition_changed<D: DdlDialect + ?Sized>(
    dialect: &D,
    old: &TableColumn,
    new: &TableColumn,
) -> bool {
    let default = |c: &TableColumn| c.default.as_deref().map(|d| dialect.normalize_default(d));
    dialect.normalize_type(old) != dialect.normalize_type(new)
        || dialect.effective_length(old) != dialect.effective_length(new)
        || dialect.effective_precision(old) != dialect.effective_precision(new)
        || old.scale != new.scale
        || old.is_array != new.is_array
        || old.is_nullable != new.is_nullable
        || default(old) != default(new)
        || old.is_generated != new.is_generated
        || old.generation_strategy != new.generation_strategy
        || old.enum_values != new.enum_values
        || expression_changed(dialect, old, new)
        || old.generated_type != new.generated_type
        || old.spatial_feature_type != new.spatial_feature_type
        || old.srid != new.srid
}

/// DDL generation for one database family.
#[allow(unused_variables)]
pub trait DdlDialect: Send + Sync + std::fmt::Debug {
    /// Which family this is.
    fn kind(&self) -> DialectKind;

    /// Dialect name for messages.
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Native capabilities.
    fn features(&self) -> DialectFeatures;

    /// Quotes one identifier.
    fn escape(&self, identifier: &str) -> String;

    /// Renders a path, quoting each part unless `escape` is off.
    ///
    /// Unescaped paths are used where the raw dotted name is embedded in a
    /// string, e.g. as a catalog query parameter.
    fn build_path(&self, path: &TablePath, escape: bool) -> String {
        if !escape {
            return path.qualified();
        }
        match &path.namespace {
            Some(ns) => format!("{}.{}", self.escape(ns), self.escape(&path.name)),
            None => self.escape(&path.name),
        }
    }

    /// Quotes a dotted table or view path as given.
    fn escape_path(&self, path: &str) -> String {
        self.build_path(&TablePath::parse(path), true)
    }

    /// Quotes and joins column names.
    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.escape(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Bind placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String {
        "?".to_string()
    }

    /// Namespace that unqualified table names resolve to.
    fn default_namespace<'c>(&self, ctx: &'c SchemaContext) -> Option<&'c str> {
        ctx.schema.as_deref()
    }

    /// Splits `path` and fills in the default namespace.
    fn resolve_path(&self, ctx: &SchemaContext, path: &str) -> TablePath {
        TablePath::parse(path).or_namespace(self.default_namespace(ctx))
    }

    /// Canonical spelling of the column's type.
    fn normalize_type(&self, column: &TableColumn) -> String;

    /// Canonical spelling of a default expression, so declared and
    /// introspected defaults compare equal.
    fn normalize_default(&self, default: &str) -> String;

    /// Canonical spelling of a computed column expression. Catalogs hand
    /// expressions back rewritten, so they are only ever compared in this
    /// form.
    fn normalize_expression(&self, expression: &str) -> String {
        expression.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Length assumed when a column of `data_type` has none.
    fn default_length(&self, data_type: &str) -> Option<&'static str> {
        None
    }

    /// Length that takes effect for the column.
    fn effective_length(&self, column: &TableColumn) -> Option<String> {
        column
            .length
            .clone()
            .or_else(|| self.default_length(&self.normalize_type(column)).map(str::to_string))
    }

    /// Precision that differs from what the type gives by default.
    fn effective_precision(&self, column: &TableColumn) -> Option<u32> {
        column.precision
    }

    /// Full type, including length, precision and enum values.
    fn column_type(&self, ctx: &DdlContext<'_>, table: &Table, column: &TableColumn) -> String;

    /// Column definition as used in `CREATE TABLE` and `ADD`.
    fn column_definition(&self, ctx: &DdlContext<'_>, table: &Table, column: &TableColumn)
        -> String;

    /// Returns true if the two columns need DDL to go from one to the other.
    /// Names, key membership and uniqueness are compared by the planners.
    fn is_definition_changed(&self, old: &TableColumn, new: &TableColumn) -> bool {
        base_definition_changed(self, old, new)
    }

    /// Statements opening a transaction.
    fn start_transaction_sql(&self, isolation: Option<IsolationLevel>) -> Vec<String>;

    /// Commit statement.
    fn commit_sql(&self) -> &'static str {
        "COMMIT"
    }

    /// Rollback statement.
    fn rollback_sql(&self) -> &'static str {
        "ROLLBACK"
    }

    /// `CREATE TABLE`, optionally with its foreign keys.
    fn create_table_sql(
        &self,
        ctx: &DdlContext<'_>,
        table: &Table,
        create_foreign_keys: bool,
    ) -> Statement;

    /// `DROP TABLE`.
    fn drop_table_sql(&self, table: &Table) -> Statement {
        Statement::new(format!("DROP TABLE {}", self.escape_path(&table.name)))
    }

    /// `CREATE VIEW`.
    fn create_view_sql(&self, view: &View) -> Statement {
        Statement::new(format!(
            "CREATE VIEW {} AS {}",
            self.escape_path(&view.name),
            view.expression
        ))
    }

    /// `DROP VIEW`.
    fn drop_view_sql(&self, view: &View) -> Statement {
        Statement::new(format!("DROP VIEW {}", self.escape_path(&view.name)))
    }

    /// `CREATE INDEX`.
    fn create_index_sql(&self, table: &Table, index: &TableIndex) -> Statement;

    /// `DROP INDEX`.
    fn drop_index_sql(&self, table: &Table, index: &TableIndex) -> Statement;

    /// Renames an index.
    fn rename_index_sql(&self, table: &Table, old_name: &str, new_name: &str) -> Statement;

    /// Name of the table's current primary key constraint.
    fn primary_key_name(&self, ctx: &DdlContext<'_>, table: &Table) -> String {
        let columns = table.primary_column_names();
        table
            .primary_columns()
            .find_map(|c| c.primary_key_constraint_name.clone())
            .unwrap_or_else(|| ctx.naming.primary_key_name(&table.name, &columns))
    }

    /// Adds a primary key over `columns`.
    fn create_primary_key_sql(
        &self,
        ctx: &DdlContext<'_>,
        table: &Table,
        columns: &[String],
        name: Option<&str>,
    ) -> Statement;

    /// Drops the table's primary key.
    fn drop_primary_key_sql(&self, ctx: &DdlContext<'_>, table: &Table) -> Statement;

    /// Adds a unique constraint.
    fn create_unique_sql(&self, table: &Table, unique: &TableUnique) -> Result<Statement> {
        Err(SyncError::unsupported(
            self.name(),
            "unique constraints",
            Some("unique indices"),
        ))
    }

    /// Drops a unique constraint.
    fn drop_unique_sql(&self, table: &Table, unique: &TableUnique) -> Result<Statement> {
        Err(SyncError::unsupported(
            self.name(),
            "unique constraints",
            Some("unique indices"),
        ))
    }

    /// Adds a check constraint.
    fn create_check_sql(&self, table: &Table, check: &TableCheck) -> Result<Statement> {
        Err(SyncError::unsupported(self.name(), "check constraints", None))
    }

    /// Drops a check constraint.
    fn drop_check_sql(&self, table: &Table, check: &TableCheck) -> Result<Statement> {
        Err(SyncError::unsupported(self.name(), "check constraints", None))
    }

    /// Adds an exclusion constraint.
    fn create_exclusion_sql(&self, table: &Table, exclusion: &TableExclusion) -> Result<Statement> {
        Err(SyncError::unsupported(
            self.name(),
            "exclusion constraints",
            None,
        ))
    }

    /// Drops an exclusion constraint.
    fn drop_exclusion_sql(&self, table: &Table, exclusion: &TableExclusion) -> Result<Statement> {
        Err(SyncError::unsupported(
            self.name(),
            "exclusion constraints",
            None,
        ))
    }

    /// `ALTER TABLE ... RENAME CONSTRAINT`.
    fn rename_constraint_sql(&self, table: &Table, old_name: &str, new_name: &str) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} RENAME CONSTRAINT {} TO {}",
            self.escape_path(&table.name),
            self.escape(old_name),
            self.escape(new_name)
        ))
    }

    /// The `FOREIGN KEY ... REFERENCES ...` clause.
    fn foreign_key_clause(&self, foreign_key: &TableForeignKey) -> String {
        let mut sql = format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            self.column_list(&foreign_key.column_names),
            self.escape_path(&foreign_key.referenced_table_name),
            self.column_list(&foreign_key.referenced_column_names)
        );
        sql.push_str(" ON DELETE ");
        sql.push_str(foreign_key.on_delete.to_sql());
        sql.push_str(" ON UPDATE ");
        sql.push_str(foreign_key.on_update.to_sql());
        sql
    }

    /// Adds a foreign key.
    fn create_foreign_key_sql(&self, table_path: &str, foreign_key: &TableForeignKey) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} {}",
            self.escape_path(table_path),
            self.escape(&foreign_key.name),
            self.foreign_key_clause(foreign_key)
        ))
    }

    /// Drops a foreign key.
    fn drop_foreign_key_sql(&self, table_path: &str, foreign_key: &TableForeignKey) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.escape_path(table_path),
            self.escape(&foreign_key.name)
        ))
    }

    /// Renames a table; both paths are full names.
    fn rename_table_sql(&self, old_path: &str, new_path: &str) -> Statement;

    /// Adds a column.
    fn add_column_sql(&self, ctx: &DdlContext<'_>, table: &Table, column: &TableColumn)
        -> Statement;

    /// Drops a column.
    fn drop_column_sql(&self, table: &Table, column: &TableColumn) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.escape_path(&table.name),
            self.escape(&column.name)
        ))
    }

    /// Renames `column` to `new_name`.
    fn rename_column_sql(
        &self,
        ctx: &DdlContext<'_>,
        table: &Table,
        column: &TableColumn,
        new_name: &str,
    ) -> Statement;

    /// Rewrites a column's definition from `from` to `to` in place.
    fn alter_column_sql(
        &self,
        ctx: &DdlContext<'_>,
        table: &Table,
        from: &TableColumn,
        to: &TableColumn,
    ) -> Statement;

    /// Sets or clears a column comment as a separate statement. Dialects that
    /// keep the comment in the column definition return `None`.
    fn comment_column_sql(
        &self,
        table: &Table,
        column: &str,
        comment: Option<&str>,
    ) -> Option<Statement> {
        None
    }

    /// `CREATE SCHEMA`.
    fn create_schema_sql(&self, schema: &str) -> Result<Statement> {
        Err(SyncError::unsupported(self.name(), "schemas", Some("databases")))
    }

    /// `DROP SCHEMA`.
    fn drop_schema_sql(&self, schema: &str, cascade: bool) -> Result<Statement> {
        Err(SyncError::unsupported(self.name(), "schemas", Some("databases")))
    }

    /// `CREATE DATABASE`.
    fn create_database_sql(&self, database: &str) -> Result<Statement> {
        Err(SyncError::unsupported(self.name(), "databases", Some("schemas")))
    }

    /// `DROP DATABASE`.
    fn drop_database_sql(&self, database: &str) -> Result<Statement> {
        Err(SyncError::unsupported(self.name(), "databases", Some("schemas")))
    }

    /// Removes all rows of a table.
    fn clear_table_sql(&self, table_path: &str) -> Statement {
        Statement::new(format!("TRUNCATE TABLE {}", self.escape_path(table_path)))
    }

    /// Drops every listed view and table.
    fn clear_database_sql(&self, views: &[View], tables: &[String]) -> Vec<Statement> {
        views
            .iter()
            .map(|v| self.drop_view_sql(v))
            .chain(
                tables
                    .iter()
                    .map(|t| Statement::new(format!("DROP TABLE {}", self.escape_path(t)))),
            )
            .collect()
    }

    /// Creates a table with its indices, unique constraints and comments.
    fn plan_create_table(
        &self,
        ctx: &DdlContext<'_>,
        table: &mut Table,
        options: CreateTableOptions,
        plan: &mut Changeset,
    ) -> Result<()> {
        plan::create_table(self, ctx, table, options, plan)
    }

    /// Drops a table, its indices and foreign keys first when asked to.
    fn plan_drop_table(
        &self,
        ctx: &DdlContext<'_>,
        table: &Table,
        options: DropTableOptions,
        plan: &mut Changeset,
    ) -> Result<()> {
        plan::drop_table(self, ctx, table, options, plan)
    }

    /// Renames a table and every dependent object whose name was derived
    /// from the old table name.
    fn plan_rename_table(
        &self,
        ctx: &DdlContext<'_>,
        table: &mut Table,
        new_name: &str,
        plan: &mut Changeset,
    ) -> Result<()> {
        plan::rename_table(self, ctx, table, new_name, plan)
    }

    /// Renames a column and its derived dependents.
    fn plan_rename_column(
        &self,
        ctx: &DdlContext<'_>,
        table: &mut Table,
        old_name: &str,
        new_name: &str,
        plan: &mut Changeset,
    ) -> Result<()> {
        plan::rename_column(self, ctx, table, old_name, new_name, plan)
    }

    /// Renames sequences and types owned by the table. Runs after the table
    /// or column rename and before constraint renames.
    fn plan_rename_owned(
        &self,
        ctx: &DdlContext<'_>,
        before: &Table,
        after: &Table,
        plan: &mut Changeset,
    ) -> Result<()> {
        Ok(())
    }

    /// Renames an index.
    fn plan_rename_index(
        &self,
        table: &Table,
        old_name: &str,
        new_name: &str,
        plan: &mut Changeset,
    ) -> Result<()> {
        plan.push(
            self.rename_index_sql(table, old_name, new_name),
            self.rename_index_sql(table, new_name, old_name),
        );
        Ok(())
    }

    /// Renames a foreign key; `old` and `new` differ only by name.
    fn plan_rename_foreign_key(
        &self,
        table: &Table,
        old: &TableForeignKey,
        new: &TableForeignKey,
        plan: &mut Changeset,
    ) -> Result<()> {
        plan.push(
            self.rename_constraint_sql(table, &old.name, &new.name),
            self.rename_constraint_sql(table, &new.name, &old.name),
        );
        Ok(())
    }

    /// Renames the primary key constraint.
    fn plan_rename_primary_key(
        &self,
        ctx: &DdlContext<'_>,
        table: &Table,
        old_name: &str,
        new_name: &str,
        plan: &mut Changeset,
    ) -> Result<()> {
        plan.push(
            self.rename_constraint_sql(table, old_name, new_name),
            self.rename_constraint_sql(table, new_name, old_name),
        );
        Ok(())
    }

    /// Renames a unique, check or exclusion constraint.
    fn plan_rename_constraint(
        &self,
        table: &Table,
        old_name: &str,
        new_name: &str,
        plan: &mut Changeset,
    ) -> Result<()> {
        plan.push(
            self.rename_constraint_sql(table, old_name, new_name),
            self.rename_constraint_sql(table, new_name, old_name),
        );
        Ok(())
    }

    /// Adds a column, extending the primary key or uniqueness as declared.
    fn plan_add_column(
        &self,
        ctx: &DdlContext<'_>,
        table: &mut Table,
        column: &TableColumn,
        plan: &mut Changeset,
    ) -> Result<()> {
        plan::add_column(self, ctx, table, column, plan)
    }

    /// Drops a column and everything that depends on it.
    fn plan_drop_column(
        &self,
        ctx: &DdlContext<'_>,
        table: &mut Table,
        column_name: &str,
        plan: &mut Changeset,
    ) -> Result<()> {
        plan::drop_column(self, ctx, table, column_name, plan)
    }

    /// Changes a column in place. Type-incompatible changes never get here.
    fn plan_change_column(
        &self,
        ctx: &DdlContext<'_>,
        table: &mut Table,
        old: &TableColumn,
        new: &TableColumn,
        plan: &mut Changeset,
    ) -> Result<()> {
        plan::change_column(self, ctx, table, old, new, plan)
    }

    /// Replaces the primary key with one over `columns`.
    fn plan_update_primary_keys(
        &self,
        ctx: &DdlContext<'_>,
        table: &mut Table,
        columns: &[String],
        plan: &mut Changeset,
    ) -> Result<()> {
        plan::update_primary_keys(self, ctx, table, columns, plan)
    }

    /// Drops the primary key.
    fn plan_drop_primary_key(
        &self,
        ctx: &DdlContext<'_>,
        table: &mut Table,
        plan: &mut Changeset,
    ) -> Result<()> {
        plan::drop_primary_key(self, ctx, table, plan)
    }

    /// Adds or removes single-column uniqueness on `column`.
    fn plan_column_unique(
        &self,
        ctx: &DdlContext<'_>,
        table: &mut Table,
        column: &str,
        unique: bool,
        plan: &mut Changeset,
    ) -> Result<()> {
        plan::column_unique(self, ctx, table, column, unique, plan)
    }

    /// Types a column change would park under a temporary name. They must
    /// not exist yet, or a previous change was left half-finished.
    fn parked_types(
        &self,
        ctx: &DdlContext<'_>,
        table: &Table,
        old: &TableColumn,
        new: &TableColumn,
    ) -> Vec<TablePath> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::DefaultNamingStrategy;

    #[test]
    fn test_kind_from_url() {
        assert_eq!(
            DialectKind::from_url("postgres://localhost/app"),
            Some(DialectKind::Postgres)
        );
        assert_eq!(
            DialectKind::from_url("mysql://root@localhost/app"),
            Some(DialectKind::MySql)
        );
        assert_eq!(DialectKind::from_url("hana://h:30015"), Some(DialectKind::Hana));
        assert_eq!(DialectKind::from_url("sqlite::memory:"), None);
    }

    #[test]
    fn test_materialize_unique_columns() {
        let naming = DefaultNamingStrategy::new();
        let mut table = Table::new("user")
            .column(TableColumn::new("email", "varchar").unique())
            .column(TableColumn::new("login", "varchar").unique())
            .index(TableIndex::new("UQ_login", ["login"]).unique());

        materialize_unique_columns(&mut table, &naming, true);
        assert_eq!(table.indices.len(), 2);
        assert!(table.indices[1].is_unique);
        assert_eq!(table.indices[1].column_names, vec!["email"]);

        // Idempotent.
        materialize_unique_columns(&mut table, &naming, true);
        assert_eq!(table.indices.len(), 2);
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("it's"), "'it''s'");
    }
}
