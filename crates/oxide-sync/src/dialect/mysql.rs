//! MySQL / MariaDB DDL.

use std::sync::LazyLock;

use regex::Regex;

use super::plan::prepared;
use super::{
    base_definition_changed, quote_literal, DdlContext, DdlDialect, DialectFeatures, DialectKind,
    IsolationLevel,
};
use crate::context::SchemaContext;
use crate::error::Result;
use crate::schema::{GeneratedType, Table, TableColumn, TableForeignKey, TableIndex, View};
use crate::statement::{Changeset, Statement};

static CURRENT_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:current_timestamp|now|localtimestamp)(?:\((\d*)\))?$")
        .expect("valid timestamp pattern")
});

/// MySQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn index_kind(index: &TableIndex) -> &'static str {
        if index.is_unique {
            "UNIQUE "
        } else if index.is_spatial {
            "SPATIAL "
        } else if index.is_fulltext {
            "FULLTEXT "
        } else {
            ""
        }
    }
}

fn has_length(data_type: &str) -> bool {
    matches!(data_type, "varchar" | "char" | "binary" | "varbinary")
}

fn has_precision(data_type: &str) -> bool {
    matches!(
        data_type,
        "decimal" | "float" | "double" | "datetime" | "timestamp" | "time"
    )
}

impl DdlDialect for MySqlDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::MySql
    }

    fn features(&self) -> DialectFeatures {
        DialectFeatures {
            unique_constraints: false,
            check_constraints: false,
            exclusion_constraints: false,
            schemas: false,
            databases: true,
            enum_types: false,
            sequences: false,
            transactional_ddl: false,
            serialized_queries: false,
            referential_guard: false,
            inline_indices: true,
            materialized_views: false,
            increment_guard: true,
        }
    }

    fn escape(&self, identifier: &str) -> String {
        format!("`{}`", identifier.replace('`', "``"))
    }

    fn default_namespace<'c>(&self, ctx: &'c SchemaContext) -> Option<&'c str> {
        ctx.database.as_deref()
    }

    fn normalize_type(&self, column: &TableColumn) -> String {
        let data_type = column.data_type.trim().to_ascii_lowercase();
        match data_type.as_str() {
            "integer" | "int4" => "int".to_string(),
            "dec" | "numeric" | "fixed" => "decimal".to_string(),
            "bool" | "boolean" => "tinyint".to_string(),
            "nvarchar" | "national varchar" | "string" | "uuid" => "varchar".to_string(),
            "nchar" | "national char" => "char".to_string(),
            "double precision" | "real" | "float8" => "double".to_string(),
            "simple-enum" => "enum".to_string(),
            _ => data_type,
        }
    }

    fn normalize_default(&self, default: &str) -> String {
        let trimmed = default.trim();
        match CURRENT_TIMESTAMP.captures(trimmed) {
            Some(caps) => match caps.get(1).map(|m| m.as_str()).filter(|p| !p.is_empty()) {
                Some(precision) => format!("CURRENT_TIMESTAMP({precision})"),
                None => "CURRENT_TIMESTAMP".to_string(),
            },
            None => trimmed.to_string(),
        }
    }

    fn default_length(&self, data_type: &str) -> Option<&'static str> {
        match data_type {
            "varchar" | "varbinary" => Some("255"),
            "char" | "binary" => Some("1"),
            _ => None,
        }
    }

    fn effective_length(&self, column: &TableColumn) -> Option<String> {
        if column.length.is_some() {
            return column.length.clone();
        }
        if column.data_type.eq_ignore_ascii_case("uuid") {
            return Some("36".to_string());
        }
        self.default_length(&self.normalize_type(column))
            .map(str::to_string)
    }

    fn is_definition_changed(&self, old: &TableColumn, new: &TableColumn) -> bool {
        let on_update = |c: &TableColumn| c.on_update.as_deref().map(|d| self.normalize_default(d));
        old.comment != new.comment
            || old.charset != new.charset
            || old.collation != new.collation
            || old.unsigned != new.unsigned
            || old.zerofill != new.zerofill
            || old.width != new.width
            || on_update(old) != on_update(new)
            || base_definition_changed(self, old, new)
    }

    fn column_type(&self, _ctx: &DdlContext<'_>, _table: &Table, column: &TableColumn) -> String {
        let data_type = self.normalize_type(column);
        if matches!(data_type.as_str(), "enum" | "set") {
            let values: Vec<String> = column
                .enum_values
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|v| quote_literal(v))
                .collect();
            return format!("{data_type}({})", values.join(","));
        }
        if has_length(&data_type) {
            if let Some(length) = self.effective_length(column) {
                return format!("{data_type}({length})");
            }
        }
        if has_precision(&data_type) {
            if let Some(precision) = column.precision {
                return match column.scale {
                    Some(scale) => format!("{data_type}({precision},{scale})"),
                    None => format!("{data_type}({precision})"),
                };
            }
        }
        match column.width {
            Some(width) => format!("{data_type}({width})"),
            None => data_type,
        }
    }

    fn column_definition(&self, ctx: &DdlContext<'_>, table: &Table, column: &TableColumn) -> String {
        let mut sql = format!(
            "{} {}",
            self.escape(&column.name),
            self.column_type(ctx, table, column)
        );
        if column.unsigned {
            sql.push_str(" UNSIGNED");
        }
        if column.zerofill {
            sql.push_str(" ZEROFILL");
        }
        if let Some(charset) = &column.charset {
            sql.push_str(&format!(" CHARACTER SET {charset}"));
        }
        if let Some(collation) = &column.collation {
            sql.push_str(&format!(" COLLATE {collation}"));
        }
        if let Some(expression) = &column.as_expression {
            let kind = column.generated_type.unwrap_or(GeneratedType::Virtual);
            sql.push_str(&format!(" AS ({expression}) {}", kind.to_sql()));
        }
        sql.push_str(if column.is_nullable { " NULL" } else { " NOT NULL" });
        if column.is_increment() {
            sql.push_str(" AUTO_INCREMENT");
        }
        if let Some(comment) = &column.comment {
            sql.push_str(&format!(" COMMENT {}", quote_literal(comment)));
        }
        if column.as_expression.is_none() {
            if let Some(default) = &column.default {
                sql.push_str(&format!(" DEFAULT {default}"));
            }
        }
        if let Some(on_update) = &column.on_update {
            sql.push_str(&format!(" ON UPDATE {on_update}"));
        }
        sql
    }

    fn start_transaction_sql(&self, isolation: Option<IsolationLevel>) -> Vec<String> {
        let mut statements = Vec::new();
        if let Some(level) = isolation {
            statements.push(format!("SET TRANSACTION ISOLATION LEVEL {}", level.to_sql()));
        }
        statements.push("START TRANSACTION".to_string());
        statements
    }

    fn create_table_sql(
        &self,
        ctx: &DdlContext<'_>,
        table: &Table,
        create_foreign_keys: bool,
    ) -> Statement {
        let table = prepared(self, ctx, table);
        let mut parts: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(ctx, &table, c))
            .collect();
        for index in &table.indices {
            parts.push(format!(
                "{}INDEX {} ({})",
                Self::index_kind(index),
                self.escape(&index.name),
                self.column_list(&index.column_names)
            ));
        }
        if create_foreign_keys {
            for foreign_key in &table.foreign_keys {
                parts.push(format!(
                    "CONSTRAINT {} {}",
                    self.escape(&foreign_key.name),
                    self.foreign_key_clause(foreign_key)
                ));
            }
        }
        let primary = table.primary_column_names();
        if !primary.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", self.column_list(&primary)));
        }

        let mut sql = format!(
            "CREATE TABLE {} ({})",
            self.escape_path(&table.name),
            parts.join(", ")
        );
        if let Some(engine) = &table.engine {
            sql.push_str(&format!(" ENGINE={engine}"));
        }
        Statement::new(sql)
    }

    fn create_index_sql(&self, table: &Table, index: &TableIndex) -> Statement {
        Statement::new(format!(
            "CREATE {}INDEX {} ON {} ({})",
            Self::index_kind(index),
            self.escape(&index.name),
            self.escape_path(&table.name),
            self.column_list(&index.column_names)
        ))
    }

    fn drop_index_sql(&self, table: &Table, index: &TableIndex) -> Statement {
        Statement::new(format!(
            "DROP INDEX {} ON {}",
            self.escape(&index.name),
            self.escape_path(&table.name)
        ))
    }

    fn rename_index_sql(&self, table: &Table, old_name: &str, new_name: &str) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} RENAME INDEX {} TO {}",
            self.escape_path(&table.name),
            self.escape(old_name),
            self.escape(new_name)
        ))
    }

    fn primary_key_name(&self, _ctx: &DdlContext<'_>, _table: &Table) -> String {
        "PRIMARY".to_string()
    }

    fn create_primary_key_sql(
        &self,
        _ctx: &DdlContext<'_>,
        table: &Table,
        columns: &[String],
        _name: Option<&str>,
    ) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} ADD PRIMARY KEY ({})",
            self.escape_path(&table.name),
            self.column_list(columns)
        ))
    }

    fn drop_primary_key_sql(&self, _ctx: &DdlContext<'_>, table: &Table) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} DROP PRIMARY KEY",
            self.escape_path(&table.name)
        ))
    }

    fn drop_foreign_key_sql(&self, table_path: &str, foreign_key: &TableForeignKey) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            self.escape_path(table_path),
            self.escape(&foreign_key.name)
        ))
    }

    fn rename_table_sql(&self, old_path: &str, new_path: &str) -> Statement {
        Statement::new(format!(
            "RENAME TABLE {} TO {}",
            self.escape_path(old_path),
            self.escape_path(new_path)
        ))
    }

    fn add_column_sql(&self, ctx: &DdlContext<'_>, table: &Table, column: &TableColumn) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} ADD {}",
            self.escape_path(&table.name),
            self.column_definition(ctx, table, column)
        ))
    }

    fn rename_column_sql(
        &self,
        ctx: &DdlContext<'_>,
        table: &Table,
        column: &TableColumn,
        new_name: &str,
    ) -> Statement {
        self.alter_column_sql(ctx, table, column, &column.renamed(new_name))
    }

    fn alter_column_sql(
        &self,
        ctx: &DdlContext<'_>,
        table: &Table,
        from: &TableColumn,
        to: &TableColumn,
    ) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} CHANGE {} {}",
            self.escape_path(&table.name),
            self.escape(&from.name),
            self.column_definition(ctx, table, to)
        ))
    }

    fn create_database_sql(&self, database: &str) -> Result<Statement> {
        Ok(Statement::new(format!(
            "CREATE DATABASE {}",
            self.escape(database)
        )))
    }

    fn drop_database_sql(&self, database: &str) -> Result<Statement> {
        Ok(Statement::new(format!("DROP DATABASE {}", self.escape(database))))
    }

    fn clear_database_sql(&self, views: &[View], tables: &[String]) -> Vec<Statement> {
        let mut statements = vec![Statement::new("SET FOREIGN_KEY_CHECKS = 0")];
        statements.extend(views.iter().map(|v| self.drop_view_sql(v)));
        statements.extend(
            tables
                .iter()
                .map(|t| Statement::new(format!("DROP TABLE {}", self.escape_path(t)))),
        );
        statements.push(Statement::new("SET FOREIGN_KEY_CHECKS = 1"));
        statements
    }

    fn plan_rename_foreign_key(
        &self,
        table: &Table,
        old: &TableForeignKey,
        new: &TableForeignKey,
        plan: &mut Changeset,
    ) -> Result<()> {
        // No RENAME CONSTRAINT; one ALTER keeps the swap atomic.
        let swap = |from: &TableForeignKey, to: &TableForeignKey| {
            Statement::new(format!(
                "ALTER TABLE {} DROP FOREIGN KEY {}, ADD CONSTRAINT {} {}",
                self.escape_path(&table.name),
                self.escape(&from.name),
                self.escape(&to.name),
                self.foreign_key_clause(to)
            ))
        };
        plan.push(swap(old, new), swap(new, old));
        Ok(())
    }

    fn plan_rename_primary_key(
        &self,
        _ctx: &DdlContext<'_>,
        _table: &Table,
        _old_name: &str,
        _new_name: &str,
        _plan: &mut Changeset,
    ) -> Result<()> {
        // The primary key is always called PRIMARY.
        Ok(())
    }
}
