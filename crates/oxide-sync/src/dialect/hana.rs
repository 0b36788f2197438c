//! SAP HANA DDL.
//!
//! HANA has no unique, check or exclusion constraints, so unique columns
//! become unique indices. Indices and constraints live in the schema rather
//! than the table, which is why their paths are built as siblings of the
//! table path. Constraint renames are expressed as drop and re-create.

use super::plan::prepared;
use super::{quote_literal, DdlContext, DdlDialect, DialectFeatures, DialectKind, IsolationLevel};
use crate::context::TablePath;
use crate::error::Result;
use crate::schema::{GenerationStrategy, Table, TableColumn, TableForeignKey, TableIndex, View};
use crate::statement::{Changeset, Statement};

/// SAP HANA dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct HanaDialect;

impl HanaDialect {
    /// Creates a new SAP HANA dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn sibling_path(&self, table: &Table, name: &str) -> String {
        self.build_path(&TablePath::parse(&table.name).sibling(name), true)
    }
}

pub(crate) fn has_length(data_type: &str) -> bool {
    matches!(
        data_type,
        "nvarchar" | "varchar" | "nchar" | "char" | "varbinary" | "binary" | "alphanum"
    )
}

impl DdlDialect for HanaDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Hana
    }

    fn features(&self) -> DialectFeatures {
        DialectFeatures {
            unique_constraints: false,
            check_constraints: false,
            exclusion_constraints: false,
            schemas: true,
            databases: false,
            enum_types: false,
            sequences: false,
            transactional_ddl: false,
            serialized_queries: true,
            referential_guard: true,
            inline_indices: false,
            materialized_views: false,
            increment_guard: false,
        }
    }

    fn escape(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    fn normalize_type(&self, column: &TableColumn) -> String {
        let data_type = column.data_type.trim().to_ascii_lowercase();
        match data_type.as_str() {
            "int" | "integer" => "integer",
            "varchar" | "nvarchar" | "string" | "uuid" => "nvarchar",
            "char" | "nchar" => "nchar",
            "float" | "double" | "double precision" => "double",
            "numeric" | "dec" | "decimal" => "decimal",
            "text" | "nclob" => "nclob",
            "datetime" | "timestamp" => "timestamp",
            "bool" | "boolean" => "boolean",
            _ => return data_type,
        }
        .to_string()
    }

    fn normalize_default(&self, default: &str) -> String {
        let value = default.trim();
        match value.to_ascii_lowercase().as_str() {
            "now()" | "current_timestamp" | "current_timestamp()" => {
                "CURRENT_TIMESTAMP".to_string()
            }
            _ => value.to_string(),
        }
    }

    fn default_length(&self, data_type: &str) -> Option<&'static str> {
        match data_type {
            "nvarchar" | "varchar" | "varbinary" => Some("255"),
            _ => None,
        }
    }

    fn effective_length(&self, column: &TableColumn) -> Option<String> {
        if column.length.is_none() && column.data_type.eq_ignore_ascii_case("uuid") {
            return Some("36".to_string());
        }
        column
            .length
            .clone()
            .or_else(|| self.default_length(&self.normalize_type(column)).map(str::to_string))
    }

    fn column_type(&self, _ctx: &DdlContext<'_>, _table: &Table, column: &TableColumn) -> String {
        let data_type = self.normalize_type(column);
        let mut rendered = data_type.clone();
        if has_length(&data_type) {
            if let Some(length) = self.effective_length(column) {
                rendered = format!("{data_type}({length})");
            }
        } else if data_type == "decimal" {
            match (column.precision, column.scale) {
                (Some(p), Some(s)) => rendered = format!("decimal({p},{s})"),
                (Some(p), None) => rendered = format!("decimal({p})"),
                _ => {}
            }
        }
        if column.is_array {
            rendered.push_str(" ARRAY");
        }
        rendered
    }

    fn column_definition(&self, ctx: &DdlContext<'_>, table: &Table, column: &TableColumn) -> String {
        let mut sql = format!(
            "{} {}",
            self.escape(&column.name),
            self.column_type(ctx, table, column)
        );
        if let Some(expression) = &column.as_expression {
            sql.push_str(&format!(" GENERATED ALWAYS AS {expression}"));
        } else if let Some(default) = &column.default {
            sql.push_str(&format!(" DEFAULT {default}"));
        }
        let identity = column.is_generated
            && matches!(
                column.generation_strategy,
                Some(GenerationStrategy::Increment | GenerationStrategy::Identity)
            );
        if identity {
            sql.push_str(" GENERATED BY DEFAULT AS IDENTITY");
        } else if column.is_nullable {
            sql.push_str(" NULL");
        } else {
            sql.push_str(" NOT NULL");
        }
        sql
    }

    /// HANA opens transactions implicitly once autocommit is off.
    fn start_transaction_sql(&self, isolation: Option<IsolationLevel>) -> Vec<String> {
        isolation
            .map(|level| format!("SET TRANSACTION ISOLATION LEVEL {}", level.to_sql()))
            .into_iter()
            .collect()
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
            parts.push(format!(
                "CONSTRAINT {} PRIMARY KEY ({})",
                self.escape(&self.primary_key_name(ctx, &table)),
                self.column_list(&primary)
            ));
        }
        Statement::new(format!(
            "CREATE TABLE {} ({})",
            self.escape_path(&table.name),
            parts.join(", ")
        ))
    }

    fn create_index_sql(&self, table: &Table, index: &TableIndex) -> Statement {
        Statement::new(format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.is_unique { "UNIQUE " } else { "" },
            self.sibling_path(table, &index.name),
            self.escape_path(&table.name),
            self.column_list(&index.column_names)
        ))
    }

    fn drop_index_sql(&self, table: &Table, index: &TableIndex) -> Statement {
        Statement::new(format!(
            "DROP INDEX {}",
            self.sibling_path(table, &index.name)
        ))
    }

    fn rename_index_sql(&self, table: &Table, old_name: &str, new_name: &str) -> Statement {
        Statement::new(format!(
            "RENAME INDEX {} TO {}",
            self.sibling_path(table, old_name),
            self.escape(new_name)
        ))
    }

    fn create_primary_key_sql(
        &self,
        ctx: &DdlContext<'_>,
        table: &Table,
        columns: &[String],
        name: Option<&str>,
    ) -> Statement {
        let name = name.map_or_else(
            || ctx.naming.primary_key_name(&table.name, columns),
            str::to_string,
        );
        Statement::new(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({})",
            self.escape_path(&table.name),
            self.escape(&name),
            self.column_list(columns)
        ))
    }

    fn drop_primary_key_sql(&self, ctx: &DdlContext<'_>, table: &Table) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.escape_path(&table.name),
            self.escape(&self.primary_key_name(ctx, table))
        ))
    }

    fn rename_table_sql(&self, old_path: &str, new_path: &str) -> Statement {
        Statement::new(format!(
            "RENAME TABLE {} TO {}",
            self.escape_path(old_path),
            self.escape(&TablePath::parse(new_path).name)
        ))
    }

    fn add_column_sql(&self, ctx: &DdlContext<'_>, table: &Table, column: &TableColumn) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} ADD ({})",
            self.escape_path(&table.name),
            self.column_definition(ctx, table, column)
        ))
    }

    fn drop_column_sql(&self, table: &Table, column: &TableColumn) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} DROP ({})",
            self.escape_path(&table.name),
            self.escape(&column.name)
        ))
    }

    fn rename_column_sql(
        &self,
        _ctx: &DdlContext<'_>,
        table: &Table,
        column: &TableColumn,
        new_name: &str,
    ) -> Statement {
        Statement::new(format!(
            "RENAME COLUMN {}.{} TO {}",
            self.escape_path(&table.name),
            self.escape(&column.name),
            self.escape(new_name)
        ))
    }

    fn alter_column_sql(
        &self,
        ctx: &DdlContext<'_>,
        table: &Table,
        _from: &TableColumn,
        to: &TableColumn,
    ) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} ALTER ({})",
            self.escape_path(&table.name),
            self.column_definition(ctx, table, to)
        ))
    }

    fn comment_column_sql(
        &self,
        table: &Table,
        column: &str,
        comment: Option<&str>,
    ) -> Option<Statement> {
        Some(Statement::new(format!(
            "COMMENT ON COLUMN {}.{} IS {}",
            self.escape_path(&table.name),
            self.escape(column),
            comment.map_or_else(|| "NULL".to_string(), quote_literal)
        )))
    }

    fn create_schema_sql(&self, schema: &str) -> Result<Statement> {
        Ok(Statement::new(format!("CREATE SCHEMA {}", self.escape(schema))))
    }

    fn drop_schema_sql(&self, schema: &str, cascade: bool) -> Result<Statement> {
        let cascade = if cascade { " CASCADE" } else { "" };
        Ok(Statement::new(format!(
            "DROP SCHEMA {}{cascade}",
            self.escape(schema)
        )))
    }

    fn clear_database_sql(&self, views: &[View], tables: &[String]) -> Vec<Statement> {
        views
            .iter()
            .map(|v| self.drop_view_sql(v))
            .chain(tables.iter().map(|t| {
                Statement::new(format!("DROP TABLE {} CASCADE", self.escape_path(t)))
            }))
            .collect()
    }

    fn plan_rename_foreign_key(
        &self,
        table: &Table,
        old: &TableForeignKey,
        new: &TableForeignKey,
        plan: &mut Changeset,
    ) -> Result<()> {
        plan.push(
            self.drop_foreign_key_sql(&table.name, old),
            self.create_foreign_key_sql(&table.name, old),
        );
        plan.push(
            self.create_foreign_key_sql(&table.name, new),
            self.drop_foreign_key_sql(&table.name, new),
        );
        Ok(())
    }

    fn plan_rename_primary_key(
        &self,
        ctx: &DdlContext<'_>,
        table: &Table,
        old_name: &str,
        new_name: &str,
        plan: &mut Changeset,
    ) -> Result<()> {
        let columns = table.primary_column_names();
        let drop = |name: &str| {
            Statement::new(format!(
                "ALTER TABLE {} DROP CONSTRAINT {}",
                self.escape_path(&table.name),
                self.escape(name)
            ))
        };
        plan.push(
            drop(old_name),
            self.create_primary_key_sql(ctx, table, &columns, Some(old_name)),
        );
        plan.push(
            self.create_primary_key_sql(ctx, table, &columns, Some(new_name)),
            drop(new_name),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SchemaContext;
    use crate::dialect::CreateTableOptions;
    use crate::naming::DefaultNamingStrategy;
    use crate::schema::TableUnique;

    fn with_ctx<R>(f: impl FnOnce(&DdlContext<'_>) -> R) -> R {
        let naming = DefaultNamingStrategy::new();
        let schema = SchemaContext::with_schema("APP");
        f(&DdlContext {
            naming: &naming,
            schema: &schema,
        })
    }

    #[test]
    fn test_unique_column_becomes_unique_index() {
        let dialect = HanaDialect::new();
        with_ctx(|ctx| {
            let mut table = Table::new("APP.user")
                .column(
                    TableColumn::new("id", "int")
                        .primary()
                        .generated(GenerationStrategy::Increment),
                )
                .column(TableColumn::new("email", "varchar").unique());
            let mut plan = Changeset::new();
            dialect
                .plan_create_table(ctx, &mut table, CreateTableOptions::default(), &mut plan)
                .unwrap();

            assert_eq!(plan.len(), 2);
            assert!(plan.up[0].sql.starts_with(
                "CREATE TABLE \"APP\".\"user\" (\"id\" integer GENERATED BY DEFAULT AS IDENTITY, \"email\" nvarchar(255) NOT NULL, CONSTRAINT \"PK_"
            ));
            assert!(plan.up[1]
                .sql
                .starts_with("CREATE UNIQUE INDEX \"APP\".\"UQ_"));
            assert!(plan.up[1].sql.ends_with("ON \"APP\".\"user\" (\"email\")"));
            assert!(plan.down[1].sql.starts_with("DROP INDEX \"APP\".\"UQ_"));
            assert!(table.uniques.is_empty());
            assert_eq!(table.indices.len(), 1);
        });
    }

    #[test]
    fn test_unique_constraints_are_rejected() {
        let dialect = HanaDialect::new();
        let err = dialect
            .create_unique_sql(&Table::new("t"), &TableUnique::new("u", ["a"]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "SAP HANA does not support unique constraints. Use unique indices instead."
        );
        assert!(dialect.create_database_sql("db").is_err());
    }

    #[test]
    fn test_column_statements() {
        let dialect = HanaDialect::new();
        with_ctx(|ctx| {
            let table = Table::new("APP.post");
            let column = TableColumn::new("title", "varchar").length("80").nullable();
            assert_eq!(
                dialect.add_column_sql(ctx, &table, &column).sql,
                "ALTER TABLE \"APP\".\"post\" ADD (\"title\" nvarchar(80) NULL)"
            );
            assert_eq!(
                dialect.drop_column_sql(&table, &column).sql,
                "ALTER TABLE \"APP\".\"post\" DROP (\"title\")"
            );
            assert_eq!(
                dialect.rename_column_sql(ctx, &table, &column, "heading").sql,
                "RENAME COLUMN \"APP\".\"post\".\"title\" TO \"heading\""
            );
            assert_eq!(
                dialect.rename_table_sql("APP.post", "APP.article").sql,
                "RENAME TABLE \"APP\".\"post\" TO \"article\""
            );
        });
    }

    #[test]
    fn test_foreign_key_rename_is_drop_and_create() {
        let dialect = HanaDialect::new();
        let table = Table::new("post");
        let old = TableForeignKey::new("FK_a", ["author_id"], "user", ["id"]);
        let mut new = old.clone();
        new.name = "FK_b".to_string();
        let mut plan = Changeset::new();
        dialect
            .plan_rename_foreign_key(&table, &old, &new, &mut plan)
            .unwrap();
        assert_eq!(
            plan.up_sql(),
            "ALTER TABLE \"post\" DROP CONSTRAINT \"FK_a\";\n\
             ALTER TABLE \"post\" ADD CONSTRAINT \"FK_b\" FOREIGN KEY (\"author_id\") REFERENCES \"user\" (\"id\") ON DELETE NO ACTION ON UPDATE NO ACTION;\n"
        );
    }

    #[test]
    fn test_transaction_has_no_begin_statement() {
        let dialect = HanaDialect::new();
        assert!(dialect.start_transaction_sql(None).is_empty());
        assert_eq!(
            dialect.start_transaction_sql(Some(IsolationLevel::ReadCommitted)),
            vec!["SET TRANSACTION ISOLATION LEVEL READ COMMITTED"]
        );
        assert!(dialect.features().serialized_queries);
        assert!(dialect.features().referential_guard);
    }
}
