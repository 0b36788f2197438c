//! PostgreSQL DDL.
//!
//! Postgres keeps enum values in separate types and backs serial columns
//! with sequences, so several operations here emit extra statements around
//! the table change: `CREATE TYPE` before a table that uses an enum,
//! sequence and type renames alongside table renames, and the six-step swap
//! when the value set of an enum column changes.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use super::plan::{self, column_of, prepared, push_comment};
use super::{
    base_definition_changed, quote_literal, CreateTableOptions, DdlContext, DdlDialect, DialectFeatures, DialectKind,
    DropTableOptions, IsolationLevel,
};
use crate::context::TablePath;
use crate::error::Result;
use crate::schema::{
    GenerationStrategy, Table, TableCheck, TableColumn, TableExclusion, TableForeignKey,
    TableIndex, TableUnique, View,
};
use crate::statement::{Changeset, Statement};

/// Default expression of uuid-generated columns.
pub const UUID_GENERATOR: &str = "uuid_generate_v4()";

/// Fractional seconds digits of time types declared without a precision.
pub const DEFAULT_TIMESTAMP_PRECISION: u32 = 6;

static TRAILING_CAST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)^(.*?)::[A-Za-z_"][A-Za-z0-9_ ."]*(?:\(\d+(?:,\s*\d+)?\))?(?:\[\])?$"#)
        .expect("valid cast pattern")
});

static INLINE_CAST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"::\s*(?:character varying|bit varying|double precision|(?:timestamp|time) with(?:out)? time zone|"[^"]+"|\w+)(?:\(\d+(?:,\s*\d+)?\))?(?:\[\])*"#,
    )
    .expect("valid inline cast pattern")
});

static WRAPPED_OPERAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(^|[^\w])\(\s*(\w+|'[^']*'|"[^"]+")\s*\)"#).expect("valid operand pattern")
});

/// PostgreSQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Path of the enum type behind `column`, in the table's schema.
    #[must_use]
    pub fn enum_type_path(ctx: &DdlContext<'_>, table: &Table, column: &TableColumn) -> TablePath {
        let name = column
            .enum_name
            .clone()
            .unwrap_or_else(|| ctx.naming.enum_type_name(&table.name, &column.name));
        TablePath::parse(&table.name).sibling(&name)
    }

    /// Path of the sequence behind a serial `column`.
    #[must_use]
    pub fn sequence_path(ctx: &DdlContext<'_>, table: &Table, column: &str) -> TablePath {
        TablePath::parse(&table.name).sibling(&ctx.naming.sequence_name(&table.name, column))
    }

    fn create_enum_sql(&self, path: &TablePath, values: &[String]) -> Statement {
        let values: Vec<String> = values.iter().map(|v| quote_literal(v)).collect();
        Statement::new(format!(
            "CREATE TYPE {} AS ENUM({})",
            self.build_path(path, true),
            values.join(", ")
        ))
    }

    fn drop_enum_sql(&self, path: &TablePath) -> Statement {
        Statement::new(format!("DROP TYPE {}", self.build_path(path, true)))
    }

    fn rename_type_sql(&self, path: &TablePath, new_name: &str) -> Statement {
        Statement::new(format!(
            "ALTER TYPE {} RENAME TO {}",
            self.build_path(path, true),
            self.escape(new_name)
        ))
    }

    fn alter_column(&self, table: &Table, column: &str, action: &str) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} ALTER COLUMN {} {action}",
            self.escape_path(&table.name),
            self.escape(column)
        ))
    }

    fn set_default(&self, table: &Table, column: &str, default: Option<&str>) -> Statement {
        match default {
            Some(value) => self.alter_column(table, column, &format!("SET DEFAULT {value}")),
            None => self.alter_column(table, column, "DROP DEFAULT"),
        }
    }

    fn nextval(&self, sequence: &TablePath) -> String {
        format!("nextval('{}')", self.build_path(sequence, true))
    }

    fn create_sequence_sql(&self, table: &Table, column: &str, sequence: &TablePath) -> Statement {
        Statement::new(format!(
            "CREATE SEQUENCE IF NOT EXISTS {} OWNED BY {}.{}",
            self.build_path(sequence, true),
            self.escape_path(&table.name),
            self.escape(column)
        ))
    }

    fn drop_sequence_sql(&self, sequence: &TablePath) -> Statement {
        Statement::new(format!("DROP SEQUENCE {}", self.build_path(sequence, true)))
    }

    fn enum_values(column: &TableColumn) -> Vec<String> {
        column.enum_values.clone().unwrap_or_default()
    }

    /// Enum types the table's columns need, deduplicated.
    fn enum_types(ctx: &DdlContext<'_>, table: &Table) -> Vec<(TablePath, Vec<String>)> {
        let mut seen = BTreeSet::new();
        table
            .columns
            .iter()
            .filter(|c| c.is_enum())
            .filter_map(|c| {
                let path = Self::enum_type_path(ctx, table, c);
                seen.insert(path.qualified())
                    .then(|| (path, Self::enum_values(c)))
            })
            .collect()
    }

    /// Swaps the enum type of a column for one with the new value set.
    fn plan_enum_change(
        &self,
        ctx: &DdlContext<'_>,
        table: &Table,
        current: &TableColumn,
        target: &TableColumn,
        plan: &mut Changeset,
    ) {
        let old_path = Self::enum_type_path(ctx, table, current);
        let new_path = Self::enum_type_path(ctx, table, target);
        let parked = old_path.sibling(&format!("{}_old", old_path.name));
        let column = &target.name;
        let suffix = if target.is_array { "[]" } else { "" };
        let retype = |path: &TablePath| {
            let escaped = self.build_path(path, true);
            self.alter_column(
                table,
                column,
                &format!(
                    "TYPE {escaped}{suffix} USING {}::\"text\"{suffix}::{escaped}{suffix}",
                    self.escape(column)
                ),
            )
        };

        plan.push(
            self.rename_type_sql(&old_path, &parked.name),
            self.rename_type_sql(&parked, &old_path.name),
        );
        plan.push(
            self.create_enum_sql(&new_path, &Self::enum_values(target)),
            self.drop_enum_sql(&new_path),
        );
        if let Some(default) = &current.default {
            plan.push(
                self.set_default(table, column, None),
                self.set_default(table, column, Some(default)),
            );
        }
        plan.push(retype(&new_path), retype(&parked));
        if let Some(default) = &target.default {
            plan.push(
                self.set_default(table, column, Some(default)),
                self.set_default(table, column, None),
            );
        }
        plan.push(
            self.drop_enum_sql(&parked),
            self.create_enum_sql(&parked, &Self::enum_values(current)),
        );
    }

    fn plan_generation_change(
        &self,
        ctx: &DdlContext<'_>,
        table: &Table,
        current: &TableColumn,
        target: &TableColumn,
        plan: &mut Changeset,
    ) {
        let column = &target.name;
        match current.generation_strategy.filter(|_| current.is_generated) {
            Some(GenerationStrategy::Increment) => {
                let sequence = Self::sequence_path(ctx, table, column);
                plan.push(
                    self.set_default(table, column, None),
                    self.set_default(table, column, Some(&self.nextval(&sequence))),
                );
                plan.push(
                    self.drop_sequence_sql(&sequence),
                    self.create_sequence_sql(table, column, &sequence),
                );
            }
            Some(GenerationStrategy::Uuid) => plan.push(
                self.set_default(table, column, None),
                self.set_default(table, column, Some(UUID_GENERATOR)),
            ),
            Some(GenerationStrategy::Identity) => plan.push(
                self.alter_column(table, column, "DROP IDENTITY"),
                self.alter_column(table, column, "ADD GENERATED BY DEFAULT AS IDENTITY"),
            ),
            Some(GenerationStrategy::Rowid) | None => {}
        }
        match target.generation_strategy.filter(|_| target.is_generated) {
            Some(GenerationStrategy::Increment) => {
                let sequence = Self::sequence_path(ctx, table, column);
                plan.push(
                    self.create_sequence_sql(table, column, &sequence),
                    self.drop_sequence_sql(&sequence),
                );
                plan.push(
                    self.set_default(table, column, Some(&self.nextval(&sequence))),
                    self.set_default(table, column, None),
                );
            }
            Some(GenerationStrategy::Uuid) => plan.push(
                self.set_default(table, column, Some(UUID_GENERATOR)),
                self.set_default(table, column, None),
            ),
            Some(GenerationStrategy::Identity) => plan.push(
                self.alter_column(table, column, "ADD GENERATED BY DEFAULT AS IDENTITY"),
                self.alter_column(table, column, "DROP IDENTITY"),
            ),
            Some(GenerationStrategy::Rowid) | None => {}
        }
    }
}

/// Lowercases everything outside quoted literals and identifiers.
fn lowercase_unquoted(value: &str) -> String {
    let mut quote = None;
    value
        .chars()
        .map(|c| match quote {
            Some(open) => {
                if c == open {
                    quote = None;
                }
                c
            }
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                c
            }
            None => c.to_ascii_lowercase(),
        })
        .collect()
}

fn strip_enclosing_parens(value: &str) -> Option<&str> {
    let inner = value.strip_prefix('(')?.strip_suffix(')')?;
    let mut depth = 0_i32;
    for c in inner.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            _ => {}
        }
    }
    (depth == 0).then_some(inner)
}

impl DdlDialect for PostgresDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn features(&self) -> DialectFeatures {
        DialectFeatures {
            unique_constraints: true,
            check_constraints: true,
            exclusion_constraints: true,
            schemas: true,
            databases: true,
            enum_types: true,
            sequences: true,
            transactional_ddl: true,
            serialized_queries: false,
            referential_guard: false,
            inline_indices: false,
            materialized_views: true,
            increment_guard: false,
        }
    }

    fn escape(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn normalize_type(&self, column: &TableColumn) -> String {
        if column.is_enum() {
            return "enum".to_string();
        }
        let data_type = column.data_type.trim().to_ascii_lowercase();
        match data_type.as_str() {
            "int" | "int4" | "integer" | "serial" => "integer",
            "int2" | "smallint" | "smallserial" => "smallint",
            "int8" | "bigint" | "bigserial" => "bigint",
            "varchar" | "character varying" | "string" => "character varying",
            "char" | "character" | "bpchar" => "character",
            "float8" | "double precision" | "double" => "double precision",
            "float4" | "real" => "real",
            "decimal" | "numeric" => "numeric",
            "bool" | "boolean" => "boolean",
            "timestamp" | "timestamp without time zone" => "timestamp without time zone",
            "timestamptz" | "timestamp with time zone" => "timestamp with time zone",
            "time" | "time without time zone" => "time without time zone",
            "timetz" | "time with time zone" => "time with time zone",
            "varbit" | "bit varying" => "bit varying",
            _ => return data_type,
        }
        .to_string()
    }

    fn normalize_default(&self, default: &str) -> String {
        let mut value = default.trim().to_string();
        loop {
            if let Some(caps) = TRAILING_CAST.captures(&value) {
                value = caps[1].trim().to_string();
                continue;
            }
            if let Some(inner) = strip_enclosing_parens(&value) {
                value = inner.trim().to_string();
                continue;
            }
            break;
        }
        match value.to_ascii_lowercase().as_str() {
            "now()" | "current_timestamp" | "current_timestamp()" => "now()".to_string(),
            _ => value,
        }
    }

    // upper(name) comes back as upper((name)::text)
    fn normalize_expression(&self, expression: &str) -> String {
        let lowered = lowercase_unquoted(expression);
        let mut value = INLINE_CAST.replace_all(&lowered, "").into_owned();
        loop {
            let next = WRAPPED_OPERAND.replace_all(&value, "${1}${2}").into_owned();
            if next == value {
                break;
            }
            value = next;
        }
        while let Some(inner) = strip_enclosing_parens(value.trim()) {
            value = inner.to_string();
        }
        value.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn effective_precision(&self, column: &TableColumn) -> Option<u32> {
        match self.normalize_type(column).as_str() {
            "timestamp without time zone"
            | "timestamp with time zone"
            | "time without time zone"
            | "time with time zone" => column
                .precision
                .filter(|p| *p != DEFAULT_TIMESTAMP_PRECISION),
            _ => column.precision,
        }
    }

    fn is_definition_changed(&self, old: &TableColumn, new: &TableColumn) -> bool {
        old.collation != new.collation || base_definition_changed(self, old, new)
    }

    fn column_type(&self, ctx: &DdlContext<'_>, table: &Table, column: &TableColumn) -> String {
        let suffix = if column.is_array { "[]" } else { "" };
        if column.is_enum() {
            let path = Self::enum_type_path(ctx, table, column);
            return format!("{}{suffix}", self.build_path(&path, true));
        }
        let data_type = self.normalize_type(column);
        let rendered = match data_type.as_str() {
            "character varying" | "character" | "bit" | "bit varying" => {
                match self.effective_length(column) {
                    Some(length) => format!("{data_type}({length})"),
                    None => data_type,
                }
            }
            "numeric" => match (column.precision, column.scale) {
                (Some(p), Some(s)) => format!("numeric({p},{s})"),
                (Some(p), None) => format!("numeric({p})"),
                _ => data_type,
            },
            "timestamp without time zone"
            | "timestamp with time zone"
            | "time without time zone"
            | "time with time zone" => match (column.precision, data_type.split_once(' ')) {
                (Some(p), Some((head, rest))) => format!("{head}({p}) {rest}"),
                _ => data_type,
            },
            "geometry" | "geography" => match (&column.spatial_feature_type, column.srid) {
                (Some(feature), Some(srid)) => format!("{data_type}({feature},{srid})"),
                (Some(feature), None) => format!("{data_type}({feature})"),
                _ => data_type,
            },
            _ => data_type,
        };
        format!("{rendered}{suffix}")
    }

    fn column_definition(&self, ctx: &DdlContext<'_>, table: &Table, column: &TableColumn) -> String {
        let strategy = column.generation_strategy.filter(|_| column.is_generated);
        let data_type = match (strategy, self.normalize_type(column).as_str()) {
            (Some(GenerationStrategy::Increment), "integer") => "SERIAL".to_string(),
            (Some(GenerationStrategy::Increment), "smallint") => "SMALLSERIAL".to_string(),
            (Some(GenerationStrategy::Increment), "bigint") => "BIGSERIAL".to_string(),
            _ => self.column_type(ctx, table, column),
        };
        let mut sql = format!("{} {data_type}", self.escape(&column.name));
        if strategy == Some(GenerationStrategy::Identity) {
            sql.push_str(" GENERATED BY DEFAULT AS IDENTITY");
        }
        if let Some(expression) = &column.as_expression {
            sql.push_str(&format!(" GENERATED ALWAYS AS ({expression}) STORED"));
        }
        if let Some(collation) = &column.collation {
            sql.push_str(&format!(" COLLATE {}", self.escape(collation)));
        }
        if !column.is_nullable {
            sql.push_str(" NOT NULL");
        }
        match (&column.default, strategy) {
            (Some(default), None) => sql.push_str(&format!(" DEFAULT {default}")),
            (None, Some(GenerationStrategy::Uuid)) => {
                sql.push_str(&format!(" DEFAULT {UUID_GENERATOR}"));
            }
            _ => {}
        }
        sql
    }

    fn start_transaction_sql(&self, isolation: Option<IsolationLevel>) -> Vec<String> {
        let mut statements = vec!["START TRANSACTION".to_string()];
        if let Some(level) = isolation {
            statements.push(format!("SET TRANSACTION ISOLATION LEVEL {}", level.to_sql()));
        }
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
        for unique in &table.uniques {
            parts.push(format!(
                "CONSTRAINT {} UNIQUE ({})",
                self.escape(&unique.name),
                self.column_list(&unique.column_names)
            ));
        }
        for check in &table.checks {
            parts.push(format!(
                "CONSTRAINT {} CHECK ({})",
                self.escape(&check.name),
                check.expression
            ));
        }
        for exclusion in &table.exclusions {
            parts.push(format!(
                "CONSTRAINT {} EXCLUDE {}",
                self.escape(&exclusion.name),
                exclusion.expression
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

    fn create_view_sql(&self, view: &View) -> Statement {
        let kind = if view.materialized { "MATERIALIZED VIEW" } else { "VIEW" };
        Statement::new(format!(
            "CREATE {kind} {} AS {}",
            self.escape_path(&view.name),
            view.expression
        ))
    }

    fn drop_view_sql(&self, view: &View) -> Statement {
        let kind = if view.materialized { "MATERIALIZED VIEW" } else { "VIEW" };
        Statement::new(format!("DROP {kind} {}", self.escape_path(&view.name)))
    }

    fn create_index_sql(&self, table: &Table, index: &TableIndex) -> Statement {
        let mut sql = format!(
            "CREATE {}INDEX {} ON {} ",
            if index.is_unique { "UNIQUE " } else { "" },
            self.escape(&index.name),
            self.escape_path(&table.name)
        );
        if index.is_spatial {
            sql.push_str("USING GiST ");
        }
        sql.push_str(&format!("({})", self.column_list(&index.column_names)));
        if let Some(predicate) = &index.where_clause {
            sql.push_str(&format!(" WHERE {predicate}"));
        }
        Statement::new(sql)
    }

    fn drop_index_sql(&self, table: &Table, index: &TableIndex) -> Statement {
        let path = TablePath::parse(&table.name).sibling(&index.name);
        Statement::new(format!("DROP INDEX {}", self.build_path(&path, true)))
    }

    fn rename_index_sql(&self, table: &Table, old_name: &str, new_name: &str) -> Statement {
        let path = TablePath::parse(&table.name).sibling(old_name);
        Statement::new(format!(
            "ALTER INDEX {} RENAME TO {}",
            self.build_path(&path, true),
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

    fn create_unique_sql(&self, table: &Table, unique: &TableUnique) -> Result<Statement> {
        Ok(Statement::new(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
            self.escape_path(&table.name),
            self.escape(&unique.name),
            self.column_list(&unique.column_names)
        )))
    }

    fn drop_unique_sql(&self, table: &Table, unique: &TableUnique) -> Result<Statement> {
        Ok(self.drop_constraint_sql(table, &unique.name))
    }

    fn create_check_sql(&self, table: &Table, check: &TableCheck) -> Result<Statement> {
        Ok(Statement::new(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({})",
            self.escape_path(&table.name),
            self.escape(&check.name),
            check.expression
        )))
    }

    fn drop_check_sql(&self, table: &Table, check: &TableCheck) -> Result<Statement> {
        Ok(self.drop_constraint_sql(table, &check.name))
    }

    fn create_exclusion_sql(&self, table: &Table, exclusion: &TableExclusion) -> Result<Statement> {
        Ok(Statement::new(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} EXCLUDE {}",
            self.escape_path(&table.name),
            self.escape(&exclusion.name),
            exclusion.expression
        )))
    }

    fn drop_exclusion_sql(&self, table: &Table, exclusion: &TableExclusion) -> Result<Statement> {
        Ok(self.drop_constraint_sql(table, &exclusion.name))
    }

    fn foreign_key_clause(&self, foreign_key: &TableForeignKey) -> String {
        let mut sql = format!(
            "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            self.column_list(&foreign_key.column_names),
            self.escape_path(&foreign_key.referenced_table_name),
            self.column_list(&foreign_key.referenced_column_names),
            foreign_key.on_delete.to_sql(),
            foreign_key.on_update.to_sql()
        );
        if let Some(deferrable) = &foreign_key.deferrable {
            sql.push_str(&format!(" DEFERRABLE {deferrable}"));
        }
        sql
    }

    fn rename_table_sql(&self, old_path: &str, new_path: &str) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} RENAME TO {}",
            self.escape_path(old_path),
            self.escape(&TablePath::parse(new_path).name)
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
        _ctx: &DdlContext<'_>,
        table: &Table,
        column: &TableColumn,
        new_name: &str,
    ) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
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
        // TYPE without COLLATE resets the column to the type's collation.
        let mut action = format!("TYPE {}", self.column_type(ctx, table, to));
        if let Some(collation) = &to.collation {
            action.push_str(&format!(" COLLATE {}", self.escape(collation)));
        }
        self.alter_column(table, &to.name, &action)
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
        views
            .iter()
            .map(|v| {
                let kind = if v.materialized { "MATERIALIZED VIEW" } else { "VIEW" };
                Statement::new(format!(
                    "DROP {kind} IF EXISTS {} CASCADE",
                    self.escape_path(&v.name)
                ))
            })
            .chain(tables.iter().map(|t| {
                Statement::new(format!("DROP TABLE IF EXISTS {} CASCADE", self.escape_path(t)))
            }))
            .collect()
    }

    fn plan_create_table(
        &self,
        ctx: &DdlContext<'_>,
        table: &mut Table,
        options: CreateTableOptions,
        plan: &mut Changeset,
    ) -> Result<()> {
        for (path, values) in Self::enum_types(ctx, table) {
            plan.push(self.create_enum_sql(&path, &values), self.drop_enum_sql(&path));
        }
        plan::create_table(self, ctx, table, options, plan)
    }

    fn plan_drop_table(
        &self,
        ctx: &DdlContext<'_>,
        table: &Table,
        options: DropTableOptions,
        plan: &mut Changeset,
    ) -> Result<()> {
        plan::drop_table(self, ctx, table, options, plan)?;
        for (path, values) in Self::enum_types(ctx, table) {
            plan.push(self.drop_enum_sql(&path), self.create_enum_sql(&path, &values));
        }
        Ok(())
    }

    fn plan_add_column(
        &self,
        ctx: &DdlContext<'_>,
        table: &mut Table,
        column: &TableColumn,
        plan: &mut Changeset,
    ) -> Result<()> {
        if column.is_enum() && table.find_column(&column.name).is_none() {
            let path = Self::enum_type_path(ctx, table, column);
            let values = Self::enum_values(column);
            plan.push(self.create_enum_sql(&path, &values), self.drop_enum_sql(&path));
        }
        plan::add_column(self, ctx, table, column, plan)
    }

    fn plan_drop_column(
        &self,
        ctx: &DdlContext<'_>,
        table: &mut Table,
        column_name: &str,
        plan: &mut Changeset,
    ) -> Result<()> {
        let column = column_of(table, column_name)?;
        let path = Self::enum_type_path(ctx, table, &column);
        plan::drop_column(self, ctx, table, column_name, plan)?;
        if column.is_enum() {
            let values = Self::enum_values(&column);
            plan.push(self.drop_enum_sql(&path), self.create_enum_sql(&path, &values));
        }
        Ok(())
    }

    fn plan_rename_owned(
        &self,
        ctx: &DdlContext<'_>,
        before: &Table,
        after: &Table,
        plan: &mut Changeset,
    ) -> Result<()> {
        for (old, new) in before.columns.iter().zip(&after.columns) {
            if old.is_increment() {
                let from = Self::sequence_path(ctx, before, &old.name);
                let to = Self::sequence_path(ctx, after, &new.name);
                if from != to {
                    plan.push(
                        Statement::new(format!(
                            "ALTER SEQUENCE {} RENAME TO {}",
                            self.build_path(&from, true),
                            self.escape(&to.name)
                        )),
                        Statement::new(format!(
                            "ALTER SEQUENCE {} RENAME TO {}",
                            self.build_path(&to, true),
                            self.escape(&from.name)
                        )),
                    );
                }
            }
            if old.is_enum() && old.enum_name.is_none() {
                let from = Self::enum_type_path(ctx, before, old);
                let to = Self::enum_type_path(ctx, after, new);
                if from != to {
                    plan.push(
                        self.rename_type_sql(&from, &to.name),
                        self.rename_type_sql(&to, &from.name),
                    );
                }
            }
        }
        Ok(())
    }

    fn plan_change_column(
        &self,
        ctx: &DdlContext<'_>,
        table: &mut Table,
        old: &TableColumn,
        new: &TableColumn,
        plan: &mut Changeset,
    ) -> Result<()> {
        let mut current = column_of(table, &old.name)?;
        if old.name != new.name {
            self.plan_rename_column(ctx, table, &old.name, &new.name, plan)?;
            current = column_of(table, &new.name)?;
        }
        let name = new.name.clone();

        if self.effective_precision(&current) != self.effective_precision(new)
            || current.scale != new.scale
            || current.spatial_feature_type != new.spatial_feature_type
            || current.srid != new.srid
            || current.collation != new.collation
        {
            let mut target = current.clone();
            target.precision = new.precision;
            target.scale = new.scale;
            target.spatial_feature_type.clone_from(&new.spatial_feature_type);
            target.srid = new.srid;
            target.collation.clone_from(&new.collation);
            plan.push(
                self.alter_column_sql(ctx, table, &current, &target),
                self.alter_column_sql(ctx, table, &target, &current),
            );
            current = target;
        }

        if new.is_enum()
            && (current.enum_values != new.enum_values || current.enum_name != new.enum_name)
        {
            self.plan_enum_change(ctx, table, &current, new, plan);
            current.enum_values.clone_from(&new.enum_values);
            current.enum_name.clone_from(&new.enum_name);
            current.default.clone_from(&new.default);
        }

        if current.is_nullable != new.is_nullable {
            let (up, down) = if new.is_nullable {
                ("DROP NOT NULL", "SET NOT NULL")
            } else {
                ("SET NOT NULL", "DROP NOT NULL")
            };
            plan.push(
                self.alter_column(table, &name, up),
                self.alter_column(table, &name, down),
            );
            current.is_nullable = new.is_nullable;
        }

        if current.comment != new.comment {
            push_comment(
                self,
                table,
                &name,
                current.comment.as_deref(),
                new.comment.as_deref(),
                plan,
            );
            current.comment.clone_from(&new.comment);
        }
        table.replace_column(&name, current);

        if column_of(table, &name)?.is_primary != new.is_primary {
            let mut columns = table.primary_column_names();
            if new.is_primary {
                columns.push(name.clone());
            } else {
                columns.retain(|c| *c != name);
            }
            self.plan_update_primary_keys(ctx, table, &columns, plan)?;
        }

        if column_of(table, &name)?.is_unique != new.is_unique {
            self.plan_column_unique(ctx, table, &name, new.is_unique, plan)?;
        }

        let mut current = column_of(table, &name)?;
        if current.is_generated != new.is_generated
            || current.generation_strategy != new.generation_strategy
        {
            self.plan_generation_change(ctx, table, &current, new, plan);
            current.is_generated = new.is_generated;
            current.generation_strategy = new.generation_strategy;
        }

        let normalized = |c: &TableColumn| c.default.as_deref().map(|d| self.normalize_default(d));
        if !new.is_generated && normalized(&current) != normalized(new) {
            plan.push(
                self.set_default(table, &name, new.default.as_deref()),
                self.set_default(table, &name, current.default.as_deref()),
            );
        }

        let mut target = new.clone();
        target.is_primary = current.is_primary;
        target.is_unique = current.is_unique;
        target
            .primary_key_constraint_name
            .clone_from(&current.primary_key_constraint_name);
        table.replace_column(&name, target);
        Ok(())
    }

    fn parked_types(
        &self,
        ctx: &DdlContext<'_>,
        table: &Table,
        old: &TableColumn,
        new: &TableColumn,
    ) -> Vec<TablePath> {
        if !new.is_enum() || (old.enum_values == new.enum_values && old.enum_name == new.enum_name)
        {
            return Vec::new();
        }
        let path = Self::enum_type_path(ctx, table, old);
        vec![path.sibling(&format!("{}_old", path.name))]
    }
}

impl PostgresDialect {
    fn drop_constraint_sql(&self, table: &Table, name: &str) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.escape_path(&table.name),
            self.escape(name)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SchemaContext;
    use crate::naming::DefaultNamingStrategy;

    fn with_ctx<R>(f: impl FnOnce(&DdlContext<'_>) -> R) -> R {
        let naming = DefaultNamingStrategy::new();
        let schema = SchemaContext::with_schema("public");
        f(&DdlContext {
            naming: &naming,
            schema: &schema,
        })
    }

    fn sql(plan: &Changeset) -> Vec<&str> {
        plan.up.iter().map(|s| s.sql.as_str()).collect()
    }

    #[test]
    fn test_nullability_flip_is_one_pair() {
        let dialect = PostgresDialect::new();
        with_ctx(|ctx| {
            let old = TableColumn::new("email", "varchar").nullable();
            let mut table = Table::new("user")
                .column(TableColumn::new("id", "int").primary())
                .column(old.clone());
            let new = TableColumn::new("email", "varchar");
            let mut plan = Changeset::new();
            dialect
                .plan_change_column(ctx, &mut table, &old, &new, &mut plan)
                .unwrap();
            assert_eq!(
                sql(&plan),
                vec!["ALTER TABLE \"user\" ALTER COLUMN \"email\" SET NOT NULL"]
            );
            assert_eq!(
                plan.down[0].sql,
                "ALTER TABLE \"user\" ALTER COLUMN \"email\" DROP NOT NULL"
            );
            assert!(!table.find_column("email").unwrap().is_nullable);
        });
    }

    #[test]
    fn test_collation_change_retypes_column() {
        let dialect = PostgresDialect::new();
        with_ctx(|ctx| {
            let old = TableColumn::new("name", "varchar").length("50");
            let mut table = Table::new("user")
                .column(TableColumn::new("id", "int").primary())
                .column(old.clone());
            let new = old.clone().collation("C");
            assert!(dialect.is_definition_changed(&old, &new));

            let mut plan = Changeset::new();
            dialect
                .plan_change_column(ctx, &mut table, &old, &new, &mut plan)
                .unwrap();
            assert_eq!(
                sql(&plan),
                vec!["ALTER TABLE \"user\" ALTER COLUMN \"name\" TYPE character varying(50) COLLATE \"C\""]
            );
            assert_eq!(
                plan.down[0].sql,
                "ALTER TABLE \"user\" ALTER COLUMN \"name\" TYPE character varying(50)"
            );
            assert_eq!(
                table.find_column("name").unwrap().collation.as_deref(),
                Some("C")
            );
        });
    }

    #[test]
    fn test_enum_value_change_swaps_types() {
        let dialect = PostgresDialect::new();
        with_ctx(|ctx| {
            let old = TableColumn::new("role", "enum")
                .enum_values(["user", "admin"])
                .default_value("'user'");
            let new = TableColumn::new("role", "enum")
                .enum_values(["user", "admin", "owner"])
                .default_value("'user'");
            let mut table = Table::new("member").column(old.clone());
            let mut plan = Changeset::new();
            dialect
                .plan_change_column(ctx, &mut table, &old, &new, &mut plan)
                .unwrap();
            assert_eq!(
                sql(&plan),
                vec![
                    "ALTER TYPE \"member_role_enum\" RENAME TO \"member_role_enum_old\"",
                    "CREATE TYPE \"member_role_enum\" AS ENUM('user', 'admin', 'owner')",
                    "ALTER TABLE \"member\" ALTER COLUMN \"role\" DROP DEFAULT",
                    "ALTER TABLE \"member\" ALTER COLUMN \"role\" TYPE \"member_role_enum\" USING \"role\"::\"text\"::\"member_role_enum\"",
                    "ALTER TABLE \"member\" ALTER COLUMN \"role\" SET DEFAULT 'user'",
                    "DROP TYPE \"member_role_enum_old\"",
                ]
            );
            let rollback: Vec<&str> = plan.rollback_order().map(|s| s.sql.as_str()).collect();
            assert_eq!(
                rollback,
                vec![
                    "CREATE TYPE \"member_role_enum_old\" AS ENUM('user', 'admin')",
                    "ALTER TABLE \"member\" ALTER COLUMN \"role\" DROP DEFAULT",
                    "ALTER TABLE \"member\" ALTER COLUMN \"role\" TYPE \"member_role_enum_old\" USING \"role\"::\"text\"::\"member_role_enum_old\"",
                    "ALTER TABLE \"member\" ALTER COLUMN \"role\" SET DEFAULT 'user'",
                    "DROP TYPE \"member_role_enum\"",
                    "ALTER TYPE \"member_role_enum_old\" RENAME TO \"member_role_enum\"",
                ]
            );
            let parked = dialect.parked_types(ctx, &table, &old, &new);
            assert_eq!(parked[0].name, "member_role_enum_old");
        });
    }

    #[test]
    fn test_rename_table_renames_derived_names() {
        let dialect = PostgresDialect::new();
        with_ctx(|ctx| {
            let mut table = Table::new("public.post")
                .column(TableColumn::new("id", "int").primary())
                .column(TableColumn::new("title", "varchar"))
                .column(TableColumn::new("author_id", "int"))
                .index(TableIndex::new("", ["title"]))
                .index(TableIndex::new("custom_idx", ["author_id"]))
                .foreign_key(TableForeignKey::new("", ["author_id"], "public.user", ["id"]));
            crate::naming::assign_names(&mut table, ctx.naming);

            let mut plan = Changeset::new();
            dialect
                .plan_rename_table(ctx, &mut table, "article", &mut plan)
                .unwrap();

            // table + primary key + one derived index + one foreign key
            assert_eq!(plan.len(), 4);
            assert_eq!(
                plan.up[0].sql,
                "ALTER TABLE \"public\".\"post\" RENAME TO \"article\""
            );
            assert!(plan.up[1].sql.contains("RENAME CONSTRAINT \"PK_"));
            assert!(plan.up[2].sql.starts_with("ALTER INDEX \"public\".\"IDX_"));
            assert_eq!(table.name, "public.article");
            assert_eq!(table.indices[1].name, "custom_idx");
            assert_eq!(
                table.indices[0].name,
                ctx.naming.index_name("article", &["title".to_string()], None)
            );
        });
    }

    #[test]
    fn test_create_table_with_enum_type_first() {
        let dialect = PostgresDialect::new();
        with_ctx(|ctx| {
            let mut table = Table::new("user")
                .column(
                    TableColumn::new("id", "int")
                        .primary()
                        .generated(GenerationStrategy::Increment),
                )
                .column(TableColumn::new("role", "enum").enum_values(["a", "b"]))
                .column(TableColumn::new("email", "varchar").unique());
            let mut plan = Changeset::new();
            dialect
                .plan_create_table(ctx, &mut table, CreateTableOptions::default(), &mut plan)
                .unwrap();
            assert_eq!(plan.up[0].sql, "CREATE TYPE \"user_role_enum\" AS ENUM('a', 'b')");
            let create = &plan.up[1].sql;
            assert!(create.starts_with(
                "CREATE TABLE \"user\" (\"id\" SERIAL NOT NULL, \"role\" \"user_role_enum\" NOT NULL, \"email\" character varying NOT NULL, CONSTRAINT \"UQ_"
            ));
            assert!(create.ends_with("PRIMARY KEY (\"id\"))"));
            assert_eq!(plan.down[0].sql, "DROP TYPE \"user_role_enum\"");
            assert_eq!(table.uniques.len(), 1);
        });
    }

    #[test]
    fn test_default_normalization() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.normalize_default("'{}'::jsonb"), "'{}'");
        assert_eq!(dialect.normalize_default("'{}'"), "'{}'");
        assert_eq!(dialect.normalize_default("CURRENT_TIMESTAMP"), "now()");
        assert_eq!(dialect.normalize_default("now()"), "now()");
        assert_eq!(
            dialect.normalize_default("'hello'::character varying"),
            "'hello'"
        );
        assert_eq!(dialect.normalize_default("('a::b'::text)"), "'a::b'");
        assert_eq!(dialect.normalize_default("(1)"), "1");
        assert_eq!(dialect.normalize_default("(1) + (2)"), "(1) + (2)");
    }

    #[test]
    fn test_expression_normalization() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.normalize_expression("upper((name)::text)"), "upper(name)");
        assert_eq!(dialect.normalize_expression("UPPER(name)"), "upper(name)");
        assert_eq!(
            dialect.normalize_expression("((price * (quantity)::numeric))"),
            "price * quantity"
        );
        assert_eq!(
            dialect.normalize_expression("(\"First\" || ' '::text) || 'X'"),
            "(\"First\" || ' ') || 'X'"
        );
    }

    #[test]
    fn test_types() {
        let dialect = PostgresDialect::new();
        with_ctx(|ctx| {
            let table = Table::new("t");
            let column = TableColumn::new("at", "timestamp").precision(3, None);
            assert_eq!(
                dialect.column_type(ctx, &table, &column),
                "timestamp(3) without time zone"
            );
            let column = TableColumn::new("tags", "varchar").length("20").array();
            assert_eq!(
                dialect.column_type(ctx, &table, &column),
                "character varying(20)[]"
            );
        });
        assert_eq!(dialect.placeholder(2), "$2");
    }

    #[test]
    fn test_transaction_sets_isolation_after_start() {
        let dialect = PostgresDialect::new();
        assert_eq!(
            dialect.start_transaction_sql(Some(IsolationLevel::Serializable)),
            vec![
                "START TRANSACTION",
                "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE"
            ]
        );
    }
}
