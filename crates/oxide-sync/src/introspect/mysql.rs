//! MySQL catalog: `INFORMATION_SCHEMA`.

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::{
    display_name, exists, fetch, group_by_table, group_ordered, mark_unique_columns,
    namespace_condition, path_filter, row_key, Catalog,
};
use crate::connection::{Connection, Row, RowExt};
use crate::context::{SchemaContext, TablePath};
use crate::dialect::{quote_literal, DdlContext, DdlDialect, MySqlDialect};
use crate::error::{Result, SyncError};
use crate::schema::{
    ForeignKeyAction, GeneratedType, GenerationStrategy, Table, TableColumn, TableForeignKey,
    TableIndex, View,
};

const CURRENT: &str = "DATABASE()";

static TYPE_ARGUMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+\((\d+)(?:,(\d+))?\)").expect("valid type pattern"));

fn is_string_like(data_type: &str) -> bool {
    matches!(
        data_type,
        "char"
            | "varchar"
            | "tinytext"
            | "text"
            | "mediumtext"
            | "longtext"
            | "enum"
            | "set"
            | "binary"
            | "varbinary"
    )
}

fn is_integer(data_type: &str) -> bool {
    matches!(
        data_type,
        "tinyint" | "smallint" | "mediumint" | "int" | "bigint"
    )
}

/// Splits `enum('a','it''s')` into its values.
fn parse_enum_values(column_type: &str) -> Vec<String> {
    let Some(start) = column_type.find('(') else {
        return Vec::new();
    };
    let body = column_type[start + 1..].trim_end_matches(')');
    let mut values = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('\'', false) => quoted = true,
            ('\'', true) if chars.peek() == Some(&'\'') => {
                current.push('\'');
                chars.next();
            }
            ('\'', true) => {
                quoted = false;
                values.push(std::mem::take(&mut current));
            }
            (c, true) => current.push(c),
            _ => {}
        }
    }
    values
}

/// Character set and collation a database assigns by default.
#[derive(Debug, Clone, Default)]
struct Collation {
    charset: Option<String>,
    collation: Option<String>,
}

impl MySqlDialect {
    fn column_from_row(&self, row: &Row, defaults: &Collation) -> TableColumn {
        let data_type = row.text("data_type").unwrap_or_default().to_ascii_lowercase();
        let column_type = row.text("column_type").unwrap_or_default().to_ascii_lowercase();
        let extra = row.text("extra").unwrap_or_default().to_ascii_lowercase();
        let mut column = TableColumn::new(row.text("column_name").unwrap_or_default(), &data_type);

        column.is_nullable = row.text("is_nullable").as_deref() == Some("YES");
        column.is_primary = row.text("column_key").as_deref() == Some("PRI");
        column.unsigned = column_type.contains("unsigned");
        column.zerofill = column_type.contains("zerofill");
        column.comment = row.text("column_comment").filter(|c| !c.is_empty());
        column.charset = row
            .text("character_set_name")
            .filter(|c| Some(c) != defaults.charset.as_ref());
        column.collation = row
            .text("collation_name")
            .filter(|c| Some(c) != defaults.collation.as_ref());

        if extra.contains("auto_increment") {
            column.is_generated = true;
            column.generation_strategy = Some(GenerationStrategy::Increment);
        }
        if extra.contains("virtual generated") || extra.contains("stored generated") {
            column.as_expression = row.text("generation_expression");
            column.generated_type = Some(if extra.contains("stored") {
                GeneratedType::Stored
            } else {
                GeneratedType::Virtual
            });
        }
        if let Some(position) = extra.find("on update ") {
            column.on_update =
                Some(self.normalize_default(extra[position + "on update ".len()..].trim()));
        }

        if data_type == "enum" || data_type == "set" {
            column.enum_values = Some(parse_enum_values(&row.text("column_type").unwrap_or_default()));
        }
        if matches!(data_type.as_str(), "char" | "varchar" | "binary" | "varbinary") {
            column.length = row.text("character_maximum_length");
        }
        let arguments = TYPE_ARGUMENTS.captures(&column_type);
        let argument = |i: usize| {
            arguments
                .as_ref()
                .and_then(|c| c.get(i))
                .and_then(|m| m.as_str().parse::<u32>().ok())
        };
        match data_type.as_str() {
            "decimal" => {
                let precision = row.int("numeric_precision").and_then(|p| u32::try_from(p).ok());
                let scale = row.int("numeric_scale").and_then(|s| u32::try_from(s).ok());
                // decimal(10,0) is what an unqualified DECIMAL becomes.
                if (precision, scale) != (Some(10), Some(0)) {
                    column.precision = precision;
                    column.scale = scale;
                }
            }
            "float" | "double" => {
                column.precision = argument(1);
                column.scale = argument(2);
            }
            "datetime" | "timestamp" | "time" => {
                column.precision = row
                    .int("datetime_precision")
                    .and_then(|p| u32::try_from(p).ok())
                    .filter(|p| *p > 0);
            }
            t if is_integer(t) && column.zerofill => column.width = argument(1),
            _ => {}
        }

        column.default = self.live_default(row, &data_type, &extra);
        column
    }

    /// Catalog default as it would be declared: string literals quoted,
    /// expressions and numbers as-is.
    fn live_default(&self, row: &Row, data_type: &str, extra: &str) -> Option<String> {
        let raw = row.text("column_default")?;
        if raw.eq_ignore_ascii_case("null") {
            return None;
        }
        if extra.contains("default_generated") {
            return Some(self.normalize_default(&raw));
        }
        let normalized = self.normalize_default(&raw);
        if normalized != raw {
            return Some(normalized);
        }
        if is_string_like(data_type) && !raw.starts_with('\'') {
            return Some(quote_literal(&raw));
        }
        Some(raw)
    }
}

fn action(row: &Row, column: &str) -> ForeignKeyAction {
    ForeignKeyAction::parse(&row.text(column).unwrap_or_default())
}

#[async_trait]
impl Catalog for MySqlDialect {
    async fn load_tables(
        &self,
        conn: &dyn Connection,
        ctx: &DdlContext<'_>,
        names: &[String],
    ) -> Result<Vec<Table>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let schema = ctx.schema;
        let default = self.default_namespace(schema);
        let paths: Vec<TablePath> = names.iter().map(|n| self.resolve_path(schema, n)).collect();
        debug!(tables = names.len(), "Loading MySQL tables");

        let mut tables_params = Vec::new();
        let tables_sql = format!(
            "SELECT TABLE_SCHEMA AS table_schema, TABLE_NAME AS table_name, ENGINE AS engine \
             FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_TYPE = 'BASE TABLE' AND {}",
            path_filter(self, "TABLE_SCHEMA", "TABLE_NAME", &paths, &mut tables_params)
        );
        let mut columns_params = Vec::new();
        let columns_sql = format!(
            "SELECT TABLE_SCHEMA AS table_schema, TABLE_NAME AS table_name, \
             COLUMN_NAME AS column_name, DATA_TYPE AS data_type, COLUMN_TYPE AS column_type, \
             IS_NULLABLE AS is_nullable, COLUMN_KEY AS column_key, COLUMN_DEFAULT AS column_default, \
             EXTRA AS extra, COLUMN_COMMENT AS column_comment, \
             CHARACTER_MAXIMUM_LENGTH AS character_maximum_length, \
             NUMERIC_PRECISION AS numeric_precision, NUMERIC_SCALE AS numeric_scale, \
             DATETIME_PRECISION AS datetime_precision, CHARACTER_SET_NAME AS character_set_name, \
             COLLATION_NAME AS collation_name, GENERATION_EXPRESSION AS generation_expression \
             FROM INFORMATION_SCHEMA.COLUMNS WHERE {} ORDER BY ORDINAL_POSITION",
            path_filter(self, "TABLE_SCHEMA", "TABLE_NAME", &paths, &mut columns_params)
        );
        let mut indices_params = Vec::new();
        let indices_sql = format!(
            "SELECT TABLE_SCHEMA AS table_schema, TABLE_NAME AS table_name, \
             INDEX_NAME AS index_name, COLUMN_NAME AS column_name, NON_UNIQUE AS non_unique, \
             INDEX_TYPE AS index_type FROM INFORMATION_SCHEMA.STATISTICS \
             WHERE INDEX_NAME != 'PRIMARY' AND {} ORDER BY SEQ_IN_INDEX",
            path_filter(self, "TABLE_SCHEMA", "TABLE_NAME", &paths, &mut indices_params)
        );
        let mut keys_params = Vec::new();
        let keys_sql = format!(
            "SELECT kcu.TABLE_SCHEMA AS table_schema, kcu.TABLE_NAME AS table_name, \
             kcu.CONSTRAINT_NAME AS constraint_name, kcu.COLUMN_NAME AS column_name, \
             kcu.REFERENCED_TABLE_SCHEMA AS referenced_table_schema, \
             kcu.REFERENCED_TABLE_NAME AS referenced_table_name, \
             kcu.REFERENCED_COLUMN_NAME AS referenced_column_name, \
             rc.DELETE_RULE AS on_delete, rc.UPDATE_RULE AS on_update \
             FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu \
             INNER JOIN INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS rc \
             ON rc.CONSTRAINT_SCHEMA = kcu.CONSTRAINT_SCHEMA AND rc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME \
             WHERE {} ORDER BY kcu.ORDINAL_POSITION",
            path_filter(self, "kcu.TABLE_SCHEMA", "kcu.TABLE_NAME", &paths, &mut keys_params)
        );
        let collations_sql = "SELECT SCHEMA_NAME AS schema_name, \
             DEFAULT_CHARACTER_SET_NAME AS charset, DEFAULT_COLLATION_NAME AS collation \
             FROM INFORMATION_SCHEMA.SCHEMATA";

        let (table_rows, column_rows, index_rows, key_rows, collation_rows) = futures::try_join!(
            fetch(conn, &tables_sql, &tables_params),
            fetch(conn, &columns_sql, &columns_params),
            fetch(conn, &indices_sql, &indices_params),
            fetch(conn, &keys_sql, &keys_params),
            fetch(conn, collations_sql, &[]),
        )?;

        let collations: HashMap<String, Collation> = collation_rows
            .iter()
            .map(|row| {
                (
                    row.text("schema_name").unwrap_or_default(),
                    Collation {
                        charset: row.text("charset"),
                        collation: row.text("collation"),
                    },
                )
            })
            .collect();
        let mut columns = group_by_table(column_rows, "table_schema", "table_name");
        let mut indices = group_by_table(index_rows, "table_schema", "table_name");
        let mut keys = group_by_table(key_rows, "table_schema", "table_name");

        let mut tables = Vec::with_capacity(table_rows.len());
        for row in &table_rows {
            let key = row_key(row, "table_schema", "table_name");
            let mut table = Table::new(display_name(&key.0, &key.1, default));
            table.engine = row.text("engine");
            let defaults = collations.get(&key.0).cloned().unwrap_or_default();

            table.columns = columns
                .remove(&key)
                .unwrap_or_default()
                .iter()
                .map(|r| self.column_from_row(r, &defaults))
                .collect();

            let key_rows = keys.remove(&key).unwrap_or_default();
            for (name, members) in group_ordered(&key_rows, "constraint_name") {
                let first = members[0];
                table.foreign_keys.push(TableForeignKey {
                    name,
                    column_names: members.iter().filter_map(|r| r.text("column_name")).collect(),
                    referenced_table_name: display_name(
                        &first.text("referenced_table_schema").unwrap_or_default(),
                        &first.text("referenced_table_name").unwrap_or_default(),
                        default,
                    ),
                    referenced_column_names: members
                        .iter()
                        .filter_map(|r| r.text("referenced_column_name"))
                        .collect(),
                    on_delete: action(first, "on_delete"),
                    on_update: action(first, "on_update"),
                    deferrable: None,
                });
            }

            let index_rows = indices.remove(&key).unwrap_or_default();
            for (name, members) in group_ordered(&index_rows, "index_name") {
                // MySQL backs every foreign key with an index of the same name.
                if table.find_foreign_key(&name).is_some() {
                    continue;
                }
                let index_type = members[0].text("index_type").unwrap_or_default();
                table.indices.push(TableIndex {
                    name,
                    column_names: members.iter().filter_map(|r| r.text("column_name")).collect(),
                    is_unique: members[0].int("non_unique") == Some(0),
                    is_spatial: index_type.eq_ignore_ascii_case("SPATIAL"),
                    is_fulltext: index_type.eq_ignore_ascii_case("FULLTEXT"),
                    where_clause: None,
                });
            }

            mark_unique_columns(&mut table, schema);
            tables.push(table);
        }
        Ok(tables)
    }

    async fn table_names(&self, conn: &dyn Connection, ctx: &SchemaContext) -> Result<Vec<String>> {
        let mut parameters = Vec::new();
        let sql = format!(
            "SELECT TABLE_NAME AS table_name FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_TYPE = 'BASE TABLE' AND {}",
            namespace_condition(self, "TABLE_SCHEMA", ctx.database.as_deref(), CURRENT, &mut parameters)
        );
        Ok(fetch(conn, &sql, &parameters)
            .await?
            .iter()
            .filter_map(|r| r.text("table_name"))
            .collect())
    }

    async fn list_views(&self, conn: &dyn Connection, ctx: &SchemaContext) -> Result<Vec<View>> {
        let mut parameters = Vec::new();
        let sql = format!(
            "SELECT TABLE_NAME AS table_name FROM INFORMATION_SCHEMA.VIEWS WHERE {}",
            namespace_condition(self, "TABLE_SCHEMA", ctx.database.as_deref(), CURRENT, &mut parameters)
        );
        Ok(fetch(conn, &sql, &parameters)
            .await?
            .iter()
            .filter_map(|r| r.text("table_name"))
            .map(|name| View::new(name, ""))
            .collect())
    }

    async fn has_table(&self, conn: &dyn Connection, ctx: &SchemaContext, name: &str) -> Result<bool> {
        let path = self.resolve_path(ctx, name);
        let mut parameters = Vec::new();
        let namespace =
            namespace_condition(self, "TABLE_SCHEMA", path.namespace.as_deref(), CURRENT, &mut parameters);
        parameters.push(Value::from(path.name));
        let sql = format!(
            "SELECT TABLE_NAME AS table_name FROM INFORMATION_SCHEMA.TABLES \
             WHERE {namespace} AND TABLE_NAME = {}",
            self.placeholder(parameters.len())
        );
        exists(conn, &sql, &parameters).await
    }

    async fn has_column(
        &self,
        conn: &dyn Connection,
        ctx: &SchemaContext,
        table: &str,
        column: &str,
    ) -> Result<bool> {
        let path = self.resolve_path(ctx, table);
        let mut parameters = Vec::new();
        let namespace =
            namespace_condition(self, "TABLE_SCHEMA", path.namespace.as_deref(), CURRENT, &mut parameters);
        parameters.push(Value::from(path.name));
        parameters.push(Value::from(column));
        let sql = format!(
            "SELECT COLUMN_NAME AS column_name FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE {namespace} AND TABLE_NAME = {} AND COLUMN_NAME = {}",
            self.placeholder(parameters.len() - 1),
            self.placeholder(parameters.len())
        );
        exists(conn, &sql, &parameters).await
    }

    async fn has_schema(&self, _conn: &dyn Connection, _schema: &str) -> Result<bool> {
        Err(SyncError::unsupported(self.name(), "schemas", Some("databases")))
    }

    async fn has_database(&self, conn: &dyn Connection, database: &str) -> Result<bool> {
        exists(
            conn,
            "SELECT SCHEMA_NAME AS schema_name FROM INFORMATION_SCHEMA.SCHEMATA WHERE SCHEMA_NAME = ?",
            &[Value::from(database)],
        )
        .await
    }

    async fn current_database(&self, conn: &dyn Connection) -> Result<Option<String>> {
        Ok(fetch(conn, "SELECT DATABASE() AS db_name", &[])
            .await?
            .first()
            .and_then(|r| r.text("db_name")))
    }

    async fn current_schema(&self, conn: &dyn Connection) -> Result<Option<String>> {
        self.current_database(conn).await
    }
}
