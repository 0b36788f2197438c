//! SAP HANA catalog: the `SYS` views.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{
    assign_primary_key_name, display_name, exists, fetch, group_by_table, group_ordered,
    mark_unique_columns, namespace_condition, path_filter, row_key, Catalog, ReferencingKey,
};
use crate::connection::{Connection, Row, RowExt};
use crate::context::{SchemaContext, TablePath};
use crate::dialect::hana::has_length;
use crate::dialect::{quote_literal, DdlContext, DdlDialect, HanaDialect};
use crate::error::Result;
use crate::schema::{
    ForeignKeyAction, GeneratedType, GenerationStrategy, Table, TableColumn, TableForeignKey,
    TableIndex, View,
};

const CURRENT: &str = "CURRENT_SCHEMA";

fn is_text(data_type: &str) -> bool {
    (has_length(data_type) && !data_type.ends_with("binary"))
        || matches!(data_type, "nclob" | "clob" | "shorttext")
}

fn foreign_key_from_rows(members: &[&Row], name: String, default: Option<&str>) -> TableForeignKey {
    let first = members[0];
    TableForeignKey {
        name,
        column_names: members.iter().filter_map(|r| r.text("column_name")).collect(),
        referenced_table_name: display_name(
            &first.text("referenced_schema_name").unwrap_or_default(),
            &first.text("referenced_table_name").unwrap_or_default(),
            default,
        ),
        referenced_column_names: members
            .iter()
            .filter_map(|r| r.text("referenced_column_name"))
            .collect(),
        on_delete: ForeignKeyAction::parse(&first.text("delete_rule").unwrap_or_default()),
        on_update: ForeignKeyAction::parse(&first.text("update_rule").unwrap_or_default()),
        deferrable: None,
    }
}

const REFERENTIAL_COLUMNS: &str = "SCHEMA_NAME AS \"table_schema\", TABLE_NAME AS \"table_name\", \
     CONSTRAINT_NAME AS \"constraint_name\", COLUMN_NAME AS \"column_name\", \
     REFERENCED_SCHEMA_NAME AS \"referenced_schema_name\", \
     REFERENCED_TABLE_NAME AS \"referenced_table_name\", \
     REFERENCED_COLUMN_NAME AS \"referenced_column_name\", \
     DELETE_RULE AS \"delete_rule\", UPDATE_RULE AS \"update_rule\"";

impl HanaDialect {
    fn column_from_row(&self, row: &Row) -> TableColumn {
        let mut data_type = row.text("data_type_name").unwrap_or_default().to_ascii_lowercase();
        let is_array = match data_type.strip_suffix(" array") {
            Some(element) => {
                data_type = element.to_string();
                true
            }
            None => false,
        };
        let mut column = TableColumn::new(row.text("column_name").unwrap_or_default(), &data_type);
        column.is_array = is_array;
        column.is_nullable = row.flag("is_nullable");
        column.comment = row.text("comments");

        if has_length(&data_type) {
            column.length = row.text("length");
        } else if data_type == "decimal" {
            column.precision = row.int("length").and_then(|p| u32::try_from(p).ok());
            column.scale = row.int("scale").and_then(|s| u32::try_from(s).ok());
        }

        let generation = row.text("generation_type").unwrap_or_default().to_ascii_uppercase();
        if generation.ends_with("AS IDENTITY") {
            column.is_generated = true;
            column.generation_strategy = Some(GenerationStrategy::Increment);
        } else if generation.starts_with("ALWAYS AS") {
            column.as_expression = row.text("generated_always_as");
            column.generated_type = Some(GeneratedType::Stored);
        }

        if let Some(raw) = row.text("default_value") {
            let normalized = self.normalize_default(&raw);
            column.default = if normalized.eq_ignore_ascii_case("null") {
                None
            } else if is_text(&data_type) && !normalized.starts_with('\'') {
                Some(quote_literal(&normalized))
            } else {
                Some(normalized)
            };
        }
        column
    }
}

#[async_trait]
impl Catalog for HanaDialect {
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
        debug!(tables = names.len(), "Loading SAP HANA tables");

        let mut tables_params = Vec::new();
        let tables_sql = format!(
            "SELECT SCHEMA_NAME AS \"table_schema\", TABLE_NAME AS \"table_name\" \
             FROM SYS.TABLES WHERE {}",
            path_filter(self, "SCHEMA_NAME", "TABLE_NAME", &paths, &mut tables_params)
        );
        let mut columns_params = Vec::new();
        let columns_sql = format!(
            "SELECT SCHEMA_NAME AS \"table_schema\", TABLE_NAME AS \"table_name\", \
             COLUMN_NAME AS \"column_name\", DATA_TYPE_NAME AS \"data_type_name\", \
             LENGTH AS \"length\", SCALE AS \"scale\", IS_NULLABLE AS \"is_nullable\", \
             DEFAULT_VALUE AS \"default_value\", COMMENTS AS \"comments\", \
             GENERATION_TYPE AS \"generation_type\", GENERATED_ALWAYS_AS AS \"generated_always_as\" \
             FROM SYS.TABLE_COLUMNS WHERE {} ORDER BY POSITION",
            path_filter(self, "SCHEMA_NAME", "TABLE_NAME", &paths, &mut columns_params)
        );
        let mut constraints_params = Vec::new();
        let constraints_sql = format!(
            "SELECT SCHEMA_NAME AS \"table_schema\", TABLE_NAME AS \"table_name\", \
             CONSTRAINT_NAME AS \"constraint_name\", COLUMN_NAME AS \"column_name\" \
             FROM SYS.CONSTRAINTS WHERE IS_PRIMARY_KEY = 'TRUE' AND {} ORDER BY POSITION",
            path_filter(self, "SCHEMA_NAME", "TABLE_NAME", &paths, &mut constraints_params)
        );
        let mut indices_params = Vec::new();
        let indices_sql = format!(
            "SELECT ind.SCHEMA_NAME AS \"table_schema\", ind.TABLE_NAME AS \"table_name\", \
             ind.INDEX_NAME AS \"index_name\", ind.INDEX_TYPE AS \"index_type\", \
             col.COLUMN_NAME AS \"column_name\", col.\"CONSTRAINT\" AS \"constraint\" \
             FROM SYS.INDEXES ind INNER JOIN SYS.INDEX_COLUMNS col ON col.INDEX_OID = ind.INDEX_OID \
             WHERE (col.\"CONSTRAINT\" IS NULL OR col.\"CONSTRAINT\" != 'PRIMARY KEY') AND {} \
             ORDER BY col.POSITION",
            path_filter(self, "ind.SCHEMA_NAME", "ind.TABLE_NAME", &paths, &mut indices_params)
        );
        let mut keys_params = Vec::new();
        let keys_sql = format!(
            "SELECT {REFERENTIAL_COLUMNS} FROM SYS.REFERENTIAL_CONSTRAINTS WHERE {} ORDER BY POSITION",
            path_filter(self, "SCHEMA_NAME", "TABLE_NAME", &paths, &mut keys_params)
        );

        // HANA connections are serialized, so these run one after another
        // regardless of how they are awaited.
        let (table_rows, column_rows, constraint_rows, index_rows, key_rows) = futures::try_join!(
            fetch(conn, &tables_sql, &tables_params),
            fetch(conn, &columns_sql, &columns_params),
            fetch(conn, &constraints_sql, &constraints_params),
            fetch(conn, &indices_sql, &indices_params),
            fetch(conn, &keys_sql, &keys_params),
        )?;

        let mut columns = group_by_table(column_rows, "table_schema", "table_name");
        let mut constraints = group_by_table(constraint_rows, "table_schema", "table_name");
        let mut indices = group_by_table(index_rows, "table_schema", "table_name");
        let mut keys = group_by_table(key_rows, "table_schema", "table_name");

        let mut tables = Vec::with_capacity(table_rows.len());
        for row in &table_rows {
            let key = row_key(row, "table_schema", "table_name");
            let mut table = Table::new(display_name(&key.0, &key.1, default));
            table.columns = columns
                .remove(&key)
                .unwrap_or_default()
                .iter()
                .map(|r| self.column_from_row(r))
                .collect();

            let primary_rows = constraints.remove(&key).unwrap_or_default();
            for row in &primary_rows {
                if let Some(column) = row
                    .text("column_name")
                    .and_then(|name| table.find_column_mut(&name))
                {
                    column.is_primary = true;
                }
            }
            let primary_key_name = primary_rows.first().and_then(|r| r.text("constraint_name"));
            assign_primary_key_name(&mut table, ctx, primary_key_name);

            let index_rows = indices.remove(&key).unwrap_or_default();
            for (name, members) in group_ordered(&index_rows, "index_name") {
                let index_type = members[0].text("index_type").unwrap_or_default();
                let constraint = members[0].text("constraint").unwrap_or_default();
                table.indices.push(TableIndex {
                    name,
                    column_names: members.iter().filter_map(|r| r.text("column_name")).collect(),
                    is_unique: index_type.contains("UNIQUE") || constraint == "UNIQUE",
                    is_spatial: false,
                    is_fulltext: index_type.contains("FULLTEXT"),
                    where_clause: None,
                });
            }

            let key_rows = keys.remove(&key).unwrap_or_default();
            for (name, members) in group_ordered(&key_rows, "constraint_name") {
                table
                    .foreign_keys
                    .push(foreign_key_from_rows(&members, name, default));
            }

            mark_unique_columns(&mut table, schema);
            tables.push(table);
        }
        Ok(tables)
    }

    async fn table_names(&self, conn: &dyn Connection, ctx: &SchemaContext) -> Result<Vec<String>> {
        let mut parameters = Vec::new();
        let sql = format!(
            "SELECT TABLE_NAME AS \"table_name\" FROM SYS.TABLES WHERE {}",
            namespace_condition(self, "SCHEMA_NAME", ctx.schema.as_deref(), CURRENT, &mut parameters)
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
            "SELECT VIEW_NAME AS \"view_name\" FROM SYS.VIEWS WHERE {}",
            namespace_condition(self, "SCHEMA_NAME", ctx.schema.as_deref(), CURRENT, &mut parameters)
        );
        Ok(fetch(conn, &sql, &parameters)
            .await?
            .iter()
            .filter_map(|r| r.text("view_name"))
            .map(|name| View::new(name, ""))
            .collect())
    }

    async fn has_table(&self, conn: &dyn Connection, ctx: &SchemaContext, name: &str) -> Result<bool> {
        let path = self.resolve_path(ctx, name);
        let mut parameters = Vec::new();
        let namespace =
            namespace_condition(self, "SCHEMA_NAME", path.namespace.as_deref(), CURRENT, &mut parameters);
        parameters.push(Value::from(path.name));
        let sql = format!(
            "SELECT TABLE_NAME AS \"table_name\" FROM SYS.TABLES WHERE {namespace} AND TABLE_NAME = ?"
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
            namespace_condition(self, "SCHEMA_NAME", path.namespace.as_deref(), CURRENT, &mut parameters);
        parameters.push(Value::from(path.name));
        parameters.push(Value::from(column));
        let sql = format!(
            "SELECT COLUMN_NAME AS \"column_name\" FROM SYS.TABLE_COLUMNS \
             WHERE {namespace} AND TABLE_NAME = ? AND COLUMN_NAME = ?"
        );
        exists(conn, &sql, &parameters).await
    }

    async fn has_schema(&self, conn: &dyn Connection, schema: &str) -> Result<bool> {
        exists(
            conn,
            "SELECT SCHEMA_NAME AS \"schema_name\" FROM SYS.SCHEMAS WHERE SCHEMA_NAME = ?",
            &[Value::from(schema)],
        )
        .await
    }

    async fn has_database(&self, conn: &dyn Connection, database: &str) -> Result<bool> {
        exists(
            conn,
            "SELECT DATABASE_NAME AS \"database_name\" FROM SYS.M_DATABASES WHERE DATABASE_NAME = ?",
            &[Value::from(database)],
        )
        .await
    }

    async fn current_database(&self, conn: &dyn Connection) -> Result<Option<String>> {
        Ok(fetch(conn, "SELECT DATABASE_NAME AS \"name\" FROM SYS.M_DATABASE", &[])
            .await?
            .first()
            .and_then(|r| r.text("name")))
    }

    async fn current_schema(&self, conn: &dyn Connection) -> Result<Option<String>> {
        Ok(fetch(conn, "SELECT CURRENT_SCHEMA AS \"name\" FROM DUMMY", &[])
            .await?
            .first()
            .and_then(|r| r.text("name")))
    }

    async fn referencing_keys(
        &self,
        conn: &dyn Connection,
        ctx: &SchemaContext,
        table: &str,
    ) -> Result<Vec<ReferencingKey>> {
        let path = self.resolve_path(ctx, table);
        let default = self.default_namespace(ctx);
        let mut parameters = Vec::new();
        let namespace = namespace_condition(
            self,
            "REFERENCED_SCHEMA_NAME",
            path.namespace.as_deref(),
            CURRENT,
            &mut parameters,
        );
        parameters.push(Value::from(path.name));
        let sql = format!(
            "SELECT {REFERENTIAL_COLUMNS} FROM SYS.REFERENTIAL_CONSTRAINTS \
             WHERE {namespace} AND REFERENCED_TABLE_NAME = ? ORDER BY POSITION"
        );
        let rows = fetch(conn, &sql, &parameters).await?;
        let mut keys = Vec::new();
        for (_, members) in group_by_table(rows, "table_schema", "table_name") {
            let (namespace, name) = row_key(&members[0], "table_schema", "table_name");
            for (constraint, key_rows) in group_ordered(&members, "constraint_name") {
                keys.push(ReferencingKey {
                    table: display_name(&namespace, &name, default),
                    foreign_key: foreign_key_from_rows(&key_rows, constraint, default),
                });
            }
        }
        keys.sort_by(|a, b| (&a.table, &a.foreign_key.name).cmp(&(&b.table, &b.foreign_key.name)));
        Ok(keys)
    }
}
