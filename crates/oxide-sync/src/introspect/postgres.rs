//! PostgreSQL catalog: `information_schema` plus `pg_catalog` for
//! constraints, indices and enum labels.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{
    assign_primary_key_name, display_name, exists, fetch, group_by_table, group_ordered,
    mark_unique_columns, namespace_condition, path_filter, row_key, Catalog, TableKey,
};
use crate::connection::{Connection, Row, RowExt};
use crate::context::{SchemaContext, TablePath};
use crate::dialect::postgres::DEFAULT_TIMESTAMP_PRECISION;
use crate::dialect::{DdlContext, DdlDialect, PostgresDialect};
use crate::error::Result;
use crate::schema::{
    ForeignKeyAction, GeneratedType, GenerationStrategy, Table, TableCheck, TableColumn,
    TableExclusion, TableForeignKey, TableIndex, TableUnique, View,
};

const CURRENT: &str = "current_schema()";

const UUID_FUNCTIONS: [&str; 2] = ["uuid_generate_v4()", "gen_random_uuid()"];

fn referential_action(code: Option<String>) -> ForeignKeyAction {
    match code.as_deref() {
        Some("r") => ForeignKeyAction::Restrict,
        Some("c") => ForeignKeyAction::Cascade,
        Some("n") => ForeignKeyAction::SetNull,
        Some("d") => ForeignKeyAction::SetDefault,
        _ => ForeignKeyAction::NoAction,
    }
}

fn strip_wrapper<'a>(definition: &'a str, prefix: &str) -> &'a str {
    definition
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(definition)
}

impl PostgresDialect {
    fn column_from_row(
        &self,
        ctx: &DdlContext<'_>,
        table: &str,
        row: &Row,
        enums: &HashMap<TableKey, Vec<String>>,
    ) -> TableColumn {
        let name = row.text("column_name").unwrap_or_default();
        let mut data_type = row.text("data_type").unwrap_or_default();
        let mut is_array = false;
        let mut udt_name = row.text("udt_name").unwrap_or_default();
        if data_type == "ARRAY" {
            is_array = true;
            udt_name = udt_name.trim_start_matches('_').to_string();
            data_type = udt_name.clone();
        }

        let enum_key = (row.text("udt_schema").unwrap_or_default(), udt_name.clone());
        let enum_values = enums.get(&enum_key).cloned();
        if enum_values.is_some() {
            data_type = "enum".to_string();
        } else if data_type == "USER-DEFINED" {
            data_type = udt_name.clone();
        }

        let mut column = TableColumn::new(&name, data_type);
        column.is_array = is_array;
        column.is_nullable = row.text("is_nullable").as_deref() == Some("YES");
        column.comment = row.text("column_comment");
        column.collation = row.text("collation_name");
        if let Some(values) = enum_values {
            column.enum_values = Some(values);
            if udt_name != ctx.naming.enum_type_name(table, &name) {
                column.enum_name = Some(udt_name);
            }
        }
        // Normalize through the column itself so array element types
        // (`int4`) get the long spelling too.
        if is_array {
            column.data_type = self.normalize_type(&column);
        }

        match column.data_type.as_str() {
            "character varying" | "character" | "bit" | "bit varying" => {
                column.length = row.text("character_maximum_length");
            }
            "numeric" => {
                column.precision = row.int("numeric_precision").and_then(|p| u32::try_from(p).ok());
                column.scale = row.int("numeric_scale").and_then(|s| u32::try_from(s).ok());
            }
            "timestamp without time zone"
            | "timestamp with time zone"
            | "time without time zone"
            | "time with time zone" => {
                column.precision = row
                    .int("datetime_precision")
                    .filter(|p| *p != i64::from(DEFAULT_TIMESTAMP_PRECISION))
                    .and_then(|p| u32::try_from(p).ok());
            }
            _ => {}
        }

        if row.text("is_identity").as_deref() == Some("YES") {
            column.is_generated = true;
            column.generation_strategy = Some(GenerationStrategy::Identity);
        }
        if row.text("is_generated").as_deref() == Some("ALWAYS") {
            column.as_expression = row.text("generation_expression");
            column.generated_type = Some(GeneratedType::Stored);
        }

        if let Some(raw) = row.text("column_default") {
            if raw.starts_with("nextval(") {
                column.is_generated = true;
                column.generation_strategy = Some(GenerationStrategy::Increment);
            } else if UUID_FUNCTIONS.iter().any(|f| raw.contains(f)) {
                column.is_generated = true;
                column.generation_strategy = Some(GenerationStrategy::Uuid);
            } else {
                let normalized = self.normalize_default(&raw);
                if !normalized.eq_ignore_ascii_case("null") {
                    column.default = Some(normalized);
                }
            }
        }
        column
    }
}

#[async_trait]
impl Catalog for PostgresDialect {
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
        debug!(tables = names.len(), "Loading PostgreSQL tables");

        let mut tables_params = Vec::new();
        let tables_sql = format!(
            "SELECT table_schema, table_name FROM information_schema.tables \
             WHERE table_type = 'BASE TABLE' AND {}",
            path_filter(self, "table_schema", "table_name", &paths, &mut tables_params)
        );
        let mut columns_params = Vec::new();
        let columns_sql = format!(
            "SELECT c.table_schema, c.table_name, c.column_name, c.data_type, c.udt_schema, \
             c.udt_name, c.is_nullable, c.column_default, c.character_maximum_length, \
             c.numeric_precision, c.numeric_scale, c.datetime_precision, c.is_identity, \
             c.is_generated, c.generation_expression, c.collation_name, \
             col_description((quote_ident(c.table_schema) || '.' || quote_ident(c.table_name))::regclass, \
             c.ordinal_position::int) AS column_comment \
             FROM information_schema.columns c WHERE {} ORDER BY c.ordinal_position",
            path_filter(self, "c.table_schema", "c.table_name", &paths, &mut columns_params)
        );
        let mut constraints_params = Vec::new();
        let constraints_sql = format!(
            "SELECT ns.nspname AS table_schema, t.relname AS table_name, \
             cnst.conname AS constraint_name, cnst.contype AS constraint_type, \
             pg_get_constraintdef(cnst.oid) AS expression, a.attname AS column_name \
             FROM pg_constraint cnst \
             INNER JOIN pg_class t ON t.oid = cnst.conrelid \
             INNER JOIN pg_namespace ns ON ns.oid = t.relnamespace \
             LEFT JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY (cnst.conkey) \
             WHERE cnst.contype IN ('p', 'u', 'c', 'x') AND {} \
             ORDER BY cnst.conname, array_position(cnst.conkey, a.attnum)",
            path_filter(self, "ns.nspname", "t.relname", &paths, &mut constraints_params)
        );
        let mut indices_params = Vec::new();
        let indices_sql = format!(
            "SELECT ns.nspname AS table_schema, t.relname AS table_name, i.relname AS index_name, \
             a.attname AS column_name, ix.indisunique AS is_unique, \
             pg_get_expr(ix.indpred, ix.indrelid) AS condition, am.amname AS index_type \
             FROM pg_index ix \
             INNER JOIN pg_class t ON t.oid = ix.indrelid \
             INNER JOIN pg_class i ON i.oid = ix.indexrelid \
             INNER JOIN pg_namespace ns ON ns.oid = t.relnamespace \
             INNER JOIN pg_am am ON am.oid = i.relam \
             INNER JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY (ix.indkey) \
             LEFT JOIN pg_constraint cnst ON cnst.conindid = ix.indexrelid \
             AND cnst.contype IN ('p', 'u', 'x') \
             WHERE cnst.oid IS NULL AND {} \
             ORDER BY i.relname, array_position(ix.indkey::int2[], a.attnum)",
            path_filter(self, "ns.nspname", "t.relname", &paths, &mut indices_params)
        );
        let mut keys_params = Vec::new();
        let keys_sql = format!(
            "SELECT ns.nspname AS table_schema, cl.relname AS table_name, \
             con.conname AS constraint_name, att2.attname AS column_name, \
             rns.nspname AS referenced_table_schema, rcl.relname AS referenced_table_name, \
             att.attname AS referenced_column_name, con.confdeltype AS on_delete, \
             con.confupdtype AS on_update, con.condeferrable AS is_deferrable, \
             con.condeferred AS is_deferred \
             FROM (SELECT unnest(conkey) AS parent, unnest(confkey) AS child, \
             generate_subscripts(conkey, 1) AS position, conname, conrelid, confrelid, \
             confdeltype, confupdtype, condeferrable, condeferred \
             FROM pg_constraint WHERE contype = 'f') con \
             INNER JOIN pg_class cl ON cl.oid = con.conrelid \
             INNER JOIN pg_namespace ns ON ns.oid = cl.relnamespace \
             INNER JOIN pg_class rcl ON rcl.oid = con.confrelid \
             INNER JOIN pg_namespace rns ON rns.oid = rcl.relnamespace \
             INNER JOIN pg_attribute att ON att.attrelid = con.confrelid AND att.attnum = con.child \
             INNER JOIN pg_attribute att2 ON att2.attrelid = con.conrelid AND att2.attnum = con.parent \
             WHERE {} ORDER BY con.conname, con.position",
            path_filter(self, "ns.nspname", "cl.relname", &paths, &mut keys_params)
        );
        let enums_sql = "SELECT n.nspname AS type_schema, t.typname AS type_name, \
             e.enumlabel AS label FROM pg_enum e \
             INNER JOIN pg_type t ON t.oid = e.enumtypid \
             INNER JOIN pg_namespace n ON n.oid = t.typnamespace \
             ORDER BY t.typname, e.enumsortorder";

        let (table_rows, column_rows, constraint_rows, index_rows, key_rows, enum_rows) = futures::try_join!(
            fetch(conn, &tables_sql, &tables_params),
            fetch(conn, &columns_sql, &columns_params),
            fetch(conn, &constraints_sql, &constraints_params),
            fetch(conn, &indices_sql, &indices_params),
            fetch(conn, &keys_sql, &keys_params),
            fetch(conn, enums_sql, &[]),
        )?;

        let mut enums: HashMap<TableKey, Vec<String>> = HashMap::new();
        for row in &enum_rows {
            if let Some(label) = row.text("label") {
                enums
                    .entry(row_key(row, "type_schema", "type_name"))
                    .or_default()
                    .push(label);
            }
        }
        let mut columns = group_by_table(column_rows, "table_schema", "table_name");
        let mut constraints = group_by_table(constraint_rows, "table_schema", "table_name");
        let mut indices = group_by_table(index_rows, "table_schema", "table_name");
        let mut keys = group_by_table(key_rows, "table_schema", "table_name");

        let mut tables = Vec::with_capacity(table_rows.len());
        for row in &table_rows {
            let key = row_key(row, "table_schema", "table_name");
            let mut table = Table::new(display_name(&key.0, &key.1, default));
            let name = table.name.clone();
            table.columns = columns
                .remove(&key)
                .unwrap_or_default()
                .iter()
                .map(|r| self.column_from_row(ctx, &name, r, &enums))
                .collect();

            let mut primary_key_name = None;
            let constraint_rows = constraints.remove(&key).unwrap_or_default();
            for (constraint, members) in group_ordered(&constraint_rows, "constraint_name") {
                let column_names: Vec<String> =
                    members.iter().filter_map(|r| r.text("column_name")).collect();
                let expression = members[0].text("expression").unwrap_or_default();
                match members[0].text("constraint_type").as_deref() {
                    Some("p") => {
                        for column in &mut table.columns {
                            column.is_primary |= column_names.contains(&column.name);
                        }
                        primary_key_name = Some(constraint);
                    }
                    Some("u") => table.uniques.push(TableUnique {
                        name: constraint,
                        column_names,
                    }),
                    Some("c") => table.checks.push(TableCheck {
                        name: constraint,
                        column_names,
                        expression: strip_wrapper(&expression, "CHECK (").to_string(),
                    }),
                    Some("x") => table.exclusions.push(TableExclusion {
                        name: constraint,
                        expression: expression
                            .strip_prefix("EXCLUDE ")
                            .unwrap_or(&expression)
                            .to_string(),
                    }),
                    _ => {}
                }
            }
            assign_primary_key_name(&mut table, ctx, primary_key_name);

            let index_rows = indices.remove(&key).unwrap_or_default();
            for (index, members) in group_ordered(&index_rows, "index_name") {
                table.indices.push(TableIndex {
                    name: index,
                    column_names: members.iter().filter_map(|r| r.text("column_name")).collect(),
                    is_unique: members[0].flag("is_unique"),
                    is_spatial: members[0].text("index_type").as_deref() == Some("gist"),
                    is_fulltext: false,
                    where_clause: members[0].text("condition"),
                });
            }

            let key_rows = keys.remove(&key).unwrap_or_default();
            for (foreign_key, members) in group_ordered(&key_rows, "constraint_name") {
                let first = members[0];
                let deferrable = first.flag("is_deferrable").then(|| {
                    if first.flag("is_deferred") {
                        "INITIALLY DEFERRED".to_string()
                    } else {
                        "INITIALLY IMMEDIATE".to_string()
                    }
                });
                table.foreign_keys.push(TableForeignKey {
                    name: foreign_key,
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
                    on_delete: referential_action(first.text("on_delete")),
                    on_update: referential_action(first.text("on_update")),
                    deferrable,
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
            "SELECT table_name FROM information_schema.tables \
             WHERE table_type = 'BASE TABLE' AND {}",
            namespace_condition(self, "table_schema", ctx.schema.as_deref(), CURRENT, &mut parameters)
        );
        Ok(fetch(conn, &sql, &parameters)
            .await?
            .iter()
            .filter_map(|r| r.text("table_name"))
            .collect())
    }

    async fn list_views(&self, conn: &dyn Connection, ctx: &SchemaContext) -> Result<Vec<View>> {
        let mut view_params = Vec::new();
        let views_sql = format!(
            "SELECT table_name FROM information_schema.views WHERE {}",
            namespace_condition(self, "table_schema", ctx.schema.as_deref(), CURRENT, &mut view_params)
        );
        let mut materialized_params = Vec::new();
        let materialized_sql = format!(
            "SELECT matviewname AS table_name FROM pg_matviews WHERE {}",
            namespace_condition(
                self,
                "schemaname",
                ctx.schema.as_deref(),
                CURRENT,
                &mut materialized_params
            )
        );
        let (views, materialized) = futures::try_join!(
            fetch(conn, &views_sql, &view_params),
            fetch(conn, &materialized_sql, &materialized_params),
        )?;
        Ok(views
            .iter()
            .filter_map(|r| r.text("table_name"))
            .map(|name| View::new(name, ""))
            .chain(
                materialized
                    .iter()
                    .filter_map(|r| r.text("table_name"))
                    .map(|name| View::new(name, "").materialized()),
            )
            .collect())
    }

    async fn has_table(&self, conn: &dyn Connection, ctx: &SchemaContext, name: &str) -> Result<bool> {
        let path = self.resolve_path(ctx, name);
        let mut parameters = Vec::new();
        let namespace =
            namespace_condition(self, "table_schema", path.namespace.as_deref(), CURRENT, &mut parameters);
        parameters.push(Value::from(path.name));
        let sql = format!(
            "SELECT table_name FROM information_schema.tables WHERE {namespace} AND table_name = {}",
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
            namespace_condition(self, "table_schema", path.namespace.as_deref(), CURRENT, &mut parameters);
        parameters.push(Value::from(path.name));
        parameters.push(Value::from(column));
        let sql = format!(
            "SELECT column_name FROM information_schema.columns \
             WHERE {namespace} AND table_name = {} AND column_name = {}",
            self.placeholder(parameters.len() - 1),
            self.placeholder(parameters.len())
        );
        exists(conn, &sql, &parameters).await
    }

    async fn has_schema(&self, conn: &dyn Connection, schema: &str) -> Result<bool> {
        exists(
            conn,
            "SELECT schema_name FROM information_schema.schemata WHERE schema_name = $1",
            &[Value::from(schema)],
        )
        .await
    }

    async fn has_database(&self, conn: &dyn Connection, database: &str) -> Result<bool> {
        exists(
            conn,
            "SELECT datname FROM pg_database WHERE datname = $1",
            &[Value::from(database)],
        )
        .await
    }

    async fn current_database(&self, conn: &dyn Connection) -> Result<Option<String>> {
        Ok(fetch(conn, "SELECT current_database() AS name", &[])
            .await?
            .first()
            .and_then(|r| r.text("name")))
    }

    async fn current_schema(&self, conn: &dyn Connection) -> Result<Option<String>> {
        Ok(fetch(conn, "SELECT current_schema() AS name", &[])
            .await?
            .first()
            .and_then(|r| r.text("name")))
    }

    async fn has_type(&self, conn: &dyn Connection, ctx: &SchemaContext, path: &TablePath) -> Result<bool> {
        let path = path.clone().or_namespace(self.default_namespace(ctx));
        let mut parameters = Vec::new();
        let namespace =
            namespace_condition(self, "n.nspname", path.namespace.as_deref(), CURRENT, &mut parameters);
        parameters.push(Value::from(path.name));
        let sql = format!(
            "SELECT t.typname FROM pg_type t INNER JOIN pg_namespace n ON n.oid = t.typnamespace \
             WHERE {namespace} AND t.typname = {}",
            self.placeholder(parameters.len())
        );
        exists(conn, &sql, &parameters).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{DefaultNamingStrategy, NamingStrategy};
    use crate::testing::ScriptedConnection;
    use serde_json::json;

    fn post_catalog() -> ScriptedConnection {
        let naming = DefaultNamingStrategy::new();
        let primary = naming.primary_key_name("post", &["id".to_string()]);
        ScriptedConnection::new()
            .respond(
                "FROM information_schema.tables",
                json!([{"table_schema": "public", "table_name": "post"}]),
            )
            .respond(
                "FROM information_schema.columns",
                json!([
                    {"table_schema": "public", "table_name": "post", "column_name": "id",
                     "data_type": "integer", "udt_schema": "pg_catalog", "udt_name": "int4",
                     "is_nullable": "NO", "column_default": "nextval('post_id_seq'::regclass)",
                     "is_identity": "NO", "is_generated": "NEVER"},
                    {"table_schema": "public", "table_name": "post", "column_name": "status",
                     "data_type": "USER-DEFINED", "udt_schema": "public",
                     "udt_name": "post_status_enum", "is_nullable": "NO",
                     "column_default": "'draft'::post_status_enum",
                     "is_identity": "NO", "is_generated": "NEVER"},
                    {"table_schema": "public", "table_name": "post", "column_name": "tags",
                     "data_type": "ARRAY", "udt_schema": "pg_catalog", "udt_name": "_int4",
                     "is_nullable": "YES", "column_default": null,
                     "is_identity": "NO", "is_generated": "NEVER"},
                    {"table_schema": "public", "table_name": "post", "column_name": "created_at",
                     "data_type": "timestamp without time zone", "udt_schema": "pg_catalog",
                     "udt_name": "timestamp", "is_nullable": "NO", "column_default": "now()",
                     "datetime_precision": 6, "is_identity": "NO", "is_generated": "NEVER",
                     "column_comment": "creation time"}
                ]),
            )
            .respond(
                "FROM pg_constraint cnst",
                json!([
                    {"table_schema": "public", "table_name": "post", "constraint_name": primary,
                     "constraint_type": "p", "expression": "PRIMARY KEY (id)", "column_name": "id"},
                    {"table_schema": "public", "table_name": "post", "constraint_name": "CHK_positive",
                     "constraint_type": "c", "expression": "CHECK ((id > 0))", "column_name": "id"}
                ]),
            )
            .respond(
                "FROM pg_index ix",
                json!([
                    {"table_schema": "public", "table_name": "post", "index_name": "IDX_recent",
                     "column_name": "created_at", "is_unique": false,
                     "condition": "(status = 'published'::post_status_enum)", "index_type": "btree"}
                ]),
            )
            .respond(
                "FROM pg_enum e",
                json!([
                    {"type_schema": "public", "type_name": "post_status_enum", "label": "draft"},
                    {"type_schema": "public", "type_name": "post_status_enum", "label": "published"}
                ]),
            )
    }

    #[tokio::test]
    async fn test_load_tables_matches_declared_shape() {
        let conn = post_catalog();
        let naming = DefaultNamingStrategy::new();
        let schema = SchemaContext::with_schema("public");
        let ctx = DdlContext {
            naming: &naming,
            schema: &schema,
        };
        let tables = PostgresDialect::new()
            .load_tables(&conn, &ctx, &["post".to_string()])
            .await
            .unwrap();
        let table = &tables[0];
        assert_eq!(table.name, "post");

        let id = table.find_column("id").unwrap();
        assert!(id.is_primary && id.is_increment());
        assert_eq!(id.default, None);
        assert_eq!(id.primary_key_constraint_name, None);

        let status = table.find_column("status").unwrap();
        assert_eq!(status.data_type, "enum");
        assert_eq!(
            status.enum_values,
            Some(vec!["draft".to_string(), "published".to_string()])
        );
        assert_eq!(status.enum_name, None);
        assert_eq!(status.default.as_deref(), Some("'draft'"));

        let tags = table.find_column("tags").unwrap();
        assert!(tags.is_array);
        assert_eq!(tags.data_type, "integer");

        let created = table.find_column("created_at").unwrap();
        assert_eq!(created.precision, None);
        assert_eq!(created.default.as_deref(), Some("now()"));
        assert_eq!(created.comment.as_deref(), Some("creation time"));

        assert_eq!(table.checks[0].expression, "(id > 0)");
        assert_eq!(
            table.indices[0].where_clause.as_deref(),
            Some("(status = 'published'::post_status_enum)")
        );
    }

    #[tokio::test]
    async fn test_empty_names_return_nothing() {
        let conn = ScriptedConnection::new();
        let naming = DefaultNamingStrategy::new();
        let schema = SchemaContext::default();
        let ctx = DdlContext {
            naming: &naming,
            schema: &schema,
        };
        assert!(PostgresDialect::new()
            .load_tables(&conn, &ctx, &[])
            .await
            .unwrap()
            .is_empty());
        assert!(conn.executed().is_empty());
    }

    #[tokio::test]
    async fn test_list_views_marks_materialized() {
        let conn = ScriptedConnection::new()
            .respond("FROM information_schema.views", json!([{"table_name": "v"}]))
            .respond("FROM pg_matviews", json!([{"table_name": "mv"}]));
        let views = PostgresDialect::new()
            .list_views(&conn, &SchemaContext::default())
            .await
            .unwrap();
        assert_eq!(views.len(), 2);
        assert!(!views[0].materialized);
        assert!(views[1].materialized);
        assert!(conn.executed()[0].ends_with("table_schema = current_schema()"));
    }

    #[tokio::test]
    async fn test_has_type_uses_schema() {
        let conn = ScriptedConnection::new().respond("FROM pg_type t", json!([{"typname": "x"}]));
        let found = PostgresDialect::new()
            .has_type(
                &conn,
                &SchemaContext::with_schema("public"),
                &TablePath::parse("user_role_enum_old"),
            )
            .await
            .unwrap();
        assert!(found);
        assert_eq!(
            conn.parameters(0),
            vec![json!("public"), json!("user_role_enum_old")]
        );
    }

    #[test]
    fn test_referential_action_codes() {
        assert_eq!(referential_action(Some("c".into())), ForeignKeyAction::Cascade);
        assert_eq!(referential_action(None), ForeignKeyAction::NoAction);
    }
}
