//! Live schema introspection.
//!
//! A [`Catalog`] reads the system catalogs of one database family and
//! materializes [`Table`] and [`View`] values shaped exactly like declared
//! ones: same type spelling, same default normalization, same unique-index
//! substitution. Anything that differs after that is real drift.
//!
//! Catalogs are implemented by the dialect structs themselves, so one value
//! both writes and reads the schema.

pub mod hana;
pub mod mysql;
pub mod postgres;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::connection::{Connection, Row, RowExt};
use crate::context::{SchemaContext, TablePath};
use crate::dialect::{DdlContext, DdlDialect, DialectKind, HanaDialect, MySqlDialect, PostgresDialect};
use crate::error::Result;
use crate::metadata::MetadataTable;
use crate::schema::{Table, TableForeignKey, View};

/// A foreign key of another table pointing at the table being changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencingKey {
    /// Path of the referencing table.
    pub table: String,
    /// The foreign key as it is declared on `table`.
    pub foreign_key: TableForeignKey,
}

/// Reads live schema structure. Every name passed in may be qualified or
/// not; unqualified names resolve to the dialect's default namespace.
#[async_trait]
pub trait Catalog: DdlDialect {
    /// Loads the named tables. Unknown names are skipped; an empty list
    /// returns nothing without querying.
    async fn load_tables(
        &self,
        conn: &dyn Connection,
        ctx: &DdlContext<'_>,
        names: &[String],
    ) -> Result<Vec<Table>>;

    /// Names of every table in the default namespace.
    async fn table_names(&self, conn: &dyn Connection, ctx: &SchemaContext) -> Result<Vec<String>>;

    /// Every view in the default namespace, without its definition.
    async fn list_views(&self, conn: &dyn Connection, ctx: &SchemaContext) -> Result<Vec<View>>;

    /// Returns true if the table exists.
    async fn has_table(&self, conn: &dyn Connection, ctx: &SchemaContext, name: &str)
        -> Result<bool>;

    /// Returns true if the table has the column.
    async fn has_column(
        &self,
        conn: &dyn Connection,
        ctx: &SchemaContext,
        table: &str,
        column: &str,
    ) -> Result<bool>;

    /// Returns true if the schema exists.
    async fn has_schema(&self, conn: &dyn Connection, schema: &str) -> Result<bool>;

    /// Returns true if the database exists.
    async fn has_database(&self, conn: &dyn Connection, database: &str) -> Result<bool>;

    /// Database the connection is using.
    async fn current_database(&self, conn: &dyn Connection) -> Result<Option<String>>;

    /// Schema unqualified names resolve to.
    async fn current_schema(&self, conn: &dyn Connection) -> Result<Option<String>>;

    /// Foreign keys of other tables that reference `table`.
    async fn referencing_keys(
        &self,
        _conn: &dyn Connection,
        _ctx: &SchemaContext,
        _table: &str,
    ) -> Result<Vec<ReferencingKey>> {
        Ok(Vec::new())
    }

    /// Returns true if the user-defined type exists.
    async fn has_type(
        &self,
        _conn: &dyn Connection,
        _ctx: &SchemaContext,
        _path: &TablePath,
    ) -> Result<bool> {
        Ok(false)
    }

    /// Loads persisted views from the metadata table. A missing metadata
    /// table means no view was ever persisted.
    async fn load_views(
        &self,
        conn: &dyn Connection,
        ctx: &SchemaContext,
        metadata: &MetadataTable,
        names: &[String],
    ) -> Result<Vec<View>> {
        if names.is_empty() || !self.has_table(conn, ctx, metadata.name()).await? {
            return Ok(Vec::new());
        }
        let paths: Vec<TablePath> = names.iter().map(|n| self.resolve_path(ctx, n)).collect();
        let statement = metadata.select_views(self, ctx, &paths);
        let rows = conn.execute(&statement.sql, &statement.parameters).await?;
        Ok(rows
            .records
            .iter()
            .filter_map(|row| MetadataTable::view_from_row(row, self.default_namespace(ctx)))
            .collect())
    }
}

/// The catalog (and dialect) of a database family.
#[must_use]
pub fn catalog_for(kind: DialectKind) -> Arc<dyn Catalog> {
    match kind {
        DialectKind::MySql => Arc::new(MySqlDialect::new()),
        DialectKind::Postgres => Arc::new(PostgresDialect::new()),
        DialectKind::Hana => Arc::new(HanaDialect::new()),
    }
}

/// Grouping key of catalog rows: `(namespace, name)`.
pub type TableKey = (String, String);

/// Reads the `(namespace, name)` key of a row.
#[must_use]
pub fn row_key(row: &Row, namespace: &str, name: &str) -> TableKey {
    (
        row.text(namespace).unwrap_or_default(),
        row.text(name).unwrap_or_default(),
    )
}

/// Groups rows by table.
#[must_use]
pub fn group_by_table(rows: Vec<Row>, namespace: &str, name: &str) -> HashMap<TableKey, Vec<Row>> {
    let mut groups: HashMap<TableKey, Vec<Row>> = HashMap::new();
    for row in rows {
        groups
            .entry(row_key(&row, namespace, name))
            .or_default()
            .push(row);
    }
    groups
}

/// Groups rows by the value of `column`, keeping first-seen order.
#[must_use]
pub fn group_ordered<'a>(rows: &'a [Row], column: &str) -> Vec<(String, Vec<&'a Row>)> {
    let mut groups: Vec<(String, Vec<&'a Row>)> = Vec::new();
    for row in rows {
        let key = row.text(column).unwrap_or_default();
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(row),
            None => groups.push((key, vec![row])),
        }
    }
    groups
}

/// Builds `((ns = ? AND name = ?) OR ...)`, appending the bound values to
/// `parameters`. Paths without a namespace only match on the name.
pub fn path_filter<D: DdlDialect + ?Sized>(
    dialect: &D,
    namespace_column: &str,
    name_column: &str,
    paths: &[TablePath],
    parameters: &mut Vec<Value>,
) -> String {
    let conditions: Vec<String> = paths
        .iter()
        .map(|path| {
            let mut condition = String::from("(");
            if let Some(ns) = &path.namespace {
                parameters.push(Value::from(ns.as_str()));
                condition.push_str(&format!(
                    "{namespace_column} = {} AND ",
                    dialect.placeholder(parameters.len())
                ));
            }
            parameters.push(Value::from(path.name.as_str()));
            condition.push_str(&format!(
                "{name_column} = {})",
                dialect.placeholder(parameters.len())
            ));
            condition
        })
        .collect();
    format!("({})", conditions.join(" OR "))
}

/// Builds `column = ?` for a known namespace, or compares against
/// `fallback` (a function such as `DATABASE()`) when there is none.
pub fn namespace_condition<D: DdlDialect + ?Sized>(
    dialect: &D,
    column: &str,
    namespace: Option<&str>,
    fallback: &str,
    parameters: &mut Vec<Value>,
) -> String {
    match namespace {
        Some(ns) => {
            parameters.push(Value::from(ns));
            format!("{column} = {}", dialect.placeholder(parameters.len()))
        }
        None => format!("{column} = {fallback}"),
    }
}

/// Name a loaded object is reported under: unqualified inside the default
/// namespace, qualified elsewhere.
#[must_use]
pub fn display_name(namespace: &str, name: &str, default: Option<&str>) -> String {
    TablePath {
        namespace: (!namespace.is_empty()).then(|| namespace.to_string()),
        name: name.to_string(),
    }
    .display_in(default)
}

/// Marks columns covered by a single-column unique index or constraint as
/// unique. Composite uniques and unsynchronized indices do not count.
pub fn mark_unique_columns(table: &mut Table, ctx: &SchemaContext) {
    let mut unique_columns = Vec::new();
    for index in &table.indices {
        if index.is_unique
            && index.column_names.len() == 1
            && !ctx.unsynchronized_indices.contains(&index.name)
        {
            unique_columns.push(index.column_names[0].clone());
        }
    }
    for unique in &table.uniques {
        if unique.column_names.len() == 1 && !ctx.unsynchronized_indices.contains(&unique.name) {
            unique_columns.push(unique.column_names[0].clone());
        }
    }
    for column in &mut table.columns {
        column.is_unique = unique_columns.contains(&column.name);
    }
}

/// Keeps the primary key name only when the naming strategy would not
/// derive it, so default-named keys compare equal to declared ones.
pub fn assign_primary_key_name(table: &mut Table, ctx: &DdlContext<'_>, name: Option<String>) {
    let Some(name) = name else {
        return;
    };
    let derived = ctx
        .naming
        .primary_key_name(&table.name, &table.primary_column_names());
    if name != derived {
        for column in table.columns.iter_mut().filter(|c| c.is_primary) {
            column.primary_key_constraint_name = Some(name.clone());
        }
    }
}

/// Runs a query and returns its rows.
pub async fn fetch(conn: &dyn Connection, sql: &str, parameters: &[Value]) -> Result<Vec<Row>> {
    Ok(conn.execute(sql, parameters).await?.records)
}

/// Runs a query and reports whether it returned a row.
pub async fn exists(conn: &dyn Connection, sql: &str, parameters: &[Value]) -> Result<bool> {
    Ok(!fetch(conn, sql, parameters).await?.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::PostgresDialect;
    use crate::schema::{TableColumn, TableIndex, TableUnique};
    use serde_json::json;

    #[test]
    fn test_catalog_for_kind() {
        for kind in [DialectKind::MySql, DialectKind::Postgres, DialectKind::Hana] {
            assert_eq!(catalog_for(kind).kind(), kind);
        }
    }

    #[test]
    fn test_path_filter_binds_in_order() {
        let mut parameters = Vec::new();
        let paths = vec![TablePath::parse("public.user"), TablePath::parse("post")];
        let sql = path_filter(
            &PostgresDialect::new(),
            "table_schema",
            "table_name",
            &paths,
            &mut parameters,
        );
        assert_eq!(
            sql,
            "((table_schema = $1 AND table_name = $2) OR (table_name = $3))"
        );
        assert_eq!(parameters, vec![json!("public"), json!("user"), json!("post")]);
    }

    #[test]
    fn test_group_ordered_keeps_first_seen_order() {
        let rows: Vec<Row> = [("b", "x"), ("a", "y"), ("b", "z")]
            .iter()
            .map(|(k, v)| json!({"k": k, "v": v}).as_object().cloned().unwrap())
            .collect();
        let groups = group_ordered(&rows, "k");
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "b");
        assert_eq!(groups[0].1.len(), 2);
    }

    #[test]
    fn test_mark_unique_columns() {
        let mut ctx = SchemaContext::default();
        ctx.unsynchronized_indices.insert("IDX_ignored".to_string());
        let mut table = Table::new("t")
            .column(TableColumn::new("a", "int"))
            .column(TableColumn::new("b", "int"))
            .column(TableColumn::new("c", "int"))
            .column(TableColumn::new("d", "int"))
            .index(TableIndex::new("IDX_a", ["a"]).unique())
            .index(TableIndex::new("IDX_ignored", ["b"]).unique())
            .unique(TableUnique::new("UQ_cd", ["c", "d"]));
        mark_unique_columns(&mut table, &ctx);
        let flags: Vec<bool> = table.columns.iter().map(|c| c.is_unique).collect();
        assert_eq!(flags, vec![true, false, false, false]);
    }

    #[test]
    fn test_namespace_condition_falls_back() {
        let dialect = PostgresDialect::new();
        let mut parameters = Vec::new();
        assert_eq!(
            namespace_condition(&dialect, "table_schema", None, "current_schema()", &mut parameters),
            "table_schema = current_schema()"
        );
        assert_eq!(
            namespace_condition(&dialect, "table_schema", Some("app"), "current_schema()", &mut parameters),
            "table_schema = $1"
        );
        assert_eq!(parameters, vec![json!("app")]);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("public", "user", Some("public")), "user");
        assert_eq!(display_name("audit", "log", Some("public")), "audit.log");
        assert_eq!(display_name("", "log", None), "log");
    }
}
