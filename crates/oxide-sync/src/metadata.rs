//! Reserved table persisting view definitions.
//!
//! Catalogs do not hand back view definitions in the form they were
//! declared, so every created view also gets a row `(type, schema, name,
//! value)` here. The row is written and removed through the same up/down
//! pairs as the `CREATE VIEW` itself.

use serde_json::Value;

use crate::connection::{Row, RowExt};
use crate::context::{SchemaContext, TablePath};
use crate::dialect::DdlDialect;
use crate::introspect::{display_name, path_filter};
use crate::schema::{Table, TableColumn, View};
use crate::statement::Statement;

/// Default name of the metadata table.
pub const DEFAULT_METADATA_TABLE: &str = "oxide_metadata";

/// Kind of a metadata row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    /// A plain view.
    View,
    /// A materialized view.
    MaterializedView,
}

impl MetadataKind {
    /// Value stored in the `type` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::View => "VIEW",
            Self::MaterializedView => "MATERIALIZED_VIEW",
        }
    }

    /// Kind for `view`.
    #[must_use]
    pub const fn of(view: &View) -> Self {
        if view.materialized {
            Self::MaterializedView
        } else {
            Self::View
        }
    }
}

/// The metadata table of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataTable {
    name: String,
}

impl Default for MetadataTable {
    fn default() -> Self {
        Self::new(DEFAULT_METADATA_TABLE)
    }
}

impl MetadataTable {
    /// Creates a handle for the table called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared structure of the metadata table.
    #[must_use]
    pub fn table(&self) -> Table {
        Table::new(self.name.clone())
            .column(TableColumn::new("type", "varchar").length("255"))
            .column(TableColumn::new("schema", "varchar").length("255").nullable())
            .column(TableColumn::new("name", "varchar").length("255").nullable())
            .column(TableColumn::new("value", "text").nullable())
    }

    fn view_path<D: DdlDialect + ?Sized>(
        dialect: &D,
        ctx: &SchemaContext,
        view: &View,
    ) -> TablePath {
        dialect.resolve_path(ctx, &view.name)
    }

    /// Records `view`.
    #[must_use]
    pub fn insert_view<D: DdlDialect + ?Sized>(
        &self,
        dialect: &D,
        ctx: &SchemaContext,
        view: &View,
    ) -> Statement {
        let path = Self::view_path(dialect, ctx, view);
        let columns = ["type", "schema", "name", "value"].map(|c| dialect.escape(c));
        let placeholders: Vec<String> = (1..=4).map(|i| dialect.placeholder(i)).collect();
        Statement::with_parameters(
            format!(
                "INSERT INTO {}({}) VALUES ({})",
                dialect.escape_path(&self.name),
                columns.join(", "),
                placeholders.join(", ")
            ),
            vec![
                Value::from(MetadataKind::of(view).as_str()),
                path.namespace.map_or(Value::Null, Value::from),
                Value::from(path.name),
                Value::from(view.expression.clone()),
            ],
        )
    }

    /// Removes the row of `view`.
    #[must_use]
    pub fn delete_view<D: DdlDialect + ?Sized>(
        &self,
        dialect: &D,
        ctx: &SchemaContext,
        view: &View,
    ) -> Statement {
        let path = Self::view_path(dialect, ctx, view);
        let mut parameters = vec![Value::from(MetadataKind::of(view).as_str())];
        let mut sql = format!(
            "DELETE FROM {} WHERE {} = {}",
            dialect.escape_path(&self.name),
            dialect.escape("type"),
            dialect.placeholder(1)
        );
        match path.namespace {
            Some(ns) => {
                parameters.push(Value::from(ns));
                sql.push_str(&format!(
                    " AND {} = {}",
                    dialect.escape("schema"),
                    dialect.placeholder(parameters.len())
                ));
            }
            None => sql.push_str(&format!(" AND {} IS NULL", dialect.escape("schema"))),
        }
        parameters.push(Value::from(path.name));
        sql.push_str(&format!(
            " AND {} = {}",
            dialect.escape("name"),
            dialect.placeholder(parameters.len())
        ));
        Statement::with_parameters(sql, parameters)
    }

    /// Selects the rows of the given views.
    #[must_use]
    pub fn select_views<D: DdlDialect + ?Sized>(
        &self,
        dialect: &D,
        _ctx: &SchemaContext,
        paths: &[TablePath],
    ) -> Statement {
        let mut parameters = vec![
            Value::from(MetadataKind::View.as_str()),
            Value::from(MetadataKind::MaterializedView.as_str()),
        ];
        let filter = path_filter(
            dialect,
            &dialect.escape("schema"),
            &dialect.escape("name"),
            paths,
            &mut parameters,
        );
        let columns = ["type", "schema", "name", "value"].map(|c| dialect.escape(c));
        Statement::with_parameters(
            format!(
                "SELECT {} FROM {} WHERE {} IN ({}, {}) AND {filter}",
                columns.join(", "),
                dialect.escape_path(&self.name),
                columns[0],
                dialect.placeholder(1),
                dialect.placeholder(2)
            ),
            parameters,
        )
    }

    /// Builds a view from one metadata row.
    #[must_use]
    pub fn view_from_row(row: &Row, default_namespace: Option<&str>) -> Option<View> {
        let name = row.text("name")?;
        let namespace = row.text("schema").unwrap_or_default();
        Some(View {
            name: display_name(&namespace, &name, default_namespace),
            expression: row.text("value").unwrap_or_default(),
            materialized: row.text("type").as_deref()
                == Some(MetadataKind::MaterializedView.as_str()),
        })
    }
}
