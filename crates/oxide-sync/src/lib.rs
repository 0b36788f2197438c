//! Schema diffing and reversible DDL generation for MySQL, PostgreSQL and
//! SAP HANA.
//!
//! `oxide-sync` compares the tables and views an application declares with
//! what a live database holds and brings the database in line:
//! - Every change is planned as paired up/down statements, so a run can be
//!   printed, replayed or reverted
//! - Dialect differences (unique indices instead of constraints on MySQL,
//!   enum types and sequences on PostgreSQL, serialized sessions on HANA)
//!   live behind one [`DdlDialect`](dialect::DdlDialect) trait
//! - Every operation works on a copy of the cached table and publishes it
//!   only after its statements succeeded
//!
//! # Architecture
//!
//! - **Introspection** - [`Catalog`](introspect::Catalog) reads tables and
//!   views back in the same normalized shape they are declared in
//! - **Dialects** - DDL synthesis and capability flags per database family
//! - **Runner** - [`QueryRunner`](runner::QueryRunner) owns one connection,
//!   its transaction state, and the schema cache
//! - **Reconciliation** - table, column, key, constraint, index, view and
//!   namespace operations on the runner
//! - **Diff** - declared-vs-live comparison and `synchronize`
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use oxide_sync::prelude::*;
//!
//! let connector = SqlxConnector::connect_url("postgres://localhost/app", 5).await?;
//! let mut runner = QueryRunner::new(
//!     Arc::new(connector),
//!     Arc::new(PostgresDialect::new()),
//!     RunnerOptions::new().with_schema("public"),
//! );
//!
//! let declared = DeclaredSchema {
//!     tables: vec![Table::new("user")
//!         .column(TableColumn::new("id", "integer").primary().generated(GenerationStrategy::Increment))
//!         .column(TableColumn::new("email", "varchar").length("255").unique())],
//!     views: Vec::new(),
//! };
//!
//! // Print what would run, then run it.
//! let plan = runner.plan_synchronize(&declared).await?;
//! println!("{}", plan.up_sql());
//! runner.synchronize(&declared).await?;
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Print live tables as JSON
//! oxide-sync --url postgres://localhost/app inspect user post
//!
//! # Print the SQL that would bring the database in line, or undo it
//! oxide-sync --url postgres://localhost/app plan schema.json
//! oxide-sync --url postgres://localhost/app plan schema.json --reverse
//!
//! # Apply it
//! oxide-sync --url postgres://localhost/app sync schema.json
//! ```

pub mod config;
pub mod connection;
pub mod context;
pub mod dialect;
pub mod diff;
pub mod error;
pub mod introspect;
pub mod metadata;
pub mod naming;
pub mod reconcile;
pub mod runner;
pub mod schema;
pub mod statement;

#[cfg(test)]
mod testing;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{load_declared_schema, ConnectionSettings, DeclaredSchema, RunnerOptions};
    pub use crate::connection::pool::SqlxConnector;
    pub use crate::connection::{Connection, Connector, QueryResult};
    pub use crate::context::{SchemaContext, TablePath};
    pub use crate::dialect::{
        CreateTableOptions, DdlContext, DdlDialect, DialectKind, DropTableOptions, HanaDialect,
        IsolationLevel, MySqlDialect, PostgresDialect,
    };
    pub use crate::diff::{diff_schema, diff_table, SchemaDiff, TableDiff};
    pub use crate::error::{Result, SyncError};
    pub use crate::introspect::Catalog;
    pub use crate::naming::{DefaultNamingStrategy, NamingStrategy};
    pub use crate::reconcile::{ColumnChange, ObjectRef};
    pub use crate::runner::QueryRunner;
    pub use crate::schema::{
        ForeignKeyAction, GeneratedType, GenerationStrategy, Table, TableCheck, TableColumn,
        TableExclusion, TableForeignKey, TableIndex, TableUnique, View,
    };
    pub use crate::statement::{Changeset, Statement};
}
