//! Deterministic names for unnamed constraints, indices, sequences and enum types.
//!
//! Names derived here are compared against live names during diffing and
//! renaming, so they must be a pure function of the table name and column
//! lists: same input, same name, regardless of column order.

use sha2::{Digest, Sha256};

use crate::context::TablePath;
use crate::schema::Table;

/// Maximum length of the hash part of generated constraint names.
const HASH_LENGTH: usize = 27;

/// Derives object names from table and column names.
pub trait NamingStrategy: Send + Sync + std::fmt::Debug {
    /// Primary key constraint name.
    fn primary_key_name(&self, table: &str, columns: &[String]) -> String;

    /// Unique constraint name (also used for unique indices standing in
    /// for unique constraints).
    fn unique_constraint_name(&self, table: &str, columns: &[String]) -> String;

    /// Index name.
    fn index_name(&self, table: &str, columns: &[String], where_clause: Option<&str>) -> String;

    /// Foreign key constraint name.
    fn foreign_key_name(
        &self,
        table: &str,
        columns: &[String],
        referenced_table: &str,
        referenced_columns: &[String],
    ) -> String;

    /// Check constraint name.
    fn check_constraint_name(&self, table: &str, expression: &str) -> String;

    /// Exclusion constraint name.
    fn exclusion_constraint_name(&self, table: &str, expression: &str) -> String;

    /// Sequence backing an auto-increment column (Postgres).
    fn sequence_name(&self, table: &str, column: &str) -> String {
        format!("{}_{column}_seq", TablePath::parse(table).name)
    }

    /// Enum type backing an enum column (Postgres).
    fn enum_type_name(&self, table: &str, column: &str) -> String {
        format!("{}_{column}_enum", TablePath::parse(table).name)
    }
}

/// Default naming: a fixed prefix followed by a truncated SHA-256 of the
/// unqualified table name and the sorted column names.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNamingStrategy;

impl DefaultNamingStrategy {
    /// Creates a new default naming strategy.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn hashed(prefix: &str, input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let hex = format!("{digest:x}");
    format!("{prefix}{}", &hex[..HASH_LENGTH])
}

fn key(table: &str, columns: &[String]) -> String {
    let mut sorted = columns.to_vec();
    sorted.sort();
    format!("{}_{}", TablePath::parse(table).name, sorted.join("_"))
}

impl NamingStrategy for DefaultNamingStrategy {
    fn primary_key_name(&self, table: &str, columns: &[String]) -> String {
        hashed("PK_", &key(table, columns))
    }

    fn unique_constraint_name(&self, table: &str, columns: &[String]) -> String {
        hashed("UQ_", &key(table, columns))
    }

    fn index_name(&self, table: &str, columns: &[String], where_clause: Option<&str>) -> String {
        let mut input = key(table, columns);
        if let Some(predicate) = where_clause {
            input.push('_');
            input.push_str(predicate);
        }
        hashed("IDX_", &input)
    }

    fn foreign_key_name(
        &self,
        table: &str,
        columns: &[String],
        referenced_table: &str,
        referenced_columns: &[String],
    ) -> String {
        let input = format!(
            "{}_{}_{}",
            key(table, columns),
            TablePath::parse(referenced_table).name,
            referenced_columns.join("_")
        );
        hashed("FK_", &input)
    }

    fn check_constraint_name(&self, table: &str, expression: &str) -> String {
        hashed(
            "CHK_",
            &format!("{}_{expression}", TablePath::parse(table).name),
        )
    }

    fn exclusion_constraint_name(&self, table: &str, expression: &str) -> String {
        hashed(
            "XCL_",
            &format!("{}_{expression}", TablePath::parse(table).name),
        )
    }
}

/// Fills empty index, foreign key and constraint names.
pub fn assign_names(table: &mut Table, naming: &dyn NamingStrategy) {
    let name = table.name.clone();
    for index in &mut table.indices {
        if index.name.is_empty() {
            index.name =
                naming.index_name(&name, &index.column_names, index.where_clause.as_deref());
        }
    }
    for fk in &mut table.foreign_keys {
        if fk.name.is_empty() {
            fk.name = naming.foreign_key_name(
                &name,
                &fk.column_names,
                &fk.referenced_table_name,
                &fk.referenced_column_names,
            );
        }
    }
    for unique in &mut table.uniques {
        if unique.name.is_empty() {
            unique.name = naming.unique_constraint_name(&name, &unique.column_names);
        }
    }
    for check in &mut table.checks {
        if check.name.is_empty() {
            check.name = naming.check_constraint_name(&name, &check.expression);
        }
    }
    for exclusion in &mut table.exclusions {
        if exclusion.name.is_empty() {
            exclusion.name = naming.exclusion_constraint_name(&name, &exclusion.expression);
        }
    }
}
