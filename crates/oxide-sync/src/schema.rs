//! Schema object model.
//!
//! These types describe tables and views the same way whether they were
//! declared by application code or materialized from the live catalog.
//! They are plain values: the reconciliation engine clones a table before
//! mutating it and swaps the clone into its cache once the DDL succeeded.

use serde::{Deserialize, Serialize};

/// How a column value is generated by the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStrategy {
    /// Auto-increment / serial / identity sequence.
    Increment,
    /// UUID generator default.
    Uuid,
    /// `ROWID`-backed column.
    Rowid,
    /// SQL standard `GENERATED ... AS IDENTITY`.
    Identity,
}

/// Storage kind of a computed column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GeneratedType {
    /// Computed on read.
    Virtual,
    /// Computed on write and stored.
    Stored,
}

impl GeneratedType {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn to_sql(self) -> &'static str {
        match self {
            Self::Virtual => "VIRTUAL",
            Self::Stored => "STORED",
        }
    }
}

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ForeignKeyAction {
    /// No action (error if referenced row is deleted/updated).
    #[default]
    NoAction,
    /// Restrict (same as NoAction but checked immediately).
    Restrict,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Set the foreign key column to NULL.
    SetNull,
    /// Set the foreign key column to its default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub const fn to_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    /// Parses a catalog rule such as `SET NULL` or `no action`.
    #[must_use]
    pub fn parse(rule: &str) -> Self {
        match rule.trim().to_ascii_uppercase().replace('_', " ").as_str() {
            "RESTRICT" => Self::Restrict,
            "CASCADE" => Self::Cascade,
            "SET NULL" => Self::SetNull,
            "SET DEFAULT" => Self::SetDefault,
            _ => Self::NoAction,
        }
    }
}

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableColumn {
    /// Column name.
    pub name: String,
    /// Normalized lower-case type token.
    #[serde(rename = "type")]
    pub data_type: String,
    /// Length for character/binary types.
    pub length: Option<String>,
    /// Numeric precision.
    pub precision: Option<u32>,
    /// Numeric scale.
    pub scale: Option<u32>,
    /// Display width (MySQL integer types).
    pub width: Option<u32>,
    /// Whether the column holds an array of `data_type`.
    pub is_array: bool,
    /// Whether the column accepts NULL.
    pub is_nullable: bool,
    /// Whether the column is part of the primary key.
    pub is_primary: bool,
    /// Whether the column carries a single-column unique constraint.
    pub is_unique: bool,
    /// Whether the value is generated by the database.
    pub is_generated: bool,
    /// How the value is generated.
    pub generation_strategy: Option<GenerationStrategy>,
    /// Default expression as SQL text (string literals keep their quotes).
    pub default: Option<String>,
    /// `ON UPDATE` expression (MySQL).
    pub on_update: Option<String>,
    /// Column comment.
    pub comment: Option<String>,
    /// Character set.
    pub charset: Option<String>,
    /// Collation.
    pub collation: Option<String>,
    /// Ordered enum values.
    #[serde(rename = "enum")]
    pub enum_values: Option<Vec<String>>,
    /// Explicit enum type name (Postgres).
    pub enum_name: Option<String>,
    /// Zero-fill flag (MySQL).
    pub zerofill: bool,
    /// Unsigned flag (MySQL).
    pub unsigned: bool,
    /// Computed column expression.
    pub as_expression: Option<String>,
    /// Computed column storage.
    pub generated_type: Option<GeneratedType>,
    /// Spatial feature type (e.g. `Point`).
    pub spatial_feature_type: Option<String>,
    /// Spatial reference id.
    pub srid: Option<u32>,
    /// Explicit primary key constraint name.
    pub primary_key_constraint_name: Option<String>,
}

impl Default for TableColumn {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl TableColumn {
    /// Creates a NOT NULL column of the given type.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            length: None,
            precision: None,
            scale: None,
            width: None,
            is_array: false,
            is_nullable: false,
            is_primary: false,
            is_unique: false,
            is_generated: false,
            generation_strategy: None,
            default: None,
            on_update: None,
            comment: None,
            charset: None,
            collation: None,
            enum_values: None,
            enum_name: None,
            zerofill: false,
            unsigned: false,
            as_expression: None,
            generated_type: None,
            spatial_feature_type: None,
            srid: None,
            primary_key_constraint_name: None,
        }
    }

    /// Sets the length.
    #[must_use]
    pub fn length(mut self, length: impl Into<String>) -> Self {
        self.length = Some(length.into());
        self
    }

    /// Sets precision and scale.
    #[must_use]
    pub const fn precision(mut self, precision: u32, scale: Option<u32>) -> Self {
        self.precision = Some(precision);
        self.scale = scale;
        self
    }

    /// Marks the column as nullable.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.is_nullable = true;
        self
    }

    /// Marks the column as part of the primary key.
    #[must_use]
    pub const fn primary(mut self) -> Self {
        self.is_primary = true;
        self.is_nullable = false;
        self
    }

    /// Marks the column as unique.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    /// Marks the column as an array.
    #[must_use]
    pub const fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    /// Marks the column as generated with the given strategy.
    #[must_use]
    pub const fn generated(mut self, strategy: GenerationStrategy) -> Self {
        self.is_generated = true;
        self.generation_strategy = Some(strategy);
        self
    }

    /// Sets the default expression.
    #[must_use]
    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Sets the collation.
    #[must_use]
    pub fn collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }

    /// Sets the comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Sets the enum values.
    #[must_use]
    pub fn enum_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the enum type name.
    #[must_use]
    pub fn enum_name(mut self, name: impl Into<String>) -> Self {
        self.enum_name = Some(name.into());
        self
    }

    /// Makes this a computed column.
    #[must_use]
    pub fn computed(mut self, expression: impl Into<String>, kind: GeneratedType) -> Self {
        self.as_expression = Some(expression.into());
        self.generated_type = Some(kind);
        self
    }

    /// Returns true for auto-increment columns.
    #[must_use]
    pub fn is_increment(&self) -> bool {
        self.is_generated && self.generation_strategy == Some(GenerationStrategy::Increment)
    }

    /// Returns true for enum columns.
    #[must_use]
    pub fn is_enum(&self) -> bool {
        self.data_type == "enum" || self.data_type == "simple-enum" || self.enum_values.is_some()
    }

    /// Returns a copy with generation turned off.
    #[must_use]
    pub fn without_generation(&self) -> Self {
        let mut column = self.clone();
        column.is_generated = false;
        column.generation_strategy = None;
        column
    }

    /// Returns a copy with another name.
    #[must_use]
    pub fn renamed(&self, name: &str) -> Self {
        let mut column = self.clone();
        column.name = name.to_string();
        column
    }
}

/// An index of a table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableIndex {
    /// Index name; empty until a naming strategy assigns one.
    pub name: String,
    /// Indexed columns, order-significant.
    pub column_names: Vec<String>,
    /// Unique index.
    pub is_unique: bool,
    /// Spatial index.
    pub is_spatial: bool,
    /// Full-text index.
    pub is_fulltext: bool,
    /// Partial index predicate.
    #[serde(rename = "where")]
    pub where_clause: Option<String>,
}

impl TableIndex {
    /// Creates a named index.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            column_names: columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Marks the index as unique.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    /// Sets the partial index predicate.
    #[must_use]
    pub fn where_clause(mut self, predicate: impl Into<String>) -> Self {
        self.where_clause = Some(predicate.into());
        self
    }

    /// Returns true if the index covers exactly `column`.
    #[must_use]
    pub fn is_single_column(&self, column: &str) -> bool {
        self.column_names.len() == 1 && self.column_names[0] == column
    }
}

/// A foreign key of a table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableForeignKey {
    /// Constraint name; empty until a naming strategy assigns one.
    pub name: String,
    /// Referencing columns.
    pub column_names: Vec<String>,
    /// Referenced table, possibly schema-qualified.
    pub referenced_table_name: String,
    /// Referenced columns, positionally matching `column_names`.
    pub referenced_column_names: Vec<String>,
    /// Action on delete.
    pub on_delete: ForeignKeyAction,
    /// Action on update.
    pub on_update: ForeignKeyAction,
    /// Deferrable clause, e.g. `INITIALLY DEFERRED`.
    pub deferrable: Option<String>,
}

impl TableForeignKey {
    /// Creates a foreign key.
    #[must_use]
    pub fn new<I, S, J, T>(
        name: impl Into<String>,
        columns: I,
        referenced_table: impl Into<String>,
        referenced_columns: J,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            name: name.into(),
            column_names: columns.into_iter().map(Into::into).collect(),
            referenced_table_name: referenced_table.into(),
            referenced_column_names: referenced_columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub const fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = action;
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub const fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = action;
        self
    }
}

/// A unique constraint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableUnique {
    /// Constraint name.
    pub name: String,
    /// Constrained columns.
    pub column_names: Vec<String>,
}

impl TableUnique {
    /// Creates a unique constraint.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            column_names: columns.into_iter().map(Into::into).collect(),
        }
    }
}

/// A check constraint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableCheck {
    /// Constraint name.
    pub name: String,
    /// Columns the expression refers to, when known.
    pub column_names: Vec<String>,
    /// Boolean expression.
    pub expression: String,
}

impl TableCheck {
    /// Creates a check constraint.
    #[must_use]
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_names: Vec::new(),
            expression: expression.into(),
        }
    }
}

/// An exclusion constraint (Postgres).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableExclusion {
    /// Constraint name.
    pub name: String,
    /// Exclusion expression, e.g. `USING gist ("room" WITH =)`.
    pub expression: String,
}

impl TableExclusion {
    /// Creates an exclusion constraint.
    #[must_use]
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
        }
    }
}

/// A table with its columns and constraints.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Table {
    /// Table name, possibly dot-qualified with a schema.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<TableColumn>,
    /// Indices.
    pub indices: Vec<TableIndex>,
    /// Foreign keys.
    pub foreign_keys: Vec<TableForeignKey>,
    /// Unique constraints.
    pub uniques: Vec<TableUnique>,
    /// Check constraints.
    pub checks: Vec<TableCheck>,
    /// Exclusion constraints.
    pub exclusions: Vec<TableExclusion>,
    /// Storage engine (MySQL).
    pub engine: Option<String>,
    /// SQLite-style strict flag, carried for completeness.
    pub strict: bool,
}

impl Table {
    /// Creates an empty table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: TableColumn) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: TableIndex) -> Self {
        self.indices.push(index);
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, foreign_key: TableForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    /// Adds a unique constraint.
    #[must_use]
    pub fn unique(mut self, unique: TableUnique) -> Self {
        self.uniques.push(unique);
        self
    }

    /// Adds a check constraint.
    #[must_use]
    pub fn check(mut self, check: TableCheck) -> Self {
        self.checks.push(check);
        self
    }

    /// Adds an exclusion constraint.
    #[must_use]
    pub fn exclusion(mut self, exclusion: TableExclusion) -> Self {
        self.exclusions.push(exclusion);
        self
    }

    /// Primary key columns. This is always derived from `is_primary`.
    pub fn primary_columns(&self) -> impl Iterator<Item = &TableColumn> {
        self.columns.iter().filter(|c| c.is_primary)
    }

    /// Names of the primary key columns.
    #[must_use]
    pub fn primary_column_names(&self) -> Vec<String> {
        self.primary_columns().map(|c| c.name.clone()).collect()
    }

    /// Gets a column by name.
    #[must_use]
    pub fn find_column(&self, name: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Gets a mutable column by name.
    #[must_use]
    pub fn find_column_mut(&mut self, name: &str) -> Option<&mut TableColumn> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Replaces the column called `name`, returning false if absent.
    pub fn replace_column(&mut self, name: &str, column: TableColumn) -> bool {
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(slot) => {
                *slot = column;
                true
            }
            None => false,
        }
    }

    /// Removes a column.
    pub fn remove_column(&mut self, name: &str) {
        self.columns.retain(|c| c.name != name);
    }

    /// Gets an index by name.
    #[must_use]
    pub fn find_index(&self, name: &str) -> Option<&TableIndex> {
        self.indices.iter().find(|i| i.name == name)
    }

    /// Removes an index by name.
    pub fn remove_index(&mut self, name: &str) {
        self.indices.retain(|i| i.name != name);
    }

    /// Gets a foreign key by name.
    #[must_use]
    pub fn find_foreign_key(&self, name: &str) -> Option<&TableForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.name == name)
    }

    /// Removes a foreign key by name.
    pub fn remove_foreign_key(&mut self, name: &str) {
        self.foreign_keys.retain(|fk| fk.name != name);
    }

    /// Gets a unique constraint by name.
    #[must_use]
    pub fn find_unique(&self, name: &str) -> Option<&TableUnique> {
        self.uniques.iter().find(|u| u.name == name)
    }

    /// Removes a unique constraint by name.
    pub fn remove_unique(&mut self, name: &str) {
        self.uniques.retain(|u| u.name != name);
    }

    /// Gets a check constraint by name.
    #[must_use]
    pub fn find_check(&self, name: &str) -> Option<&TableCheck> {
        self.checks.iter().find(|c| c.name == name)
    }

    /// Removes a check constraint by name.
    pub fn remove_check(&mut self, name: &str) {
        self.checks.retain(|c| c.name != name);
    }

    /// Gets an exclusion constraint by name.
    #[must_use]
    pub fn find_exclusion(&self, name: &str) -> Option<&TableExclusion> {
        self.exclusions.iter().find(|e| e.name == name)
    }

    /// Removes an exclusion constraint by name.
    pub fn remove_exclusion(&mut self, name: &str) {
        self.exclusions.retain(|e| e.name != name);
    }

    /// Indices that include `column`.
    #[must_use]
    pub fn column_indices(&self, column: &str) -> Vec<TableIndex> {
        self.indices
            .iter()
            .filter(|i| i.column_names.iter().any(|c| c == column))
            .cloned()
            .collect()
    }

    /// Foreign keys that include `column`.
    #[must_use]
    pub fn column_foreign_keys(&self, column: &str) -> Vec<TableForeignKey> {
        self.foreign_keys
            .iter()
            .filter(|fk| fk.column_names.iter().any(|c| c == column))
            .cloned()
            .collect()
    }

    /// Unique constraints that include `column`.
    #[must_use]
    pub fn column_uniques(&self, column: &str) -> Vec<TableUnique> {
        self.uniques
            .iter()
            .filter(|u| u.column_names.iter().any(|c| c == column))
            .cloned()
            .collect()
    }

    /// Check constraints that name `column`.
    #[must_use]
    pub fn column_checks(&self, column: &str) -> Vec<TableCheck> {
        self.checks
            .iter()
            .filter(|c| c.column_names.iter().any(|n| n == column))
            .cloned()
            .collect()
    }

    /// Renames `old` to `new` in the column list and in every constraint
    /// column list. Constraint names are left untouched.
    pub fn rename_column_references(&mut self, old: &str, new: &str) {
        let rename = |names: &mut Vec<String>| {
            for name in names.iter_mut() {
                if name == old {
                    *name = new.to_string();
                }
            }
        };
        if let Some(column) = self.find_column_mut(old) {
            column.name = new.to_string();
        }
        for index in &mut self.indices {
            rename(&mut index.column_names);
        }
        for fk in &mut self.foreign_keys {
            rename(&mut fk.column_names);
        }
        for unique in &mut self.uniques {
            rename(&mut unique.column_names);
        }
        for check in &mut self.checks {
            rename(&mut check.column_names);
        }
    }
}

/// A view.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct View {
    /// View name, possibly dot-qualified with a schema.
    pub name: String,
    /// Defining query.
    pub expression: String,
    /// Materialized view (Postgres).
    pub materialized: bool,
}

impl View {
    /// Creates a view.
    #[must_use]
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
            materialized: false,
        }
    }

    /// Marks the view as materialized.
    #[must_use]
    pub const fn materialized(mut self) -> Self {
        self.materialized = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Table {
        Table::new("users")
            .column(
                TableColumn::new("id", "int")
                    .primary()
                    .generated(GenerationStrategy::Increment),
            )
            .column(TableColumn::new("email", "varchar").length("255").unique())
            .column(TableColumn::new("bio", "text").nullable())
            .index(TableIndex::new("IDX_email", ["email"]))
            .foreign_key(TableForeignKey::new("FK_team", ["team_id"], "teams", ["id"]))
    }

    #[test]
    fn test_primary_columns_follow_flags() {
        let mut table = users();
        assert_eq!(table.primary_column_names(), vec!["id"]);

        table.find_column_mut("email").unwrap().is_primary = true;
        assert_eq!(table.primary_column_names(), vec!["id", "email"]);

        table.remove_column("id");
        assert_eq!(table.primary_column_names(), vec!["email"]);
    }

    #[test]
    fn test_column_builder() {
        let column = TableColumn::new("id", "int")
            .primary()
            .generated(GenerationStrategy::Increment);
        assert!(column.is_increment());
        assert!(!column.is_nullable);
        assert!(!column.without_generation().is_increment());
    }

    #[test]
    fn test_rename_column_references() {
        let mut table = users();
        table.rename_column_references("email", "mail");
        assert!(table.find_column("mail").is_some());
        assert_eq!(table.indices[0].column_names, vec!["mail"]);
        assert_eq!(table.indices[0].name, "IDX_email");
    }

    #[test]
    fn test_dependent_lookups() {
        let table = users();
        assert_eq!(table.column_indices("email").len(), 1);
        assert_eq!(table.column_foreign_keys("team_id").len(), 1);
        assert!(table.column_uniques("email").is_empty());
    }

    #[test]
    fn test_foreign_key_action_parse() {
        assert_eq!(ForeignKeyAction::parse("SET NULL"), ForeignKeyAction::SetNull);
        assert_eq!(ForeignKeyAction::parse("cascade"), ForeignKeyAction::Cascade);
        assert_eq!(ForeignKeyAction::parse("SET_DEFAULT"), ForeignKeyAction::SetDefault);
        assert_eq!(ForeignKeyAction::parse("whatever"), ForeignKeyAction::NoAction);
        assert_eq!(ForeignKeyAction::Restrict.to_sql(), "RESTRICT");
    }

    #[test]
    fn test_table_deserializes_from_camel_case_json() {
        let json = r#"{
            "name": "user",
            "columns": [
                {"name": "id", "type": "int", "isPrimary": true, "isGenerated": true, "generationStrategy": "increment"},
                {"name": "status", "type": "enum", "enum": ["a", "b"], "isNullable": true}
            ]
        }"#;
        let table: Table = serde_json::from_str(json).unwrap();
        assert!(table.columns[0].is_increment());
        assert_eq!(
            table.columns[1].enum_values,
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert!(table.columns[1].is_nullable);
        assert!(!table.columns[0].is_nullable);
    }
}
