//! Reconciliation operations.
//!
//! Every operation follows the same steps. It resolves its target once,
//! clones it, and lets the dialect plan the change against the clone. Then
//! it runs the resulting [`Changeset`] and, only on success, publishes the
//! clone in the runner's schema cache.

mod columns;
mod constraints;
mod indices;
mod keys;
mod namespaces;
mod tables;
mod views;

pub use columns::ColumnChange;

use tracing::debug;

use crate::error::{Result, SyncError};
use crate::introspect::ReferencingKey;
use crate::runner::QueryRunner;
use crate::schema::{
    Table, TableCheck, TableColumn, TableExclusion, TableForeignKey, TableIndex, TableUnique, View,
};
use crate::statement::Changeset;

/// Objects that can be referred to by name.
pub trait Named {
    /// The object's name.
    fn name(&self) -> &str;
}

/// An object passed either as a full definition or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectRef<T> {
    /// The full definition.
    ByValue(T),
    /// Looked up by name in the current state.
    ByName(String),
}

impl<T: Named> ObjectRef<T> {
    /// Name of the referenced object.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::ByValue(object) => object.name(),
            Self::ByName(name) => name,
        }
    }
}

/// A table or a table name.
pub type TableRef = ObjectRef<Table>;
/// A column or a column name.
pub type ColumnRef = ObjectRef<TableColumn>;
/// A view or a view name.
pub type ViewRef = ObjectRef<View>;
/// An index or an index name.
pub type IndexRef = ObjectRef<TableIndex>;
/// A foreign key or a foreign key name.
pub type ForeignKeyRef = ObjectRef<TableForeignKey>;
/// A unique constraint or its name.
pub type UniqueRef = ObjectRef<TableUnique>;
/// A check constraint or its name.
pub type CheckRef = ObjectRef<TableCheck>;
/// An exclusion constraint or its name.
pub type ExclusionRef = ObjectRef<TableExclusion>;

macro_rules! named {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Named for $ty {
                fn name(&self) -> &str {
                    &self.name
                }
            }

            impl From<$ty> for ObjectRef<$ty> {
                fn from(object: $ty) -> Self {
                    Self::ByValue(object)
                }
            }

            impl From<&str> for ObjectRef<$ty> {
                fn from(name: &str) -> Self {
                    Self::ByName(name.to_string())
                }
            }

            impl From<String> for ObjectRef<$ty> {
                fn from(name: String) -> Self {
                    Self::ByName(name)
                }
            }
        )+
    };
}

named!(
    Table,
    TableColumn,
    View,
    TableIndex,
    TableForeignKey,
    TableUnique,
    TableCheck,
    TableExclusion,
);

/// Resolves a reference to one of the table's constraints, indices or
/// columns, failing with `missing` when a name is not found.
pub(crate) fn resolve_member<T: Named + Clone>(
    reference: ObjectRef<T>,
    members: &[T],
    missing: impl FnOnce(String) -> SyncError,
) -> Result<T> {
    match reference {
        ObjectRef::ByValue(object) => Ok(object),
        ObjectRef::ByName(name) => members
            .iter()
            .find(|m| m.name() == name)
            .cloned()
            .ok_or_else(|| missing(name)),
    }
}

impl QueryRunner {
    pub(crate) async fn resolve_table(&mut self, table: TableRef) -> Result<Table> {
        match table {
            ObjectRef::ByValue(table) => Ok(table),
            ObjectRef::ByName(name) => self.cached_table(&name).await,
        }
    }

    pub(crate) async fn resolve_view(&mut self, view: ViewRef) -> Result<View> {
        match view {
            ObjectRef::ByValue(view) => Ok(view),
            ObjectRef::ByName(name) => self.cached_view(&name).await,
        }
    }

    /// Runs `plan` and publishes `table` in place of `previous_name`.
    pub(crate) async fn commit_table(
        &mut self,
        previous_name: &str,
        table: Table,
        plan: Changeset,
    ) -> Result<()> {
        self.execute_queries(plan).await?;
        self.replace_cached_table(previous_name, table);
        Ok(())
    }

    /// Fails fast when the dialect lacks a feature.
    pub(crate) fn require(
        &self,
        supported: bool,
        feature: &str,
        alternative: Option<&'static str>,
    ) -> Result<()> {
        if supported {
            Ok(())
        } else {
            Err(SyncError::unsupported(self.dialect.name(), feature, alternative))
        }
    }

    /// Foreign keys of other tables that block primary key changes on
    /// `table`. Empty unless the dialect needs the guard.
    pub(crate) async fn blocking_keys(&mut self, table: &str) -> Result<Vec<ReferencingKey>> {
        if !self.dialect.features().referential_guard {
            return Ok(Vec::new());
        }
        let conn = self.connect().await?;
        let keys = self
            .dialect
            .referencing_keys(conn.as_ref(), &self.context, table)
            .await?;
        if !keys.is_empty() {
            debug!(table = %table, count = keys.len(), "Dropping referencing foreign keys around key change");
        }
        Ok(keys)
    }

    /// Brackets `plan` with dropping and recreating `keys`. When the
    /// referenced table was renamed, the keys come back pointing at
    /// `renamed_to`.
    pub(crate) fn guard_plan(
        &self,
        keys: &[ReferencingKey],
        renamed_to: Option<&str>,
        plan: Changeset,
    ) -> Changeset {
        if keys.is_empty() {
            return plan;
        }
        let mut guarded = Changeset::new();
        for key in keys {
            guarded.push(
                self.dialect.drop_foreign_key_sql(&key.table, &key.foreign_key),
                self.dialect.create_foreign_key_sql(&key.table, &key.foreign_key),
            );
        }
        guarded.extend(plan);
        for key in keys {
            let mut restored = key.foreign_key.clone();
            if let Some(name) = renamed_to {
                restored.referenced_table_name = name.to_string();
            }
            guarded.push(
                self.dialect.create_foreign_key_sql(&key.table, &restored),
                self.dialect.drop_foreign_key_sql(&key.table, &restored),
            );
        }
        guarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_ref_names() {
        let by_value: TableRef = Table::new("user").into();
        let by_name: TableRef = "post".into();
        assert_eq!(by_value.name(), "user");
        assert_eq!(by_name.name(), "post");
    }

    #[test]
    fn test_resolve_member_reports_missing_name() {
        let indices = vec![TableIndex::new("IDX_a", ["a"])];
        let found = resolve_member(IndexRef::from("IDX_a"), &indices, |_| {
            SyncError::TableNotFound(String::new())
        })
        .unwrap();
        assert_eq!(found.column_names, vec!["a"]);

        let err = resolve_member(IndexRef::from("IDX_b"), &indices, |index| {
            SyncError::IndexNotFound {
                table: "t".into(),
                index,
            }
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "Index \"IDX_b\" was not found in table \"t\"");
    }
}
