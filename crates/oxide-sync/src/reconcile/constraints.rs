//! Unique, check and exclusion constraints.
//!
//! Dialects without a constraint kind fail before any statement runs.

use tracing::info;

use super::{resolve_member, CheckRef, ExclusionRef, TableRef, UniqueRef};
use crate::error::{Result, SyncError};
use crate::runner::QueryRunner;
use crate::schema::{Table, TableCheck, TableExclusion, TableUnique};
use crate::statement::Changeset;

/// Keeps a column's `is_unique` flag in line with single-column constraints.
fn mark_unique(table: &mut Table, unique: &TableUnique, flag: bool) {
    if let [column] = unique.column_names.as_slice() {
        if let Some(slot) = table.find_column_mut(column) {
            slot.is_unique = flag;
        }
    }
}

impl QueryRunner {
    /// Creates a unique constraint.
    pub async fn create_unique_constraint(
        &mut self,
        table: TableRef,
        unique: TableUnique,
    ) -> Result<()> {
        self.create_unique_constraints(table, vec![unique]).await
    }

    /// Creates unique constraints in one batch.
    pub async fn create_unique_constraints(
        &mut self,
        table: TableRef,
        uniques: Vec<TableUnique>,
    ) -> Result<()> {
        self.require(
            self.dialect.features().unique_constraints,
            "unique constraints",
            Some("unique indices"),
        )?;
        let mut table = self.resolve_table(table).await?;
        let previous = table.name.clone();
        let mut plan = Changeset::new();
        for mut unique in uniques {
            if unique.name.is_empty() {
                unique.name = self
                    .naming
                    .unique_constraint_name(&table.name, &unique.column_names);
            }
            info!(table = %previous, unique = %unique.name, "Creating unique constraint");
            plan.push(
                self.dialect.create_unique_sql(&table, &unique)?,
                self.dialect.drop_unique_sql(&table, &unique)?,
            );
            mark_unique(&mut table, &unique, true);
            table.uniques.push(unique);
        }
        self.commit_table(&previous, table, plan).await
    }

    /// Drops a unique constraint.
    pub async fn drop_unique_constraint(&mut self, table: TableRef, unique: UniqueRef) -> Result<()> {
        self.drop_unique_constraints(table, vec![unique]).await
    }

    /// Drops unique constraints in one batch.
    pub async fn drop_unique_constraints(
        &mut self,
        table: TableRef,
        uniques: Vec<UniqueRef>,
    ) -> Result<()> {
        self.require(
            self.dialect.features().unique_constraints,
            "unique constraints",
            Some("unique indices"),
        )?;
        let mut table = self.resolve_table(table).await?;
        let previous = table.name.clone();
        let mut plan = Changeset::new();
        for reference in uniques {
            let unique = resolve_member(reference, &table.uniques, |name| {
                SyncError::UniqueNotFound {
                    table: table.name.clone(),
                    unique: name,
                }
            })?;
            info!(table = %previous, unique = %unique.name, "Dropping unique constraint");
            plan.push(
                self.dialect.drop_unique_sql(&table, &unique)?,
                self.dialect.create_unique_sql(&table, &unique)?,
            );
            mark_unique(&mut table, &unique, false);
            table.remove_unique(&unique.name);
        }
        self.commit_table(&previous, table, plan).await
    }

    /// Creates a check constraint.
    pub async fn create_check_constraint(&mut self, table: TableRef, check: TableCheck) -> Result<()> {
        self.create_check_constraints(table, vec![check]).await
    }

    /// Creates check constraints in one batch.
    pub async fn create_check_constraints(
        &mut self,
        table: TableRef,
        checks: Vec<TableCheck>,
    ) -> Result<()> {
        self.require(self.dialect.features().check_constraints, "check constraints", None)?;
        let mut table = self.resolve_table(table).await?;
        let previous = table.name.clone();
        let mut plan = Changeset::new();
        for mut check in checks {
            if check.name.is_empty() {
                check.name = self
                    .naming
                    .check_constraint_name(&table.name, &check.expression);
            }
            info!(table = %previous, check = %check.name, "Creating check constraint");
            plan.push(
                self.dialect.create_check_sql(&table, &check)?,
                self.dialect.drop_check_sql(&table, &check)?,
            );
            table.checks.push(check);
        }
        self.commit_table(&previous, table, plan).await
    }

    /// Drops a check constraint.
    pub async fn drop_check_constraint(&mut self, table: TableRef, check: CheckRef) -> Result<()> {
        self.drop_check_constraints(table, vec![check]).await
    }

    /// Drops check constraints in one batch.
    pub async fn drop_check_constraints(
        &mut self,
        table: TableRef,
        checks: Vec<CheckRef>,
    ) -> Result<()> {
        self.require(self.dialect.features().check_constraints, "check constraints", None)?;
        let mut table = self.resolve_table(table).await?;
        let previous = table.name.clone();
        let mut plan = Changeset::new();
        for reference in checks {
            let check = resolve_member(reference, &table.checks, |name| SyncError::CheckNotFound {
                table: table.name.clone(),
                check: name,
            })?;
            info!(table = %previous, check = %check.name, "Dropping check constraint");
            plan.push(
                self.dialect.drop_check_sql(&table, &check)?,
                self.dialect.create_check_sql(&table, &check)?,
            );
            table.remove_check(&check.name);
        }
        self.commit_table(&previous, table, plan).await
    }

    /// Creates an exclusion constraint.
    pub async fn create_exclusion_constraint(
        &mut self,
        table: TableRef,
        exclusion: TableExclusion,
    ) -> Result<()> {
        self.create_exclusion_constraints(table, vec![exclusion]).await
    }

    /// Creates exclusion constraints in one batch.
    pub async fn create_exclusion_constraints(
        &mut self,
        table: TableRef,
        exclusions: Vec<TableExclusion>,
    ) -> Result<()> {
        self.require(
            self.dialect.features().exclusion_constraints,
            "exclusion constraints",
            None,
        )?;
        let mut table = self.resolve_table(table).await?;
        let previous = table.name.clone();
        let mut plan = Changeset::new();
        for mut exclusion in exclusions {
            if exclusion.name.is_empty() {
                exclusion.name = self
                    .naming
                    .exclusion_constraint_name(&table.name, &exclusion.expression);
            }
            info!(table = %previous, exclusion = %exclusion.name, "Creating exclusion constraint");
            plan.push(
                self.dialect.create_exclusion_sql(&table, &exclusion)?,
                self.dialect.drop_exclusion_sql(&table, &exclusion)?,
            );
            table.exclusions.push(exclusion);
        }
        self.commit_table(&previous, table, plan).await
    }

    /// Drops an exclusion constraint.
    pub async fn drop_exclusion_constraint(
        &mut self,
        table: TableRef,
        exclusion: ExclusionRef,
    ) -> Result<()> {
        self.drop_exclusion_constraints(table, vec![exclusion]).await
    }

    /// Drops exclusion constraints in one batch.
    pub async fn drop_exclusion_constraints(
        &mut self,
        table: TableRef,
        exclusions: Vec<ExclusionRef>,
    ) -> Result<()> {
        self.require(
            self.dialect.features().exclusion_constraints,
            "exclusion constraints",
            None,
        )?;
        let mut table = self.resolve_table(table).await?;
        let previous = table.name.clone();
        let mut plan = Changeset::new();
        for reference in exclusions {
            let exclusion = resolve_member(reference, &table.exclusions, |name| {
                SyncError::ExclusionNotFound {
                    table: table.name.clone(),
                    exclusion: name,
                }
            })?;
            info!(table = %previous, exclusion = %exclusion.name, "Dropping exclusion constraint");
            plan.push(
                self.dialect.drop_exclusion_sql(&table, &exclusion)?,
                self.dialect.create_exclusion_sql(&table, &exclusion)?,
            );
            table.remove_exclusion(&exclusion.name);
        }
        self.commit_table(&previous, table, plan).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::config::RunnerOptions;
    use crate::dialect::{HanaDialect, MySqlDialect, PostgresDialect};
    use crate::error::SyncError;
    use crate::schema::{Table, TableCheck, TableColumn, TableExclusion, TableUnique};
    use crate::testing::{runner, ScriptedConnection};

    fn booking() -> Table {
        Table::new("booking")
            .column(TableColumn::new("id", "integer").primary())
            .column(TableColumn::new("code", "varchar").length("32"))
            .column(TableColumn::new("room", "integer"))
    }

    #[tokio::test]
    async fn test_unique_constraint_on_mysql_points_to_indices() {
        let conn = Arc::new(ScriptedConnection::new());
        let mut runner = runner(&conn, MySqlDialect::new(), RunnerOptions::new().with_database("app"));

        let err = runner
            .create_unique_constraint(booking().into(), TableUnique::new("UQ_code", ["code"]))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "MySql does not support unique constraints. Use unique indices instead."
        );
        assert!(conn.executed().is_empty());
    }

    #[tokio::test]
    async fn test_check_constraints_unsupported_on_hana() {
        let conn = Arc::new(ScriptedConnection::new());
        let mut runner = runner(&conn, HanaDialect::new(), RunnerOptions::new().with_schema("APP"));

        let err = runner
            .drop_check_constraint(booking().into(), "CHK_room".into())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Unsupported { .. }));
        assert!(conn.executed().is_empty());
    }

    #[tokio::test]
    async fn test_single_column_unique_tracks_column_flag() {
        let conn = Arc::new(ScriptedConnection::new());
        let mut runner = runner(&conn, PostgresDialect::new(), RunnerOptions::new().with_schema("public"));

        runner
            .create_unique_constraint(booking().into(), TableUnique::new("UQ_code", ["code"]))
            .await
            .unwrap();
        assert_eq!(
            conn.statements(),
            vec!["ALTER TABLE \"booking\" ADD CONSTRAINT \"UQ_code\" UNIQUE (\"code\")"]
        );
        let cached = runner.schema_cache().table("booking").unwrap();
        assert!(cached.find_column("code").unwrap().is_unique);

        runner
            .drop_unique_constraint("booking".into(), "UQ_code".into())
            .await
            .unwrap();
        let cached = runner.schema_cache().table("booking").unwrap();
        assert!(!cached.find_column("code").unwrap().is_unique);
        assert!(cached.uniques.is_empty());
    }

    #[tokio::test]
    async fn test_unnamed_check_and_exclusion() {
        let conn = Arc::new(ScriptedConnection::new());
        let mut runner = runner(&conn, PostgresDialect::new(), RunnerOptions::new().with_schema("public"));

        runner
            .create_check_constraints(
                booking().into(),
                vec![TableCheck::new("", "\"room\" > 0")],
            )
            .await
            .unwrap();
        runner
            .create_exclusion_constraint(
                "booking".into(),
                TableExclusion::new("XCL_room", "USING gist (\"room\" WITH =)"),
            )
            .await
            .unwrap();

        let statements = conn.statements();
        assert!(statements[0].contains("ADD CONSTRAINT \"CHK_"));
        assert!(statements[0].ends_with("CHECK (\"room\" > 0)"));
        assert_eq!(
            statements[1],
            "ALTER TABLE \"booking\" ADD CONSTRAINT \"XCL_room\" EXCLUDE USING gist (\"room\" WITH =)"
        );

        let err = runner
            .drop_exclusion_constraint("booking".into(), "XCL_other".into())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ExclusionNotFound { exclusion, .. } if exclusion == "XCL_other"));
    }
}
