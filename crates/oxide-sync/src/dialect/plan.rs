//! Shared planning steps behind the `plan_*` methods of [`DdlDialect`].
//!
//! Every function mutates the working copy of a table so that it describes
//! the database after the appended statements ran, and appends one up/down
//! pair per statement.

use super::{materialize_unique_columns, CreateTableOptions, DdlContext, DdlDialect, DropTableOptions};
use crate::context::TablePath;
use crate::error::{Result, SyncError};
use crate::naming::assign_names;
use crate::schema::{Table, TableColumn, TableIndex, TableUnique};
use crate::statement::Changeset;

/// Returns a copy with unique columns materialized and blank names filled.
pub fn prepared<D: DdlDialect + ?Sized>(dialect: &D, ctx: &DdlContext<'_>, table: &Table) -> Table {
    let mut table = table.clone();
    prepare(dialect, ctx, &mut table);
    table
}

fn prepare<D: DdlDialect + ?Sized>(dialect: &D, ctx: &DdlContext<'_>, table: &mut Table) {
    materialize_unique_columns(table, ctx.naming, !dialect.features().unique_constraints);
    assign_names(table, ctx.naming);
}

pub(crate) fn column_of(table: &Table, name: &str) -> Result<TableColumn> {
    table
        .find_column(name)
        .cloned()
        .ok_or_else(|| SyncError::ColumnNotFound {
            table: table.name.clone(),
            column: name.to_string(),
        })
}

pub(crate) fn push_comment<D: DdlDialect + ?Sized>(
    dialect: &D,
    table: &Table,
    column: &str,
    from: Option<&str>,
    to: Option<&str>,
    plan: &mut Changeset,
) {
    if let (Some(up), Some(down)) = (
        dialect.comment_column_sql(table, column, to),
        dialect.comment_column_sql(table, column, from),
    ) {
        plan.push(up, down);
    }
}

/// Creates the table, then its indices and column comments.
pub fn create_table<D: DdlDialect + ?Sized>(
    dialect: &D,
    ctx: &DdlContext<'_>,
    table: &mut Table,
    options: CreateTableOptions,
    plan: &mut Changeset,
) -> Result<()> {
    prepare(dialect, ctx, table);
    if !options.foreign_keys {
        table.foreign_keys.clear();
    }
    if !dialect.features().check_constraints && !table.checks.is_empty() {
        return Err(SyncError::unsupported(dialect.name(), "check constraints", None));
    }
    if !dialect.features().exclusion_constraints && !table.exclusions.is_empty() {
        return Err(SyncError::unsupported(
            dialect.name(),
            "exclusion constraints",
            None,
        ));
    }

    plan.push(
        dialect.create_table_sql(ctx, table, true),
        dialect.drop_table_sql(table),
    );

    if !dialect.features().inline_indices {
        if options.indices {
            for index in &table.indices {
                plan.push(
                    dialect.create_index_sql(table, index),
                    dialect.drop_index_sql(table, index),
                );
            }
        } else {
            table.indices.clear();
        }
    }

    for column in &table.columns {
        if column.comment.is_some() {
            push_comment(dialect, table, &column.name, None, column.comment.as_deref(), plan);
        }
    }
    Ok(())
}

/// Drops indices and foreign keys (when asked to), then the table.
pub fn drop_table<D: DdlDialect + ?Sized>(
    dialect: &D,
    ctx: &DdlContext<'_>,
    table: &Table,
    options: DropTableOptions,
    plan: &mut Changeset,
) -> Result<()> {
    if options.indices && !dialect.features().inline_indices {
        for index in &table.indices {
            plan.push(
                dialect.drop_index_sql(table, index),
                dialect.create_index_sql(table, index),
            );
        }
    }
    if options.foreign_keys {
        for foreign_key in &table.foreign_keys {
            plan.push(
                dialect.drop_foreign_key_sql(&table.name, foreign_key),
                dialect.create_foreign_key_sql(&table.name, foreign_key),
            );
        }
    }
    plan.push(
        dialect.drop_table_sql(table),
        dialect.create_table_sql(ctx, table, !options.foreign_keys),
    );
    Ok(())
}

/// Renames the table, owned sequences and types, then derived names.
pub fn rename_table<D: DdlDialect + ?Sized>(
    dialect: &D,
    ctx: &DdlContext<'_>,
    table: &mut Table,
    new_name: &str,
    plan: &mut Changeset,
) -> Result<()> {
    let before = table.clone();
    let new_path = TablePath::parse(&table.name).sibling(new_name).qualified();
    plan.push(
        dialect.rename_table_sql(&table.name, &new_path),
        dialect.rename_table_sql(&new_path, &table.name),
    );

    table.name.clone_from(&new_path);
    for foreign_key in &mut table.foreign_keys {
        if foreign_key.referenced_table_name == before.name {
            foreign_key.referenced_table_name.clone_from(&new_path);
        }
    }

    dialect.plan_rename_owned(ctx, &before, table, plan)?;
    rename_dependents(dialect, ctx, &before, table, plan)
}

/// Renames a column, owned sequences and types, then derived names.
pub fn rename_column<D: DdlDialect + ?Sized>(
    dialect: &D,
    ctx: &DdlContext<'_>,
    table: &mut Table,
    old_name: &str,
    new_name: &str,
    plan: &mut Changeset,
) -> Result<()> {
    let column = column_of(table, old_name)?;
    if old_name == new_name {
        return Ok(());
    }
    if table.find_column(new_name).is_some() {
        return Err(SyncError::ColumnExists {
            table: table.name.clone(),
            column: new_name.to_string(),
        });
    }

    let before = table.clone();
    plan.push(
        dialect.rename_column_sql(ctx, &before, &column, new_name),
        dialect.rename_column_sql(ctx, &before, &column.renamed(new_name), old_name),
    );
    table.rename_column_references(old_name, new_name);

    dialect.plan_rename_owned(ctx, &before, table, plan)?;
    rename_dependents(dialect, ctx, &before, table, plan)
}

/// Renames every dependent object whose current name is the one the naming
/// strategy derives for `before` and differs from the one it derives for
/// `after`. Custom names are left alone.
///
/// `before` and `after` must list their constraints in the same order.
pub fn rename_dependents<D: DdlDialect + ?Sized>(
    dialect: &D,
    ctx: &DdlContext<'_>,
    before: &Table,
    after: &mut Table,
    plan: &mut Changeset,
) -> Result<()> {
    let naming = ctx.naming;

    let old_columns = before.primary_column_names();
    if !old_columns.is_empty() {
        let current = dialect.primary_key_name(ctx, before);
        let old_auto = naming.primary_key_name(&before.name, &old_columns);
        let new_auto = naming.primary_key_name(&after.name, &after.primary_column_names());
        if current == old_auto && old_auto != new_auto {
            dialect.plan_rename_primary_key(ctx, after, &current, &new_auto, plan)?;
            for column in after.columns.iter_mut().filter(|c| c.is_primary) {
                if column.primary_key_constraint_name.is_some() {
                    column.primary_key_constraint_name = Some(new_auto.clone());
                }
            }
        }
    }

    for (i, old) in before.indices.iter().enumerate() {
        let Some(new) = after.indices.get(i) else {
            break;
        };
        let mut candidates = vec![(
            naming.index_name(&before.name, &old.column_names, old.where_clause.as_deref()),
            naming.index_name(&after.name, &new.column_names, new.where_clause.as_deref()),
        )];
        if old.is_unique {
            candidates.push((
                naming.unique_constraint_name(&before.name, &old.column_names),
                naming.unique_constraint_name(&after.name, &new.column_names),
            ));
        }
        if let Some((_, renamed)) = candidates
            .into_iter()
            .find(|(from, to)| *from == old.name && from != to)
        {
            dialect.plan_rename_index(after, &old.name, &renamed, plan)?;
            after.indices[i].name = renamed;
        }
    }

    for (i, old) in before.uniques.iter().enumerate() {
        let Some(new) = after.uniques.get(i) else {
            break;
        };
        let old_auto = naming.unique_constraint_name(&before.name, &old.column_names);
        let new_auto = naming.unique_constraint_name(&after.name, &new.column_names);
        if old.name == old_auto && old_auto != new_auto {
            dialect.plan_rename_constraint(after, &old.name, &new_auto, plan)?;
            after.uniques[i].name = new_auto;
        }
    }

    for (i, old) in before.checks.iter().enumerate() {
        let old_auto = naming.check_constraint_name(&before.name, &old.expression);
        let new_auto = naming.check_constraint_name(&after.name, &old.expression);
        if old.name == old_auto && old_auto != new_auto {
            dialect.plan_rename_constraint(after, &old.name, &new_auto, plan)?;
            after.checks[i].name = new_auto;
        }
    }

    for (i, old) in before.exclusions.iter().enumerate() {
        let old_auto = naming.exclusion_constraint_name(&before.name, &old.expression);
        let new_auto = naming.exclusion_constraint_name(&after.name, &old.expression);
        if old.name == old_auto && old_auto != new_auto {
            dialect.plan_rename_constraint(after, &old.name, &new_auto, plan)?;
            after.exclusions[i].name = new_auto;
        }
    }

    for (i, old) in before.foreign_keys.iter().enumerate() {
        let Some(new) = after.foreign_keys.get(i) else {
            break;
        };
        let old_auto = naming.foreign_key_name(
            &before.name,
            &old.column_names,
            &old.referenced_table_name,
            &old.referenced_column_names,
        );
        let new_auto = naming.foreign_key_name(
            &after.name,
            &new.column_names,
            &new.referenced_table_name,
            &new.referenced_column_names,
        );
        if old.name == old_auto && old_auto != new_auto {
            let from = new.clone();
            let mut to = new.clone();
            to.name = new_auto;
            dialect.plan_rename_foreign_key(after, &from, &to, plan)?;
            after.foreign_keys[i].name = to.name;
        }
    }
    Ok(())
}

/// The auto-increment column of the primary key, when the dialect needs it
/// cleared before the key can change.
fn increment_guard<D: DdlDialect + ?Sized>(dialect: &D, table: &Table) -> Option<TableColumn> {
    if !dialect.features().increment_guard {
        return None;
    }
    table.primary_columns().find(|c| c.is_increment()).cloned()
}

fn guard_off<D: DdlDialect + ?Sized>(
    dialect: &D,
    ctx: &DdlContext<'_>,
    table: &Table,
    column: &TableColumn,
    plan: &mut Changeset,
) {
    let off = column.without_generation();
    plan.push(
        dialect.alter_column_sql(ctx, table, column, &off),
        dialect.alter_column_sql(ctx, table, &off, column),
    );
}

fn guard_on<D: DdlDialect + ?Sized>(
    dialect: &D,
    ctx: &DdlContext<'_>,
    table: &Table,
    column: &TableColumn,
    plan: &mut Changeset,
) {
    let off = column.without_generation();
    plan.push(
        dialect.alter_column_sql(ctx, table, &off, column),
        dialect.alter_column_sql(ctx, table, column, &off),
    );
}

/// Drops the current primary key and creates one over `columns`, clearing
/// auto-increment first and restoring it if the column stays in the key.
fn replace_primary_key<D: DdlDialect + ?Sized>(
    dialect: &D,
    ctx: &DdlContext<'_>,
    table: &mut Table,
    columns: &[String],
    plan: &mut Changeset,
) {
    let guarded = increment_guard(dialect, table);
    if let Some(column) = &guarded {
        guard_off(dialect, ctx, table, column, plan);
    }

    let old_columns = table.primary_column_names();
    if !old_columns.is_empty() {
        let old_name = dialect.primary_key_name(ctx, table);
        plan.push(
            dialect.drop_primary_key_sql(ctx, table),
            dialect.create_primary_key_sql(ctx, table, &old_columns, Some(&old_name)),
        );
    }

    for column in &mut table.columns {
        column.is_primary = columns.contains(&column.name);
        column.primary_key_constraint_name = None;
    }
    if let Some(column) = &guarded {
        if let Some(slot) = table.find_column_mut(&column.name) {
            slot.is_generated = false;
            slot.generation_strategy = None;
        }
    }

    if !columns.is_empty() {
        plan.push(
            dialect.create_primary_key_sql(ctx, table, columns, None),
            dialect.drop_primary_key_sql(ctx, table),
        );
    }

    if let Some(column) = guarded {
        if columns.contains(&column.name) {
            guard_on(dialect, ctx, table, &column, plan);
            if let Some(slot) = table.find_column_mut(&column.name) {
                slot.is_generated = column.is_generated;
                slot.generation_strategy = column.generation_strategy;
            }
        }
    }
}

/// Replaces the primary key.
pub fn update_primary_keys<D: DdlDialect + ?Sized>(
    dialect: &D,
    ctx: &DdlContext<'_>,
    table: &mut Table,
    columns: &[String],
    plan: &mut Changeset,
) -> Result<()> {
    for name in columns {
        column_of(table, name)?;
    }
    replace_primary_key(dialect, ctx, table, columns, plan);
    Ok(())
}

/// Drops the primary key.
pub fn drop_primary_key<D: DdlDialect + ?Sized>(
    dialect: &D,
    ctx: &DdlContext<'_>,
    table: &mut Table,
    plan: &mut Changeset,
) -> Result<()> {
    if table.primary_columns().next().is_none() {
        return Err(SyncError::PrimaryKeyNotFound(table.name.clone()));
    }
    replace_primary_key(dialect, ctx, table, &[], plan);
    Ok(())
}

/// Adds a column; primary key and uniqueness follow as separate steps.
pub fn add_column<D: DdlDialect + ?Sized>(
    dialect: &D,
    ctx: &DdlContext<'_>,
    table: &mut Table,
    column: &TableColumn,
    plan: &mut Changeset,
) -> Result<()> {
    if table.find_column(&column.name).is_some() {
        return Err(SyncError::ColumnExists {
            table: table.name.clone(),
            column: column.name.clone(),
        });
    }

    let mut added = column.clone();
    added.is_primary = false;
    added.is_unique = false;
    // An auto-increment column must be keyed before it can increment.
    let deferred = column.is_primary && column.is_increment() && dialect.features().increment_guard;
    if deferred {
        added = added.without_generation();
    }

    plan.push(
        dialect.add_column_sql(ctx, table, &added),
        dialect.drop_column_sql(table, &added),
    );
    table.columns.push(added);

    if column.is_primary {
        let mut columns = table.primary_column_names();
        columns.push(column.name.clone());
        replace_primary_key(dialect, ctx, table, &columns, plan);
        if deferred {
            let mut restored = column_of(table, &column.name)?;
            restored.is_generated = column.is_generated;
            restored.generation_strategy = column.generation_strategy;
            guard_on(dialect, ctx, table, &restored, plan);
            table.replace_column(&column.name, restored);
        }
    }

    if column.is_unique {
        dialect.plan_column_unique(ctx, table, &column.name, true, plan)?;
    }
    if column.comment.is_some() {
        push_comment(dialect, table, &column.name, None, column.comment.as_deref(), plan);
    }
    Ok(())
}

/// Drops a column together with its indices, foreign keys, unique and check
/// constraints, shrinking the primary key first if the column is in it.
pub fn drop_column<D: DdlDialect + ?Sized>(
    dialect: &D,
    ctx: &DdlContext<'_>,
    table: &mut Table,
    column_name: &str,
    plan: &mut Changeset,
) -> Result<()> {
    let column = column_of(table, column_name)?;
    if column.is_primary {
        let remaining: Vec<String> = table
            .primary_column_names()
            .into_iter()
            .filter(|c| c != column_name)
            .collect();
        replace_primary_key(dialect, ctx, table, &remaining, plan);
    }
    // The key change may have cleared auto-increment.
    let column = column_of(table, column_name)?;

    for index in table.column_indices(column_name) {
        plan.push(
            dialect.drop_index_sql(table, &index),
            dialect.create_index_sql(table, &index),
        );
        table.remove_index(&index.name);
    }
    for foreign_key in table.column_foreign_keys(column_name) {
        plan.push(
            dialect.drop_foreign_key_sql(&table.name, &foreign_key),
            dialect.create_foreign_key_sql(&table.name, &foreign_key),
        );
        table.remove_foreign_key(&foreign_key.name);
    }
    if dialect.features().unique_constraints {
        for unique in table.column_uniques(column_name) {
            plan.push(
                dialect.drop_unique_sql(table, &unique)?,
                dialect.create_unique_sql(table, &unique)?,
            );
            table.remove_unique(&unique.name);
        }
    }
    if dialect.features().check_constraints {
        for check in table.column_checks(column_name) {
            plan.push(
                dialect.drop_check_sql(table, &check)?,
                dialect.create_check_sql(table, &check)?,
            );
            table.remove_check(&check.name);
        }
    }

    plan.push(
        dialect.drop_column_sql(table, &column),
        dialect.add_column_sql(ctx, table, &column),
    );
    table.remove_column(column_name);
    Ok(())
}

/// In-place column change: rename, key membership, uniqueness, then the
/// definition itself and the comment.
pub fn change_column<D: DdlDialect + ?Sized>(
    dialect: &D,
    ctx: &DdlContext<'_>,
    table: &mut Table,
    old: &TableColumn,
    new: &TableColumn,
    plan: &mut Changeset,
) -> Result<()> {
    let mut current = column_of(table, &old.name)?;
    if old.name != new.name {
        dialect.plan_rename_column(ctx, table, &old.name, &new.name, plan)?;
        current = column_of(table, &new.name)?;
    }

    if current.is_primary != new.is_primary {
        let mut columns = table.primary_column_names();
        if new.is_primary {
            columns.push(new.name.clone());
        } else {
            columns.retain(|c| *c != new.name);
        }
        dialect.plan_update_primary_keys(ctx, table, &columns, plan)?;
        current = column_of(table, &new.name)?;
    }

    if current.is_unique != new.is_unique {
        dialect.plan_column_unique(ctx, table, &new.name, new.is_unique, plan)?;
        current = column_of(table, &new.name)?;
    }

    let mut target = new.clone();
    target.is_primary = current.is_primary;
    target.is_unique = current.is_unique;
    target
        .primary_key_constraint_name
        .clone_from(&current.primary_key_constraint_name);

    if dialect.is_definition_changed(&current, &target) {
        plan.push(
            dialect.alter_column_sql(ctx, table, &current, &target),
            dialect.alter_column_sql(ctx, table, &target, &current),
        );
    }
    if current.comment != target.comment {
        push_comment(
            dialect,
            table,
            &target.name,
            current.comment.as_deref(),
            target.comment.as_deref(),
            plan,
        );
    }

    table.replace_column(&new.name, target);
    Ok(())
}

/// Adds or removes the single-column unique constraint (or the unique index
/// standing in for it) on `column`.
pub fn column_unique<D: DdlDialect + ?Sized>(
    dialect: &D,
    ctx: &DdlContext<'_>,
    table: &mut Table,
    column: &str,
    unique: bool,
    plan: &mut Changeset,
) -> Result<()> {
    let Some(slot) = table.find_column_mut(column) else {
        return Err(SyncError::ColumnNotFound {
            table: table.name.clone(),
            column: column.to_string(),
        });
    };
    slot.is_unique = unique;
    let columns = vec![column.to_string()];

    if dialect.features().unique_constraints {
        let existing: Vec<TableUnique> = table
            .uniques
            .iter()
            .filter(|u| u.column_names == columns)
            .cloned()
            .collect();
        if unique {
            if existing.is_empty() {
                let constraint = TableUnique::new(
                    ctx.naming.unique_constraint_name(&table.name, &columns),
                    columns,
                );
                plan.push(
                    dialect.create_unique_sql(table, &constraint)?,
                    dialect.drop_unique_sql(table, &constraint)?,
                );
                table.uniques.push(constraint);
            }
        } else {
            for constraint in existing {
                plan.push(
                    dialect.drop_unique_sql(table, &constraint)?,
                    dialect.create_unique_sql(table, &constraint)?,
                );
                table.remove_unique(&constraint.name);
            }
        }
    } else {
        let existing: Vec<TableIndex> = table
            .indices
            .iter()
            .filter(|i| i.is_unique && i.is_single_column(column))
            .cloned()
            .collect();
        if unique {
            if existing.is_empty() {
                let index = TableIndex::new(
                    ctx.naming.unique_constraint_name(&table.name, &columns),
                    columns,
                )
                .unique();
                plan.push(
                    dialect.create_index_sql(table, &index),
                    dialect.drop_index_sql(table, &index),
                );
                table.indices.push(index);
            }
        } else {
            for index in existing {
                plan.push(
                    dialect.drop_index_sql(table, &index),
                    dialect.create_index_sql(table, &index),
                );
                table.remove_index(&index.name);
            }
        }
    }
    Ok(())
}
