//! Databases and schemas.
//!
//! These statements run outside any transaction: several engines refuse to
//! create or drop a database inside one.

use tracing::{debug, info};

use crate::error::Result;
use crate::runner::QueryRunner;
use crate::statement::Changeset;

impl QueryRunner {
    /// Creates a database. With `if_not_exist`, an existing one is kept.
    pub async fn create_database(&mut self, database: &str, if_not_exist: bool) -> Result<()> {
        let up = self.dialect.create_database_sql(database)?;
        let down = self.dialect.drop_database_sql(database)?;
        if if_not_exist && self.has_database(database).await? {
            debug!(database = %database, "Database exists, skipping");
            return Ok(());
        }
        info!(database = %database, "Creating database");
        let mut plan = Changeset::new();
        plan.push(up, down);
        self.execute_direct(plan).await
    }

    /// Drops a database. With `if_exist`, a missing one is not an error.
    pub async fn drop_database(&mut self, database: &str, if_exist: bool) -> Result<()> {
        let up = self.dialect.drop_database_sql(database)?;
        let down = self.dialect.create_database_sql(database)?;
        if if_exist && !self.has_database(database).await? {
            debug!(database = %database, "Database does not exist, skipping");
            return Ok(());
        }
        info!(database = %database, "Dropping database");
        let mut plan = Changeset::new();
        plan.push(up, down);
        self.execute_direct(plan).await
    }

    /// Creates a schema. With `if_not_exist`, an existing one is kept.
    pub async fn create_schema(&mut self, schema: &str, if_not_exist: bool) -> Result<()> {
        let up = self.dialect.create_schema_sql(schema)?;
        let down = self.dialect.drop_schema_sql(schema, false)?;
        if if_not_exist && self.has_schema(schema).await? {
            debug!(schema = %schema, "Schema exists, skipping");
            return Ok(());
        }
        info!(schema = %schema, "Creating schema");
        let mut plan = Changeset::new();
        plan.push(up, down);
        self.execute_direct(plan).await
    }

    /// Drops a schema, with everything in it when `cascade` is set.
    pub async fn drop_schema(&mut self, schema: &str, if_exist: bool, cascade: bool) -> Result<()> {
        let up = self.dialect.drop_schema_sql(schema, cascade)?;
        let down = self.dialect.create_schema_sql(schema)?;
        if if_exist && !self.has_schema(schema).await? {
            debug!(schema = %schema, "Schema does not exist, skipping");
            return Ok(());
        }
        info!(schema = %schema, cascade, "Dropping schema");
        let mut plan = Changeset::new();
        plan.push(up, down);
        self.execute_direct(plan).await
    }
}
