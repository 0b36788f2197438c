//! Runner options, command-line settings and declared-schema files.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use clap::Args;
use serde::{Deserialize, Serialize};

use crate::context::SchemaContext;
use crate::error::Result;
use crate::metadata::DEFAULT_METADATA_TABLE;
use crate::schema::{Table, View};

/// Options of one query runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Database unqualified names resolve to (MySQL).
    pub database: Option<String>,
    /// Schema unqualified names resolve to (Postgres, SAP HANA).
    pub schema: Option<String>,
    /// Statements running longer than this are reported as slow.
    pub max_query_execution_time: Option<Duration>,
    /// Table persisting view definitions.
    pub metadata_table: String,
    /// Indices that are never created, dropped or compared.
    pub unsynchronized_indices: BTreeSet<String>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl RunnerOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self {
            database: None,
            schema: None,
            max_query_execution_time: None,
            metadata_table: DEFAULT_METADATA_TABLE.to_string(),
            unsynchronized_indices: BTreeSet::new(),
        }
    }

    /// Sets the default database.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Sets the default schema.
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Sets the slow-query threshold.
    #[must_use]
    pub const fn with_max_query_execution_time(mut self, threshold: Duration) -> Self {
        self.max_query_execution_time = Some(threshold);
        self
    }

    /// Renames the metadata table.
    #[must_use]
    pub fn with_metadata_table(mut self, name: impl Into<String>) -> Self {
        self.metadata_table = name.into();
        self
    }

    /// Excludes an index from synchronization.
    #[must_use]
    pub fn ignore_index(mut self, name: impl Into<String>) -> Self {
        self.unsynchronized_indices.insert(name.into());
        self
    }

    /// Name resolution context these options describe.
    #[must_use]
    pub fn schema_context(&self) -> SchemaContext {
        SchemaContext {
            database: self.database.clone(),
            schema: self.schema.clone(),
            unsynchronized_indices: self.unsynchronized_indices.clone(),
        }
    }
}

/// Connection settings shared by every command.
#[derive(Debug, Clone, Args)]
pub struct ConnectionSettings {
    /// Connection URL; the scheme selects the dialect.
    #[arg(long = "url", env = "DATABASE_URL")]
    pub database_url: String,

    /// Default schema.
    #[arg(long, env = "OXIDE_SYNC_SCHEMA")]
    pub schema: Option<String>,

    /// Default database.
    #[arg(long, env = "OXIDE_SYNC_DATABASE")]
    pub database: Option<String>,

    /// Slow-query threshold in milliseconds.
    #[arg(long = "max-query-ms", env = "OXIDE_SYNC_MAX_QUERY_MS")]
    pub max_query_ms: Option<u64>,

    /// Table persisting view definitions.
    #[arg(long, env = "OXIDE_SYNC_METADATA_TABLE", default_value = DEFAULT_METADATA_TABLE)]
    pub metadata_table: String,
}

impl ConnectionSettings {
    /// Runner options for these settings.
    #[must_use]
    pub fn runner_options(&self) -> RunnerOptions {
        let mut options = RunnerOptions::new().with_metadata_table(self.metadata_table.clone());
        options.database.clone_from(&self.database);
        options.schema.clone_from(&self.schema);
        options.max_query_execution_time = self.max_query_ms.map(Duration::from_millis);
        options
    }
}

/// A declared schema as stored in a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeclaredSchema {
    /// Declared tables.
    pub tables: Vec<Table>,
    /// Declared views.
    pub views: Vec<View>,
}

/// Reads a declared schema from `path`.
pub fn load_declared_schema(path: &Path) -> Result<DeclaredSchema> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_options_build_context() {
        let options = RunnerOptions::new()
            .with_schema("public")
            .ignore_index("IDX_legacy");
        let ctx = options.schema_context();
        assert_eq!(ctx.schema.as_deref(), Some("public"));
        assert!(ctx.unsynchronized_indices.contains("IDX_legacy"));
        assert_eq!(options.metadata_table, "oxide_metadata");
    }

    #[test]
    fn test_settings_convert_threshold() {
        let settings = ConnectionSettings {
            database_url: "postgres://localhost/app".to_string(),
            schema: Some("public".to_string()),
            database: None,
            max_query_ms: Some(250),
            metadata_table: "meta".to_string(),
        };
        let options = settings.runner_options();
        assert_eq!(
            options.max_query_execution_time,
            Some(Duration::from_millis(250))
        );
        assert_eq!(options.metadata_table, "meta");
    }

    #[test]
    fn test_load_declared_schema() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "tables": [{{
                    "name": "user",
                    "columns": [
                        {{"name": "id", "type": "int", "isPrimary": true}},
                        {{"name": "email", "type": "varchar", "length": "255", "isUnique": true}}
                    ]
                }}],
                "views": [{{"name": "active_users", "expression": "SELECT 1"}}]
            }}"#
        )
        .unwrap();

        let schema = load_declared_schema(file.path()).unwrap();
        assert_eq!(schema.tables[0].name, "user");
        assert!(schema.tables[0].columns[0].is_primary);
        assert!(schema.tables[0].columns[1].is_unique);
        assert_eq!(schema.views.len(), 1);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_declared_schema(Path::new("/nonexistent/schema.json")).unwrap_err();
        assert!(matches!(err, crate::error::SyncError::Io(_)));
    }
}
