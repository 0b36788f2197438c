//! Error types for schema synchronization.

/// Errors that can occur while introspecting or reconciling a schema.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// `start_transaction` was called while a transaction is active.
    #[error("Transaction already started for the given connection, commit current transaction before starting a new one")]
    TransactionAlreadyStarted,

    /// `commit_transaction` or `rollback_transaction` without an active transaction.
    #[error("Transaction is not started yet, start transaction before committing or rolling it back")]
    TransactionNotStarted,

    /// The query runner was used after `release`.
    #[error("Query runner already released, cannot run queries anymore")]
    RunnerReleased,

    /// A table referenced by name does not exist.
    #[error("Table \"{0}\" does not exist")]
    TableNotFound(String),

    /// A view referenced by name does not exist.
    #[error("View \"{0}\" does not exist")]
    ViewNotFound(String),

    /// A column referenced by name does not exist.
    #[error("Column \"{column}\" was not found in table \"{table}\"")]
    ColumnNotFound {
        /// Table that was searched.
        table: String,
        /// Missing column.
        column: String,
    },

    /// A column is added twice.
    #[error("Column \"{column}\" already exists in table \"{table}\"")]
    ColumnExists {
        /// Table being altered.
        table: String,
        /// Duplicate column.
        column: String,
    },

    /// An index referenced by name does not exist.
    #[error("Index \"{index}\" was not found in table \"{table}\"")]
    IndexNotFound {
        /// Table that was searched.
        table: String,
        /// Missing index.
        index: String,
    },

    /// A foreign key referenced by name does not exist.
    #[error("Foreign key \"{foreign_key}\" was not found in table \"{table}\"")]
    ForeignKeyNotFound {
        /// Table that was searched.
        table: String,
        /// Missing foreign key.
        foreign_key: String,
    },

    /// A unique constraint referenced by name does not exist.
    #[error("Unique constraint \"{unique}\" was not found in table \"{table}\"")]
    UniqueNotFound {
        /// Table that was searched.
        table: String,
        /// Missing constraint.
        unique: String,
    },

    /// A check constraint referenced by name does not exist.
    #[error("Check constraint \"{check}\" was not found in table \"{table}\"")]
    CheckNotFound {
        /// Table that was searched.
        table: String,
        /// Missing constraint.
        check: String,
    },

    /// An exclusion constraint referenced by name does not exist.
    #[error("Exclusion constraint \"{exclusion}\" was not found in table \"{table}\"")]
    ExclusionNotFound {
        /// Table that was searched.
        table: String,
        /// Missing constraint.
        exclusion: String,
    },

    /// The table has no primary key to drop.
    #[error("Table \"{0}\" has no primary key")]
    PrimaryKeyNotFound(String),

    /// A previous enum rename left a `<type>_old` type behind.
    #[error("Enum type \"{0}\" already exists, drop it before changing the enum values again")]
    StaleEnumType(String),

    /// The dialect cannot express the requested feature.
    #[error("{dialect} does not support {feature}.{}", .alternative.map(|a| format!(" Use {a} instead.")).unwrap_or_default())]
    Unsupported {
        /// Dialect name.
        dialect: &'static str,
        /// What was requested.
        feature: String,
        /// The supported alternative, if any.
        alternative: Option<&'static str>,
    },

    /// A statement failed; the offending SQL and parameters are attached.
    #[error("Query failed: {sql} -- PARAMETERS: {parameters}: {source}")]
    QueryFailed {
        /// SQL text.
        sql: String,
        /// Bound parameters rendered as JSON.
        parameters: String,
        /// Underlying driver error.
        #[source]
        source: Box<SyncError>,
    },

    /// Database error reported by sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Error reported by a non-sqlx driver.
    #[error("Driver error: {0}")]
    Driver(String),

    /// A declared table, column or view is inconsistent.
    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),

    /// IO error (reading declared schema files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Builds an [`SyncError::Unsupported`] error.
    #[must_use]
    pub fn unsupported(
        dialect: &'static str,
        feature: impl Into<String>,
        alternative: Option<&'static str>,
    ) -> Self {
        Self::Unsupported {
            dialect,
            feature: feature.into(),
            alternative,
        }
    }

    /// Wraps an error raised while executing `sql`.
    #[must_use]
    pub fn query_failed(sql: &str, parameters: &[serde_json::Value], source: Self) -> Self {
        // Already wrapped by an inner layer.
        if matches!(source, Self::QueryFailed { .. }) {
            return source;
        }
        Self::QueryFailed {
            sql: sql.to_string(),
            parameters: serde_json::Value::from(parameters.to_vec()).to_string(),
            source: Box::new(source),
        }
    }

    /// Returns true for errors raised before touching the database.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        !matches!(
            self,
            Self::QueryFailed { .. }
                | Self::Database(_)
                | Self::Driver(_)
                | Self::Io(_)
                | Self::Serialization(_)
        )
    }
}

/// Result type for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;
