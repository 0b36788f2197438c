//! SQL statements and up/down pairs.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw SQL plus bound parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// SQL text.
    pub sql: String,
    /// Bound parameters, in placeholder order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Value>,
}

impl Statement {
    /// Creates a statement without parameters.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Vec::new(),
        }
    }

    /// Creates a statement with bound parameters.
    #[must_use]
    pub fn with_parameters(sql: impl Into<String>, parameters: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            parameters,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)?;
        if !self.parameters.is_empty() {
            write!(f, " -- PARAMETERS: {}", Value::from(self.parameters.clone()))?;
        }
        Ok(())
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Self::new(sql)
    }
}

/// Parallel lists of forward and rollback statements.
///
/// `down[i]` undoes `up[i]`; rolling back runs the down list in reverse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    /// Forward statements, in execution order.
    pub up: Vec<Statement>,
    /// Inverse statements, paired by position with `up`.
    pub down: Vec<Statement>,
}

impl Changeset {
    /// Creates an empty changeset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one up statement and its inverse.
    pub fn push(&mut self, up: impl Into<Statement>, down: impl Into<Statement>) {
        self.up.push(up.into());
        self.down.push(down.into());
    }

    /// Appends all pairs of `other`.
    pub fn extend(&mut self, other: Self) {
        self.up.extend(other.up);
        self.down.extend(other.down);
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.up.len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.up.is_empty()
    }

    /// Rollback order: the down list reversed.
    pub fn rollback_order(&self) -> impl Iterator<Item = &Statement> {
        self.down.iter().rev()
    }

    /// Returns the up SQL as `;`-terminated lines.
    #[must_use]
    pub fn up_sql(&self) -> String {
        render(self.up.iter())
    }

    /// Returns the rollback SQL as `;`-terminated lines.
    #[must_use]
    pub fn down_sql(&self) -> String {
        render(self.rollback_order())
    }
}

fn render<'a>(statements: impl Iterator<Item = &'a Statement>) -> String {
    statements.map(|s| format!("{s};\n")).collect()
}
