//! Explicit schema context.
//!
//! Dialects and catalogs never look up "the current schema" on their own;
//! the runner resolves it once and passes a [`SchemaContext`] down.

use std::collections::BTreeSet;

/// Default database and schema of a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaContext {
    /// Current database (the namespace used by MySQL table paths).
    pub database: Option<String>,
    /// Current schema (Postgres, SAP HANA).
    pub schema: Option<String>,
    /// Indices that are not synchronized and never count as unique columns.
    pub unsynchronized_indices: BTreeSet<String>,
}

impl SchemaContext {
    /// Creates a context with the given default schema.
    #[must_use]
    pub fn with_schema(schema: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            ..Self::default()
        }
    }

    /// Creates a context with the given default database.
    #[must_use]
    pub fn with_database(database: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            ..Self::default()
        }
    }
}

/// A dot-separated table or view path split into namespace and name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePath {
    /// Database or schema, when given.
    pub namespace: Option<String>,
    /// Object name.
    pub name: String,
}

impl TablePath {
    /// Splits `schema.table` (or `database.schema.table`, keeping the last
    /// two parts).
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let mut parts: Vec<&str> = path.split('.').collect();
        let name = parts.pop().unwrap_or_default().to_string();
        Self {
            namespace: parts.pop().map(str::to_string),
            name,
        }
    }

    /// Fills the namespace from `default` when the path had none.
    #[must_use]
    pub fn or_namespace(mut self, default: Option<&str>) -> Self {
        if self.namespace.is_none() {
            self.namespace = default.map(str::to_string);
        }
        self
    }

    /// Returns `namespace.name`, or just the name.
    #[must_use]
    pub fn qualified(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}.{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Returns the name alone when the namespace is the default one.
    #[must_use]
    pub fn display_in(&self, default: Option<&str>) -> String {
        match (&self.namespace, default) {
            (Some(ns), Some(d)) if ns == d => self.name.clone(),
            _ => self.qualified(),
        }
    }

    /// Returns the same namespace with another object name.
    #[must_use]
    pub fn sibling(&self, name: &str) -> Self {
        let inner = Self::parse(name);
        Self {
            namespace: inner.namespace.or_else(|| self.namespace.clone()),
            name: inner.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paths() {
        assert_eq!(
            TablePath::parse("public.user"),
            TablePath {
                namespace: Some("public".into()),
                name: "user".into()
            }
        );
        assert_eq!(TablePath::parse("user").namespace, None);
        assert_eq!(TablePath::parse("db.public.user").qualified(), "public.user");
    }

    #[test]
    fn test_default_namespace() {
        let path = TablePath::parse("user").or_namespace(Some("public"));
        assert_eq!(path.qualified(), "public.user");
        assert_eq!(path.display_in(Some("public")), "user");
        assert_eq!(path.display_in(Some("other")), "public.user");
    }

    #[test]
    fn test_sibling_keeps_namespace() {
        let path = TablePath::parse("public.user");
        assert_eq!(path.sibling("member").qualified(), "public.member");
        assert_eq!(path.sibling("archive.member").qualified(), "archive.member");
    }
}
