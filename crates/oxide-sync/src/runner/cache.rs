//! Copy-on-write cache of loaded tables and views.
//!
//! Operations never touch the published snapshot. They describe their
//! change as a closure over a private copy, and the copy is published as the
//! next generation in one pointer swap once the DDL has run. Holders of an
//! older [`SchemaSnapshot`] keep seeing it unchanged.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::schema::{Table, View};

/// One published state of the cache.
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    generation: u64,
    tables: BTreeMap<String, Table>,
    views: BTreeMap<String, View>,
}

impl SchemaSnapshot {
    /// Generation number; every published change increments it.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Cached table under `key`.
    #[must_use]
    pub fn table(&self, key: &str) -> Option<&Table> {
        self.tables.get(key)
    }

    /// Cached view under `key`.
    #[must_use]
    pub fn view(&self, key: &str) -> Option<&View> {
        self.views.get(key)
    }

    /// Every cached table, ordered by key.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// Every cached view, ordered by key.
    pub fn views(&self) -> impl Iterator<Item = &View> {
        self.views.values()
    }

    /// Stores `table` under `key`.
    pub fn put_table(&mut self, key: impl Into<String>, table: Table) {
        self.tables.insert(key.into(), table);
    }

    /// Forgets the table under `key`.
    pub fn remove_table(&mut self, key: &str) {
        self.tables.remove(key);
    }

    /// Stores `view` under `key`.
    pub fn put_view(&mut self, key: impl Into<String>, view: View) {
        self.views.insert(key.into(), view);
    }

    /// Forgets the view under `key`.
    pub fn remove_view(&mut self, key: &str) {
        self.views.remove(key);
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.tables.clear();
        self.views.clear();
    }
}

/// The cache of one query runner.
#[derive(Debug, Default)]
pub struct SchemaCache {
    current: Arc<SchemaSnapshot>,
}

impl SchemaCache {
    /// Creates an empty cache at generation 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<SchemaSnapshot> {
        Arc::clone(&self.current)
    }

    /// Generation of the published snapshot.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.current.generation
    }

    /// Cached table under `key`.
    #[must_use]
    pub fn table(&self, key: &str) -> Option<&Table> {
        self.current.table(key)
    }

    /// Cached view under `key`.
    #[must_use]
    pub fn view(&self, key: &str) -> Option<&View> {
        self.current.view(key)
    }

    /// Applies `change` to a copy and publishes it as the next generation.
    pub fn update(&mut self, change: impl FnOnce(&mut SchemaSnapshot)) -> u64 {
        let mut next = SchemaSnapshot::clone(&self.current);
        change(&mut next);
        next.generation = self.current.generation + 1;
        self.current = Arc::new(next);
        self.current.generation
    }

    /// Publishes the contents of an earlier snapshot as the next generation.
    pub fn restore(&mut self, snapshot: &SchemaSnapshot) -> u64 {
        self.update(|next| {
            next.tables.clone_from(&snapshot.tables);
            next.views.clone_from(&snapshot.views);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_publishes_next_generation() {
        let mut cache = SchemaCache::new();
        let before = cache.snapshot();
        let generation = cache.update(|s| s.put_table("user", Table::new("user")));

        assert_eq!(generation, 1);
        assert!(cache.table("user").is_some());
        // Earlier readers keep their view.
        assert_eq!(before.generation(), 0);
        assert!(before.table("user").is_none());
    }

    #[test]
    fn test_restore_moves_forward() {
        let mut cache = SchemaCache::new();
        cache.update(|s| s.put_view("v", View::new("v", "SELECT 1")));
        let saved = cache.snapshot();
        cache.update(SchemaSnapshot::clear);

        assert!(cache.view("v").is_none());
        assert_eq!(cache.restore(&saved), 3);
        assert!(cache.view("v").is_some());
    }
}
