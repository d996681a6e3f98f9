//! Database state: one snapshot of every table

use std::sync::Arc;

use im::OrdMap;
use serde::{Deserialize, Serialize};

use super::table::TableState;

/// A full snapshot, `{table name -> TableState}`.
///
/// Cheap to clone. Never mutated in place: `with_table` returns a new
/// snapshot sharing every other table with this one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatabaseState {
    tables: OrdMap<String, Arc<TableState>>,
}

impl DatabaseState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, table: &str) -> Option<&Arc<TableState>> {
        self.tables.get(table)
    }

    /// New snapshot with `table` replaced by `state`
    pub fn with_table(&self, table: impl Into<String>, state: Arc<TableState>) -> Self {
        Self {
            tables: self.tables.update(table.into(), state),
        }
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<TableState>)> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Whether `table` holds the very same state object in both snapshots
    pub fn shares_table(&self, other: &DatabaseState, table: &str) -> bool {
        match (self.get(table), other.get(table)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}
