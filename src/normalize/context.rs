//! Per-call normalization scratch space

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::errors::{ConstraintKind, StoreError, StoreResult};
use crate::value::Row;

/// Index entries gathered for one foreign key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOutput {
    pub unique: bool,
    pub values: BTreeMap<String, Vec<String>>,
}

/// Rows gathered for one table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableOutput {
    /// Ids in first-seen order
    pub ids: Vec<String>,
    pub by_id: BTreeMap<String, Row>,
    pub indexes: BTreeMap<String, IndexOutput>,
}

impl TableOutput {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Rows in first-seen order
    pub fn into_rows(mut self) -> Vec<(String, Row)> {
        self.ids
            .into_iter()
            .filter_map(|id| self.by_id.remove(&id).map(|row| (id, row)))
            .collect()
    }

    /// Split into the rows whose id is in `ids` and the rest. Index
    /// entries are not carried over; table writes rebuild them.
    pub(crate) fn partition(self, ids: &BTreeSet<String>) -> (TableOutput, TableOutput) {
        let mut selected = TableOutput::default();
        let mut rest = TableOutput::default();
        for (id, row) in self.into_rows() {
            if ids.contains(&id) {
                selected.put(&id, row);
            } else {
                rest.put(&id, row);
            }
        }
        (selected, rest)
    }

    /// Store a row. A row seen twice in one call is merged, later fields
    /// winning.
    pub(crate) fn put(&mut self, id: &str, row: Row) {
        match self.by_id.get_mut(id) {
            Some(existing) => existing.extend(row),
            None => {
                self.ids.push(id.to_string());
                self.by_id.insert(id.to_string(), row);
            }
        }
    }

    /// Drop `id` from every bucket, before re-indexing a row seen twice
    pub(crate) fn unindex(&mut self, id: &str) {
        for index in self.indexes.values_mut() {
            for bucket in index.values.values_mut() {
                bucket.retain(|existing| existing != id);
            }
            index.values.retain(|_, bucket| !bucket.is_empty());
        }
    }

    /// Record `id` under `value` for foreign key `field`
    pub(crate) fn index(
        &mut self,
        table: &str,
        field: &str,
        unique: bool,
        value: String,
        id: &str,
    ) -> StoreResult<()> {
        let index = self.indexes.entry(field.to_string()).or_insert_with(|| IndexOutput {
            unique,
            values: BTreeMap::new(),
        });

        let bucket = index.values.entry(value.clone()).or_default();
        if !bucket.iter().any(|existing| existing == id) {
            bucket.push(id.to_string());
        }

        if index.unique && bucket.len() > 1 {
            return Err(StoreError::constraint(
                ConstraintKind::UniqueIndex,
                table,
                id,
                format!("'{}' = '{}' is already held by '{}'", field, value, bucket[0]),
            ));
        }

        Ok(())
    }
}

/// Scratch state of one normalization call
#[derive(Debug, Clone)]
pub struct NormalizeContext {
    origin: String,
    output: BTreeMap<String, TableOutput>,
    emits: BTreeMap<String, Vec<Value>>,
    depth: usize,
}

impl NormalizeContext {
    /// New context for a write that starts at table `origin`
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            output: BTreeMap::new(),
            emits: BTreeMap::new(),
            depth: 0,
        }
    }

    /// Table the write started at
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Route `record` to `table`, independent of nested relations. It is
    /// upserted there once the originating write has been applied.
    pub fn emit(&mut self, table: impl Into<String>, record: Value) {
        self.emits.entry(table.into()).or_default().push(record);
    }

    pub fn output(&self, table: &str) -> Option<&TableOutput> {
        self.output.get(table)
    }

    pub fn outputs(&self) -> &BTreeMap<String, TableOutput> {
        &self.output
    }

    pub fn emits(&self) -> &BTreeMap<String, Vec<Value>> {
        &self.emits
    }

    /// Remove and return the rows gathered for `table`
    pub fn take_output(&mut self, table: &str) -> TableOutput {
        self.output.remove(table).unwrap_or_default()
    }

    /// Split into `(origin, output, emits)`
    pub fn into_parts(
        self,
    ) -> (
        String,
        BTreeMap<String, TableOutput>,
        BTreeMap<String, Vec<Value>>,
    ) {
        (self.origin, self.output, self.emits)
    }

    pub(crate) fn table_mut(&mut self, table: &str) -> &mut TableOutput {
        self.output.entry(table.to_string()).or_default()
    }

    pub(crate) fn enter(&mut self, table: &str, max_depth: usize) -> StoreResult<()> {
        if self.depth >= max_depth {
            return Err(StoreError::normalization(
                table,
                format!("nesting exceeds max depth {}", max_depth),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}
