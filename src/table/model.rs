//! TableModel: copy-on-write operations over one table's state

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::config::DatabaseOptions;
use crate::errors::{ConstraintKind, StoreError, StoreResult};
use crate::normalize::TableOutput;
use crate::observability::Event;
use crate::schema::TableSchema;
use crate::state::TableState;
use crate::value::{key_from_value, Row};

/// Which existence rule a write enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// Every row must be new
    Insert,
    /// Every row must already exist
    Update,
    /// Rows are inserted or merged as found
    Upsert,
}

impl WriteKind {
    fn event(self) -> Event {
        match self {
            WriteKind::Insert => Event::RowsInserted,
            WriteKind::Update => Event::RowsUpdated,
            WriteKind::Upsert => Event::RowsUpserted,
        }
    }
}

/// One table's state within a session
#[derive(Debug, Clone)]
pub struct TableModel {
    schema: Arc<TableSchema>,
    /// State the session started from
    initial: Arc<TableState>,
    state: Arc<TableState>,
    dirty: bool,
}

impl TableModel {
    /// Bind `schema` to `state`, or to a fresh empty state
    pub fn new(schema: Arc<TableSchema>, state: Option<Arc<TableState>>) -> Self {
        let state = state.unwrap_or_else(|| Arc::new(TableState::for_schema(&schema)));
        Self {
            schema,
            initial: state.clone(),
            state,
            dirty: false,
        }
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    /// Current state reference
    pub fn state(&self) -> &Arc<TableState> {
        &self.state
    }

    pub fn get(&self, id: &str) -> Option<&Row> {
        self.state.get(id)
    }

    pub fn exists(&self, id: &str) -> bool {
        self.state.contains(id)
    }

    /// Primary keys in insertion order
    pub fn ids(&self) -> Vec<String> {
        self.state.ids().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Ids whose foreign key `field` holds `value`; empty if none
    pub fn get_index(&self, field: &str, value: &str) -> Vec<String> {
        self.state.get_index(field, value)
    }

    /// Whether any write succeeded since the session started
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether the state reference differs from the starting one
    pub fn has_changed(&self) -> bool {
        !Arc::ptr_eq(&self.initial, &self.state)
    }

    /// Resolve a delete target to an id.
    ///
    /// Strings and numbers are ids; objects are keyed through the schema.
    pub fn resolve_id(&self, target: &Value, separator: &str) -> Option<String> {
        match target {
            Value::Object(row) => self.schema.get_primary_key(row, separator),
            other => key_from_value(other),
        }
    }

    /// Apply normalized rows. Returns the number of rows written; rows that
    /// compare unmodified are skipped.
    pub fn write(
        &mut self,
        output: TableOutput,
        kind: WriteKind,
        options: &DatabaseOptions,
    ) -> StoreResult<usize> {
        let table = self.schema.name();

        for id in &output.ids {
            match kind {
                WriteKind::Insert if self.state.contains(id) => {
                    return Err(StoreError::constraint(
                        ConstraintKind::DuplicateId,
                        table,
                        id.as_str(),
                        "row already exists",
                    ));
                }
                WriteKind::Update if !self.state.contains(id) => {
                    return Err(StoreError::missing_row(table, id));
                }
                _ => {}
            }
        }

        let mut changed = Vec::new();
        for (id, row) in output.into_rows() {
            let prev = self.state.get_shared(&id).cloned();

            let merged = match &prev {
                Some(prev) => {
                    let mut merged = (**prev).clone();
                    merged.extend(row);
                    merged
                }
                None => row,
            };

            if let Some(prev) = &prev {
                if !self
                    .schema
                    .is_modified(prev, &merged, |a, b| options.rows_equal(a, b))
                {
                    trace!(event = %Event::RowUnchanged, table, id = %id);
                    continue;
                }
            }
            changed.push((id, prev, merged));
        }

        if changed.is_empty() {
            return Ok(0);
        }

        // Every old bucket entry of the batch goes before any new one is
        // added, so rows may trade unique values within one write.
        let mut next = (*self.state).clone();
        let mut additions = Vec::new();
        for (id, prev, merged) in &changed {
            additions.extend(self.unindex(&mut next, id, prev.as_deref(), merged)?);
        }
        for (field, unique, value, id) in additions {
            let (size, unique) = next.index_add(&field, unique, value.clone(), &id);
            if unique && size > 1 {
                return Err(StoreError::constraint(
                    ConstraintKind::UniqueIndex,
                    table,
                    id.as_str(),
                    format!("'{}' = '{}' is already taken", field, value),
                ));
            }
        }

        let written = changed.len();
        for (id, _, merged) in changed {
            next.put_row(id, Arc::new(merged));
        }

        self.state = Arc::new(next);
        self.dirty = true;
        debug!(event = %kind.event(), table, count = written);

        Ok(written)
    }

    /// Drop `id` from the bucket of every foreign key whose value changed
    /// and return the `(field, unique, value, id)` entries still to add.
    /// Not-null keys are enforced on the merged row.
    fn unindex(
        &self,
        next: &mut TableState,
        id: &str,
        prev: Option<&Row>,
        merged: &Row,
    ) -> StoreResult<Vec<(String, bool, String, String)>> {
        let table = self.schema.name();

        let old: BTreeMap<&str, Option<String>> = prev
            .map(|row| {
                self.schema
                    .get_foreign_keys(row)
                    .into_iter()
                    .map(|fk| (fk.field, fk.value))
                    .collect()
            })
            .unwrap_or_default();

        let mut additions = Vec::new();
        for fk in self.schema.get_foreign_keys(merged) {
            if fk.not_null && fk.value.is_none() {
                return Err(StoreError::constraint(
                    ConstraintKind::NotNull,
                    table,
                    id,
                    format!("'{}' must reference a row of '{}'", fk.field, fk.references),
                ));
            }

            let before = old.get(fk.field).cloned().flatten();
            if before == fk.value {
                continue;
            }

            if let Some(before) = before {
                next.index_remove(fk.field, &before, id);
            }
            if let Some(value) = fk.value {
                additions.push((fk.field.to_string(), fk.unique, value, id.to_string()));
            }
        }

        Ok(additions)
    }

    /// Remove rows by id, repairing every index bucket that listed them.
    /// Unknown ids are ignored. Returns the number of rows removed.
    pub fn remove(&mut self, ids: &[String]) -> usize {
        let mut next = (*self.state).clone();
        let mut removed = BTreeSet::new();

        for id in ids {
            let Some(row) = next.take_row(id) else {
                continue;
            };
            for fk in self.schema.get_foreign_keys(&row) {
                if let Some(value) = fk.value {
                    next.index_remove(fk.field, &value, id);
                }
            }
            removed.insert(id.clone());
        }

        if removed.is_empty() {
            return 0;
        }

        next.retain_ids(&removed);
        self.state = Arc::new(next);
        self.dirty = true;
        debug!(event = %Event::RowsDeleted, table = self.schema.name(), count = removed.len());

        removed.len()
    }

    /// Reset to an empty state. Returns the number of rows dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.state.len();
        if count == 0 {
            return 0;
        }

        self.state = Arc::new(TableState::for_schema(&self.schema));
        self.dirty = true;
        debug!(event = %Event::TableCleared, table = self.schema.name(), count);

        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, TableDef};
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn output(rows: Vec<Value>) -> TableOutput {
        let mut out = TableOutput::default();
        for value in rows {
            let row = row(value);
            let id = crate::value::row_key(&row, "id").unwrap();
            out.put(&id, row);
        }
        out
    }

    fn posts() -> TableModel {
        let def = TableDef::new()
            .field("id", FieldDef::primary_key())
            .field("author", FieldDef::references("User").relation_name("posts"));
        TableModel::new(Arc::new(TableSchema::from_def("Post", &def).unwrap()), None)
    }

    fn profiles() -> TableModel {
        let def = TableDef::new()
            .field("id", FieldDef::primary_key())
            .field("user", FieldDef::references("User").unique().not_null());
        TableModel::new(Arc::new(TableSchema::from_def("Profile", &def).unwrap()), None)
    }

    #[test]
    fn test_insert_and_index() {
        let options = DatabaseOptions::default();
        let mut table = posts();

        let written = table
            .write(
                output(vec![json!({"id": "p1", "author": "u1"}), json!({"id": "p2", "author": "u1"})]),
                WriteKind::Insert,
                &options,
            )
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(table.ids(), vec!["p1", "p2"]);
        assert_eq!(table.get_index("author", "u1"), vec!["p1", "p2"]);
        assert!(table.has_changed());
    }

    #[test]
    fn test_insert_duplicate_rejected() {
        let options = DatabaseOptions::default();
        let mut table = posts();
        table
            .write(output(vec![json!({"id": "p1"})]), WriteKind::Insert, &options)
            .unwrap();
        let before = table.state().clone();

        let err = table
            .write(output(vec![json!({"id": "p1"})]), WriteKind::Insert, &options)
            .unwrap_err();
        assert_eq!(err.constraint_kind(), Some(ConstraintKind::DuplicateId));
        assert!(Arc::ptr_eq(&before, table.state()));
    }

    #[test]
    fn test_update_missing_is_lookup_error() {
        let options = DatabaseOptions::default();
        let mut table = posts();

        let err = table
            .write(output(vec![json!({"id": "p1", "title": "x"})]), WriteKind::Update, &options)
            .unwrap_err();
        assert_eq!(err.code(), "NORMDB_LOOKUP_FAILED");
    }

    #[test]
    fn test_update_moves_index_bucket() {
        let options = DatabaseOptions::default();
        let mut table = posts();
        table
            .write(output(vec![json!({"id": "p1", "author": "u1", "title": "a"})]), WriteKind::Insert, &options)
            .unwrap();

        table
            .write(output(vec![json!({"id": "p1", "author": "u2"})]), WriteKind::Update, &options)
            .unwrap();

        assert!(table.get_index("author", "u1").is_empty());
        assert_eq!(table.get_index("author", "u2"), vec!["p1"]);
        // merged over the old row
        assert_eq!(table.get("p1").unwrap()["title"], "a");
    }

    #[test]
    fn test_unchanged_write_keeps_reference() {
        let options = DatabaseOptions::default();
        let mut table = posts();
        table
            .write(output(vec![json!({"id": "p1", "author": "u1"})]), WriteKind::Insert, &options)
            .unwrap();
        let before = table.state().clone();

        let written = table
            .write(output(vec![json!({"id": "p1", "author": "u1"})]), WriteKind::Upsert, &options)
            .unwrap();

        assert_eq!(written, 0);
        assert!(Arc::ptr_eq(&before, table.state()));
    }

    #[test]
    fn test_unique_and_not_null() {
        let options = DatabaseOptions::default();
        let mut table = profiles();
        table
            .write(output(vec![json!({"id": "a", "user": "u1"})]), WriteKind::Insert, &options)
            .unwrap();

        let err = table
            .write(output(vec![json!({"id": "b", "user": "u1"})]), WriteKind::Insert, &options)
            .unwrap_err();
        assert_eq!(err.constraint_kind(), Some(ConstraintKind::UniqueIndex));
        assert_eq!(table.len(), 1);

        let err = table
            .write(output(vec![json!({"id": "c"})]), WriteKind::Insert, &options)
            .unwrap_err();
        assert_eq!(err.constraint_kind(), Some(ConstraintKind::NotNull));
    }

    #[test]
    fn test_unique_values_swap_in_one_write() {
        let options = DatabaseOptions::default();
        let mut table = profiles();
        table
            .write(
                output(vec![json!({"id": "a", "user": "u1"}), json!({"id": "b", "user": "u2"})]),
                WriteKind::Insert,
                &options,
            )
            .unwrap();

        let written = table
            .write(
                output(vec![json!({"id": "b", "user": "u1"}), json!({"id": "a", "user": "u2"})]),
                WriteKind::Update,
                &options,
            )
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(table.get_index("user", "u1"), vec!["b"]);
        assert_eq!(table.get_index("user", "u2"), vec!["a"]);

        // two rows claiming one value in the same batch still fail
        let err = table
            .write(
                output(vec![json!({"id": "a", "user": "u3"}), json!({"id": "b", "user": "u3"})]),
                WriteKind::Update,
                &options,
            )
            .unwrap_err();
        assert_eq!(err.constraint_kind(), Some(ConstraintKind::UniqueIndex));
        assert_eq!(table.get_index("user", "u1"), vec!["b"]);
        assert!(table.get_index("user", "u3").is_empty());
    }

    #[test]
    fn test_remove_repairs_indexes() {
        let options = DatabaseOptions::default();
        let mut table = posts();
        table
            .write(
                output(vec![json!({"id": "p1", "author": "u1"}), json!({"id": "p2", "author": "u1"})]),
                WriteKind::Insert,
                &options,
            )
            .unwrap();

        assert_eq!(table.remove(&["p1".to_string(), "ghost".to_string()]), 1);
        assert_eq!(table.ids(), vec!["p2"]);
        assert_eq!(table.get_index("author", "u1"), vec!["p2"]);

        assert_eq!(table.remove(&["ghost".to_string()]), 0);
    }

    #[test]
    fn test_clear() {
        let options = DatabaseOptions::default();
        let mut table = posts();
        assert!(!table.is_dirty());
        table
            .write(output(vec![json!({"id": "p1", "author": "u1"})]), WriteKind::Insert, &options)
            .unwrap();

        assert!(table.is_dirty());
        assert_eq!(table.clear(), 1);
        assert!(table.is_empty());
        assert!(table.get_index("author", "u1").is_empty());
        assert_eq!(table.clear(), 0);
    }

    #[test]
    fn test_resolve_id() {
        let table = posts();
        assert_eq!(table.resolve_id(&json!("p1"), ":"), Some("p1".to_string()));
        assert_eq!(table.resolve_id(&json!(3), ":"), Some("3".to_string()));
        assert_eq!(table.resolve_id(&json!({"id": "p1", "title": "x"}), ":"), Some("p1".to_string()));
        assert_eq!(table.resolve_id(&json!(null), ":"), None);
    }
}
