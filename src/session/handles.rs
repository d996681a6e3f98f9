//! Mutable handles: a table, a row, or a relation of a row

use serde_json::{Map, Value};

use crate::errors::{StoreError, StoreResult};
use crate::normalize::infer_relations;
use crate::schema::Relation;
use crate::value::Row;

use super::scope::Session;

impl Session {
    /// Write handle over one table
    pub fn table_mut(&mut self, table: &str) -> StoreResult<TableMut<'_>> {
        self.ensure_writable("table_mut")?;
        self.table(table)?;
        Ok(TableMut {
            session: self,
            table: table.to_string(),
        })
    }

    /// Write handle over an existing row
    pub fn record_mut(&mut self, table: &str, id: &str) -> StoreResult<RecordMut<'_>> {
        self.ensure_writable("record_mut")?;
        if !self.table(table)?.exists(id) {
            return Err(StoreError::missing_row(table, id));
        }
        Ok(RecordMut {
            session: self,
            table: table.to_string(),
            id: id.to_string(),
        })
    }

    /// Write handle over the relation `name` of row `id`
    pub fn relation_mut(&mut self, table: &str, id: &str, name: &str) -> StoreResult<RelationMut<'_>> {
        self.ensure_writable("relation_mut")?;
        let relation = self.schema(table)?.relation(name).cloned().ok_or_else(|| {
            StoreError::lookup(table, format!("unknown relation '{}'", name))
        })?;
        Ok(RelationMut {
            session: self,
            relation,
            owner: id.to_string(),
        })
    }
}

fn into_object(table: &str, value: Value) -> StoreResult<Row> {
    match value {
        Value::Object(row) => Ok(row),
        other => Err(StoreError::argument(format!(
            "'{}' patch must be an object, got {}",
            table, other
        ))),
    }
}

/// Mutable view over one table
#[derive(Debug)]
pub struct TableMut<'s> {
    session: &'s mut Session,
    table: String,
}

impl TableMut<'_> {
    pub fn name(&self) -> &str {
        &self.table
    }

    pub fn insert(&mut self, data: Value) -> StoreResult<Vec<String>> {
        self.session.insert(&self.table, data)
    }

    pub fn update(&mut self, data: Value) -> StoreResult<Vec<String>> {
        self.session.update(&self.table, data)
    }

    pub fn upsert(&mut self, data: Value) -> StoreResult<Vec<String>> {
        self.session.upsert(&self.table, data)
    }

    pub fn delete(&mut self, target: Value) -> StoreResult<usize> {
        self.session.delete(&self.table, target)
    }

    pub fn delete_all(&mut self) -> StoreResult<usize> {
        self.session.delete_all(&self.table)
    }

    pub fn get(&self, id: &str) -> Option<Row> {
        self.session.get(&self.table, id).ok().flatten().cloned()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.session.exists(&self.table, id).unwrap_or(false)
    }

    pub fn ids(&self) -> Vec<String> {
        self.session.ids(&self.table).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.session.len(&self.table).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_index(&self, field: &str, value: &str) -> Vec<String> {
        self.session
            .get_index(&self.table, field, value)
            .unwrap_or_default()
    }

    pub fn record(&mut self, id: &str) -> StoreResult<RecordMut<'_>> {
        self.session.record_mut(&self.table, id)
    }
}

/// Mutable view over one row
#[derive(Debug)]
pub struct RecordMut<'s> {
    session: &'s mut Session,
    table: String,
    id: String,
}

impl RecordMut<'_> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn exists(&self) -> bool {
        self.session.exists(&self.table, &self.id).unwrap_or(false)
    }

    /// Copy of the row; empty once it is deleted
    pub fn value(&self) -> Row {
        self.session
            .get(&self.table, &self.id)
            .ok()
            .flatten()
            .cloned()
            .unwrap_or_default()
    }

    /// Assign fields to the row. Same as `update`.
    pub fn set_value(&mut self, value: Value) -> StoreResult<()> {
        self.update(value)
    }

    /// Merge `patch` into the row. Key fields keep their current values.
    pub fn update(&mut self, patch: Value) -> StoreResult<()> {
        let schema = self.session.schema(&self.table)?;
        let current = self
            .session
            .get(&self.table, &self.id)?
            .ok_or_else(|| StoreError::missing_row(&self.table, &self.id))?;

        let mut row = into_object(&self.table, patch)?;
        row.extend(schema.key_patch(current));

        self.session.update(&self.table, Value::Object(row))?;
        Ok(())
    }

    /// Delete the row, cascading
    pub fn delete(&mut self) -> StoreResult<usize> {
        self.session.delete(&self.table, Value::String(self.id.clone()))
    }

    /// Write handle over one of this row's relations
    pub fn relation(&mut self, name: &str) -> StoreResult<RelationMut<'_>> {
        self.session.relation_mut(&self.table, &self.id, name)
    }
}

/// Mutable view over the rows of one relation of one owner row
#[derive(Debug)]
pub struct RelationMut<'s> {
    session: &'s mut Session,
    relation: Relation,
    owner: String,
}

impl RelationMut<'_> {
    /// Related table
    pub fn table(&self) -> &str {
        &self.relation.table
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Ids currently in the owner's bucket
    pub fn ids(&self) -> StoreResult<Vec<String>> {
        self.session
            .get_index(&self.relation.table, &self.relation.field, &self.owner)
    }

    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.ids()?.len())
    }

    /// Upsert children with the owner filled in
    pub fn add(&mut self, data: Value) -> StoreResult<Vec<String>> {
        let shared = self.session.shared().clone();
        let children = infer_relations(
            &shared.graph,
            &self.relation,
            &self.owner,
            data,
            shared.options.config.scalar_relation,
        )?;
        self.session
            .upsert(&self.relation.table, Value::Array(children))
    }

    /// Detach the listed children from the owner.
    ///
    /// The foreign key is cleared; rows keyed by their foreign keys are
    /// deleted instead. Children outside the bucket are ignored. Returns
    /// the number of rows detached.
    pub fn remove(&mut self, targets: Value) -> StoreResult<usize> {
        let child = self.session.schema(&self.relation.table)?;
        let bucket = self.ids()?;
        let separator = self.session.shared().options.config.key_separator.clone();

        let targets = match targets {
            Value::Array(items) => items,
            other => vec![other],
        };

        let model = self.session.table(&self.relation.table)?;
        let mut ids = Vec::new();
        for target in &targets {
            if let Some(id) = model.resolve_id(target, &separator) {
                if bucket.contains(&id) && !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        if ids.is_empty() {
            return Ok(0);
        }

        if !child.has_declared_primary_key() {
            let targets = ids.into_iter().map(Value::String).collect();
            return self.session.delete(&self.relation.table, Value::Array(targets));
        }

        let mut rows = Vec::with_capacity(ids.len());
        for id in &ids {
            let Some(current) = model.get(id) else {
                continue;
            };
            let mut row = child.key_patch(current);
            row.insert(self.relation.field_name.clone(), Value::Null);
            rows.push(Value::Object(row));
        }

        let count = rows.len();
        self.session.update(&self.relation.table, Value::Array(rows))?;
        Ok(count)
    }

    /// Merge `patch` into every child. Keys and the owner reference are
    /// kept. Returns the number of children patched.
    pub fn update(&mut self, patch: Value) -> StoreResult<usize> {
        let child = self.session.schema(&self.relation.table)?;
        let patch = into_object(&self.relation.table, patch)?;
        let ids = self.ids()?;
        if ids.is_empty() {
            return Ok(0);
        }

        let model = self.session.table(&self.relation.table)?;
        let mut rows = Vec::with_capacity(ids.len());
        for id in &ids {
            let Some(current) = model.get(id) else {
                continue;
            };
            let mut row: Map<String, Value> = patch.clone();
            row.remove(&self.relation.field_name);
            row.extend(child.key_patch(current));
            rows.push(Value::Object(row));
        }

        let count = rows.len();
        self.session.update(&self.relation.table, Value::Array(rows))?;
        Ok(count)
    }

    /// Delete every child, cascading. Returns the number removed.
    pub fn delete(&mut self) -> StoreResult<usize> {
        let ids = self.ids()?;
        if ids.is_empty() {
            return Ok(0);
        }
        let targets = ids.into_iter().map(Value::String).collect();
        self.session.delete(&self.relation.table, Value::Array(targets))
    }
}
