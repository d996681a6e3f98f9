//! Table state: ordered ids, rows by id, foreign key indexes

use std::collections::BTreeSet;
use std::sync::Arc;

use im::{OrdMap, Vector};
use serde::{Deserialize, Serialize};

use crate::schema::TableSchema;
use crate::value::Row;

/// Index over one foreign key: referenced id -> owning row ids
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexState {
    pub unique: bool,
    pub values: OrdMap<String, Vec<String>>,
}

impl IndexState {
    pub fn new(unique: bool) -> Self {
        Self {
            unique,
            values: OrdMap::new(),
        }
    }

    /// Ids of the rows holding `value`
    pub fn bucket(&self, value: &str) -> &[String] {
        self.values.get(value).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Add `id` to the bucket for `value`. Returns the bucket size.
    fn add(&mut self, value: String, id: &str) -> usize {
        let bucket = self.values.entry(value).or_default();
        if !bucket.iter().any(|existing| existing == id) {
            bucket.push(id.to_string());
        }
        bucket.len()
    }

    /// Remove `id` from the bucket for `value`, dropping empty buckets
    fn remove(&mut self, value: &str, id: &str) {
        let emptied = match self.values.get_mut(value) {
            Some(bucket) => {
                bucket.retain(|existing| existing != id);
                bucket.is_empty()
            }
            None => false,
        };
        if emptied {
            self.values.remove(value);
        }
    }
}

/// State of one table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableState {
    pub name: String,
    ids: Vector<String>,
    by_id: OrdMap<String, Arc<Row>>,
    indexes: OrdMap<String, IndexState>,
}

impl TableState {
    /// Empty state with one index per foreign key of `schema`
    pub fn for_schema(schema: &TableSchema) -> Self {
        let indexes = schema
            .foreign_key_fields()
            .map(|field| (field.name().to_string(), IndexState::new(field.is_unique())))
            .collect();

        Self {
            name: schema.name().to_string(),
            ids: Vector::new(),
            by_id: OrdMap::new(),
            indexes,
        }
    }

    /// Primary keys in insertion order
    pub fn ids(&self) -> &Vector<String> {
        &self.ids
    }

    pub fn get(&self, id: &str) -> Option<&Row> {
        self.by_id.get(id).map(Arc::as_ref)
    }

    pub(crate) fn get_shared(&self, id: &str) -> Option<&Arc<Row>> {
        self.by_id.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Rows in id order
    pub fn rows(&self) -> impl Iterator<Item = (&String, &Row)> {
        self.ids
            .iter()
            .filter_map(|id| self.by_id.get(id).map(|row| (id, row.as_ref())))
    }

    pub fn index(&self, field: &str) -> Option<&IndexState> {
        self.indexes.get(field)
    }

    pub fn indexes(&self) -> &OrdMap<String, IndexState> {
        &self.indexes
    }

    /// Ids of rows whose foreign key `field` holds `value`
    pub fn get_index(&self, field: &str, value: &str) -> Vec<String> {
        self.indexes
            .get(field)
            .map(|index| index.bucket(value).to_vec())
            .unwrap_or_default()
    }

    /// Store a row, appending its id if it is new. Returns true if new.
    pub(crate) fn put_row(&mut self, id: String, row: Arc<Row>) -> bool {
        let is_new = self.by_id.insert(id.clone(), row).is_none();
        if is_new {
            self.ids.push_back(id);
        }
        is_new
    }

    /// Remove a row from `by_id`. `ids` is repaired by `retain_ids`.
    pub(crate) fn take_row(&mut self, id: &str) -> Option<Arc<Row>> {
        self.by_id.remove(id)
    }

    /// Drop every id in `removed` from the id list
    pub(crate) fn retain_ids(&mut self, removed: &BTreeSet<String>) {
        if !removed.is_empty() {
            self.ids.retain(|id| !removed.contains(id));
        }
    }

    /// Add `id` under `value` in the index of `field`. Returns the size of
    /// the bucket and whether the index is unique.
    pub(crate) fn index_add(
        &mut self,
        field: &str,
        unique: bool,
        value: String,
        id: &str,
    ) -> (usize, bool) {
        let index = self
            .indexes
            .entry(field.to_string())
            .or_insert_with(|| IndexState::new(unique));
        (index.add(value, id), index.unique)
    }

    pub(crate) fn index_remove(&mut self, field: &str, value: &str, id: &str) {
        if let Some(index) = self.indexes.get_mut(field) {
            index.remove(value, id);
        }
    }
}
