//! Record: a read view over one row

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::errors::{StoreError, StoreResult};
use crate::session::Session;
use crate::value::{row_key, Row};

use super::accessor::{Accessor, RecordType};
use super::relation::RelationSet;

/// Result of reading a record property
#[derive(Debug, Clone)]
pub enum FieldValue<'s> {
    /// Plain attribute value (`Null` if unset)
    Value(Value),
    /// Row behind a foreign key or unique relation, if any
    Record(Option<Record<'s>>),
    /// Rows of a relation
    Set(RelationSet<'s>),
}

impl<'s> FieldValue<'s> {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            FieldValue::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_record(self) -> Option<Record<'s>> {
        match self {
            FieldValue::Record(record) => record,
            _ => None,
        }
    }

    pub fn into_set(self) -> Option<RelationSet<'s>> {
        match self {
            FieldValue::Set(set) => Some(set),
            _ => None,
        }
    }
}

/// View over the row `id` of one table.
///
/// Borrows the session, so it cannot outlive a write. Foreign key and
/// relation lookups are memoized per record; attributes are always read
/// from the live row.
#[derive(Clone)]
pub struct Record<'s> {
    session: &'s Session,
    kind: Arc<RecordType>,
    id: String,
    memo: RefCell<BTreeMap<String, Vec<String>>>,
}

impl<'s> Record<'s> {
    pub(crate) fn new(session: &'s Session, kind: Arc<RecordType>, id: String) -> Self {
        Self {
            session,
            kind,
            id,
            memo: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn table(&self) -> &str {
        self.kind.table()
    }

    /// Whether the row still exists in the session
    pub fn exists(&self) -> bool {
        self.row().is_some()
    }

    /// Copy of the underlying row; empty if it no longer exists
    pub fn value(&self) -> Row {
        self.row().cloned().unwrap_or_default()
    }

    fn row(&self) -> Option<&'s Row> {
        self.session
            .table(self.kind.table())
            .ok()
            .and_then(|model| model.get(&self.id))
    }

    fn accessor(&self, prop: &str) -> StoreResult<&Accessor> {
        self.kind.accessor(prop).ok_or_else(|| {
            StoreError::lookup(self.kind.table(), format!("unknown property '{}'", prop))
        })
    }

    /// Read property `prop` through its accessor
    pub fn get(&self, prop: &str) -> StoreResult<FieldValue<'s>> {
        match self.accessor(prop)? {
            Accessor::Attribute { field } => Ok(FieldValue::Value(
                self.row()
                    .and_then(|row| row.get(field))
                    .cloned()
                    .unwrap_or(Value::Null),
            )),
            Accessor::ForeignKey { field, target } => {
                let ids = self.memoized(prop, || {
                    Ok(self.row().and_then(|row| row_key(row, field)).into_iter().collect())
                })?;
                self.first_record(target, ids).map(FieldValue::Record)
            }
            Accessor::UniqueRelation { table, field } => {
                let ids = self.memoized(prop, || {
                    Ok(self.session.table(table)?.get_index(field, &self.id))
                })?;
                self.first_record(table, ids).map(FieldValue::Record)
            }
            Accessor::RelationSet { table, field } => {
                let ids = self.memoized(prop, || {
                    Ok(self.session.table(table)?.get_index(field, &self.id))
                })?;
                Ok(FieldValue::Set(RelationSet::new(self.session, table.clone(), ids)))
            }
        }
    }

    /// Attribute value, or the raw id stored under a foreign key
    pub fn attr(&self, prop: &str) -> StoreResult<Value> {
        let field = match self.accessor(prop)? {
            Accessor::Attribute { field } | Accessor::ForeignKey { field, .. } => field,
            _ => {
                return Err(StoreError::lookup(
                    self.kind.table(),
                    format!("'{}' is a relation, not an attribute", prop),
                ))
            }
        };
        Ok(self
            .row()
            .and_then(|row| row.get(field))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Row behind a foreign key or unique relation
    pub fn related(&self, prop: &str) -> StoreResult<Option<Record<'s>>> {
        match self.get(prop)? {
            FieldValue::Record(record) => Ok(record),
            _ => Err(StoreError::lookup(
                self.kind.table(),
                format!("'{}' does not point at a single row", prop),
            )),
        }
    }

    /// Rows of a non-unique relation
    pub fn relation(&self, prop: &str) -> StoreResult<RelationSet<'s>> {
        match self.get(prop)? {
            FieldValue::Set(set) => Ok(set),
            _ => Err(StoreError::lookup(
                self.kind.table(),
                format!("'{}' is not a relation set", prop),
            )),
        }
    }

    fn memoized(
        &self,
        prop: &str,
        resolve: impl FnOnce() -> StoreResult<Vec<String>>,
    ) -> StoreResult<Vec<String>> {
        if let Some(ids) = self.memo.borrow().get(prop) {
            return Ok(ids.clone());
        }
        let ids = resolve()?;
        self.memo.borrow_mut().insert(prop.to_string(), ids.clone());
        Ok(ids)
    }

    fn first_record(&self, table: &str, ids: Vec<String>) -> StoreResult<Option<Record<'s>>> {
        match ids.into_iter().next() {
            Some(id) => self.session.record(table, &id),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("table", &self.kind.table())
            .field("id", &self.id)
            .finish()
    }
}

impl PartialEq for Record<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.kind.table() == other.kind.table() && self.id == other.id
    }
}
