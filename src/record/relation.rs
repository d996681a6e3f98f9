//! RelationSet: the rows of one reverse relation

use std::fmt;

use crate::session::Session;
use crate::value::Row;

use super::proxy::Record;

/// Rows of a related table whose foreign key holds one owner id.
///
/// The ids are taken from the index bucket when the set is created.
#[derive(Clone)]
pub struct RelationSet<'s> {
    session: &'s Session,
    table: String,
    ids: Vec<String>,
}

impl<'s> RelationSet<'s> {
    pub(crate) fn new(session: &'s Session, table: String, ids: Vec<String>) -> Self {
        Self { session, table, ids }
    }

    /// Related table
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|existing| existing == id)
    }

    /// Records in bucket order
    pub fn all(&self) -> Vec<Record<'s>> {
        self.ids.iter().filter_map(|id| self.record(id)).collect()
    }

    /// Record `id`, if it belongs to this set
    pub fn get(&self, id: &str) -> Option<Record<'s>> {
        if self.contains(id) {
            self.record(id)
        } else {
            None
        }
    }

    pub fn first(&self) -> Option<Record<'s>> {
        self.ids.first().and_then(|id| self.record(id))
    }

    /// Plain rows in bucket order
    pub fn values(&self) -> Vec<Row> {
        self.all().iter().map(Record::value).collect()
    }

    fn record(&self, id: &str) -> Option<Record<'s>> {
        self.session.record(&self.table, id).ok().flatten()
    }
}

impl fmt::Debug for RelationSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationSet")
            .field("table", &self.table)
            .field("ids", &self.ids)
            .finish()
    }
}
