//! Session: one transition over one snapshot

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::database::Shared;
use crate::errors::{StoreError, StoreResult};
use crate::normalize::{KeyMode, NormalizeContext, Normalizer};
use crate::observability::Event;
use crate::record::Record;
use crate::schema::TableSchema;
use crate::state::DatabaseState;
use crate::table::{TableModel, WriteKind};
use crate::value::Row;

/// Session construction options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Reject every write and `commit`
    pub read_only: bool,
}

impl SessionOptions {
    pub fn read_only() -> Self {
        Self { read_only: true }
    }
}

/// Every table of the database bound to one snapshot.
///
/// Writes go through the session so cross-table effects (nested rows,
/// emits, cascades) land in the same transition. Each write call is
/// atomic over all tables.
pub struct Session {
    shared: Arc<Shared>,
    start: DatabaseState,
    tables: BTreeMap<String, TableModel>,
    read_only: bool,
}

impl Session {
    pub(crate) fn new(shared: Arc<Shared>, state: &DatabaseState, options: SessionOptions) -> Self {
        let tables = shared
            .graph
            .tables()
            .map(|schema| {
                let model = TableModel::new(schema.clone(), state.get(schema.name()).cloned());
                (schema.name().to_string(), model)
            })
            .collect();

        debug!(
            event = %Event::SessionOpened,
            tables = shared.graph.len(),
            read_only = options.read_only
        );

        Self {
            shared,
            start: state.clone(),
            tables,
            read_only: options.read_only,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Table model by name
    pub fn table(&self, name: &str) -> StoreResult<&TableModel> {
        self.tables
            .get(name)
            .ok_or_else(|| StoreError::lookup(name, "unknown table"))
    }

    fn model_mut(&mut self, table: &str) -> StoreResult<&mut TableModel> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| StoreError::lookup(table, "unknown table"))
    }

    /// Table models in name order
    pub fn tables(&self) -> impl Iterator<Item = &TableModel> {
        self.tables.values()
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub(crate) fn schema(&self, table: &str) -> StoreResult<Arc<TableSchema>> {
        Ok(self.shared.graph.require_table(table)?.clone())
    }

    pub(crate) fn ensure_writable(&self, operation: &str) -> StoreResult<()> {
        if self.read_only {
            return Err(StoreError::read_only(operation));
        }
        Ok(())
    }

    // ==================== Reads ====================

    pub fn get(&self, table: &str, id: &str) -> StoreResult<Option<&Row>> {
        Ok(self.table(table)?.get(id))
    }

    pub fn exists(&self, table: &str, id: &str) -> StoreResult<bool> {
        Ok(self.table(table)?.exists(id))
    }

    pub fn ids(&self, table: &str) -> StoreResult<Vec<String>> {
        Ok(self.table(table)?.ids())
    }

    pub fn len(&self, table: &str) -> StoreResult<usize> {
        Ok(self.table(table)?.len())
    }

    pub fn get_index(&self, table: &str, field: &str, value: &str) -> StoreResult<Vec<String>> {
        Ok(self.table(table)?.get_index(field, value))
    }

    /// Record view over row `id`, if it exists
    pub fn record(&self, table: &str, id: &str) -> StoreResult<Option<Record<'_>>> {
        let kind = self.shared.records.get(table)?.clone();
        if !self.table(table)?.exists(id) {
            return Ok(None);
        }
        Ok(Some(Record::new(self, kind, id.to_string())))
    }

    /// Record views over every row, in id order
    pub fn all(&self, table: &str) -> StoreResult<Vec<Record<'_>>> {
        let kind = self.shared.records.get(table)?;
        Ok(self
            .table(table)?
            .ids()
            .into_iter()
            .map(|id| Record::new(self, kind.clone(), id))
            .collect())
    }

    // ==================== Writes ====================

    /// Insert new rows. Nested and embedded rows of other tables are
    /// upserted.
    pub fn insert(&mut self, table: &str, data: Value) -> StoreResult<Vec<String>> {
        self.ensure_writable("insert")?;
        self.atomically("insert", |session| session.write(table, data, WriteKind::Insert))
    }

    /// Merge fields into existing rows
    pub fn update(&mut self, table: &str, data: Value) -> StoreResult<Vec<String>> {
        self.ensure_writable("update")?;
        self.atomically("update", |session| session.write(table, data, WriteKind::Update))
    }

    /// Insert rows that are new, merge the rest
    pub fn upsert(&mut self, table: &str, data: Value) -> StoreResult<Vec<String>> {
        self.ensure_writable("upsert")?;
        self.atomically("upsert", |session| session.write(table, data, WriteKind::Upsert))
    }

    /// Apply the rows a normalization gathered for tables other than its
    /// origin, then the records emitted by hooks.
    pub fn upsert_context(&mut self, ctx: NormalizeContext) -> StoreResult<()> {
        self.ensure_writable("upsert")?;
        self.atomically("upsert", |session| session.route(ctx))
    }

    /// Delete rows by id or by partial row, cascading along relations
    /// flagged `cascade`. Unknown ids are skipped. Returns the number of
    /// rows removed from `table`.
    pub fn delete(&mut self, table: &str, target: Value) -> StoreResult<usize> {
        self.ensure_writable("delete")?;
        self.atomically("delete", |session| {
            let model = session.table(table)?;
            let separator = &session.shared.options.config.key_separator;

            let targets = match target {
                Value::Array(items) => items,
                other => vec![other],
            };

            let mut ids = Vec::with_capacity(targets.len());
            for target in &targets {
                let id = model.resolve_id(target, separator).ok_or_else(|| {
                    StoreError::argument(format!(
                        "cannot resolve a '{}' id from {}",
                        table, target
                    ))
                })?;
                ids.push(id);
            }

            let mut visiting = BTreeSet::new();
            session.delete_ids(table, ids, &mut visiting)
        })
    }

    /// Delete every row, cascading, and reset the table to empty
    pub fn delete_all(&mut self, table: &str) -> StoreResult<usize> {
        self.ensure_writable("delete_all")?;
        self.atomically("delete_all", |session| {
            let ids = session.table(table)?.ids();
            let mut visiting = BTreeSet::new();
            let doomed = session.mark(table, ids, &mut visiting)?;
            session.cascade(table, &doomed, &mut visiting)?;
            session.model_mut(table)?.clear();
            Ok(doomed.len())
        })
    }

    /// Build the snapshot holding every table whose state changed.
    /// Unchanged tables keep their reference from the starting snapshot.
    pub fn commit(&self) -> StoreResult<DatabaseState> {
        self.ensure_writable("commit")?;

        let mut state = self.start.clone();
        let mut changed = 0;
        for (name, model) in &self.tables {
            if model.has_changed() {
                state = state.with_table(name.clone(), model.state().clone());
                changed += 1;
            }
        }

        debug!(event = %Event::SessionCommitted, changed);
        Ok(state)
    }

    // ==================== Internals ====================

    /// Run `op`, restoring every table if it fails
    fn atomically<T>(
        &mut self,
        operation: &str,
        op: impl FnOnce(&mut Self) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let saved = self.tables.clone();
        match op(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.tables = saved;
                debug!(event = %Event::WriteRejected, operation, code = err.code(), error = %err);
                Err(err)
            }
        }
    }

    fn write(&mut self, table: &str, data: Value, kind: WriteKind) -> StoreResult<Vec<String>> {
        let shared = self.shared.clone();
        let mode = match kind {
            WriteKind::Update => KeyMode::Require,
            WriteKind::Insert | WriteKind::Upsert => KeyMode::Generate,
        };

        let mut ctx = NormalizeContext::new(table);
        let ids = Normalizer::new(&shared.graph, &shared.options).normalize(table, data, &mut ctx, mode)?;

        // The existence rule applies to the rows the caller passed; rows of
        // this table reached through nesting are upserted.
        let requested: BTreeSet<String> = ids.iter().cloned().collect();
        let (own, nested) = ctx.take_output(table).partition(&requested);

        let model = self.model_mut(table)?;
        model.write(own, kind, &shared.options)?;
        model.write(nested, WriteKind::Upsert, &shared.options)?;

        self.route(ctx)?;
        Ok(ids)
    }

    fn route(&mut self, ctx: NormalizeContext) -> StoreResult<()> {
        let shared = self.shared.clone();
        let (origin, output, emits) = ctx.into_parts();

        for (name, rows) in output {
            if name == origin {
                continue;
            }
            self.model_mut(&name)?.write(rows, WriteKind::Upsert, &shared.options)?;
        }

        for (name, records) in emits {
            self.write(&name, Value::Array(records), WriteKind::Upsert)?;
        }

        Ok(())
    }

    fn delete_ids(
        &mut self,
        table: &str,
        ids: Vec<String>,
        visiting: &mut BTreeSet<(String, String)>,
    ) -> StoreResult<usize> {
        let doomed = self.mark(table, ids, visiting)?;
        self.cascade(table, &doomed, visiting)?;
        Ok(self.model_mut(table)?.remove(&doomed))
    }

    /// Existing ids not already being deleted in this pass
    fn mark(
        &self,
        table: &str,
        ids: Vec<String>,
        visiting: &mut BTreeSet<(String, String)>,
    ) -> StoreResult<Vec<String>> {
        let model = self.table(table)?;
        Ok(ids
            .into_iter()
            .filter(|id| model.exists(id) && visiting.insert((table.to_string(), id.clone())))
            .collect())
    }

    /// Delete every row reached from `doomed` through `cascade` relations,
    /// walking breadth-first. Rows in `doomed` itself are left to the caller.
    fn cascade(
        &mut self,
        table: &str,
        doomed: &[String],
        visiting: &mut BTreeSet<(String, String)>,
    ) -> StoreResult<()> {
        let mut queue: VecDeque<(String, Vec<String>)> = VecDeque::new();
        queue.push_back((table.to_string(), doomed.to_vec()));
        let mut removals: BTreeMap<String, Vec<String>> = BTreeMap::new();

        while let Some((parent_table, parents)) = queue.pop_front() {
            let schema = self.schema(&parent_table)?;

            for id in &parents {
                for relation in schema.relations().iter().filter(|r| r.cascade) {
                    let children = self.table(&relation.table)?.get_index(&relation.field, id);
                    let children = self.mark(&relation.table, children, visiting)?;
                    if children.is_empty() {
                        continue;
                    }

                    debug!(
                        event = %Event::CascadeDelete,
                        table = %parent_table,
                        id = %id,
                        child_table = %relation.table,
                        count = children.len()
                    );
                    removals
                        .entry(relation.table.clone())
                        .or_default()
                        .extend(children.iter().cloned());
                    queue.push_back((relation.table.clone(), children));
                }
            }
        }

        for (child_table, ids) in removals {
            self.model_mut(&child_table)?.remove(&ids);
        }
        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("tables", &self.tables.keys().collect::<Vec<_>>())
            .field("read_only", &self.read_only)
            .finish()
    }
}
