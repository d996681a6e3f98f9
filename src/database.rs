//! Database: composition root
//!
//! Builds the schema graph and record types once, then hands out sessions
//! over caller-supplied snapshots. A `Database` holds no table state of its
//! own; it is cheap to clone and can be shared between threads.

use std::sync::Arc;

use tracing::debug;

use crate::config::DatabaseOptions;
use crate::errors::{StoreError, StoreResult};
use crate::observability::Event;
use crate::record::RecordFactory;
use crate::schema::{SchemaDefinition, SchemaGraph};
use crate::session::{Session, SessionOptions};
use crate::state::{DatabaseState, TableState};

/// A reducer: applies `action` through the session's tables
pub type Reducer<A> = Box<dyn Fn(&mut Session, &A) -> StoreResult<()> + Send + Sync>;

/// Everything sessions share
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) graph: SchemaGraph,
    pub(crate) options: DatabaseOptions,
    pub(crate) records: RecordFactory,
}

/// Connected schema plus options
#[derive(Debug, Clone)]
pub struct Database {
    shared: Arc<Shared>,
}

/// Build a database from a schema definition
pub fn create_database(schema: &SchemaDefinition, options: DatabaseOptions) -> StoreResult<Database> {
    Database::new(schema, options)
}

impl Database {
    pub fn new(schema: &SchemaDefinition, options: DatabaseOptions) -> StoreResult<Self> {
        options.config.validate()?;

        let graph = SchemaGraph::build(schema)?;

        for table in options.hooked_tables() {
            if !graph.contains(table) {
                return Err(StoreError::argument(format!(
                    "normalize hook registered for unknown table '{}'",
                    table
                )));
            }
        }

        let records = RecordFactory::build(&graph)?;

        debug!(event = %Event::DatabaseCreated, tables = graph.len());

        Ok(Self {
            shared: Arc::new(Shared {
                graph,
                options,
                records,
            }),
        })
    }

    pub fn schema(&self) -> &SchemaGraph {
        &self.shared.graph
    }

    pub fn options(&self) -> &DatabaseOptions {
        &self.shared.options
    }

    pub fn records(&self) -> &RecordFactory {
        &self.shared.records
    }

    /// Snapshot with every table present and empty
    pub fn initial_state(&self) -> DatabaseState {
        self.shared
            .graph
            .tables()
            .fold(DatabaseState::new(), |state, schema| {
                state.with_table(schema.name(), Arc::new(TableState::for_schema(schema)))
            })
    }

    pub fn create_session(&self, state: &DatabaseState, options: SessionOptions) -> Session {
        Session::new(self.shared.clone(), state, options)
    }

    /// Writable session over `state`
    pub fn session(&self, state: &DatabaseState) -> Session {
        self.create_session(state, SessionOptions::default())
    }

    /// Read-only session over `state`, for selectors
    pub fn select_tables(&self, state: &DatabaseState) -> Session {
        self.create_session(state, SessionOptions::read_only())
    }

    /// Run one reducer in a fresh session and commit
    pub fn reduce<A>(
        &self,
        state: &DatabaseState,
        action: &A,
        reducer: impl Fn(&mut Session, &A) -> StoreResult<()>,
    ) -> StoreResult<DatabaseState> {
        let mut session = self.session(state);
        reducer(&mut session, action)?;
        session.commit()
    }

    /// Combine reducers into one transition function.
    ///
    /// Reducers run in order within one session; each sees the writes of
    /// the ones before it.
    pub fn combine_reducers<A>(
        &self,
        reducers: Vec<Reducer<A>>,
    ) -> impl Fn(&DatabaseState, &A) -> StoreResult<DatabaseState> {
        let db = self.clone();
        move |state: &DatabaseState, action: &A| {
            let mut session = db.session(state);
            for reducer in &reducers {
                reducer(&mut session, action)?;
            }
            session.commit()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, TableDef};
    use serde_json::json;

    fn blog() -> SchemaDefinition {
        SchemaDefinition::new()
            .table("User", TableDef::new().field("id", FieldDef::primary_key()))
            .table(
                "Post",
                TableDef::new()
                    .field("id", FieldDef::primary_key())
                    .field("author", FieldDef::references("User").relation_name("posts")),
            )
    }

    #[test]
    fn test_initial_state_has_every_table() {
        let db = create_database(&blog(), DatabaseOptions::default()).unwrap();
        let state = db.initial_state();

        assert_eq!(state.table_names().collect::<Vec<_>>(), vec!["Post", "User"]);
        assert!(state.get("Post").unwrap().index("author").is_some());
    }

    #[test]
    fn test_hook_for_unknown_table() {
        let options = DatabaseOptions::default().with_normalize_hook("Ghost", |row, _| Ok(row));
        let err = create_database(&blog(), options).unwrap_err();
        assert_eq!(err.code(), "NORMDB_ARGUMENT_INVALID");
    }

    #[test]
    fn test_reduce_commits() {
        let db = create_database(&blog(), DatabaseOptions::default()).unwrap();
        let state = db.initial_state();

        let next = db
            .reduce(&state, &json!({"id": "u1"}), |session, payload| {
                session.insert("User", payload.clone()).map(|_| ())
            })
            .unwrap();

        assert!(next.get("User").unwrap().contains("u1"));
        assert!(state.get("User").unwrap().is_empty());
        assert!(next.shares_table(&state, "Post"));
    }

    #[test]
    fn test_select_tables_is_read_only() {
        let db = create_database(&blog(), DatabaseOptions::default()).unwrap();
        let mut session = db.select_tables(&db.initial_state());

        let err = session.insert("User", json!({"id": "u1"})).unwrap_err();
        assert_eq!(err.code(), "NORMDB_SESSION_READONLY");
        assert!(session.commit().is_err());
    }
}
