//! normdb - an in-memory, schema-driven, normalized relational state store
//!
//! Nested domain objects go in; flat, id-indexed tables with foreign key
//! indexes come out, inside an immutable snapshot that can be replaced
//! wholesale between transitions.
//!
//! ```ignore
//! let db = create_database(&schema, DatabaseOptions::default())?;
//! let mut session = db.session(&db.initial_state());
//! session.insert("Post", json!({"id": "p1", "author": {"id": "u1"}}))?;
//! let next = session.commit()?;
//! ```

pub mod cli;
pub mod config;
pub mod database;
pub mod errors;
pub mod normalize;
pub mod observability;
pub mod record;
pub mod schema;
pub mod session;
pub mod state;
pub mod table;
pub mod value;

pub use config::{uuid_key_generator, DatabaseOptions, ScalarRelation, StoreConfig};
pub use database::{create_database, Database, Reducer};
pub use errors::{ConstraintKind, ErrorCode, StoreError, StoreResult};
pub use normalize::NormalizeContext;
pub use record::{FieldValue, Record, RelationSet};
pub use schema::{FieldDef, SchemaDefinition, TableDef};
pub use session::{RecordMut, RelationMut, Session, SessionOptions, TableMut};
pub use state::{DatabaseState, IndexState, TableState};
pub use value::Row;
