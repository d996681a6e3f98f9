//! Schema model for normdb
//!
//! Tables, fields, key roles and relations. Declarations (`SchemaDefinition`)
//! are turned into `TableSchema`s in two passes:
//!
//! - each table builds its own fields
//! - `SchemaGraph::connect` resolves foreign key targets and attaches the
//!   reverse relations
//!
//! After connection every schema is immutable.

mod field;
mod graph;
mod loader;
mod table;
mod types;

pub use field::{FieldRole, FieldSchema, ForeignKey};
pub use graph::SchemaGraph;
pub use loader::SchemaLoader;
pub use table::{ForeignKeyValue, Relation, TableSchema};
pub use types::{ComputedValue, FieldDef, FieldType, SchemaDefinition, TableDef};
