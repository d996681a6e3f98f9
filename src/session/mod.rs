//! Session subsystem for normdb
//!
//! A session binds every table to one `DatabaseState` for the duration of
//! one transition.
//!
//! # Invariants
//!
//! - Each write call either applies completely or leaves every table as it
//!   was before the call
//! - Rows gathered for other tables are upserted there; the origin table
//!   applies its own rows directly
//! - `commit` includes exactly the tables whose state reference changed
//! - A read-only session rejects every write and `commit`

mod handles;
mod scope;

pub use handles::{RecordMut, RelationMut, TableMut};
pub use scope::{Session, SessionOptions};
