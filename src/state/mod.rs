//! Persistent table and database state
//!
//! States are plain data built on `im` persistent maps: cloning is O(1) and
//! a write copies only the changed path. Table states are shared behind
//! `Arc`, so "did this table change" is an `Arc::ptr_eq` check.
//!
//! # Invariants
//!
//! - `ids` and `by_id` have identical membership
//! - every foreign key value on a row appears in exactly one bucket of
//!   that foreign key's index, and buckets are never empty

mod database;
mod table;

pub use database::DatabaseState;
pub use table::{IndexState, TableState};
