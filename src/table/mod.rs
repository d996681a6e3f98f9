//! Table model for normdb
//!
//! One `TableModel` per table per session. It owns the table's current
//! state and applies already-normalized rows to it.
//!
//! # Invariants
//!
//! - `ids` and `byId` hold the same membership after every operation
//! - Every foreign key value on a row sits in exactly one index bucket
//! - State is replaced wholesale, never edited in place; a failed call
//!   leaves the previous state reference untouched
//! - A write whose rows all compare unmodified keeps the state reference

mod model;

pub use model::{TableModel, WriteKind};
