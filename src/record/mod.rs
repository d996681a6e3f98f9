//! Record views for normdb
//!
//! Records expose normalized rows as object-like graphs without ever
//! building a denormalized copy.
//!
//! # Design Principles
//!
//! - One accessor table per schema table, built with the database
//! - Reserved names (`id`, `table`, `value`, `_cache`) are rejected when
//!   the accessor table is built, not when a property is read
//! - Views borrow their session: a record can never be held across a write

mod accessor;
mod proxy;
mod relation;

pub use accessor::{Accessor, RecordFactory, RecordType, RESERVED};
pub use proxy::{FieldValue, Record};
pub use relation::RelationSet;
