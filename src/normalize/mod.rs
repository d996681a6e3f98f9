//! Normalizer for normdb
//!
//! Turns nested input into flat, per-table, id-indexed rows in a single
//! recursive pass:
//!
//! - embedded objects under a foreign key are normalized into the
//!   referenced table and replaced by their primary key
//! - children nested under a relation name are normalized into the related
//!   table with the owner id filled in, and removed from the parent row
//!
//! Normalization is pure: it only writes into a `NormalizeContext` and never
//! touches table state.

mod context;
mod infer;
mod normalizer;

pub use context::{IndexOutput, NormalizeContext, TableOutput};
pub use infer::infer_relations;
pub use normalizer::{KeyMode, Normalizer};
