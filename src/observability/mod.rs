//! Observability subsystem for normdb
//!
//! Structured logging goes through `tracing`. Each log line names a typed
//! [`Event`] so output can be filtered on a stable field:
//!
//! ```ignore
//! tracing::debug!(event = %Event::RowsInserted, table = "Post", count = 2);
//! ```
//!
//! Observability is read-only: nothing here affects a write.

mod events;

pub use events::Event;
