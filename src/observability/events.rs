//! Observable events for normdb
//!
//! Every log line carries a stable `event` field naming one of these
//! variants. Emission goes through `tracing`; the library never installs a
//! subscriber.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Schema graph connected and record types built
    DatabaseCreated,
    /// Session bound to a snapshot
    SessionOpened,
    /// Session produced a new snapshot
    SessionCommitted,
    /// Rows inserted into a table
    RowsInserted,
    /// Existing rows merged with new fields
    RowsUpdated,
    /// Mixed insert/update pass
    RowsUpserted,
    /// Rows removed from a table
    RowsDeleted,
    /// Delete propagated through a cascade relation
    CascadeDelete,
    /// Table reset to empty
    TableCleared,
    /// Write failed and every table was restored
    WriteRejected,
    /// Row compared unmodified; write skipped
    RowUnchanged,
}

impl Event {
    /// Returns the event name
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::DatabaseCreated => "DATABASE_CREATED",
            Event::SessionOpened => "SESSION_OPENED",
            Event::SessionCommitted => "SESSION_COMMITTED",
            Event::RowsInserted => "ROWS_INSERTED",
            Event::RowsUpdated => "ROWS_UPDATED",
            Event::RowsUpserted => "ROWS_UPSERTED",
            Event::RowsDeleted => "ROWS_DELETED",
            Event::CascadeDelete => "CASCADE_DELETE",
            Event::TableCleared => "TABLE_CLEARED",
            Event::WriteRejected => "WRITE_REJECTED",
            Event::RowUnchanged => "ROW_UNCHANGED",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
