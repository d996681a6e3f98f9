//! Error types for normdb
//!
//! Error codes:
//! - NORMDB_ARGUMENT_INVALID (missing or invalid constructor input)
//! - NORMDB_SCHEMA_INVALID (unresolved reference, reserved name collision)
//! - NORMDB_NORMALIZATION_FAILED (input cannot be flattened into rows)
//! - NORMDB_CONSTRAINT_VIOLATION (unique index, duplicate id, not-null)
//! - NORMDB_LOOKUP_FAILED (row or property does not exist)
//! - NORMDB_SESSION_READONLY (mutation attempted on a read-only session)
//!
//! Every error is raised synchronously at the point of violation and
//! leaves the affected tables untouched.

use std::fmt;

use thiserror::Error;

/// Which constraint a write violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Two rows share a value on a unique foreign key
    UniqueIndex,
    /// Insert of an id that already exists
    DuplicateId,
    /// A not-null foreign key has no value
    NotNull,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintKind::UniqueIndex => write!(f, "unique index"),
            ConstraintKind::DuplicateId => write!(f, "duplicate id"),
            ConstraintKind::NotNull => write!(f, "not null"),
        }
    }
}

/// Error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Argument,
    Schema,
    Normalization,
    Constraint,
    Lookup,
    SessionState,
}

impl ErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::Argument => "NORMDB_ARGUMENT_INVALID",
            ErrorCode::Schema => "NORMDB_SCHEMA_INVALID",
            ErrorCode::Normalization => "NORMDB_NORMALIZATION_FAILED",
            ErrorCode::Constraint => "NORMDB_CONSTRAINT_VIOLATION",
            ErrorCode::Lookup => "NORMDB_LOOKUP_FAILED",
            ErrorCode::SessionState => "NORMDB_SESSION_READONLY",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// All errors produced by normdb
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("invalid argument: {message}")]
    Argument { message: String },

    #[error("schema error in '{table}': {message}")]
    Schema { table: String, message: String },

    #[error("cannot normalize '{table}': {message}")]
    Normalization { table: String, message: String },

    #[error("{kind} violated on '{table}' (id '{id}'): {message}")]
    Constraint {
        kind: ConstraintKind,
        table: String,
        id: String,
        message: String,
    },

    #[error("lookup failed in '{table}': {message}")]
    Lookup { table: String, message: String },

    #[error("session is read-only: {operation} rejected")]
    SessionState { operation: String },
}

impl StoreError {
    pub fn argument(message: impl Into<String>) -> Self {
        StoreError::Argument {
            message: message.into(),
        }
    }

    pub fn schema(table: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Schema {
            table: table.into(),
            message: message.into(),
        }
    }

    pub fn normalization(table: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Normalization {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Primary key could not be determined for a row
    pub fn missing_primary_key(table: impl Into<String>) -> Self {
        let table = table.into();
        let message = format!("cannot determine primary key for row of '{}'", table);
        StoreError::Normalization { table, message }
    }

    pub fn constraint(
        kind: ConstraintKind,
        table: impl Into<String>,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        StoreError::Constraint {
            kind,
            table: table.into(),
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn lookup(table: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Lookup {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Row with the given id does not exist
    pub fn missing_row(table: impl Into<String>, id: &str) -> Self {
        let table = table.into();
        let message = format!("no row with id '{}'", id);
        StoreError::Lookup { table, message }
    }

    pub fn read_only(operation: impl Into<String>) -> Self {
        StoreError::SessionState {
            operation: operation.into(),
        }
    }

    /// Returns the error category
    pub fn error_code(&self) -> ErrorCode {
        match self {
            StoreError::Argument { .. } => ErrorCode::Argument,
            StoreError::Schema { .. } => ErrorCode::Schema,
            StoreError::Normalization { .. } => ErrorCode::Normalization,
            StoreError::Constraint { .. } => ErrorCode::Constraint,
            StoreError::Lookup { .. } => ErrorCode::Lookup,
            StoreError::SessionState { .. } => ErrorCode::SessionState,
        }
    }

    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        self.error_code().code()
    }

    /// Returns the constraint kind for constraint violations
    pub fn constraint_kind(&self) -> Option<ConstraintKind> {
        match self {
            StoreError::Constraint { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result type for normdb operations
pub type StoreResult<T> = Result<T, StoreError>;
